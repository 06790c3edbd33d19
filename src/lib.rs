//! Live L3 limit order book reconstruction from exchange WebSocket feeds.
//!
//! An [`adapter`] drives one exchange's protocol, mutating an
//! [`orderbook::OrderBook`] through the shared mutation algebra and
//! publishing [`orderbook::Snapshot`]s through a [`publisher::Publisher`].
//! A [`supervisor::Supervisor`] owns the publisher and the lifecycle of
//! every configured adapter.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod metrics;
pub mod orderbook;
pub mod price_level;
pub mod publisher;
pub mod rest;
pub mod supervisor;
pub mod transport;
pub mod utils;

pub use config::{load_subscriptions, ConfigError, Subscription};
pub use orderbook::{BookRegistry, OrderBook, OrderBookError, Snapshot, SnapshotOrder};
pub use publisher::{Publisher, SubscribeMode, SubscriptionId};
pub use supervisor::{Supervisor, SupervisorError};
