//! The L3 order book aggregate (spec.md C2): mutation algebra, snapshotting,
//! and the per-adapter registry of instrument books.

mod book;
mod error;
mod registry;
mod snapshot;

pub use book::OrderBook;
pub use error::OrderBookError;
pub use registry::BookRegistry;
pub use snapshot::{Snapshot, SnapshotOrder};
