//! Per-exchange protocol adapters (spec.md C5) — the hardest subsystem:
//! subscribe, bootstrap, apply updates, detect gaps, verify checksums.

mod backoff;
mod bitfinex;
mod bittrex;
mod error;
mod gdax;
mod state;

pub use backoff::{Backoff, RESET_THRESHOLD};
pub use bitfinex::BitfinexAdapter;
pub use bittrex::BittrexAdapter;
pub use error::AdapterError;
pub use gdax::GdaxAdapter;
pub use state::AdapterState;
