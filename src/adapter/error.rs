//! Failures surfaced by an [`super::ExchangeAdapter`] variant.

use crate::orderbook::OrderBookError;
use crate::rest::RestError;
use crate::transport::TransportError;
use thiserror::Error;

/// Adapter-level failures.
///
/// Every variant here is something the adapter's own state machine
/// reacts to — a `Gap`/`ChecksumMismatch` sends it to `Recovering`, a
/// `Transport`/`Rest` failure sends it to `Backoff` — rather than
/// something that should propagate out to the supervisor, except
/// `BootstrapFailed` after retries are exhausted, which the supervisor
/// treats as this adapter's failure to ever reach `Live`.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The underlying transport failed or disconnected.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// A REST snapshot request failed.
    #[error("rest: {0}")]
    Rest(#[from] RestError),

    /// Applying an update to the order book failed.
    #[error("order book: {0}")]
    OrderBook(#[from] OrderBookError),

    /// A sequence gap was detected: `book.sequence` then the update's
    /// sequence that skipped ahead.
    #[error("sequence gap for {instrument_id}: book at {book_sequence}, update at {update_sequence}")]
    SequenceGap {
        /// The instrument the gap was observed on.
        instrument_id: String,
        /// The book's sequence before the gap.
        book_sequence: u64,
        /// The sequence the incoming update carried.
        update_sequence: u64,
    },

    /// A Bitfinex `cs` checksum frame did not match the locally computed
    /// CRC32 over the top-25 levels per side.
    #[error("checksum mismatch for {instrument_id}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// The instrument the checksum was computed for.
        instrument_id: String,
        /// The checksum the exchange reported.
        expected: u32,
        /// The checksum computed locally.
        computed: u32,
    },

    /// A message referenced a product this adapter was not configured
    /// to track.
    #[error("message for unsubscribed product {0}")]
    UnknownProduct(String),

    /// Bootstrap could not complete after exhausting retries.
    #[error("bootstrap failed for {instrument_id}: {source}")]
    BootstrapFailed {
        /// The instrument that failed to bootstrap.
        instrument_id: String,
        /// The underlying cause.
        #[source]
        source: Box<AdapterError>,
    },

    /// A message did not match the exchange's documented wire shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}
