//! The immutable, self-contained view published after every applied update.

use crate::price_level::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One resting order as it appears in a published [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotOrder {
    /// Limit price.
    pub price: Decimal,
    /// Remaining resting size.
    pub size: Decimal,
    /// Exchange order id.
    pub order_id: OrderId,
}

/// An immutable, point-in-time materialization of one instrument's book.
///
/// Value-typed: once produced by [`super::OrderBook::snapshot`], a
/// `Snapshot` is never mutated. It is JSON-serializable so downstream
/// sinks (persistence, chart renderers) can consume it without linking
/// against this crate (spec.md §6: "Published snapshot ... JSON-serializable
/// record").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Which exchange this book tracks (e.g. `"gdax"`, `"bitfinex"`, `"bittrex"`).
    pub exchange: String,
    /// The instrument's wire product code (e.g. `"BTC-USD"`).
    pub instrument_id: String,
    /// The book's sequence number at the moment this snapshot was taken.
    pub sequence: u64,
    /// Bid levels, best (highest price) first.
    pub bids: Vec<SnapshotOrder>,
    /// Ask levels, best (lowest price) first.
    pub asks: Vec<SnapshotOrder>,
    /// Wall-clock time the snapshot was produced, epoch milliseconds.
    pub produced_at: u64,
}

impl Snapshot {
    /// Best bid price, if any resting bids exist.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|o| o.price)
    }

    /// Best ask price, if any resting asks exist.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|o| o.price)
    }
}
