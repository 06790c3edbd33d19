//! Errors raised by the [`super::OrderBook`] mutation algebra.

use crate::price_level::{OrderId, Side};
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures from applying a single mutation to an [`super::OrderBook`].
///
/// `UnknownOrder` is recoverable and logged at debug (spec.md §4.2: "a
/// `done` message may reference an unknown order after a gap or
/// out-of-order delivery"). `CrossedBookDetected` and `SequenceMismatch`
/// both demand a book reset — the caller (an [`crate::adapter`]) is
/// expected to transition to `Recovering` on either.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderBookError {
    /// `remove`/`change` referenced an order id that is not resting in the
    /// book. Non-fatal; the caller should log and continue.
    #[error("unknown order {order_id} on {side}")]
    UnknownOrder {
        /// The order id that could not be found.
        order_id: OrderId,
        /// The side the caller expected it to be on.
        side: Side,
    },

    /// `match` found that the head-of-queue order at `(side, price)` does
    /// not match the `maker_order_id` the update claimed. The book is
    /// inconsistent and must be rebuilt from a fresh snapshot.
    #[error(
        "sequence mismatch: match at {side} {price} expected maker {expected}, found {found:?}"
    )]
    SequenceMismatch {
        /// Side of the mismatched match.
        side: Side,
        /// Price of the mismatched match.
        price: Decimal,
        /// The maker id the incoming update claimed.
        expected: OrderId,
        /// The order id actually at the head of the queue, if any.
        found: Option<OrderId>,
    },

    /// Best bid ≥ best ask persisted across a message boundary.
    #[error("crossed book: best bid {best_bid} >= best ask {best_ask}")]
    CrossedBookDetected {
        /// Best bid price at the time of detection.
        best_bid: Decimal,
        /// Best ask price at the time of detection.
        best_ask: Decimal,
    },
}
