//! Resting-order type and the identifiers used to address it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-assigned order identifier. Opaque: adapters may hand us a
/// UUID (Gdax), a small integer (Bitfinex), or nothing at all (Bittrex,
/// which has no per-order identity and is handled via whole-book
/// `reset` instead — see [`crate::adapter::bittrex`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Wrap any displayable exchange id.
    pub fn new(id: impl fmt::Display) -> Self {
        OrderId(id.to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        OrderId(s.to_string())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        OrderId(s)
    }
}

/// Which side of the book an order or price level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Resting buy order / bid price level.
    Buy,
    /// Resting sell order / ask price level.
    Sell,
}

impl Side {
    /// The opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A single resting order on one side of one instrument's book.
///
/// `size` is the remaining resting size; an order with `size == 0` has
/// already been removed from its level (see the invariant in spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Exchange-assigned order id, unique across both sides of one instrument.
    pub order_id: OrderId,
    /// Buy or sell.
    pub side: Side,
    /// Limit price. Exact fixed-point value — never compared as a float.
    pub price: Decimal,
    /// Remaining resting size. Always `> 0` for an order still in the book.
    pub size: Decimal,
}

impl Order {
    /// Construct a new resting order.
    pub fn new(order_id: impl Into<OrderId>, side: Side, price: Decimal, size: Decimal) -> Self {
        Order {
            order_id: order_id.into(),
            side,
            price,
            size,
        }
    }
}
