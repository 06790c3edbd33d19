//! Ordered map from price to [`PriceLevel`], indexed for one side of one book.

use super::level::PriceLevel;
use super::order::{Order, OrderId};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One side (bids or asks) of an order book.
///
/// Backed by a `BTreeMap` — the balanced ordered tree spec.md §4.1 calls
/// for, giving O(log N) best-price lookup, insert, and price-point
/// removal, plus free in-order traversal. A hash map would lose the
/// ordering; an array indexed by price tick is wrong because per-exchange
/// tick sizes vary and L3 updates arrive at arbitrary precision (spec.md
/// §4.1's own rationale).
#[derive(Debug, Clone, Default)]
pub struct PriceLevelTree {
    levels: BTreeMap<Decimal, PriceLevel>,
    /// `true` for asks (best = lowest price), `false` for bids (best =
    /// highest price). Determines which end of the map is "best".
    is_ask: bool,
}

impl PriceLevelTree {
    /// A new, empty side.
    pub fn new(is_ask: bool) -> Self {
        PriceLevelTree {
            levels: BTreeMap::new(),
            is_ask,
        }
    }

    /// Insert a new order, creating its level if necessary.
    pub fn insert(&mut self, order: Order) {
        self.levels.entry(order.price).or_default().push_back(order);
    }

    /// Update an order's size at `price`. `new_size == 0` removes it
    /// (deleting the level if it becomes empty). Returns `false` if the
    /// order (or the level) is not present — the caller logs that as
    /// `OrderBookError::UnknownOrder` rather than treating it as fatal.
    pub fn modify_size(&mut self, price: Decimal, order_id: &OrderId, new_size: Decimal) -> bool {
        let Some(level) = self.levels.get_mut(&price) else {
            return false;
        };
        if new_size.is_zero() {
            let removed = level.remove(order_id).is_some();
            if level.is_empty() {
                self.levels.remove(&price);
            }
            removed
        } else {
            level.set_size(order_id, new_size)
        }
    }

    /// Remove a single order at an exact price. Deletes the level if it
    /// becomes empty. Returns the removed order, if any.
    pub fn erase(&mut self, price: Decimal, order_id: &OrderId) -> Option<Order> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove(order_id);
        if level.is_empty() {
            self.levels.remove(&price);
        }
        removed
    }

    /// Decrement the head-of-queue order at `price` by `size`. Returns the
    /// pre-match head order id (for the caller's maker-id assertion), or
    /// `None` if the level is absent/empty.
    pub fn match_head(&mut self, price: Decimal, size: Decimal) -> Option<OrderId> {
        let level = self.levels.get_mut(&price)?;
        let head_id = level.match_head(size);
        if level.is_empty() {
            self.levels.remove(&price);
        }
        head_id
    }

    /// Best (top-of-book) price and its level, or `None` if the side is empty.
    pub fn best(&self) -> Option<(Decimal, &PriceLevel)> {
        if self.is_ask {
            self.levels.iter().next().map(|(p, l)| (*p, l))
        } else {
            self.levels.iter().next_back().map(|(p, l)| (*p, l))
        }
    }

    /// Borrow the level at exactly `price` — no nearest-match.
    pub fn level_at(&self, price: Decimal) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    /// Yield up to `limit` levels in best-first order.
    pub fn iter_from_top(&self, limit: usize) -> Box<dyn Iterator<Item = (Decimal, &PriceLevel)> + '_> {
        if self.is_ask {
            Box::new(self.levels.iter().take(limit).map(|(p, l)| (*p, l)))
        } else {
            Box::new(self.levels.iter().rev().take(limit).map(|(p, l)| (*p, l)))
        }
    }

    /// Total resting size across levels whose price falls within
    /// `[lo, hi]` inclusive.
    pub fn depth(&self, lo: Decimal, hi: Decimal) -> Decimal {
        self.levels
            .range(lo..=hi)
            .map(|(_, level)| level.total_size())
            .sum()
    }

    /// Drop every level, replacing this side's contents wholesale (used by
    /// `OrderBook::reset` on bootstrap/recovery and by the Bittrex
    /// whole-book adapter on every message).
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Number of distinct price levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// `true` if this side holds no resting orders.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
