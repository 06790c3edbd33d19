//! A single price level: a FIFO queue of resting orders sharing one price.

use super::order::{Order, OrderId};
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// All resting orders at one `(side, price)` point, in arrival order.
///
/// The teacher crate backs this with a `DashMap` keyed by order id plus a
/// `SegQueue` of ids purely to let many threads mutate one level
/// concurrently without blocking each other. Under this system's
/// single-writer-per-book invariant (spec.md §5) that concurrency is never
/// exercised, so a plain `VecDeque` gives the same FIFO semantics with no
/// lock and no indirection — the correct generalization of the teacher's
/// intent, not a regression from it.
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
}

impl PriceLevel {
    /// An empty level.
    pub fn new() -> Self {
        PriceLevel {
            orders: VecDeque::new(),
        }
    }

    /// Append an order to the tail (arrival-time priority).
    pub fn push_back(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    /// `true` once the last order has been removed — callers must erase the
    /// level itself when this holds (spec.md §3: "empty levels are deleted").
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of resting orders at this level.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Sum of the resting size of every order at this level.
    pub fn total_size(&self) -> Decimal {
        self.orders.iter().map(|o| o.size).sum()
    }

    /// The order at the head of the FIFO queue (next to match), if any.
    pub fn head(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Find an order by id, scanning the level. Levels are small in
    /// practice (a handful to a few dozen resting orders), so a linear
    /// scan is the right trade-off over a secondary index per level.
    pub fn find(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.order_id == order_id)
    }

    /// Update an order's size in place. Returns `false` if not present.
    pub fn set_size(&mut self, order_id: &OrderId, new_size: Decimal) -> bool {
        match self.orders.iter_mut().find(|o| &o.order_id == order_id) {
            Some(order) => {
                order.size = new_size;
                true
            }
            None => false,
        }
    }

    /// Remove an order by id, preserving FIFO order of the remainder.
    /// Returns the removed order, or `None` if it was not present.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| &o.order_id == order_id)?;
        self.orders.remove(pos)
    }

    /// Decrement the head order's size by `size`, dropping it once it
    /// reaches zero. Returns the head's pre-match order id, so the caller
    /// can assert it against the maker id the adapter expects to match.
    pub fn match_head(&mut self, size: Decimal) -> Option<OrderId> {
        let head = self.orders.front_mut()?;
        let head_id = head.order_id.clone();
        if head.size <= size {
            self.orders.pop_front();
        } else {
            head.size -= size;
        }
        Some(head_id)
    }

    /// Iterate resting orders in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }
}
