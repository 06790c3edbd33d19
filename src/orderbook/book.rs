//! Core [`OrderBook`]: per-instrument aggregate and its mutation algebra.

use super::error::OrderBookError;
use super::snapshot::{Snapshot, SnapshotOrder};
use crate::price_level::{Order, OrderId, PriceLevelTree, Side};
use crate::utils::current_time_millis;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Per-instrument L3 order book: both sides plus the sequence watermark
/// that anchors gap detection (spec.md §3).
///
/// Exclusively owned by one [`crate::adapter`] worker at a time (spec.md
/// §5's single-writer invariant) — every mutator here takes `&mut self`
/// rather than relying on interior mutability, so there is nothing to lock
/// on the hot path.
#[derive(Debug, Clone)]
pub struct OrderBook {
    exchange: String,
    instrument_id: String,
    bids: PriceLevelTree,
    asks: PriceLevelTree,
    sequence: u64,
    /// Reverse index from order id to its current `(price, side)`, so
    /// `remove`/`change` don't need to scan every level.
    order_locations: HashMap<OrderId, (Decimal, Side)>,
}

impl OrderBook {
    /// A fresh, empty book for `instrument_id` on `exchange`.
    pub fn new(exchange: impl Into<String>, instrument_id: impl Into<String>) -> Self {
        OrderBook {
            exchange: exchange.into(),
            instrument_id: instrument_id.into(),
            bids: PriceLevelTree::new(false),
            asks: PriceLevelTree::new(true),
            sequence: 0,
            order_locations: HashMap::new(),
        }
    }

    /// The instrument this book tracks.
    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    /// The current sequence watermark.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Advance the sequence watermark. Sequence is monotonically
    /// non-decreasing (spec.md §3); callers (the adapter's gap-detection
    /// logic) are responsible for only calling this with a value `>=`
    /// the current one.
    pub fn set_sequence(&mut self, sequence: u64) {
        debug_assert!(
            sequence >= self.sequence,
            "sequence must be monotonically non-decreasing"
        );
        self.sequence = sequence;
    }

    fn side_tree(&mut self, side: Side) -> &mut PriceLevelTree {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn side_tree_ref(&self, side: Side) -> &PriceLevelTree {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Every price level currently resting on `side`, best-first. Used by
    /// protocols whose removal messages carry no price (Bitfinex's raw
    /// book) to scan for the level holding a given order id.
    pub fn price_levels(&self, side: Side) -> Vec<Decimal> {
        self.side_tree_ref(side)
            .iter_from_top(usize::MAX)
            .map(|(p, _)| p)
            .collect()
    }

    /// The top `n` resting orders on `side`, best-price-first and FIFO
    /// within each level, paired with their level's price. Used to feed
    /// the Bitfinex checksum computation (spec.md §4.4).
    pub fn top_n(&self, side: Side, n: usize) -> Vec<(Decimal, &Order)> {
        let mut out = Vec::with_capacity(n);
        for (price, level) in self.side_tree_ref(side).iter_from_top(usize::MAX) {
            for order in level.iter() {
                if out.len() >= n {
                    return out;
                }
                out.push((price, order));
            }
        }
        out
    }

    /// Insert a new resting order at its price level.
    pub fn add(&mut self, order: Order) {
        trace!(order_id = %order.order_id, side = %order.side, price = %order.price, size = %order.size, "add");
        self.order_locations
            .insert(order.order_id.clone(), (order.price, order.side));
        self.side_tree(order.side).insert(order);
    }

    /// Erase an order. A no-op (not an error) if the order is not
    /// present — a `done`/cancel message may reference an order already
    /// removed by a gap or out-of-order delivery (spec.md §4.2), logged
    /// as [`OrderBookError::UnknownOrder`] at debug rather than returned,
    /// since the caller has nothing useful to do with it.
    pub fn remove(&mut self, side: Side, price: Decimal, order_id: &OrderId) {
        trace!(%order_id, %side, %price, "remove");
        if self.side_tree(side).erase(price, order_id).is_none() {
            let err = OrderBookError::UnknownOrder {
                order_id: order_id.clone(),
                side,
            };
            debug!(%err, "remove on unknown order, ignoring");
        }
        self.order_locations.remove(order_id);
    }

    /// Decrement the size of the head-of-queue order at `(side, price)`
    /// by `size`, dropping it if it reaches zero.
    ///
    /// # Errors
    /// Returns [`OrderBookError::SequenceMismatch`] if the head order id
    /// does not equal `maker_order_id` — per spec.md §4.2 this means the
    /// book is inconsistent and the caller must trigger a reset.
    pub fn apply_match(
        &mut self,
        side: Side,
        price: Decimal,
        maker_order_id: &OrderId,
        size: Decimal,
    ) -> Result<(), OrderBookError> {
        let tree = self.side_tree(side);
        let head = tree.level_at(price).and_then(|l| l.head()).map(|o| o.order_id.clone());
        if head.as_ref() != Some(maker_order_id) {
            return Err(OrderBookError::SequenceMismatch {
                side,
                price,
                expected: maker_order_id.clone(),
                found: head,
            });
        }
        tree.match_head(price, size);
        trace!(%maker_order_id, %side, %price, %size, "match");
        if tree.level_at(price).is_none() {
            self.order_locations.remove(maker_order_id);
        }
        Ok(())
    }

    /// Update an order's resting size. `new_size == 0` is equivalent to
    /// `remove`. A no-op if the order is not present, logged as
    /// [`OrderBookError::UnknownOrder`] at debug (spec.md §7).
    pub fn change(&mut self, side: Side, price: Decimal, order_id: &OrderId, new_size: Decimal) {
        trace!(%order_id, %side, %price, %new_size, "change");
        let found = self.side_tree(side).modify_size(price, order_id, new_size);
        if found {
            if new_size.is_zero() {
                self.order_locations.remove(order_id);
            }
        } else {
            let err = OrderBookError::UnknownOrder {
                order_id: order_id.clone(),
                side,
            };
            debug!(%err, "change on unknown order, ignoring");
        }
    }

    /// Atomically replace both sides with a fresh list of resting orders,
    /// used on bootstrap and gap recovery (spec.md §4.2/§4.4).
    pub fn reset(&mut self, orders: impl IntoIterator<Item = Order>) {
        self.bids.clear();
        self.asks.clear();
        self.order_locations.clear();
        for order in orders {
            self.order_locations
                .insert(order.order_id.clone(), (order.price, order.side));
            self.side_tree(order.side).insert(order);
        }
    }

    /// Best bid `(price, total size at that level)`.
    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.best().map(|(p, l)| (p, l.total_size()))
    }

    /// Best ask `(price, total size at that level)`.
    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.best().map(|(p, l)| (p, l.total_size()))
    }

    /// Total resting size on `side` within `[lo, hi]` inclusive.
    pub fn depth(&self, side: Side, lo: Decimal, hi: Decimal) -> Decimal {
        match side {
            Side::Buy => self.bids.depth(lo, hi),
            Side::Sell => self.asks.depth(lo, hi),
        }
    }

    /// `Some((best_bid, best_ask))` if the book is currently crossed
    /// (`best_bid >= best_ask`). Transient crosses are tolerated mid-message
    /// by the adapter; this check is for the post-message boundary
    /// (spec.md §3's invariant, §8 property 4).
    pub fn crossed(&self) -> Option<(Decimal, Decimal)> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) if bid >= ask => Some((bid, ask)),
            _ => None,
        }
    }

    /// Materialize an immutable snapshot of both sides in best-first
    /// order, stamped with the current sequence.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            exchange: self.exchange.clone(),
            instrument_id: self.instrument_id.clone(),
            sequence: self.sequence,
            bids: self
                .bids
                .iter_from_top(usize::MAX)
                .flat_map(|(price, level)| {
                    level.iter().map(move |o| SnapshotOrder {
                        price,
                        size: o.size,
                        order_id: o.order_id.clone(),
                    })
                })
                .collect(),
            asks: self
                .asks
                .iter_from_top(usize::MAX)
                .flat_map(|(price, level)| {
                    level.iter().map(move |o| SnapshotOrder {
                        price,
                        size: o.size,
                        order_id: o.order_id.clone(),
                    })
                })
                .collect(),
            produced_at: current_time_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> OrderBook {
        OrderBook::new("gdax", "BTC-USD")
    }

    /// End-to-end scenario S1 from spec.md §8.
    #[test]
    fn s1_gdax_open_match_done() {
        let mut b = book();
        b.set_sequence(100);

        b.add(Order::new("A", Side::Sell, dec!(100.00), dec!(1.0)));
        b.set_sequence(101);
        b.add(Order::new("B", Side::Sell, dec!(100.00), dec!(2.0)));
        b.set_sequence(102);
        b.apply_match(Side::Sell, dec!(100.00), &OrderId::from("A"), dec!(0.5))
            .unwrap();
        b.set_sequence(103);
        b.remove(Side::Sell, dec!(100.00), &OrderId::from("A"));
        b.set_sequence(104);

        let snap = b.snapshot();
        assert_eq!(snap.sequence, 104);
        assert_eq!(snap.asks.len(), 1);
        assert_eq!(snap.asks[0].order_id, OrderId::from("B"));
        assert_eq!(snap.asks[0].size, dec!(2.0));
        assert!(snap.bids.is_empty());
    }

    #[test]
    fn match_head_mismatch_is_sequence_mismatch() {
        let mut b = book();
        b.add(Order::new("A", Side::Buy, dec!(100), dec!(1)));
        let err = b
            .apply_match(Side::Buy, dec!(100), &OrderId::from("B"), dec!(1))
            .unwrap_err();
        assert!(matches!(err, OrderBookError::SequenceMismatch { .. }));
        // The book must be untouched by a failed match.
        assert_eq!(b.best_bid(), Some((dec!(100), dec!(1))));
    }

    #[test]
    fn remove_unknown_order_is_a_no_op() {
        let mut b = book();
        b.remove(Side::Buy, dec!(100), &OrderId::from("ghost"));
        assert!(b.best_bid().is_none());
    }

    #[test]
    fn change_to_zero_removes_order() {
        let mut b = book();
        b.add(Order::new("A", Side::Buy, dec!(100), dec!(1)));
        b.change(Side::Buy, dec!(100), &OrderId::from("A"), dec!(0));
        assert!(b.best_bid().is_none());
    }

    #[test]
    fn reset_replaces_both_sides() {
        let mut b = book();
        b.add(Order::new("stale", Side::Buy, dec!(1), dec!(1)));
        b.reset(vec![
            Order::new("A", Side::Buy, dec!(99), dec!(1)),
            Order::new("B", Side::Sell, dec!(101), dec!(1)),
        ]);
        assert_eq!(b.best_bid(), Some((dec!(99), dec!(1))));
        assert_eq!(b.best_ask(), Some((dec!(101), dec!(1))));
    }

    /// Testable property 7 (spec.md §8): reset(snapshot) round-trips.
    #[test]
    fn snapshot_reset_round_trip() {
        let mut b = book();
        b.add(Order::new("A", Side::Buy, dec!(99), dec!(1)));
        b.add(Order::new("B", Side::Buy, dec!(99), dec!(2)));
        b.add(Order::new("C", Side::Sell, dec!(101), dec!(3)));
        b.set_sequence(42);

        let snap1 = b.snapshot();

        let mut b2 = book();
        let orders = snap1
            .bids
            .iter()
            .map(|o| Order::new(o.order_id.clone(), Side::Buy, o.price, o.size))
            .chain(
                snap1
                    .asks
                    .iter()
                    .map(|o| Order::new(o.order_id.clone(), Side::Sell, o.price, o.size)),
            );
        b2.reset(orders);
        b2.set_sequence(snap1.sequence);

        let snap2 = b2.snapshot();
        assert_eq!(snap1, snap2);
    }

    /// Testable property 3 (spec.md §8): FIFO within a level.
    #[test]
    fn fifo_within_level_via_match() {
        let mut b = book();
        b.add(Order::new("A", Side::Sell, dec!(100), dec!(1)));
        b.add(Order::new("B", Side::Sell, dec!(100), dec!(1)));
        b.apply_match(Side::Sell, dec!(100), &OrderId::from("A"), dec!(1))
            .unwrap();
        // A is now fully matched away; B must be the new head.
        let err = b
            .apply_match(Side::Sell, dec!(100), &OrderId::from("A"), dec!(1))
            .unwrap_err();
        assert!(matches!(err, OrderBookError::SequenceMismatch { found: Some(id), .. } if id == OrderId::from("B")));
    }

    /// Testable property 4 (spec.md §8): crossed book is detectable.
    #[test]
    fn crossed_book_is_detected() {
        let mut b = book();
        b.add(Order::new("bid", Side::Buy, dec!(101), dec!(1)));
        b.add(Order::new("ask", Side::Sell, dec!(100), dec!(1)));
        assert_eq!(b.crossed(), Some((dec!(101), dec!(100))));
    }
}
