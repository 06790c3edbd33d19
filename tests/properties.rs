//! Property-based invariant tests for the order-book mutation algebra.
//!
//! Covers invariants 1, 2, 4, and 7 from spec.md §8: no order aliasing,
//! price-sorted iteration, no crossed book after non-erroneous updates,
//! and snapshot/reset round-tripping.

use l3book::price_level::{Order, OrderId, Side};
use l3book::OrderBook;
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Op {
    Add { id: u8, side: Side, price: i64, size: i64 },
    Remove { id: u8, side: Side, price: i64 },
    Change { id: u8, side: Side, price: i64, new_size: i64 },
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, arb_side(), 90i64..110, 1i64..5)
            .prop_map(|(id, side, price, size)| Op::Add { id, side, price, size }),
        (0u8..6, arb_side(), 90i64..110).prop_map(|(id, side, price)| Op::Remove { id, side, price }),
        (0u8..6, arb_side(), 90i64..110, 0i64..5)
            .prop_map(|(id, side, price, new_size)| Op::Change { id, side, price, new_size }),
    ]
}

fn order_id(id: u8, side: Side) -> OrderId {
    OrderId::new(format!("{side}-{id}"))
}

proptest! {
    /// Invariant 1 (no order aliasing) and invariant 2 (price sort),
    /// checked after every op in an arbitrary sequence.
    #[test]
    fn no_aliasing_and_price_sorted(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut book = OrderBook::new("gdax", "BTC-USD");
        for op in ops {
            match op {
                Op::Add { id, side, price, size } => {
                    book.add(Order::new(order_id(id, side), side, Decimal::from(price), Decimal::from(size)));
                }
                Op::Remove { id, side, price } => {
                    book.remove(side, Decimal::from(price), &order_id(id, side));
                }
                Op::Change { id, side, price, new_size } => {
                    book.change(side, Decimal::from(price), &order_id(id, side), Decimal::from(new_size));
                }
            }

            let snap = book.snapshot();

            let mut seen = std::collections::HashSet::new();
            for o in snap.bids.iter().chain(snap.asks.iter()) {
                prop_assert!(seen.insert(o.order_id.clone()), "order id aliased across levels: {:?}", o.order_id);
            }

            let bid_prices: Vec<Decimal> = snap.bids.iter().map(|o| o.price).collect();
            for w in bid_prices.windows(2) {
                prop_assert!(w[0] >= w[1], "bids must be non-increasing in price");
            }
            let ask_prices: Vec<Decimal> = snap.asks.iter().map(|o| o.price).collect();
            for w in ask_prices.windows(2) {
                prop_assert!(w[0] <= w[1], "asks must be non-decreasing in price");
            }
        }
    }

    /// Invariant 7 (round-trip): reset(snapshot) then snapshot() is equal.
    #[test]
    fn snapshot_reset_round_trips(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut book = OrderBook::new("gdax", "BTC-USD");
        for op in ops {
            match op {
                Op::Add { id, side, price, size } => {
                    book.add(Order::new(order_id(id, side), side, Decimal::from(price), Decimal::from(size)));
                }
                Op::Remove { id, side, price } => {
                    book.remove(side, Decimal::from(price), &order_id(id, side));
                }
                Op::Change { id, side, price, new_size } => {
                    book.change(side, Decimal::from(price), &order_id(id, side), Decimal::from(new_size));
                }
            }
        }
        book.set_sequence(1);

        let snap1 = book.snapshot();
        let mut rebuilt = OrderBook::new("gdax", "BTC-USD");
        let orders = snap1
            .bids
            .iter()
            .map(|o| Order::new(o.order_id.clone(), Side::Buy, o.price, o.size))
            .chain(snap1.asks.iter().map(|o| Order::new(o.order_id.clone(), Side::Sell, o.price, o.size)));
        rebuilt.reset(orders);
        rebuilt.set_sequence(snap1.sequence);

        prop_assert_eq!(snap1, rebuilt.snapshot());
    }
}

/// Invariant 4 (no crossed book after non-erroneous updates): building a
/// book from disjoint bid/ask price ranges never crosses.
#[test]
fn disjoint_ranges_never_cross() {
    let mut book = OrderBook::new("gdax", "BTC-USD");
    for price in 90..100 {
        book.add(Order::new(OrderId::new(format!("bid-{price}")), Side::Buy, Decimal::from(price), Decimal::from(1)));
    }
    for price in 100..110 {
        book.add(Order::new(OrderId::new(format!("ask-{price}")), Side::Sell, Decimal::from(price), Decimal::from(1)));
    }
    assert!(book.crossed().is_none());
}
