//! The ordered price -> FIFO-order-queue structure (spec.md C1:
//! `PriceLevelTree`) that backs each side of an [`crate::orderbook::OrderBook`].

mod level;
mod order;
mod side;

pub use level::PriceLevel;
pub use order::{Order, OrderId, Side};
pub use side::PriceLevelTree;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fifo_within_level() {
        let mut tree = PriceLevelTree::new(true);
        tree.insert(Order::new("A", Side::Sell, dec!(100.00), dec!(1.0)));
        tree.insert(Order::new("B", Side::Sell, dec!(100.00), dec!(2.0)));

        let head = tree.match_head(dec!(100.00), dec!(0.5)).unwrap();
        assert_eq!(head, OrderId::from("A"));
        // A still has 0.5 remaining, still at the head.
        let level = tree.level_at(dec!(100.00)).unwrap();
        assert_eq!(level.head().unwrap().order_id, OrderId::from("A"));

        // Matching the rest of A's size should expose B as the new head.
        let head2 = tree.match_head(dec!(100.00), dec!(0.5)).unwrap();
        assert_eq!(head2, OrderId::from("A"));
        let level = tree.level_at(dec!(100.00)).unwrap();
        assert_eq!(level.head().unwrap().order_id, OrderId::from("B"));
    }

    #[test]
    fn best_ask_is_lowest_bid_is_highest() {
        let mut asks = PriceLevelTree::new(true);
        asks.insert(Order::new("1", Side::Sell, dec!(101), dec!(1)));
        asks.insert(Order::new("2", Side::Sell, dec!(100), dec!(1)));
        assert_eq!(asks.best().unwrap().0, dec!(100));

        let mut bids = PriceLevelTree::new(false);
        bids.insert(Order::new("1", Side::Buy, dec!(99), dec!(1)));
        bids.insert(Order::new("2", Side::Buy, dec!(100), dec!(1)));
        assert_eq!(bids.best().unwrap().0, dec!(100));
    }

    #[test]
    fn empty_levels_are_deleted() {
        let mut tree = PriceLevelTree::new(true);
        tree.insert(Order::new("A", Side::Sell, dec!(100), dec!(1)));
        assert_eq!(tree.level_count(), 1);
        tree.erase(dec!(100), &OrderId::from("A"));
        assert_eq!(tree.level_count(), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn modify_size_to_zero_removes_order() {
        let mut tree = PriceLevelTree::new(false);
        tree.insert(Order::new("A", Side::Buy, dec!(50), dec!(3)));
        assert!(tree.modify_size(dec!(50), &OrderId::from("A"), dec!(0)));
        assert!(tree.level_at(dec!(50)).is_none());
    }

    #[test]
    fn unknown_order_operations_are_no_ops() {
        let mut tree = PriceLevelTree::new(true);
        assert!(!tree.modify_size(dec!(100), &OrderId::from("ghost"), dec!(1)));
        assert!(tree.erase(dec!(100), &OrderId::from("ghost")).is_none());
    }
}
