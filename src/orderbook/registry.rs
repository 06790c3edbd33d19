//! Per-adapter collection of [`OrderBook`]s, one per subscribed instrument.

use super::book::OrderBook;
use std::collections::HashMap;

/// Owns every [`OrderBook`] an [`crate::adapter`] worker is responsible
/// for.
///
/// One adapter task drives every product on a shared exchange connection
/// (spec.md §5), and always from the same task, so a plain `HashMap`
/// suffices — there is no cross-thread contention to design around here,
/// unlike the teacher's `DashMap`-backed book registry which assumed many
/// callers could reach any book at once.
#[derive(Debug, Default)]
pub struct BookRegistry {
    books: HashMap<String, OrderBook>,
}

impl BookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        BookRegistry {
            books: HashMap::new(),
        }
    }

    /// Fetch or create the book for `instrument_id`, backed by `exchange`.
    pub fn get_or_create(&mut self, exchange: &str, instrument_id: &str) -> &mut OrderBook {
        self.books
            .entry(instrument_id.to_string())
            .or_insert_with(|| OrderBook::new(exchange, instrument_id))
    }

    /// Borrow an existing book, if the instrument is known.
    pub fn get(&self, instrument_id: &str) -> Option<&OrderBook> {
        self.books.get(instrument_id)
    }

    /// Mutably borrow an existing book, if the instrument is known.
    pub fn get_mut(&mut self, instrument_id: &str) -> Option<&mut OrderBook> {
        self.books.get_mut(instrument_id)
    }

    /// Iterate over every tracked instrument's book.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OrderBook)> {
        self.books.iter()
    }

    /// Number of instruments currently tracked.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// `true` if no instruments are tracked.
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_reuses_existing_book() {
        let mut reg = BookRegistry::new();
        reg.get_or_create("gdax", "BTC-USD").set_sequence(5);
        assert_eq!(reg.get_or_create("gdax", "BTC-USD").sequence(), 5);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn separate_instruments_get_separate_books() {
        let mut reg = BookRegistry::new();
        reg.get_or_create("gdax", "BTC-USD").set_sequence(1);
        reg.get_or_create("gdax", "ETH-USD").set_sequence(2);
        assert_eq!(reg.get("BTC-USD").unwrap().sequence(), 1);
        assert_eq!(reg.get("ETH-USD").unwrap().sequence(), 2);
        assert_eq!(reg.len(), 2);
    }
}
