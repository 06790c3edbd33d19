//! Bittrex adapter: the transport delivers whole-book frames, so this
//! variant degenerates to `reset` on every message (spec.md §4.4).

use super::error::AdapterError;
use crate::orderbook::BookRegistry;
use crate::price_level::{Order, OrderId, Side};
use crate::publisher::Publisher;
use crate::transport::{FeedEvent, FeedTransport};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

const WS_URL: &str = "wss://socket.bittrex.com/signalr";

/// Drives a group of Bittrex markets. There is no exchange-assigned
/// sequence or checksum to track; every frame fully replaces one
/// market's book, but the book's own `sequence` field must still
/// advance strictly with each applied frame (spec.md §3's "sequence
/// monotonically non-decreasing" invariant and §8 property 5 bind here
/// just as much as for the sequenced exchanges — only the *source* of
/// the number differs).
pub struct BittrexAdapter<T: FeedTransport> {
    products: Vec<String>,
    registry: BookRegistry,
    /// Locally assigned sequence counter, one per market, incremented on
    /// every applied whole-book frame.
    sequence_counters: HashMap<String, u64>,
    _transport: std::marker::PhantomData<T>,
}

impl<T: FeedTransport> BittrexAdapter<T> {
    /// A new adapter for `products` (Bittrex `MarketName`s, e.g. `BTC-ETH`).
    pub fn new(products: Vec<String>) -> Self {
        BittrexAdapter {
            products,
            registry: BookRegistry::new(),
            sequence_counters: HashMap::new(),
            _transport: std::marker::PhantomData,
        }
    }

    fn subscribe_payload(&self) -> Vec<Value> {
        vec![serde_json::json!({
            "markets": self.products,
            "depth": 500,
        })]
    }

    /// Run until the transport disconnects or a fatal error occurs.
    pub async fn run(&mut self, publisher: &Publisher) -> Result<(), AdapterError> {
        info!(exchange = "bittrex", products = ?self.products, "connecting");
        let mut transport = T::open(WS_URL, self.subscribe_payload()).await?;

        loop {
            match transport.next().await {
                FeedEvent::Message(value) => {
                    if let Err(e) = self.handle_message(&value, publisher).await {
                        warn!(error = %e, "dropping malformed bittrex frame");
                    }
                }
                FeedEvent::Disconnected(e) => {
                    transport.close().await;
                    return Err(e.into());
                }
            }
        }
    }

    async fn handle_message(&mut self, value: &Value, publisher: &Publisher) -> Result<(), AdapterError> {
        let market = value
            .get("MarketName")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdapterError::MalformedMessage("missing MarketName".into()))?;
        if !self.products.iter().any(|p| p == market) {
            return Ok(());
        }

        let buys = decode_rung(value.get("Buys"))?;
        let sells = decode_rung(value.get("Sells"))?;

        let orders = buys
            .into_iter()
            .enumerate()
            .map(|(i, (price, size))| Order::new(OrderId::new(format!("buy-{i}@{price}")), Side::Buy, price, size))
            .chain(
                sells
                    .into_iter()
                    .enumerate()
                    .map(|(i, (price, size))| Order::new(OrderId::new(format!("sell-{i}@{price}")), Side::Sell, price, size)),
            )
            .collect::<Vec<_>>();

        let counter = self.sequence_counters.entry(market.to_string()).or_insert(0);
        *counter += 1;
        let sequence = *counter;

        let book = self.registry.get_or_create("bittrex", market);
        book.reset(orders);
        book.set_sequence(sequence);
        crate::metrics::record_update_applied("bittrex", market);
        publisher.publish(book.snapshot()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    /// A transport that is never actually driven — these tests call
    /// `handle_message` directly rather than going through `run`.
    struct NeverTransport;

    impl FeedTransport for NeverTransport {
        async fn open(_url: &str, _subscribe_payloads: Vec<Value>) -> Result<Self, TransportError> {
            unreachable!("tests drive handle_message directly, not open")
        }
        async fn next(&mut self) -> FeedEvent {
            unreachable!("tests drive handle_message directly, not next")
        }
        async fn send(&mut self, _payload: Value) -> Result<(), TransportError> {
            unreachable!("tests drive handle_message directly, not send")
        }
        async fn close(&mut self) {}
    }

    fn adapter() -> BittrexAdapter<NeverTransport> {
        BittrexAdapter::new(vec!["BTC-ETH".to_string()])
    }

    fn frame(buy_rate: &str, buy_qty: &str) -> Value {
        serde_json::json!({
            "MarketName": "BTC-ETH",
            "Buys": [{"Rate": buy_rate, "Quantity": buy_qty}],
            "Sells": [],
        })
    }

    /// S6 (spec.md §8): two successive whole-book frames for the same
    /// market must produce two successive published snapshots whose
    /// `sequence` is strictly increasing, driven through
    /// `BittrexAdapter::handle_message` (not by calling
    /// `OrderBook::reset`/`set_sequence` directly).
    #[tokio::test]
    async fn sequence_advances_across_successive_frames() {
        let mut a = adapter();
        let publisher = Publisher::new();

        a.handle_message(&frame("0.05", "10"), &publisher).await.unwrap();
        let first = a.registry.get("BTC-ETH").unwrap().sequence();
        assert_eq!(first, 1);

        a.handle_message(&frame("0.051", "12"), &publisher).await.unwrap();
        let second = a.registry.get("BTC-ETH").unwrap().sequence();
        assert_eq!(second, 2);

        assert!(second > first, "sequence must strictly increase across frames");
    }

    #[tokio::test]
    async fn unsubscribed_market_is_ignored() {
        let mut a = adapter();
        let publisher = Publisher::new();
        let mut other = frame("0.05", "10");
        other["MarketName"] = Value::String("ETH-LTC".to_string());

        a.handle_message(&other, &publisher).await.unwrap();
        assert!(a.registry.get("ETH-LTC").is_none());
    }
}

fn decode_rung(value: Option<&Value>) -> Result<Vec<(Decimal, Decimal)>, AdapterError> {
    let rows = value
        .and_then(|v| v.as_array())
        .ok_or_else(|| AdapterError::MalformedMessage("missing rung array".into()))?;
    rows.iter()
        .map(|row| {
            let rate = row
                .get("Rate")
                .and_then(number_to_decimal)
                .ok_or_else(|| AdapterError::MalformedMessage("missing Rate".into()))?;
            let quantity = row
                .get("Quantity")
                .and_then(number_to_decimal)
                .ok_or_else(|| AdapterError::MalformedMessage("missing Quantity".into()))?;
            Ok((rate, quantity))
        })
        .collect()
}

fn number_to_decimal(value: &Value) -> Option<Decimal> {
    if let Some(s) = value.as_str() {
        s.parse().ok()
    } else if let Some(f) = value.as_f64() {
        Decimal::try_from(f).ok()
    } else {
        None
    }
}
