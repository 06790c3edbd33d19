//! REST bootstrap/recovery client (spec.md C4: `RestClient`).

mod error;

pub use error::RestError;

use crate::price_level::{OrderId, Side};
use reqwest::Client;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(400);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 5;

/// One resting order as reported by a REST book snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestBookLevel {
    /// Limit price.
    pub price: Decimal,
    /// Resting size.
    pub size: Decimal,
    /// Exchange order id, if the venue's REST book is order-level (L3).
    /// `None` for venues whose deepest REST level is aggregated.
    pub order_id: Option<OrderId>,
}

/// A full REST book snapshot: sequence plus both sides (spec.md §4.3:
/// `snapshot(product_id, level)` returns `(sequence, bids, asks)`).
#[derive(Debug, Clone)]
pub struct RestSnapshot {
    /// The sequence number the book was at when this snapshot was taken.
    pub sequence: u64,
    /// Bid levels.
    pub bids: Vec<(Decimal, RestBookLevel)>,
    /// Ask levels.
    pub asks: Vec<(Decimal, RestBookLevel)>,
}

/// Fetches REST book snapshots for bootstrap and gap recovery.
///
/// Implementations must enforce a client-side rate limit — a minimum
/// interval between requests, shared across every caller holding a
/// clone of the client (spec.md §4.3).
pub trait RestClient: Send + Sync {
    /// Fetch the current book at the deepest supported level.
    fn snapshot(
        &self,
        product_id: &str,
        level: u8,
    ) -> impl std::future::Future<Output = Result<RestSnapshot, RestError>> + Send;
}

/// A [`RestClient`] over HTTP via `reqwest`.
///
/// Clone freely — the inner `reqwest::Client` and rate limiter state are
/// both cheaply shared (`Client` is internally `Arc`-backed; the last
/// request timestamp lives behind a `tokio::sync::Mutex` shared via
/// `Arc`), so every adapter holding a clone observes the same 400 ms
/// floor (spec.md §4.3/§5).
#[derive(Debug, Clone)]
pub struct HttpRestClient {
    client: Client,
    base_url: String,
    min_interval: Duration,
    last_request_millis: std::sync::Arc<AtomicI64>,
    throttle_gate: std::sync::Arc<Mutex<()>>,
}

impl HttpRestClient {
    /// A new client against `base_url`, with the default 400 ms rate limit.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_min_interval(base_url, DEFAULT_MIN_INTERVAL)
    }

    /// A new client with a custom minimum interval between requests.
    pub fn with_min_interval(base_url: impl Into<String>, min_interval: Duration) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client configuration is valid");
        HttpRestClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            min_interval,
            last_request_millis: std::sync::Arc::new(AtomicI64::new(0)),
            throttle_gate: std::sync::Arc::new(Mutex::new(())),
        }
    }

    async fn throttle(&self) {
        // Hold the gate for the whole wait-and-stamp sequence so two
        // concurrent callers can't both observe a stale last-request
        // time and race under the floor.
        let _gate = self.throttle_gate.lock().await;
        let now = crate::utils::current_time_millis() as i64;
        let last = self.last_request_millis.load(Ordering::Acquire);
        let elapsed = now - last;
        let floor = self.min_interval.as_millis() as i64;
        if elapsed < floor {
            tokio::time::sleep(Duration::from_millis((floor - elapsed) as u64)).await;
        }
        self.last_request_millis
            .store(crate::utils::current_time_millis() as i64, Ordering::Release);
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value, RestError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.throttle().await;
            let result = self.client.get(&url).query(query).send().await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| RestError::Decode(e.to_string()));
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(attempt, %status, "rest request failed");
                    if !(500..600).contains(&status) {
                        return Err(RestError::Http { status, body });
                    }
                    if attempt >= MAX_RETRIES {
                        return Err(RestError::RetriesExhausted {
                            attempts: attempt,
                            last: format!("http {status}: {body}"),
                        });
                    }
                }
                Err(e) => {
                    debug!(attempt, error = %e, "rest request error");
                    if attempt >= MAX_RETRIES {
                        return Err(RestError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt.min(4)))).await;
        }
    }
}

impl RestClient for HttpRestClient {
    async fn snapshot(&self, product_id: &str, level: u8) -> Result<RestSnapshot, RestError> {
        let value = self
            .get_json(
                &format!("/products/{product_id}/book"),
                &[("level", &level.to_string())],
            )
            .await?;
        decode_generic_book(&value)
    }
}

/// Decodes the common `{sequence, bids: [[price, size, order_id?], ...], asks: [...]}`
/// shape shared by the exchanges' level-3/level-2 REST books
/// (`original_source/app/api/public_client.py`'s `get_product_order_book`).
fn decode_generic_book(value: &serde_json::Value) -> Result<RestSnapshot, RestError> {
    let sequence = value
        .get("sequence")
        .and_then(|s| s.as_u64())
        .ok_or_else(|| RestError::Decode("missing sequence".into()))?;

    let decode_side = |side: Side, key: &str| -> Result<Vec<(Decimal, RestBookLevel)>, RestError> {
        let rows = value
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| RestError::Decode(format!("missing {key}")))?;
        rows.iter()
            .map(|row| decode_row(row))
            .collect::<Result<Vec<_>, _>>()
            .map(|levels| levels.into_iter().map(|l| (l.price, l)).collect())
            .map_err(|e| {
                let _ = side;
                e
            })
    };

    Ok(RestSnapshot {
        sequence,
        bids: decode_side(Side::Buy, "bids")?,
        asks: decode_side(Side::Sell, "asks")?,
    })
}

fn decode_row(row: &serde_json::Value) -> Result<RestBookLevel, RestError> {
    let arr = row
        .as_array()
        .ok_or_else(|| RestError::Decode("book row is not an array".into()))?;
    let price: Decimal = arr
        .first()
        .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_f64().map(|f| f.to_string())))
        .ok_or_else(|| RestError::Decode("missing price".into()))?
        .parse()
        .map_err(|_| RestError::Decode("invalid price".into()))?;
    let size: Decimal = arr
        .get(1)
        .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_f64().map(|f| f.to_string())))
        .ok_or_else(|| RestError::Decode("missing size".into()))?
        .parse()
        .map_err(|_| RestError::Decode("invalid size".into()))?;
    let order_id = arr.get(2).and_then(|v| {
        v.as_str()
            .map(OrderId::from)
            .or_else(|| v.as_u64().map(|n| OrderId::new(n)))
    });
    Ok(RestBookLevel { price, size, order_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_gdax_level3_book() {
        let body = serde_json::json!({
            "sequence": 42,
            "bids": [["100.50", "2.0", "order-a"]],
            "asks": [["101.00", "1.0", "order-b"]],
        });
        let snap = decode_generic_book(&body).unwrap();
        assert_eq!(snap.sequence, 42);
        assert_eq!(snap.bids[0].1.order_id, Some(OrderId::from("order-a")));
        assert_eq!(snap.asks[0].1.price.to_string(), "101.00");
    }

    #[test]
    fn missing_sequence_is_a_decode_error() {
        let body = serde_json::json!({"bids": [], "asks": []});
        assert!(decode_generic_book(&body).is_err());
    }
}
