//! Spawns one adapter per `(exchange, product)` group, wires the
//! publisher to subscribers, and handles lifecycle (spec.md C8).

mod error;

pub use error::SupervisorError;

use crate::adapter::{Backoff, BitfinexAdapter, BittrexAdapter, GdaxAdapter, RESET_THRESHOLD};
use crate::config::Subscription;
use crate::publisher::Publisher;
use crate::rest::HttpRestClient;
use crate::transport::WsFeedTransport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const GDAX_REST_URL: &str = "https://api.gdax.com";

/// Consecutive connect/bootstrap/run failures (none lasting even
/// `RESET_THRESHOLD`, i.e. the adapter never reached `Live`) an adapter
/// group is allowed before the supervisor gives up on it for good
/// (spec.md §6's exit code 2 condition).
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Owns the publisher and drives every configured exchange adapter
/// until cancelled.
pub struct Supervisor {
    publisher: Arc<Publisher>,
}

impl Supervisor {
    /// A supervisor around a fresh [`Publisher`]. Subscribers should be
    /// attached to [`Supervisor::publisher`] before [`Supervisor::run`]
    /// is called, so they observe every snapshot from start-up.
    pub fn new() -> Self {
        Supervisor {
            publisher: Arc::new(Publisher::new()),
        }
    }

    /// The shared publisher every adapter this supervisor spawns
    /// publishes through.
    pub fn publisher(&self) -> Arc<Publisher> {
        self.publisher.clone()
    }

    /// Group `subscriptions` by exchange, spawn one adapter task per
    /// group, and run until `cancel` fires. Returns once every adapter
    /// has stopped.
    ///
    /// # Errors
    /// [`SupervisorError::AllAdaptersFailed`] if every spawned adapter
    /// exited without ever reaching `Live` and without being cancelled —
    /// the process-level "fatal" condition of spec.md §6 (exit code 2).
    pub async fn run(
        &self,
        subscriptions: Vec<Subscription>,
        cancel: CancellationToken,
    ) -> Result<(), SupervisorError> {
        let mut by_exchange: HashMap<String, Vec<Subscription>> = HashMap::new();
        for sub in subscriptions {
            by_exchange.entry(sub.exchange.clone()).or_default().push(sub);
        }

        let mut handles = Vec::new();
        for (exchange, subs) in by_exchange {
            let products: Vec<String> = subs.into_iter().map(|s| s.instrument_code).collect();
            let publisher = self.publisher.clone();
            let cancel = cancel.clone();
            let exchange_name = exchange.clone();

            let handle = match exchange.as_str() {
                "gdax" => tokio::spawn(async move {
                    run_gdax_with_backoff(products, publisher, cancel).await
                }),
                "bitfinex" => tokio::spawn(async move {
                    run_bitfinex_with_backoff(products, publisher, cancel).await
                }),
                "bittrex" => tokio::spawn(async move {
                    run_bittrex_with_backoff(products, publisher, cancel).await
                }),
                other => {
                    warn!(exchange = other, "unknown exchange in subscription file, skipping");
                    continue;
                }
            };
            handles.push((exchange_name, handle));
        }

        if handles.is_empty() {
            return Err(SupervisorError::NoAdapters);
        }

        let mut any_succeeded = cancel.is_cancelled();
        for (exchange, handle) in handles {
            match handle.await {
                Ok(true) => any_succeeded = true,
                Ok(false) => error!(exchange, "adapter exhausted retries without reaching Live"),
                Err(e) => error!(exchange, error = %e, "adapter task panicked"),
            }
        }

        if any_succeeded || cancel.is_cancelled() {
            Ok(())
        } else {
            Err(SupervisorError::AllAdaptersFailed)
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// `true` if the adapter reached `Live` at least once before stopping
/// (a clean shutdown or a transient failure) or was cancelled; `false`
/// if it failed `MAX_CONSECUTIVE_FAILURES` times in a row without ever
/// staying up for `RESET_THRESHOLD` — the supervisor gives up on this
/// exchange group for good in that case.
async fn run_gdax_with_backoff(products: Vec<String>, publisher: Arc<Publisher>, cancel: CancellationToken) -> bool {
    let rest = HttpRestClient::new(GDAX_REST_URL);
    let mut backoff = Backoff::new();
    let mut consecutive_failures: u32 = 0;
    loop {
        let mut adapter = GdaxAdapter::<WsFeedTransport>::new(products.clone(), rest.clone());
        let started = Instant::now();
        tokio::select! {
            result = adapter.run(&publisher) => {
                match result {
                    Ok(()) => return true,
                    Err(e) => {
                        if started.elapsed() >= RESET_THRESHOLD {
                            consecutive_failures = 0;
                            backoff.reset();
                        } else {
                            consecutive_failures += 1;
                        }
                        warn!(exchange = "gdax", error = %e, consecutive_failures, "adapter stopped, backing off");
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            error!(exchange = "gdax", consecutive_failures, "giving up, never reached Live");
                            return false;
                        }
                    }
                }
            }
            _ = cancel.cancelled() => return true,
        }
        tokio::select! {
            _ = tokio::time::sleep(backoff.next_delay()) => {}
            _ = cancel.cancelled() => return true,
        }
    }
}

async fn run_bitfinex_with_backoff(products: Vec<String>, publisher: Arc<Publisher>, cancel: CancellationToken) -> bool {
    let mut backoff = Backoff::new();
    let mut consecutive_failures: u32 = 0;
    loop {
        let mut adapter = BitfinexAdapter::<WsFeedTransport>::new(products.clone());
        let started = Instant::now();
        tokio::select! {
            result = adapter.run(&publisher) => {
                match result {
                    Ok(()) => return true,
                    Err(e) => {
                        if started.elapsed() >= RESET_THRESHOLD {
                            consecutive_failures = 0;
                            backoff.reset();
                        } else {
                            consecutive_failures += 1;
                        }
                        warn!(exchange = "bitfinex", error = %e, consecutive_failures, "adapter stopped, backing off");
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            error!(exchange = "bitfinex", consecutive_failures, "giving up, never reached Live");
                            return false;
                        }
                    }
                }
            }
            _ = cancel.cancelled() => return true,
        }
        tokio::select! {
            _ = tokio::time::sleep(backoff.next_delay()) => {}
            _ = cancel.cancelled() => return true,
        }
    }
}

async fn run_bittrex_with_backoff(products: Vec<String>, publisher: Arc<Publisher>, cancel: CancellationToken) -> bool {
    let mut backoff = Backoff::new();
    let mut consecutive_failures: u32 = 0;
    loop {
        let mut adapter = BittrexAdapter::<WsFeedTransport>::new(products.clone());
        let started = Instant::now();
        tokio::select! {
            result = adapter.run(&publisher) => {
                match result {
                    Ok(()) => return true,
                    Err(e) => {
                        if started.elapsed() >= RESET_THRESHOLD {
                            consecutive_failures = 0;
                            backoff.reset();
                        } else {
                            consecutive_failures += 1;
                        }
                        warn!(exchange = "bittrex", error = %e, consecutive_failures, "adapter stopped, backing off");
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            error!(exchange = "bittrex", consecutive_failures, "giving up, never reached Live");
                            return false;
                        }
                    }
                }
            }
            _ = cancel.cancelled() => return true,
        }
        tokio::select! {
            _ = tokio::time::sleep(backoff.next_delay()) => {}
            _ = cancel.cancelled() => return true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_with_no_known_exchanges_errors() {
        let supervisor = Supervisor::new();
        let cancel = CancellationToken::new();
        let subs = vec![Subscription {
            exchange: "not-a-real-exchange".to_string(),
            instrument_name: "Bitcoin".to_string(),
            instrument_code: "BTC-USD".to_string(),
        }];
        let result = supervisor.run(subs, cancel).await;
        assert!(matches!(result, Err(SupervisorError::NoAdapters)));
    }
}
