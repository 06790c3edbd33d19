//! Fan-out of consistent book snapshots to a set of subscribers with a
//! back-pressure policy (spec.md C6: `Publisher`).

mod port;

pub use port::{ChannelPort, SubscriberPort};

use crate::orderbook::Snapshot;
use crossbeam::queue::ArrayQueue;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default per-subscriber mailbox capacity (spec.md §4.5).
const DEFAULT_MAILBOX_CAPACITY: usize = 16;
/// How long a `lossless` publish blocks before counting a lag event
/// (spec.md §4.5/§5).
const LOSSLESS_SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(50);
/// Consecutive lag events before a `lossless` subscriber is dropped.
const MAX_LAG_STRIKES: u32 = 3;

/// Opaque handle returned by [`Publisher::subscribe`], used to
/// [`Publisher::unsubscribe`] later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// How a subscriber wants snapshots delivered under back-pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeMode {
    /// Best-effort: a full mailbox drops the oldest queued snapshot.
    Lossy,
    /// Must see every update: `publish` blocks briefly rather than
    /// drop, and the subscriber is unsubscribed after repeated lag.
    Lossless,
}

struct Mailbox {
    queue: Arc<ArrayQueue<Snapshot>>,
    notify: Arc<Notify>,
    mode: SubscribeMode,
    lag_strikes: Arc<AtomicU32>,
}

impl Clone for Mailbox {
    fn clone(&self) -> Self {
        Mailbox {
            queue: self.queue.clone(),
            notify: self.notify.clone(),
            mode: self.mode,
            lag_strikes: self.lag_strikes.clone(),
        }
    }
}

struct Subscription {
    mailbox: Mailbox,
    worker: JoinHandle<()>,
}

/// Owns the subscriber roster and delivers [`Snapshot`]s with the
/// back-pressure policy described in spec.md §4.5.
///
/// The roster is a [`DashMap`] — the teacher crate's choice for state
/// genuinely touched by many threads at once (there, order locations
/// under concurrent matching; here, `subscribe`/`unsubscribe` racing
/// against `publish` from the adapter's hot path).
#[derive(Default)]
pub struct Publisher {
    subscriptions: DashMap<SubscriptionId, Subscription>,
    next_id: AtomicU64,
}

impl Publisher {
    /// An empty publisher.
    pub fn new() -> Self {
        Publisher {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a subscriber, spawning its dedicated delivery worker.
    pub fn subscribe(&self, port: Arc<dyn SubscriberPort>, mode: SubscribeMode) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mailbox = Mailbox {
            queue: Arc::new(ArrayQueue::new(DEFAULT_MAILBOX_CAPACITY)),
            notify: Arc::new(Notify::new()),
            mode,
            lag_strikes: Arc::new(AtomicU32::new(0)),
        };

        let worker_mailbox = mailbox.clone();
        let worker = tokio::spawn(async move {
            loop {
                worker_mailbox.notify.notified().await;
                while let Some(snapshot) = worker_mailbox.queue.pop() {
                    port.deliver(snapshot).await;
                }
            }
        });

        self.subscriptions.insert(id, Subscription { mailbox, worker });
        id
    }

    /// Deregister a subscriber and stop its delivery worker. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some((_, subscription)) = self.subscriptions.remove(&id) {
            subscription.worker.abort();
        }
    }

    /// Deliver `snapshot` to every registered subscriber, applying each
    /// one's back-pressure policy independently.
    pub async fn publish(&self, snapshot: Snapshot) {
        let targets: Vec<(SubscriptionId, Mailbox)> = self
            .subscriptions
            .iter()
            .map(|e| (*e.key(), e.value().mailbox.clone()))
            .collect();

        let mut to_drop = Vec::new();
        for (id, mailbox) in targets {
            match mailbox.mode {
                SubscribeMode::Lossy => {
                    if let Err(rejected) = mailbox.queue.push(snapshot.clone()) {
                        mailbox.queue.pop();
                        let _ = mailbox.queue.push(rejected);
                    }
                    mailbox.notify.notify_one();
                }
                SubscribeMode::Lossless => {
                    if self.send_lossless(&mailbox, snapshot.clone()).await {
                        mailbox.lag_strikes.store(0, Ordering::Relaxed);
                    } else {
                        let strikes = mailbox.lag_strikes.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            subscriber = id.0,
                            strikes, "SubscriberLagging: lossless mailbox full"
                        );
                        if strikes >= MAX_LAG_STRIKES {
                            info!(subscriber = id.0, "unsubscribing after repeated lag");
                            to_drop.push(id);
                        }
                    }
                }
            }
        }

        for id in to_drop {
            self.unsubscribe(id);
        }
    }

    /// Try to enqueue for up to [`LOSSLESS_SEND_TIMEOUT`], polling the
    /// bounded queue since `ArrayQueue` has no blocking push of its own.
    async fn send_lossless(&self, mailbox: &Mailbox, snapshot: Snapshot) -> bool {
        let deadline = tokio::time::Instant::now() + LOSSLESS_SEND_TIMEOUT;
        let mut pending = snapshot;
        loop {
            match mailbox.queue.push(pending) {
                Ok(()) => {
                    mailbox.notify.notify_one();
                    return true;
                }
                Err(rejected) => {
                    pending = rejected;
                    if tokio::time::Instant::now() >= deadline {
                        return false;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                }
            }
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        for entry in self.subscriptions.iter() {
            entry.value().worker.abort();
        }
    }
}
