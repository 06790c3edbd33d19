//! The consumer-facing interface (spec.md C7: `SubscriberPort`).

use crate::orderbook::Snapshot;
use async_trait::async_trait;

/// A sink that receives published snapshots one at a time, in order.
///
/// Implementations run on their own dedicated worker (spec.md §5: "each
/// subscriber runs on its own worker and consumes from its mailbox"), so
/// `deliver` may do real work — write to a socket, append to a file,
/// forward into another channel — without risking the adapter's hot
/// path.
///
/// The [`crate::publisher::Publisher`] roster holds heterogeneous
/// subscribers behind `Arc<dyn SubscriberPort>`, so unlike
/// [`crate::transport::FeedTransport`] or [`crate::rest::RestClient`]
/// (always used as a concrete generic parameter) this one needs the
/// boxed-future indirection `#[async_trait]` provides to stay object-safe.
#[async_trait]
pub trait SubscriberPort: Send + Sync {
    /// Handle one snapshot. Called sequentially; the next call waits for
    /// this one to return.
    async fn deliver(&self, snapshot: Snapshot);
}

/// A [`SubscriberPort`] that forwards snapshots onto an unbounded
/// `tokio::sync::mpsc` channel — the common case for wiring a subscriber
/// into another async task (a websocket broadcaster, a persistence
/// writer) without that task implementing the trait itself.
pub struct ChannelPort {
    tx: tokio::sync::mpsc::UnboundedSender<Snapshot>,
}

impl ChannelPort {
    /// Pair a new `ChannelPort` with the receiver it forwards into.
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<Snapshot>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (ChannelPort { tx }, rx)
    }
}

#[async_trait]
impl SubscriberPort for ChannelPort {
    async fn deliver(&self, snapshot: Snapshot) {
        // The receiver dropping is a normal unsubscribe path, not an error.
        let _ = self.tx.send(snapshot);
    }
}
