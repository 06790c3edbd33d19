//! Exchange feed transport (spec.md C3): a thin WebSocket contract shared
//! by every [`crate::adapter::ExchangeAdapter`] variant.

mod error;
mod ws;

pub use error::TransportError;
pub use ws::WsFeedTransport;

/// One decoded item from a feed connection.
#[derive(Debug)]
pub enum FeedEvent {
    /// A JSON message from the exchange.
    Message(serde_json::Value),
    /// The connection ended (gracefully or not); the transport is no
    /// longer usable and the adapter must reconnect.
    Disconnected(TransportError),
}

/// Contract an [`crate::adapter::ExchangeAdapter`] drives to talk to an
/// exchange over a persistent connection.
///
/// Implementations own keepalive and staleness detection internally and
/// surface any failure as a [`FeedEvent::Disconnected`] rather than an
/// `Err` from `next` — per spec.md §4.3, disconnects are a terminal item
/// on the stream, not an exception that unwinds the adapter's loop.
/// Reconnection itself is the adapter's responsibility (spec.md §4.4's
/// state machine), not the transport's.
pub trait FeedTransport: Send {
    /// Open a connection to `url` and send each of `subscribe_payloads`
    /// as a text frame once connected.
    fn open(
        url: &str,
        subscribe_payloads: Vec<serde_json::Value>,
    ) -> impl std::future::Future<Output = Result<Self, TransportError>> + Send
    where
        Self: Sized;

    /// Wait for the next message or terminal disconnect.
    fn next(&mut self) -> impl std::future::Future<Output = FeedEvent> + Send;

    /// Send one additional frame over an already-open connection — used
    /// by adapters that must unsubscribe/resubscribe a single channel to
    /// recover (spec.md §4.4's `Recovering` state for multiplexed feeds
    /// such as Bitfinex's) without tearing down the whole connection.
    fn send(
        &mut self,
        payload: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Close the connection. Idempotent.
    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send;
}
