//! Transport-layer failures (spec.md C3: `FeedTransport`).

use thiserror::Error;

/// Failures surfaced by a [`super::FeedTransport`].
///
/// All of these are terminal for the current connection — on any of
/// them the transport is done and the caller (an
/// [`crate::adapter::ExchangeAdapter`]) must reconnect from scratch.
/// Transport itself never retries; retry policy belongs to the adapter's
/// state machine (spec.md §4.3).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The initial WebSocket handshake failed.
    #[error("connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server closed the connection, or we read past end-of-stream.
    #[error("connection closed")]
    ConnectionClosed,

    /// No frame (data or ping) arrived within the staleness window.
    #[error("connection stale: no frames for {elapsed_ms}ms")]
    Stale {
        /// Milliseconds since the last frame was received.
        elapsed_ms: u64,
    },

    /// We sent a ping and no pong arrived before the deadline.
    #[error("pong timeout")]
    PongTimeout,

    /// A frame was not valid UTF-8 text (binary frames are not expected
    /// on any supported exchange feed).
    #[error("unexpected binary frame")]
    UnexpectedBinaryFrame,
}
