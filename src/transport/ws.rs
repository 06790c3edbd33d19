use super::{FeedEvent, FeedTransport, TransportError};
use futures_util::{SinkExt, StreamExt};
use futures_util::stream::{SplitSink, SplitStream};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);
const STALE_THRESHOLD: Duration = Duration::from_secs(60);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// A [`FeedTransport`] over a `wss://` connection, using `tokio-tungstenite`.
///
/// Sends a ping whenever [`PING_INTERVAL`] elapses with no outbound
/// traffic, and treats both a missed pong and a prolonged silence from
/// the server as a stale connection (spec.md §4.3: "must send a
/// keepalive ping if no frame was sent for 30 s").
pub struct WsFeedTransport {
    sink: WsSink,
    source: WsSource,
    last_frame_at: Instant,
    ping_interval: tokio::time::Interval,
    pong_deadline: Option<Instant>,
    closed: bool,
}

impl FeedTransport for WsFeedTransport {
    async fn open(
        url: &str,
        subscribe_payloads: Vec<serde_json::Value>,
    ) -> Result<Self, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, source) = stream.split();

        for payload in subscribe_payloads {
            sink.send(Message::Text(payload.to_string().into())).await?;
        }

        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        ping_interval.tick().await; // consume the immediate first tick

        Ok(WsFeedTransport {
            sink,
            source,
            last_frame_at: Instant::now(),
            ping_interval,
            pong_deadline: None,
            closed: false,
        })
    }

    async fn next(&mut self) -> FeedEvent {
        if self.closed {
            return FeedEvent::Disconnected(TransportError::ConnectionClosed);
        }
        loop {
            let pong_timeout = match self.pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline),
                None => tokio::time::sleep_until(Instant::now() + Duration::from_secs(86_400)),
            };
            let pong_active = self.pong_deadline.is_some();

            tokio::select! {
                msg = self.source.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.last_frame_at = Instant::now();
                            match serde_json::from_str(&text) {
                                Ok(value) => return FeedEvent::Message(value),
                                Err(e) => {
                                    debug!(error = %e, "non-JSON frame ignored");
                                    continue;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            self.last_frame_at = Instant::now();
                            if self.sink.send(Message::Pong(data)).await.is_err() {
                                self.closed = true;
                                return FeedEvent::Disconnected(TransportError::ConnectionClosed);
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            trace!("pong received");
                            self.last_frame_at = Instant::now();
                            self.pong_deadline = None;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            self.closed = true;
                            return FeedEvent::Disconnected(TransportError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            self.closed = true;
                            return FeedEvent::Disconnected(TransportError::UnexpectedBinaryFrame);
                        }
                        Some(Err(e)) => {
                            self.closed = true;
                            return FeedEvent::Disconnected(TransportError::Connect(e));
                        }
                    }
                }
                _ = self.ping_interval.tick() => {
                    trace!("sending ping");
                    if self.sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        self.closed = true;
                        return FeedEvent::Disconnected(TransportError::ConnectionClosed);
                    }
                    self.pong_deadline = Some(Instant::now() + PONG_TIMEOUT);
                }
                _ = pong_timeout, if pong_active => {
                    warn!("pong timeout");
                    self.closed = true;
                    return FeedEvent::Disconnected(TransportError::PongTimeout);
                }
            }

            let elapsed = self.last_frame_at.elapsed();
            if elapsed > STALE_THRESHOLD {
                self.closed = true;
                return FeedEvent::Disconnected(TransportError::Stale {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }
    }

    async fn send(&mut self, payload: serde_json::Value) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        self.sink.send(Message::Text(payload.to_string().into())).await?;
        self.last_frame_at = Instant::now();
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        let _ = self.sink.send(Message::Close(None)).await;
        self.closed = true;
    }
}
