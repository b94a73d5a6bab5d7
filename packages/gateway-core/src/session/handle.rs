use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toygateway_protocol::Frame;

/// One live device↔gateway connection plus its accumulated buffers (§3
/// "Session"). Owned by the WebSocket handler task; shared (via `Arc`) with
/// its off-loop AI dispatch task so the dispatch task can push frames back
/// to the client without taking over the connection's single writer (I1).
pub struct SessionHandle {
    pub id: String,
    pub device_id: String,
    pub toy_id: String,

    /// Outbound frames from background tasks (AI dispatch, status
    /// heartbeat) funnel through here; the WS handler's main loop is the
    /// single writer that actually serializes them onto the socket.
    outbound_tx: mpsc::UnboundedSender<Frame>,

    /// Ingress audio buffer: append-only until a terminal marker, then
    /// drained atomically in the same step that schedules dispatch (I2).
    ingress: Mutex<Vec<u8>>,

    last_activity_unix_ms: AtomicU64,

    /// Thread/conversation id assigned by the AI backend on first
    /// interaction, opaque to the gateway.
    thread_id: RwLock<Option<String>>,

    /// Cancels this session's reader, heartbeat, and in-flight dispatch.
    pub cancel_token: CancellationToken,
}

impl SessionHandle {
    pub(crate) fn new(
        id: String,
        device_id: String,
        toy_id: String,
        outbound_tx: mpsc::UnboundedSender<Frame>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            device_id,
            toy_id,
            outbound_tx,
            ingress: Mutex::new(Vec::new()),
            last_activity_unix_ms: AtomicU64::new(now_unix_ms()),
            thread_id: RwLock::new(None),
            cancel_token,
        }
    }

    /// Enqueues a frame for the single writer to send. Silently drops if
    /// the session's WS loop has already exited — the session is closing.
    pub fn send(&self, frame: Frame) {
        let _ = self.outbound_tx.send(frame);
    }

    pub fn record_activity(&self) {
        self.last_activity_unix_ms
            .store(now_unix_ms(), Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> std::time::Duration {
        let last = self.last_activity_unix_ms.load(Ordering::Relaxed);
        let now = now_unix_ms();
        std::time::Duration::from_millis(now.saturating_sub(last))
    }

    /// Appends a decoded `audio_chunk` payload to the ingress buffer.
    pub fn push_ingress(&self, bytes: &[u8]) {
        self.ingress.lock().extend_from_slice(bytes);
    }

    /// Drains and returns the ingress buffer, leaving it empty — the
    /// atomic clear-on-dispatch step I2 requires.
    pub fn take_ingress(&self) -> Vec<u8> {
        std::mem::take(&mut self.ingress.lock())
    }

    pub fn ingress_is_empty(&self) -> bool {
        self.ingress.lock().is_empty()
    }

    pub fn thread_id(&self) -> Option<String> {
        self.thread_id.read().clone()
    }

    pub fn set_thread_id(&self, id: String) {
        *self.thread_id.write() = Some(id);
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Monotonic wall-clock instant a dispatch started, used only for the
/// dispatch-latency histogram.
pub fn dispatch_timer() -> Instant {
    Instant::now()
}
