//! Named constants for the gateway so they have exactly one definition
//! site, grouped by concern with the rationale attached to each group.

use std::time::Duration;

// ── Session heartbeat & idle reaping (§4.2) ────────────────────────────────

/// Transport-level WebSocket keepalive ping interval.
pub const TRANSPORT_PING_INTERVAL: Duration = Duration::from_secs(45);

/// How often the idle-reap background task scans the live-sessions map.
pub const IDLE_REAP_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// A session idle longer than this is reaped. Kept a fixed multiple of the
/// heartbeat interval above: a well-behaved device sends at least one frame
/// per reap window even when silent.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

// ── AI dispatch (§4.3) ──────────────────────────────────────────────────────

/// Default timeout for the `processVoiceInteraction` call.
pub const DEFAULT_AI_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between `status:"processing"` heartbeats while a dispatch call
/// is outstanding.
pub const AI_STATUS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

// ── TTS provider abstraction (§4.4, §4.7) ───────────────────────────────────

/// Coalesce raw provider chunks until this many bytes have accumulated
/// before yielding to the writer (`MIN_CHUNK_SIZE` in the original source).
pub const TTS_COALESCE_MIN_BYTES: usize = 1024;

/// Bound on the producer→writer coalescing queue. A full queue blocks the
/// producer (backpressure), matching §4.7's "bounded queue (~100 chunks)".
pub const PROVIDER_QUEUE_CAPACITY: usize = 100;
