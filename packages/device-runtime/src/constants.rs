//! Named constants for the device connection (C5) and audio engine (C6).
//!
//! Deliberately not shared with `toygateway-core` — the device is a
//! separate process from the gateway and the two crates only share
//! `toygateway-protocol` — but the values mirror the gateway's own
//! `constants.rs` wherever the two sides' timing is coupled (e.g. the
//! idle-reap threshold's relationship to the transport ping interval).

use std::time::Duration;

// ── Transport (§4.5) ────────────────────────────────────────────────────────

/// Application-level WebSocket ping interval.
pub const TRANSPORT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long the reader waits for a frame before issuing a ping and
/// continuing, long enough to tolerate an outstanding AI call.
pub const TRANSPORT_PING_TIMEOUT: Duration = Duration::from_secs(60);

// ── Reconnect (§4.5) ─────────────────────────────────────────────────────────

/// Base delay for the exponential reconnect backoff.
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Reconnect backoff ceiling: `base * 2^(attempt-1)`, capped here.
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Attempts before the device gives up and transitions to `failed`.
pub const RECONNECT_MAX_ATTEMPTS: u32 = 10;

// ── Inbound audio queue (§4.5) ───────────────────────────────────────────────

/// Capacity of the inbound audio queue; overflow drops the oldest entry.
pub const INBOUND_QUEUE_CAPACITY: usize = 1000;

/// A gap longer than this between outbound audio sends starts a new
/// interaction and triggers an inbound-queue drain.
pub const INTERACTION_BOUNDARY_GAP: Duration = Duration::from_millis(1500);

// ── Playback pipeline (§4.6) ─────────────────────────────────────────────────

/// Minimum aggregation-buffer size before a write to the output sink;
/// correctness requirement for Bluetooth-class sinks, not a tunable.
pub const PLAYBACK_AGGREGATION_MIN_BYTES: usize = 8 * 1024;

/// Delay between aggregated playback writes.
pub const PLAYBACK_WRITE_DELAY: Duration = Duration::from_millis(3);

/// Fallback watchdog: start playback this long after the terminal outbound
/// marker if inbound audio arrived but no `text_response` did.
pub const PLAYBACK_WATCHDOG_DELAY: Duration = Duration::from_millis(500);

/// Overall cap guarding against a stuck playback stream.
pub const PLAYBACK_OVERALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Playback is considered complete if no inbound data has arrived for this
/// long and the stream is no longer in a receiving state.
pub const PLAYBACK_IDLE_COMPLETION: Duration = Duration::from_secs(1);

/// Default output sample rate for Bluetooth-class sinks.
pub const BLUETOOTH_DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Target duration of one playback write chunk at the selected sample rate.
pub const PLAYBACK_CHUNK_DURATION_MS: u32 = 20;

// ── Capture pipeline (§4.6) ──────────────────────────────────────────────────

/// Target duration of one captured frame submitted to C5 (20 ms, matching
/// the end-to-end scenario's 640-byte PCM16 @16 kHz chunks).
pub const CAPTURE_CHUNK_DURATION_MS: u32 = 20;

/// Default capture sample rate when the input device's native rate is not
/// otherwise overridden.
pub const DEFAULT_CAPTURE_SAMPLE_RATE: u32 = 16_000;
