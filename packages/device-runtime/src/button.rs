//! Button source contract.
//!
//! §4.6 names "button press" as one of two ways `listening` is entered from
//! `idle` (the other being wake-word detection). GPIO access itself is out
//! of scope (§1 "Device-side hardware drivers... treated as... edge-triggered
//! inputs"), so this crate only defines the trait seam a real GPIO handler
//! would implement, plus a no-op stand-in for headless/test environments —
//! the same shape as [`crate::led::LedController`].

use async_trait::async_trait;

/// A single edge-triggered button event: pressed or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed,
    Released,
}

/// Yields button press/release edges. Implementations must not block the
/// caller's event loop; GPIO polling belongs on a dedicated thread bridged
/// in via a channel (§5 "Thread/loop bridging"), matching how capture and
/// TTS producers cross into the async world.
#[async_trait]
pub trait ButtonSource: Send + Sync {
    /// Awaits the next button edge. Returns `None` if the source has shut
    /// down (e.g. the underlying GPIO line was closed).
    async fn next_event(&mut self) -> Option<ButtonEvent>;
}

/// A button source that never fires; used when no physical button is wired
/// up (wake-word-only devices, desktop test runs).
pub struct NoopButtonSource;

#[async_trait]
impl ButtonSource for NoopButtonSource {
    async fn next_event(&mut self) -> Option<ButtonEvent> {
        std::future::pending().await
    }
}
