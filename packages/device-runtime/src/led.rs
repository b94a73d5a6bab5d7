//! LED pattern controller contract.
//!
//! §4.6: "Transitions drive an LED pattern controller (not specified in the
//! core, but contract: accepts a named pattern and renders asynchronously)."
//! Hardware-specific renderers (GPIO, I2C ring, etc.) are out of scope; this
//! crate only defines the contract and a logging stand-in.

use async_trait::async_trait;

use crate::state_machine::DeviceState;

/// A named LED pattern, one per device state plus a couple of transient
/// cues the state machine emits mid-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    Idle,
    Connecting,
    Listening,
    Processing,
    Speaking,
    Error,
    Offline,
}

impl LedPattern {
    /// The steady-state pattern for a given [`DeviceState`].
    pub fn for_state(state: DeviceState) -> Self {
        match state {
            DeviceState::Idle => LedPattern::Idle,
            DeviceState::Connecting => LedPattern::Connecting,
            DeviceState::Listening => LedPattern::Listening,
            DeviceState::Processing => LedPattern::Processing,
            DeviceState::Speaking => LedPattern::Speaking,
            DeviceState::Error => LedPattern::Error,
            DeviceState::Offline => LedPattern::Offline,
        }
    }
}

/// Renders LED patterns asynchronously. Implementations must not block the
/// caller's event loop — if the underlying hardware call is synchronous,
/// bridge it to a dedicated thread (§5 "Thread/loop bridging").
#[async_trait]
pub trait LedController: Send + Sync {
    async fn render(&self, pattern: LedPattern);
}

/// Logs the pattern instead of driving hardware. The default controller
/// for headless/test environments and for devices without LEDs attached.
pub struct LoggingLedController;

#[async_trait]
impl LedController for LoggingLedController {
    async fn render(&self, pattern: LedPattern) {
        log::debug!("[led] pattern -> {pattern:?}");
    }
}
