//! Echo gate — suppresses microphone capture while TTS playback is active.
//!
//! Without this, a device that is simultaneously recording and playing back
//! through acoustically-coupled mic/speaker hardware would feed its own
//! synthesized speech back into the next utterance. The playback pipeline
//! sets the gate when it starts writing audio to the output stream and
//! clears it when playback completes or is interrupted; the capture
//! pipeline checks it on every audio callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag coordinating capture and playback on one device.
#[derive(Debug, Clone)]
pub struct EchoGate {
    speaking: Arc<AtomicBool>,
}

impl EchoGate {
    pub fn new() -> Self {
        Self {
            speaking: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start_speaking(&self) {
        self.speaking.store(true, Ordering::SeqCst);
    }

    pub fn stop_speaking(&self) {
        self.speaking.store(false, Ordering::SeqCst);
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

impl Default for EchoGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_not_speaking() {
        assert!(!EchoGate::new().is_speaking());
    }

    #[test]
    fn clone_shares_state() {
        let a = EchoGate::new();
        let b = a.clone();
        a.start_speaking();
        assert!(b.is_speaking());
        b.stop_speaking();
        assert!(!a.is_speaking());
    }
}
