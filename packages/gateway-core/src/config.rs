//! Gateway-wide runtime configuration.
//!
//! A flat, `serde`-deserializable struct with a hand-written `Default`,
//! populated by the binary crate from a YAML file and then environment
//! overrides (see `apps/gateway-server/src/config.rs`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AI_STATUS_HEARTBEAT_INTERVAL, DEFAULT_AI_DISPATCH_TIMEOUT, IDLE_REAP_SCAN_INTERVAL,
    PROVIDER_QUEUE_CAPACITY, SESSION_IDLE_TIMEOUT, TRANSPORT_PING_INTERVAL,
};

/// Configuration for a single TTS vendor, keyed by provider id in
/// [`Config::tts_providers`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TtsProviderConfig {
    /// Vendor API base URL (e.g. `https://api.vendor.example`).
    pub base_url: String,
    /// Vendor API credential, read from environment in practice (never
    /// serialized back out in logs or `/health`).
    pub api_key: String,
    /// Provider-native sample rate surfaced in `audio_response` metadata.
    pub sample_rate: u32,
    /// Default voice id when the toy config omits `voiceId`.
    pub default_voice_id: String,
}

impl Default for TtsProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            sample_rate: 16_000,
            default_voice_id: String::new(),
        }
    }
}

/// Core gateway configuration (transport-agnostic; the binary layers CLI
/// and environment overrides over this).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Port the HTTP/WS server binds to.
    pub bind_port: u16,

    /// Base URL of the AI backend (e.g. a Convex deployment).
    pub ai_backend_url: String,

    /// Shared credential for the AI backend, if required.
    pub ai_backend_token: Option<String>,

    /// Timeout, in seconds, for the `processVoiceInteraction` call.
    pub ai_dispatch_timeout_secs: u64,

    /// Globally disables TTS streaming; the AI backend is then expected to
    /// return `audioData` directly (§4.3 step 3).
    pub tts_disabled: bool,

    /// Id of the provider used when the toy config omits `ttsProvider` or
    /// names one that is not registered.
    pub default_tts_provider: String,

    /// Per-provider vendor configuration, keyed by provider id.
    pub tts_providers: std::collections::HashMap<String, TtsProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_port: 8080,
            ai_backend_url: String::new(),
            ai_backend_token: None,
            ai_dispatch_timeout_secs: DEFAULT_AI_DISPATCH_TIMEOUT.as_secs(),
            tts_disabled: false,
            default_tts_provider: "flash".to_string(),
            tts_providers: std::collections::HashMap::new(),
        }
    }
}

impl Config {
    pub fn ai_dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_dispatch_timeout_secs)
    }

    pub fn ai_status_heartbeat_interval(&self) -> Duration {
        AI_STATUS_HEARTBEAT_INTERVAL
    }

    pub fn transport_ping_interval(&self) -> Duration {
        TRANSPORT_PING_INTERVAL
    }

    pub fn idle_reap_scan_interval(&self) -> Duration {
        IDLE_REAP_SCAN_INTERVAL
    }

    pub fn session_idle_timeout(&self) -> Duration {
        SESSION_IDLE_TIMEOUT
    }

    pub fn provider_queue_capacity(&self) -> usize {
        PROVIDER_QUEUE_CAPACITY
    }

    /// `skipTTS` is true when the gateway itself will stream TTS (a
    /// provider is configured) or the operator disabled TTS outright
    /// (§4.3 step 3). Tells the AI backend not to synthesize its own audio
    /// either way; which of the two reasons applies is decided separately
    /// by [`Self::gateway_streams_tts`].
    pub fn skip_tts_for_backend(&self) -> bool {
        self.tts_disabled || self.gateway_streams_tts()
    }

    /// Whether the gateway itself synthesizes and streams TTS via a
    /// configured provider. `false` when the operator disabled TTS
    /// globally, even if providers happen to be configured.
    pub fn gateway_streams_tts(&self) -> bool {
        !self.tts_disabled && !self.tts_providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_timeouts() {
        let cfg = Config::default();
        assert_eq!(cfg.ai_dispatch_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.default_tts_provider, "flash");
    }

    #[test]
    fn skip_tts_true_when_providers_configured() {
        let mut cfg = Config::default();
        assert!(!cfg.skip_tts_for_backend());
        cfg.tts_providers
            .insert("flash".to_string(), TtsProviderConfig::default());
        assert!(cfg.skip_tts_for_backend());
        assert!(cfg.gateway_streams_tts());
    }

    #[test]
    fn tts_disabled_skips_backend_but_does_not_stream() {
        let mut cfg = Config::default();
        cfg.tts_disabled = true;
        cfg.tts_providers
            .insert("flash".to_string(), TtsProviderConfig::default());
        assert!(cfg.skip_tts_for_backend());
        assert!(!cfg.gateway_streams_tts());
    }
}
