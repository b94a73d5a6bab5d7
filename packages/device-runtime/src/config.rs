//! Device-side runtime configuration (§6 "Environment").
//!
//! Mirrors `toygateway-core::Config`'s shape: a flat, `serde`-deserializable
//! struct with a hand-written `Default`, populated by the binary crate from
//! a YAML file and environment overrides.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CAPTURE_SAMPLE_RATE, RECONNECT_MAX_ATTEMPTS};
use crate::error::{DeviceError, DeviceResult};

/// Configuration for one device's connection and audio engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Gateway base URL, e.g. `wss://gateway.example.com` (scheme required).
    pub gateway_url: String,

    /// Device id supplied on `handshake` and used to build the connect URL.
    pub device_id: String,

    /// Toy id supplied on `handshake` and used to build the connect URL.
    pub toy_id: String,

    /// Shared credential, if the deployment requires one (sent as a bearer
    /// token on the WebSocket upgrade request).
    pub auth_token: Option<String>,

    /// Enables local wake-word detection (out of scope for the core; this
    /// flag only gates whether the capture pipeline waits for a wake word
    /// before opening the input stream versus starting on button press).
    pub wake_word_enabled: bool,

    /// Enables the offline write-behind queue contract (out of scope for
    /// the core; carried through so a future cache component can read it).
    pub offline_mode_enabled: bool,

    /// Maximum reconnect attempts before transitioning to `failed`.
    pub reconnect_max_attempts: u32,

    /// Overrides the default input device name; `None` selects the host's
    /// default input device.
    pub input_device: Option<String>,

    /// Overrides the default output device name; `None` selects the host's
    /// default output device.
    pub output_device: Option<String>,

    /// Overrides the playback sample rate; `None` defaults per §4.6
    /// ("Bluetooth sinks: 48 kHz; HAT-style I2S sinks: the stream's native
    /// rate").
    pub playback_sample_rate_override: Option<u32>,

    /// Capture sample rate advertised in the `handshake` capabilities and
    /// used to tag outbound `audio_chunk` frames.
    pub capture_sample_rate: u32,

    /// Encodes captured audio with Opus instead of raw PCM16. Only takes
    /// effect when the crate is built with the `opus-codec` feature.
    pub opus_enabled: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            device_id: String::new(),
            toy_id: String::new(),
            auth_token: None,
            wake_word_enabled: false,
            offline_mode_enabled: false,
            reconnect_max_attempts: RECONNECT_MAX_ATTEMPTS,
            input_device: None,
            output_device: None,
            playback_sample_rate_override: None,
            capture_sample_rate: DEFAULT_CAPTURE_SAMPLE_RATE,
            opus_enabled: false,
        }
    }
}

impl DeviceConfig {
    /// Builds the `<gateway>/ws/{device_id}/{toy_id}` connect URL (§6).
    pub fn ws_url(&self) -> DeviceResult<url::Url> {
        if self.gateway_url.is_empty() {
            return Err(DeviceError::Configuration("gateway_url is empty".into()));
        }
        if self.device_id.is_empty() || self.toy_id.is_empty() {
            return Err(DeviceError::Configuration(
                "device_id and toy_id must be set".into(),
            ));
        }

        let base = self.gateway_url.trim_end_matches('/');
        let full = format!("{base}/ws/{}/{}", self.device_id, self.toy_id);
        url::Url::parse(&full).map_err(|e| DeviceError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_joins_device_and_toy_id() {
        let config = DeviceConfig {
            gateway_url: "wss://gateway.example.com/".to_string(),
            device_id: "device-1".to_string(),
            toy_id: "toy-1".to_string(),
            ..Default::default()
        };
        let url = config.ws_url().unwrap();
        assert_eq!(url.as_str(), "wss://gateway.example.com/ws/device-1/toy-1");
    }

    #[test]
    fn ws_url_rejects_missing_gateway_url() {
        let config = DeviceConfig::default();
        assert!(config.ws_url().is_err());
    }
}
