//! Device agent configuration.
//!
//! Supports loading from YAML files with environment variable overrides,
//! mirroring `apps/gateway-server/src/config.rs`'s `apply_env_overrides`
//! pattern on the device side.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use toygateway_device::DeviceConfig as CoreDeviceConfig;

/// Device agent configuration loaded from YAML with environment overrides.
/// Mirrors [`CoreDeviceConfig`] field-for-field; kept separate so the
/// library crate does not need to depend on `clap`/`serde_yaml`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Override: `DEVICE_GATEWAY_URL`
    pub gateway_url: String,
    /// Override: `DEVICE_ID`
    pub device_id: String,
    /// Override: `DEVICE_TOY_ID`
    pub toy_id: String,
    /// Override: `DEVICE_AUTH_TOKEN`
    pub auth_token: Option<String>,
    pub wake_word_enabled: bool,
    pub offline_mode_enabled: bool,
    /// Override: `DEVICE_RECONNECT_MAX_ATTEMPTS`
    pub reconnect_max_attempts: u32,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub playback_sample_rate_override: Option<u32>,
    pub capture_sample_rate: u32,
    pub opus_enabled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let core = CoreDeviceConfig::default();
        Self {
            gateway_url: core.gateway_url,
            device_id: core.device_id,
            toy_id: core.toy_id,
            auth_token: core.auth_token,
            wake_word_enabled: core.wake_word_enabled,
            offline_mode_enabled: core.offline_mode_enabled,
            reconnect_max_attempts: core.reconnect_max_attempts,
            input_device: core.input_device,
            output_device: core.output_device,
            playback_sample_rate_override: core.playback_sample_rate_override,
            capture_sample_rate: core.capture_sample_rate,
            opus_enabled: core.opus_enabled,
        }
    }
}

impl AgentConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DEVICE_GATEWAY_URL") {
            self.gateway_url = val;
        }
        if let Ok(val) = std::env::var("DEVICE_ID") {
            self.device_id = val;
        }
        if let Ok(val) = std::env::var("DEVICE_TOY_ID") {
            self.toy_id = val;
        }
        if let Ok(val) = std::env::var("DEVICE_AUTH_TOKEN") {
            self.auth_token = Some(val);
        }
        if let Ok(val) = std::env::var("DEVICE_RECONNECT_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                self.reconnect_max_attempts = n;
            }
        }
        if let Ok(val) = std::env::var("DEVICE_OPUS_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.opus_enabled = enabled;
            }
        }
    }

    pub fn to_core_config(self) -> CoreDeviceConfig {
        CoreDeviceConfig {
            gateway_url: self.gateway_url,
            device_id: self.device_id,
            toy_id: self.toy_id,
            auth_token: self.auth_token,
            wake_word_enabled: self.wake_word_enabled,
            offline_mode_enabled: self.offline_mode_enabled,
            reconnect_max_attempts: self.reconnect_max_attempts,
            input_device: self.input_device,
            output_device: self.output_device,
            playback_sample_rate_override: self.playback_sample_rate_override,
            capture_sample_rate: self.capture_sample_rate,
            opus_enabled: self.opus_enabled,
        }
    }
}
