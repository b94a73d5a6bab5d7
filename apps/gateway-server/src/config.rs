//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use toygateway_core::config::TtsProviderConfig;
use toygateway_core::Config as CoreConfig;

/// Server configuration loaded from YAML with environment overrides. Mirrors
/// [`CoreConfig`] field-for-field; kept separate so the library crate does
/// not need to depend on `clap`/`serde_yaml`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP/WS server to.
    /// Override: `GATEWAY_BIND_PORT`
    pub bind_port: u16,

    /// Base URL of the AI backend.
    /// Override: `GATEWAY_AI_BACKEND_URL`
    pub ai_backend_url: String,

    /// Shared credential for the AI backend.
    /// Override: `GATEWAY_AI_BACKEND_TOKEN`
    pub ai_backend_token: Option<String>,

    /// Timeout, in seconds, for the AI dispatch call.
    pub ai_dispatch_timeout_secs: u64,

    /// Globally disables TTS streaming.
    pub tts_disabled: bool,

    /// Id of the default TTS provider.
    pub default_tts_provider: String,

    /// Per-provider vendor configuration, keyed by provider id.
    pub tts_providers: HashMap<String, TtsProviderConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = CoreConfig::default();
        Self {
            bind_port: core.bind_port,
            ai_backend_url: core.ai_backend_url,
            ai_backend_token: core.ai_backend_token,
            ai_dispatch_timeout_secs: core.ai_dispatch_timeout_secs,
            tts_disabled: core.tts_disabled,
            default_tts_provider: core.default_tts_provider,
            tts_providers: core.tts_providers,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
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

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GATEWAY_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("GATEWAY_AI_BACKEND_URL") {
            self.ai_backend_url = val;
        }

        if let Ok(val) = std::env::var("GATEWAY_AI_BACKEND_TOKEN") {
            self.ai_backend_token = Some(val);
        }

        if let Ok(val) = std::env::var("GATEWAY_AI_DISPATCH_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.ai_dispatch_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("GATEWAY_TTS_DISABLED") {
            if let Ok(disabled) = val.parse() {
                self.tts_disabled = disabled;
            }
        }
    }

    /// Converts to `toygateway-core`'s `Config` type.
    pub fn to_core_config(self) -> CoreConfig {
        CoreConfig {
            bind_port: self.bind_port,
            ai_backend_url: self.ai_backend_url,
            ai_backend_token: self.ai_backend_token,
            ai_dispatch_timeout_secs: self.ai_dispatch_timeout_secs,
            tts_disabled: self.tts_disabled,
            default_tts_provider: self.default_tts_provider,
            tts_providers: self.tts_providers,
        }
    }
}
