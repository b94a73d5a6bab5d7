//! The TTS provider capability set (§4.4): a uniform streaming interface
//! implemented once per speech-synthesis vendor.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;

/// Raw PCM byte chunks yielded by a provider, in its native sample rate.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes, TtsError>> + Send>>;

/// Recognized voice configuration keys (§4.4). Unknown keys in the source
/// JSON are ignored by `serde`'s default "unknown fields are dropped"
/// behavior; missing keys fall back to provider defaults set at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceConfig {
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub speed: Option<f32>,
    pub volume: Option<f32>,
    pub pitch: Option<f32>,
    pub emotion: Option<String>,
}

/// Failure modes of a single provider's `stream` call (§7 "Provider errors").
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("vendor request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vendor returned an error: {0}")]
    Vendor(String),
    #[error("vendor stream produced no audio")]
    Empty,
}

/// A speech-synthesis vendor adapter (§4.4).
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Registry key and the `provider` tag surfaced in `audio_response` metadata.
    fn id(&self) -> &str;

    /// Provider-native sample rate, surfaced in the wire metadata so the
    /// device can resample.
    fn sample_rate(&self) -> u32;

    /// Canonical wire format tag. Every provider in this gateway emits raw
    /// PCM16, so this is fixed rather than per-instance.
    fn format(&self) -> &'static str {
        "pcm16"
    }

    /// Produces a lazy sequence of raw PCM16 bytes for `text`. Returns
    /// immediately on a connect-time failure (no bytes yielded); a failure
    /// occurring after the first successful byte is represented as an `Err`
    /// item partway through the stream.
    async fn stream(&self, text: &str, voice: &VoiceConfig) -> Result<AudioStream, TtsError>;
}
