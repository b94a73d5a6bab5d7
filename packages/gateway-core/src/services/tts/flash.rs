//! "Flash" vendor provider: chunked-binary streaming HTTP API.
//!
//! The vendor returns raw PCM16 bytes as a plain `Transfer-Encoding: chunked`
//! response body — no inner framing — so this adapter is close to a
//! pass-through over `reqwest`'s `bytes_stream`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;

use super::provider::{AudioStream, TtsError, TtsProvider, VoiceConfig};

pub struct FlashProvider {
    id: String,
    client: Client,
    base_url: String,
    api_key: String,
    sample_rate: u32,
    default_voice_id: String,
}

impl FlashProvider {
    pub fn new(
        id: impl Into<String>,
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        sample_rate: u32,
        default_voice_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            sample_rate,
            default_voice_id: default_voice_id.into(),
        }
    }
}

#[async_trait]
impl TtsProvider for FlashProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn stream(&self, text: &str, voice: &VoiceConfig) -> Result<AudioStream, TtsError> {
        let voice_id = voice
            .voice_id
            .clone()
            .unwrap_or_else(|| self.default_voice_id.clone());

        let body = json!({
            "text": text,
            "voiceId": voice_id,
            "modelId": voice.model_id,
            "speed": voice.speed,
            "volume": voice.volume,
            "pitch": voice.pitch,
            "sampleRate": self.sample_rate,
            "outputFormat": "pcm16",
        });

        let resp = self
            .client
            .post(format!("{}/v1/tts/stream", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TtsError::Vendor(format!(
                "flash tts returned status {}",
                resp.status()
            )));
        }

        let byte_stream = resp
            .bytes_stream()
            .map(|r| r.map_err(TtsError::from));

        Ok(Box::pin(byte_stream))
    }
}
