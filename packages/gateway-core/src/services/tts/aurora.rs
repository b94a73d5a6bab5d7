//! "Aurora" vendor provider: SSE-framed streaming HTTP API.
//!
//! The vendor streams `text/event-stream` frames of the shape
//! `data: {"audio":"<base64 pcm16 chunk>"}\n\n`, terminated by a
//! `data: [DONE]\n\n` sentinel. This mirrors the SSE response-parsing shape
//! used for vendor streaming transcripts elsewhere in the surrounding
//! corpus (line-buffered incremental JSON parsing over a chunked body).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::provider::{AudioStream, TtsError, TtsProvider, VoiceConfig};

pub struct AuroraProvider {
    id: String,
    client: Client,
    base_url: String,
    api_key: String,
    sample_rate: u32,
    default_voice_id: String,
}

impl AuroraProvider {
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

#[derive(Deserialize)]
struct AuroraEvent {
    audio: Option<String>,
}

/// Extracts complete `data: ...\n\n` frames from an accumulating buffer,
/// returning the decoded payloads found and the unconsumed remainder.
fn drain_sse_frames(buf: &mut String) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(pos) = buf.find("\n\n") {
        let frame = buf[..pos].to_string();
        *buf = buf[pos + 2..].to_string();
        for line in frame.lines() {
            if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                out.push(data.trim().to_string());
            }
        }
    }
    out
}

#[async_trait]
impl TtsProvider for AuroraProvider {
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
            "voice": voice_id,
            "model": voice.model_id,
            "emotion": voice.emotion,
            "sample_rate": self.sample_rate,
        });

        let resp = self
            .client
            .post(format!("{}/v1/synthesize/sse", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TtsError::Vendor(format!(
                "aurora tts returned status {}",
                resp.status()
            )));
        }

        let raw = resp.bytes_stream();

        let decoded = async_stream::stream! {
            futures::pin_mut!(raw);
            let mut buf = String::new();
            while let Some(chunk) = raw.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(TtsError::from(e));
                        return;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));

                for data in drain_sse_frames(&mut buf) {
                    if data == "[DONE]" {
                        return;
                    }
                    match serde_json::from_str::<AuroraEvent>(&data) {
                        Ok(event) => {
                            if let Some(audio_b64) = event.audio {
                                match BASE64.decode(audio_b64.as_bytes()) {
                                    Ok(pcm) => yield Ok(Bytes::from(pcm)),
                                    Err(e) => {
                                        yield Err(TtsError::Vendor(format!(
                                            "aurora emitted invalid base64 audio: {e}"
                                        )));
                                        return;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            yield Err(TtsError::Vendor(format!(
                                "aurora emitted malformed SSE frame: {e}"
                            )));
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_frames_and_keeps_remainder() {
        let mut buf = "data: {\"audio\":\"AA==\"}\n\ndata: [DON".to_string();
        let frames = drain_sse_frames(&mut buf);
        assert_eq!(frames, vec!["{\"audio\":\"AA==\"}"]);
        assert_eq!(buf, "data: [DON");
    }
}
