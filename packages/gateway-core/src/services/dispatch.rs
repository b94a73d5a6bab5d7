//! AI dispatch (§4.3, C4): off-loop invocation of the AI backend's
//! `processVoiceInteraction` action, and delivery of the resulting
//! `text_response`/`audio_response` frames back onto the session.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use uuid::Uuid;

use toygateway_protocol::{
    encode_audio, AudioResponseMetadata, AudioResponsePayload, Frame, TextResponsePayload,
};

use crate::audio::{containerize, IngressFormat};
use crate::config::Config;
use crate::error::DispatchError;
use crate::metrics::Metrics;
use crate::runtime::TaskSpawner;
use crate::services::tts::{coalesce, TtsRegistry, VoiceConfig};
use crate::session::SessionHandle;

/// Body of the `processVoiceInteraction` HTTP action (§4.3 step 2).
#[derive(Serialize)]
struct AiRequestBody {
    #[serde(rename = "toyId")]
    toy_id: String,
    audio: String,
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "deviceId")]
    device_id: String,
    format: String,
    duration: Option<f64>,
    #[serde(rename = "skipTTS")]
    skip_tts: bool,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
}

/// Shape the AI backend responds with. Unknown fields are dropped.
#[derive(Debug, Deserialize)]
struct AiResponseBody {
    success: bool,
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "audioData", default)]
    audio_data: Option<String>,
    #[serde(rename = "toyConfig", default)]
    toy_config: Option<ToyConfigWire>,
    #[serde(rename = "threadId", default)]
    thread_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// The subset of the AI backend's toy configuration this gateway acts on.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToyConfigWire {
    pub tts_provider: Option<String>,
    #[serde(flatten)]
    pub voice: VoiceConfig,
}

/// Drives the off-loop dispatch of one buffered utterance (§4.3).
pub struct AiDispatcher {
    client: Client,
    config: Arc<Config>,
    tts: Arc<TtsRegistry>,
    metrics: Arc<Metrics>,
}

impl AiDispatcher {
    pub fn new(
        client: Client,
        config: Arc<Config>,
        tts: Arc<TtsRegistry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            config,
            tts,
            metrics,
        }
    }

    /// Called by the session reader immediately on a terminal `audio_chunk`
    /// marker. Sends `status:processing` synchronously (before returning)
    /// so the client sees it ahead of anything the background task does,
    /// then spawns the background task that owns the rest of the flow.
    pub fn dispatch(
        self: &Arc<Self>,
        session: Arc<SessionHandle>,
        spawner: &dyn TaskSpawner,
        buffer: Vec<u8>,
        format: IngressFormat,
        sample_rate: u32,
        duration: Option<f64>,
    ) {
        session.send(Frame::Status {
            status: "processing".to_string(),
            message: None,
        });

        let this = self.clone();
        spawner.spawn(async move {
            this.run(session, buffer, format, sample_rate, duration).await;
        });
    }

    async fn run(
        &self,
        session: Arc<SessionHandle>,
        buffer: Vec<u8>,
        format: IngressFormat,
        sample_rate: u32,
        duration: Option<f64>,
    ) {
        let dispatch_id = Uuid::new_v4();
        let (containerized, warning) = containerize(format, &buffer, sample_rate);
        if let Some(warning) = warning {
            log::warn!("[dispatch] session {} ({dispatch_id}): {warning}", session.id);
        }

        let skip_tts = self.config.skip_tts_for_backend();
        let body = AiRequestBody {
            toy_id: session.toy_id.clone(),
            audio: BASE64.encode(&containerized),
            session_id: session.id.clone(),
            device_id: session.device_id.clone(),
            format: format_tag(format),
            duration,
            skip_tts,
            thread_id: session.thread_id(),
        };

        let heartbeat = self.spawn_heartbeat(session.clone());
        let timer = crate::session::dispatch_timer();
        let result = self.call_backend(&body).await;
        self.metrics
            .dispatch_latency_seconds
            .observe(timer.elapsed().as_secs_f64());
        heartbeat.abort();

        match result {
            Ok(resp) => self.deliver(session, resp).await,
            Err(err) => {
                log::warn!(
                    "[dispatch] session {} ({dispatch_id}): ai dispatch failed: {err}",
                    session.id
                );
                session.send(Frame::Error {
                    error: err.wire_code(),
                    message: Some(err.to_string()),
                });
            }
        }
    }

    /// Sends `status:processing` every ~10 s while the call is outstanding
    /// (§4.3 step 1), independent of the HTTP call's own lifetime.
    fn spawn_heartbeat(&self, session: Arc<SessionHandle>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.ai_status_heartbeat_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                session.send(Frame::Status {
                    status: "processing".to_string(),
                    message: None,
                });
            }
        })
    }

    async fn call_backend(&self, body: &AiRequestBody) -> Result<AiResponseBody, DispatchError> {
        let timeout = self.config.ai_dispatch_timeout();
        let request = self
            .client
            .post(format!(
                "{}/processVoiceInteraction",
                self.config.ai_backend_url
            ))
            .json(body);
        let request = match &self.config.ai_backend_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = match tokio::time::timeout(timeout, request.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(DispatchError::Unreachable(e.to_string())),
            Err(_) => return Err(DispatchError::Timeout(timeout.as_secs_f64())),
        };

        if !resp.status().is_success() {
            return Err(DispatchError::BadStatus(resp.status().as_u16()));
        }

        let parsed: AiResponseBody = resp
            .json()
            .await
            .map_err(|e| DispatchError::MalformedResponse(e.to_string()))?;

        if !parsed.success {
            return Err(DispatchError::MalformedResponse(
                parsed.error.unwrap_or_else(|| "backend reported failure".to_string()),
            ));
        }

        Ok(parsed)
    }

    /// Forwards `text_response` first, then either streams TTS or passes
    /// through the backend's `audioData` (§4.3 step 4).
    async fn deliver(&self, session: Arc<SessionHandle>, resp: AiResponseBody) {
        if let Some(thread_id) = resp.thread_id {
            session.set_thread_id(thread_id);
        }

        let text = resp.text.unwrap_or_default();
        session.send(Frame::TextResponse {
            payload: TextResponsePayload {
                text: text.clone(),
                timestamp: unix_ms_now() as f64,
            },
        });

        let toy_config = resp.toy_config.unwrap_or_default();

        if self.config.tts_disabled {
            // Operator disabled TTS globally: no synthesis, no passthrough,
            // just the terminal marker so the client's playback state
            // machine still resolves cleanly.
            session.send(Frame::AudioResponse {
                payload: AudioResponsePayload::terminal("pcm16", 16_000, None),
            });
        } else if self.config.gateway_streams_tts() {
            self.stream_tts(&session, &text, &toy_config).await;
        } else if let Some(audio_b64) = resp.audio_data {
            self.forward_passthrough_audio(&session, &audio_b64);
        } else {
            session.send(Frame::AudioResponse {
                payload: AudioResponsePayload::terminal("pcm16", 16_000, None),
            });
        }
    }

    async fn stream_tts(&self, session: &Arc<SessionHandle>, text: &str, toy_config: &ToyConfigWire) {
        let requested = toy_config.tts_provider.as_deref();
        let (provider, stream) = match self
            .tts
            .stream_with_fallback(requested, text, &toy_config.voice)
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("tts provider and fallback both failed: {e}");
                session.send(Frame::Error {
                    error: "TTS_FAILED".to_string(),
                    message: Some("Text-to-speech service unavailable".to_string()),
                });
                return;
            }
        };

        let spawner = crate::runtime::TokioSpawner::current();
        let mut coalesced = Box::pin(coalesce(
            stream,
            crate::constants::TTS_COALESCE_MIN_BYTES,
            self.config.provider_queue_capacity(),
            &spawner,
        ));

        let sample_rate = provider.sample_rate();
        let provider_id = provider.id().to_string();
        let mut failed = false;

        while let Some(item) = coalesced.next().await {
            match item {
                Ok(chunk) => {
                    self.metrics.audio_bytes_out_total.inc_by(chunk.len() as u64);
                    session.send(Frame::AudioResponse {
                        payload: AudioResponsePayload {
                            data: encode_audio(&chunk),
                            metadata: AudioResponseMetadata {
                                format: "pcm16".to_string(),
                                endian: "le".to_string(),
                                channels: 1,
                                provider: Some(provider_id.clone()),
                                sample_rate,
                                is_final: false,
                            },
                        },
                    });
                }
                Err(e) => {
                    log::warn!("tts stream failed mid-response: {e}");
                    failed = true;
                    break;
                }
            }
        }

        if failed {
            session.send(Frame::Error {
                error: "TTS_FAILED".to_string(),
                message: Some("Text-to-speech service unavailable".to_string()),
            });
            return;
        }

        session.send(Frame::AudioResponse {
            payload: AudioResponsePayload::terminal("pcm16", sample_rate, Some(provider_id)),
        });
    }

    fn forward_passthrough_audio(&self, session: &Arc<SessionHandle>, audio_b64: &str) {
        match BASE64.decode(audio_b64) {
            Ok(pcm) => {
                self.metrics.audio_bytes_out_total.inc_by(pcm.len() as u64);
                session.send(Frame::AudioResponse {
                    payload: AudioResponsePayload {
                        data: encode_audio(&pcm),
                        metadata: AudioResponseMetadata {
                            format: "pcm16".to_string(),
                            endian: "le".to_string(),
                            channels: 1,
                            provider: None,
                            sample_rate: 16_000,
                            is_final: false,
                        },
                    },
                });
                session.send(Frame::AudioResponse {
                    payload: AudioResponsePayload::terminal("pcm16", 16_000, None),
                });
            }
            Err(e) => {
                log::warn!("ai backend returned invalid base64 audioData: {e}");
                session.send(Frame::Error {
                    error: "TTS_FAILED".to_string(),
                    message: Some("Text-to-speech service unavailable".to_string()),
                });
            }
        }
    }
}

fn format_tag(format: IngressFormat) -> String {
    match format {
        IngressFormat::Pcm16 => "pcm16",
        IngressFormat::Wav => "wav",
        IngressFormat::Opus => "opus",
        IngressFormat::Other => "unknown",
    }
    .to_string()
}

fn unix_ms_now() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
