use serde::{Deserialize, Serialize};

/// A single wire message. The `type` discriminator selects the variant;
/// unknown discriminators never reach this type — see [`crate::decode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// First frame after accept, either direction of the connection.
    Handshake {
        #[serde(rename = "deviceId")]
        device_id: String,
        #[serde(rename = "toyId")]
        toy_id: String,
        capabilities: Capabilities,
    },
    /// Accept confirmation.
    HandshakeAck {
        status: HandshakeStatus,
        session_id: String,
    },
    /// Liveness probe, either direction.
    Ping {},
    /// Liveness reply, either direction.
    Pong {},
    /// `start_streaming` / `stop_streaming`; advisory, no state change beyond ack.
    Control { command: ControlCommand },
    /// Control reply.
    ControlAck { ok: bool, command: ControlCommand },
    /// Streaming input; terminal when `metadata.isFinal`.
    AudioChunk {
        data: String,
        metadata: AudioChunkMetadata,
    },
    /// Periodic progress frame sent while an AI dispatch is outstanding.
    Status {
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Text of the AI reply; the device's playback trigger.
    TextResponse { payload: TextResponsePayload },
    /// A streamed TTS chunk (or the terminal empty-payload marker).
    AudioResponse { payload: AudioResponsePayload },
    /// Runtime config change, pushed by the gateway.
    ConfigUpdate { config: serde_json::Value },
    /// Advisory state broadcast.
    ToyState { state: serde_json::Value },
    /// Recoverable error, either direction.
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Frame {
    /// Builds the `{type:"error", error:"invalid_json"}` reply sent back
    /// for malformed inbound JSON.
    pub fn invalid_json_error() -> Self {
        Frame::Error {
            error: "invalid_json".to_string(),
            message: None,
        }
    }

    /// Builds the `{type:"error", error:"unknown_message_type:<t>"}` reply.
    pub fn unknown_message_type_error(msg_type: &str) -> Self {
        Frame::Error {
            error: format!("unknown_message_type:{msg_type}"),
            message: None,
        }
    }
}

/// Decode failures for [`crate::decode`]. Neither variant terminates the
/// session — the caller replies with the matching [`Frame::Error`] and keeps
/// reading.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid_json")]
    InvalidJson,
    #[error("unknown_message_type:{0}")]
    UnknownMessageType(String),
}

impl DecodeError {
    /// Converts the decode failure into the `Frame::Error` reply sent back
    /// to the client.
    pub fn to_frame(&self) -> Frame {
        match self {
            DecodeError::InvalidJson => Frame::invalid_json_error(),
            DecodeError::UnknownMessageType(t) => Frame::unknown_message_type_error(t),
        }
    }
}

/// Device capability advertisement carried on `handshake`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub audio: bool,
    pub wake_word: bool,
    pub offline_mode: bool,
    pub opus: bool,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStatus {
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand {
    StartStreaming,
    StopStreaming,
}

/// Metadata sibling to an inbound `audio_chunk`'s hex `data` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunkMetadata {
    pub is_final: bool,
    pub format: String,
    pub sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResponsePayload {
    pub text: String,
    pub timestamp: f64,
}

/// Payload of a streamed `audio_response` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioResponsePayload {
    pub data: String,
    pub metadata: AudioResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioResponseMetadata {
    pub format: String,
    pub endian: String,
    pub channels: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub sample_rate: u32,
    pub is_final: bool,
}

impl AudioResponsePayload {
    /// The terminal empty-payload marker sent after the last TTS chunk (and
    /// reused verbatim by B2's "empty `data` + `isFinal=true`" boundary case).
    pub fn terminal(format: &str, sample_rate: u32, provider: Option<String>) -> Self {
        Self {
            data: String::new(),
            metadata: AudioResponseMetadata {
                format: format.to_string(),
                endian: "le".to_string(),
                channels: 1,
                provider,
                sample_rate,
                is_final: true,
            },
        }
    }
}
