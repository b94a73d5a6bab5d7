//! Wire protocol shared by the gateway relay and the device audio engine.
//!
//! Every message is a self-delimited JSON object with a `type` discriminator.
//! Binary audio payloads are transported as lowercase hex in a `data` field.
//! See `Frame` for the full set of message shapes.

mod frame;
mod hex_codec;

pub use frame::{
    AudioChunkMetadata, AudioResponseMetadata, AudioResponsePayload, Capabilities, ControlCommand,
    DecodeError, Frame, HandshakeStatus, TextResponsePayload,
};
pub use hex_codec::{decode_audio, encode_audio};

/// Parses a raw inbound message into a [`Frame`].
///
/// Rejects non-JSON (`DecodeError::InvalidJson`) and JSON lacking a `type`
/// field or carrying an unrecognized one (`DecodeError::UnknownMessageType`).
/// Decoder failures never panic and never consume the caller's connection;
/// the caller is expected to reply with the corresponding `error` frame and
/// keep reading.
pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|_| DecodeError::InvalidJson)?;

    let msg_type = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(DecodeError::InvalidJson)?
        .to_string();

    serde_json::from_value(value).map_err(|_| DecodeError::UnknownMessageType(msg_type))
}

/// Serializes a [`Frame`] into the UTF-8 JSON bytes sent on the wire.
///
/// No embedded newlines are required or produced.
pub fn encode(frame: &Frame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(decode(b"not json"), Err(DecodeError::InvalidJson)));
    }

    #[test]
    fn decode_rejects_missing_type() {
        assert!(matches!(
            decode(br#"{"deviceId":"d1"}"#),
            Err(DecodeError::InvalidJson)
        ));
    }

    #[test]
    fn decode_rejects_unknown_type() {
        match decode(br#"{"type":"frobnicate"}"#) {
            Err(DecodeError::UnknownMessageType(t)) => assert_eq!(t, "frobnicate"),
            other => panic!("expected UnknownMessageType, got {other:?}"),
        }
    }

    #[test]
    fn ping_pong_round_trip() {
        let encoded = encode(&Frame::Ping {}).unwrap();
        assert_eq!(decode(encoded.as_bytes()).unwrap(), Frame::Ping {});
    }

    #[test]
    fn handshake_decodes_camel_case_fields() {
        let raw = br#"{
            "type":"handshake",
            "deviceId":"device-1",
            "toyId":"toy-1",
            "capabilities":{"audio":true,"wakeWord":false,"offlineMode":false,"opus":false,"sampleRate":16000}
        }"#;
        match decode(raw).unwrap() {
            Frame::Handshake {
                device_id,
                toy_id,
                capabilities,
                ..
            } => {
                assert_eq!(device_id, "device-1");
                assert_eq!(toy_id, "toy-1");
                assert!(capabilities.audio);
                assert_eq!(capabilities.sample_rate, 16000);
            }
            other => panic!("expected Handshake, got {other:?}"),
        }
    }
}
