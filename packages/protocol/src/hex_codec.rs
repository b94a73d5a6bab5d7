//! Hex transport for binary audio payloads (R1: encode then decode is identity).
//!
//! Hex is used instead of base64 because the payloads are small and the 2x
//! overhead is tolerable against the simplicity gain; switching to base64
//! requires no change outside this module as long as both ends agree.

/// Lowercase-hex-encodes a raw audio payload for the `data` field.
pub fn encode_audio(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decodes a `data` field back into raw bytes.
pub fn decode_audio(data: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let original: Vec<u8> = (0..=255).collect();
        let encoded = encode_audio(&original);
        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(decode_audio(&encoded).unwrap(), original);
    }

    #[test]
    fn round_trips_empty_payload() {
        assert_eq!(decode_audio(&encode_audio(&[])).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_odd_length_input() {
        assert!(decode_audio("abc").is_err());
    }
}
