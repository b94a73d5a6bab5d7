//! PCM16 containerization (§4.3 "Containerization by advertised format").
//!
//! Wraps a finite buffer of raw little-endian PCM16 samples in a 44-byte
//! RIFF/WAVE header sized to the actual payload, built with `bytes::BytesMut`
//! and explicit `put_*_le` calls for a closed, known-length buffer.

use bytes::{BufMut, Bytes, BytesMut};

/// Wraps `samples` (raw PCM16 little-endian bytes) in a single-channel WAV
/// container at `sample_rate`. Satisfies P6: the result parses back to the
/// same sample rate and `samples.len() / 2` sample count.
pub fn containerize_pcm16(samples: &[u8], sample_rate: u32) -> Bytes {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;
    const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;

    let data_len = samples.len() as u32;
    let byte_rate = sample_rate * CHANNELS as u32 * BYTES_PER_SAMPLE as u32;
    let block_align = CHANNELS * BYTES_PER_SAMPLE;

    let mut out = BytesMut::with_capacity(44 + samples.len());

    out.put_slice(b"RIFF");
    out.put_u32_le(36 + data_len);
    out.put_slice(b"WAVE");

    out.put_slice(b"fmt ");
    out.put_u32_le(16);
    out.put_u16_le(1); // PCM
    out.put_u16_le(CHANNELS);
    out.put_u32_le(sample_rate);
    out.put_u32_le(byte_rate);
    out.put_u16_le(block_align);
    out.put_u16_le(BITS_PER_SAMPLE);

    out.put_slice(b"data");
    out.put_u32_le(data_len);
    out.put_slice(samples);

    out.freeze()
}

/// Parsed header fields of a WAV container, used by tests (and available to
/// callers that need to sanity-check a downstream-provided WAV) to verify
/// P6 without pulling in a full WAV-parsing crate for one read path.
pub struct WavInfo {
    pub sample_rate: u32,
    pub sample_count: usize,
}

/// Parses the fields P6 cares about out of a WAV container produced by
/// [`containerize_pcm16`] (or any single-channel 16-bit PCM WAV).
pub fn parse_wav_pcm16(bytes: &[u8]) -> Option<WavInfo> {
    if bytes.len() < 44 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }
    let sample_rate = u32::from_le_bytes(bytes[24..28].try_into().ok()?);
    let data_len = u32::from_le_bytes(bytes[40..44].try_into().ok()?) as usize;
    Some(WavInfo {
        sample_rate,
        sample_count: data_len / 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containerize_then_parse_round_trips_rate_and_count() {
        let raw: Vec<u8> = (0u8..=255).cycle().take(10_240).collect();
        let wav = containerize_pcm16(&raw, 16_000);

        let info = parse_wav_pcm16(&wav).expect("valid wav");
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.sample_count, raw.len() / 2);
        assert_eq!(wav.len(), 44 + raw.len());
    }

    #[test]
    fn empty_buffer_still_produces_valid_header() {
        let wav = containerize_pcm16(&[], 24_000);
        let info = parse_wav_pcm16(&wav).unwrap();
        assert_eq!(info.sample_count, 0);
        assert_eq!(info.sample_rate, 24_000);
    }
}
