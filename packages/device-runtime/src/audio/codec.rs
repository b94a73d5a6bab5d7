//! Opus encode/decode, built only under the `opus-codec` feature (§4.6
//! "optionally encodes them (Opus if configured, else raw PCM16)").

use crate::error::{DeviceError, DeviceResult};

/// Opus frame size in samples at 16 kHz mono for a 20 ms frame — matches
/// `CAPTURE_CHUNK_DURATION_MS`.
const OPUS_FRAME_SAMPLES: usize = 320;

#[cfg(feature = "opus-codec")]
pub struct OpusCodec {
    encoder: opus::Encoder,
    decoder: opus::Decoder,
    sample_rate: u32,
}

#[cfg(feature = "opus-codec")]
impl OpusCodec {
    pub fn new(sample_rate: u32) -> DeviceResult<Self> {
        let encoder = opus::Encoder::new(sample_rate, opus::Channels::Mono, opus::Application::Voip)
            .map_err(|e| DeviceError::Codec(e.to_string()))?;
        let decoder = opus::Decoder::new(sample_rate, opus::Channels::Mono)
            .map_err(|e| DeviceError::Codec(e.to_string()))?;
        Ok(Self {
            encoder,
            decoder,
            sample_rate,
        })
    }

    /// Encodes one frame of PCM16 little-endian samples. `pcm` must be
    /// exactly [`OPUS_FRAME_SAMPLES`] samples (pad the final capture frame
    /// with silence if short).
    pub fn encode_frame(&mut self, pcm: &[i16]) -> DeviceResult<Vec<u8>> {
        let mut out = vec![0u8; 4000];
        let len = self
            .encoder
            .encode(pcm, &mut out)
            .map_err(|e| DeviceError::Codec(e.to_string()))?;
        out.truncate(len);
        Ok(out)
    }

    pub fn decode_frame(&mut self, packet: &[u8]) -> DeviceResult<Vec<i16>> {
        let mut out = vec![0i16; OPUS_FRAME_SAMPLES * 4];
        let len = self
            .decoder
            .decode(packet, &mut out, false)
            .map_err(|e| DeviceError::Codec(e.to_string()))?;
        out.truncate(len);
        Ok(out)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// No-op stand-in so callers can hold an `Option<OpusCodec>` regardless of
/// whether the feature is compiled in.
#[cfg(not(feature = "opus-codec"))]
pub struct OpusCodec;

#[cfg(not(feature = "opus-codec"))]
impl OpusCodec {
    pub fn new(_sample_rate: u32) -> DeviceResult<Self> {
        Err(DeviceError::Codec(
            "opus-codec feature not enabled in this build".into(),
        ))
    }

    /// Unreachable in practice: [`Self::new`] always errors, so no caller
    /// ever holds an instance of this stub. Present so `capture.rs`'s
    /// `Option<OpusCodec>` branch still type-checks with the feature off.
    pub fn encode_frame(&mut self, _pcm: &[i16]) -> DeviceResult<Vec<u8>> {
        Err(DeviceError::Codec(
            "opus-codec feature not enabled in this build".into(),
        ))
    }

    pub fn decode_frame(&mut self, _packet: &[u8]) -> DeviceResult<Vec<i16>> {
        Err(DeviceError::Codec(
            "opus-codec feature not enabled in this build".into(),
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        0
    }
}

/// Converts interleaved little-endian PCM16 bytes to `i16` samples.
pub fn pcm16_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Converts `i16` samples to interleaved little-endian PCM16 bytes.
pub fn samples_to_pcm16_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_round_trip() {
        let samples: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 42];
        let bytes = samples_to_pcm16_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);
        assert_eq!(pcm16_bytes_to_samples(&bytes), samples);
    }
}
