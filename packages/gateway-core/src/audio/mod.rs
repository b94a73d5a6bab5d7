//! Audio containerization helpers used by AI dispatch (C4).

mod wav;

pub use wav::{containerize_pcm16, parse_wav_pcm16, WavInfo};

/// Format tag advertised by the device on `audio_chunk.metadata.format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressFormat {
    Pcm16,
    Wav,
    Opus,
    Other,
}

impl IngressFormat {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "pcm16" => Self::Pcm16,
            "wav" | "wave" => Self::Wav,
            "opus" => Self::Opus,
            _ => Self::Other,
        }
    }
}

/// Containerizes a buffered utterance per §4.3's per-format rules, returning
/// the bytes to base64-encode for the AI backend and any warning to log.
pub fn containerize(format: IngressFormat, buffer: &[u8], sample_rate: u32) -> (Vec<u8>, Option<&'static str>) {
    match format {
        IngressFormat::Pcm16 => (containerize_pcm16(buffer, sample_rate).to_vec(), None),
        IngressFormat::Wav => (buffer.to_vec(), None),
        IngressFormat::Opus => (
            buffer.to_vec(),
            Some("opus audio passed through without a container; downstream STT may require one"),
        ),
        IngressFormat::Other => (
            buffer.to_vec(),
            Some("unrecognized audio format passed through without a container"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_gets_containerized() {
        let (out, warning) = containerize(IngressFormat::Pcm16, &[0u8; 640], 16_000);
        assert!(warning.is_none());
        assert_eq!(out.len(), 44 + 640);
    }

    #[test]
    fn opus_passes_through_with_warning() {
        let (out, warning) = containerize(IngressFormat::Opus, &[1, 2, 3], 16_000);
        assert_eq!(out, vec![1, 2, 3]);
        assert!(warning.is_some());
    }
}
