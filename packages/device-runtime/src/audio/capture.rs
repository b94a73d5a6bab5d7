//! Capture pipeline (§4.6): mic → encode → send.
//!
//! This engine submits each fixed-size frame over the wire as it's produced
//! rather than buffering a full utterance locally, since the gateway (not
//! the device) owns utterance buffering (§4.3 I2).
//!
//! `cpal`'s input callback runs on the host's own audio thread and must not
//! block or allocate unboundedly; it only copies samples into an unbounded
//! channel (§5 "Thread/loop bridging"). A tokio task on the async side
//! drains the channel, chunks samples into `CAPTURE_CHUNK_DURATION_MS`
//! frames, encodes them, and submits each as an `audio_chunk` frame.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use rubato::{FftFixedIn, Resampler as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use toygateway_protocol::{AudioChunkMetadata, Frame};

use crate::audio::codec::{samples_to_pcm16_bytes, OpusCodec};
use crate::connection::Connection;
use crate::constants::CAPTURE_CHUNK_DURATION_MS;
use crate::error::{DeviceError, DeviceResult};
use crate::gate::EchoGate;

/// A running capture session. Dropping or calling [`stop`](CaptureSession::stop)
/// tears down the input stream and the frame-encoding task.
pub struct CaptureSession {
    _stream: Stream,
    task: JoinHandle<()>,
}

impl CaptureSession {
    /// Opens the default input device, clears the outbound buffer (there is
    /// none to clear here — it's implicit in starting a fresh channel), and
    /// starts streaming `audio_chunk` frames to `connection` until
    /// [`stop`](Self::stop) is called.
    pub fn start(
        connection: Arc<Connection>,
        echo_gate: EchoGate,
        wire_sample_rate: u32,
        input_device_name: Option<&str>,
        opus_codec: Option<OpusCodec>,
    ) -> DeviceResult<Self> {
        let host = cpal::default_host();
        let device = match input_device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| DeviceError::AudioDevice(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::AudioDevice(format!("input device not found: {name}")))?,
            None => host
                .default_input_device()
                .ok_or_else(|| DeviceError::AudioDevice("no default input device".into()))?,
        };

        let config = device
            .default_input_config()
            .map_err(|e| DeviceError::AudioDevice(e.to_string()))?;
        let device_sample_rate = config.sample_rate().0;
        let device_channels = config.channels();
        let stream_config: StreamConfig = config.clone().into();
        let sample_format = config.sample_format();

        let (tx, rx) = mpsc::unbounded_channel::<Vec<f32>>();

        let err_fn = |err: cpal::StreamError| log::error!("[capture] input stream error: {err}");
        let gate = echo_gate.clone();

        let stream = build_input_stream(&device, &stream_config, sample_format, tx, gate, err_fn)?;
        stream
            .play()
            .map_err(|e| DeviceError::AudioDevice(e.to_string()))?;

        let task = tokio::spawn(encode_and_send_loop(
            rx,
            connection,
            device_sample_rate,
            device_channels,
            wire_sample_rate,
            opus_codec,
        ));

        log::info!(
            "[capture] recording started (device_rate={device_sample_rate}, channels={device_channels}, wire_rate={wire_sample_rate})"
        );

        Ok(Self {
            _stream: stream,
            task,
        })
    }

    /// Stops the input stream, then sends the `audio_chunk` terminal marker
    /// (empty payload, `isFinal=true`) as required on exit from `listening`.
    pub async fn stop(self, connection: &Connection, wire_sample_rate: u32) {
        drop(self._stream);
        self.task.abort();

        let terminal = Frame::AudioChunk {
            data: String::new(),
            metadata: AudioChunkMetadata {
                is_final: true,
                format: "pcm16".to_string(),
                sample_rate: wire_sample_rate,
                duration: None,
            },
        };
        if let Err(e) = connection.send_frame(&terminal).await {
            log::warn!("[capture] failed to send terminal audio_chunk: {e}");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_input_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    tx: mpsc::UnboundedSender<Vec<f32>>,
    gate: EchoGate,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> DeviceResult<Stream> {
    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if gate.is_speaking() {
                    return;
                }
                let _ = tx.send(data.to_vec());
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if gate.is_speaking() {
                    return;
                }
                let converted: Vec<f32> = data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                let _ = tx.send(converted);
            },
            err_fn,
            None,
        ),
        SampleFormat::I32 => device.build_input_stream(
            config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| {
                if gate.is_speaking() {
                    return;
                }
                #[allow(clippy::cast_precision_loss)]
                let converted: Vec<f32> = data.iter().map(|&s| s as f32 / 2_147_483_648.0).collect();
                let _ = tx.send(converted);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(DeviceError::AudioDevice(format!(
                "unsupported input sample format: {other:?}"
            )))
        }
    };

    stream.map_err(|e| DeviceError::AudioDevice(e.to_string()))
}

/// Drains captured samples, converts to mono + wire sample rate, chunks
/// into `CAPTURE_CHUNK_DURATION_MS` frames, encodes, and submits each as an
/// `audio_chunk` frame via the connection.
async fn encode_and_send_loop(
    mut rx: mpsc::UnboundedReceiver<Vec<f32>>,
    connection: Arc<Connection>,
    device_sample_rate: u32,
    device_channels: u16,
    wire_sample_rate: u32,
    mut opus_codec: Option<OpusCodec>,
) {
    let samples_per_frame = (wire_sample_rate as usize * CAPTURE_CHUNK_DURATION_MS as usize) / 1000;
    let mut pending: Vec<f32> = Vec::new();

    while let Some(block) = rx.recv().await {
        let mono = if device_channels > 1 {
            downmix(&block, device_channels)
        } else {
            block
        };

        let resampled = if device_sample_rate == wire_sample_rate {
            mono
        } else {
            match resample(&mono, device_sample_rate, wire_sample_rate) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("[capture] resample failed, dropping block: {e}");
                    continue;
                }
            }
        };

        pending.extend_from_slice(&resampled);

        while pending.len() >= samples_per_frame {
            let frame_samples: Vec<f32> = pending.drain(..samples_per_frame).collect();
            let pcm16: Vec<i16> = frame_samples
                .iter()
                .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .collect();

            let (format, payload_bytes) = match &mut opus_codec {
                Some(codec) => match codec.encode_frame(&pcm16) {
                    Ok(bytes) => ("opus", bytes),
                    Err(e) => {
                        log::warn!("[capture] opus encode failed, dropping frame: {e}");
                        continue;
                    }
                },
                None => ("pcm16", samples_to_pcm16_bytes(&pcm16)),
            };

            let frame = Frame::AudioChunk {
                data: toygateway_protocol::encode_audio(&payload_bytes),
                metadata: AudioChunkMetadata {
                    is_final: false,
                    format: format.to_string(),
                    sample_rate: wire_sample_rate,
                    duration: Some(CAPTURE_CHUNK_DURATION_MS as f64 / 1000.0),
                },
            };

            if let Err(e) = connection.send_frame(&frame).await {
                log::warn!("[capture] failed to send audio_chunk: {e}");
                return;
            }
        }
    }
}

fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> DeviceResult<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = 1024;
    let mut resampler = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1)
        .map_err(|e| DeviceError::Codec(e.to_string()))?;

    let mut output = Vec::new();
    let mut pos = 0;
    while pos + chunk_size <= samples.len() {
        let chunk = &samples[pos..pos + chunk_size];
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| DeviceError::Codec(e.to_string()))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
        pos += chunk_size;
    }

    if pos < samples.len() {
        let remaining = &samples[pos..];
        let mut padded = vec![0.0f32; chunk_size];
        padded[..remaining.len()].copy_from_slice(remaining);
        let result = resampler
            .process(&[&padded], None)
            .map_err(|e| DeviceError::Codec(e.to_string()))?;
        if let Some(channel) = result.first() {
            #[allow(clippy::cast_precision_loss)]
            let keep = (remaining.len() as f64 * to_rate as f64 / from_rate as f64).ceil() as usize;
            output.extend_from_slice(&channel[..keep.min(channel.len())]);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![1.0, -1.0, 0.5, -0.5];
        let mono = downmix(&stereo, 2);
        assert_eq!(mono, vec![0.0, 0.0]);
    }
}
