//! Playback pipeline (§4.6): receive → jitter/aggregation buffer → speaker.
//!
//! Built on a `rodio` sink, generalized from "play one pre-synthesized clip"
//! to "continuously aggregate small, bursty inbound chunks into writes
//! large enough for Bluetooth-class sinks" (§4.6's correctness requirement,
//! not an optimization).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rodio::{OutputStream, OutputStreamHandle, Sink};

use crate::audio::codec::{pcm16_bytes_to_samples, OpusCodec};
use crate::connection::InboundQueue;
use crate::constants::{
    PLAYBACK_AGGREGATION_MIN_BYTES, PLAYBACK_IDLE_COMPLETION, PLAYBACK_OVERALL_TIMEOUT,
    PLAYBACK_WRITE_DELAY,
};
use crate::error::{DeviceError, DeviceResult};
use crate::gate::EchoGate;

/// Owns the exclusive `playback_running` flag (I4 / §4.6): a second trigger
/// while playback is active is rejected, not enqueued.
pub struct PlaybackPipeline {
    echo_gate: EchoGate,
    running: Arc<AtomicBool>,
    output_device: Option<String>,
}

impl PlaybackPipeline {
    pub fn new(echo_gate: EchoGate, output_device: Option<String>) -> Self {
        Self {
            echo_gate,
            running: Arc::new(AtomicBool::new(false)),
            output_device,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Attempts to start a playback task consuming `inbound`. Returns
    /// `false` (logging, not enqueueing) if playback is already running —
    /// the "second trigger is rejected" rule from §4.6/§5.
    pub fn try_start(
        self: &Arc<Self>,
        inbound: Arc<InboundQueue>,
        wire_sample_rate: u32,
        opus_codec: Option<OpusCodec>,
    ) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("[playback] trigger ignored; a playback task is already running");
            return false;
        }

        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(inbound, wire_sample_rate, opus_codec).await {
                log::warn!("[playback] playback task ended with error: {e}");
            }
            pipeline.echo_gate.stop_speaking();
            pipeline.running.store(false, Ordering::SeqCst);
        });
        true
    }

    async fn run(
        &self,
        inbound: Arc<InboundQueue>,
        output_sample_rate: u32,
        mut opus_codec: Option<OpusCodec>,
    ) -> DeviceResult<()> {
        let (stream, stream_handle) = open_output(self.output_device.as_deref())?;
        let mut sink = Sink::try_new(&stream_handle)
            .map_err(|e| DeviceError::AudioDevice(e.to_string()))?;

        self.echo_gate.start_speaking();

        let deadline = Instant::now() + PLAYBACK_OVERALL_TIMEOUT;
        let mut aggregation = Vec::<u8>::with_capacity(PLAYBACK_AGGREGATION_MIN_BYTES * 2);
        // Tracks the native rate the provider advertised on the most recent
        // chunk (§4.4: each frame carries its own `sample_rate` so the
        // device can resample); falls back to the device's configured
        // output rate until the first chunk arrives.
        let mut source_rate = output_sample_rate;

        loop {
            if Instant::now() >= deadline {
                log::warn!("[playback] overall timeout reached; ending playback");
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = remaining.min(PLAYBACK_IDLE_COMPLETION);
            let payload = match tokio::time::timeout(wait, inbound.recv()).await {
                Ok(payload) => payload,
                Err(_elapsed) => {
                    // No data for PLAYBACK_IDLE_COMPLETION and nothing buffered: done (§4.6 completion condition b).
                    if aggregation.is_empty() {
                        break;
                    }
                    continue;
                }
            };

            let decoded = match toygateway_protocol::decode_audio(&payload.data) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("[playback] undecodable hex payload, skipping: {e}");
                    continue;
                }
            };

            source_rate = payload.metadata.sample_rate;

            match payload.metadata.format.as_str() {
                "pcm16" => aggregation.extend_from_slice(&decoded),
                "opus" => match &mut opus_codec {
                    Some(codec) => match codec.decode_frame(&decoded) {
                        Ok(pcm) => aggregation.extend_from_slice(&super::codec::samples_to_pcm16_bytes(&pcm)),
                        Err(e) => log::warn!("[playback] opus decode failed, dropping frame: {e}"),
                    },
                    None => log::warn!("[playback] received opus audio but no decoder configured; skipping"),
                },
                other => {
                    log::warn!("[playback] unsupported playback format '{other}', skipping frame");
                }
            }

            while aggregation.len() >= PLAYBACK_AGGREGATION_MIN_BYTES {
                let block: Vec<u8> = aggregation.drain(..PLAYBACK_AGGREGATION_MIN_BYTES).collect();
                write_block(&sink, &block, source_rate);
                tokio::time::sleep(PLAYBACK_WRITE_DELAY).await;
            }

            if payload.metadata.is_final {
                if !aggregation.is_empty() {
                    // Pad to the minimum write size with silence to smooth stream-end on jittery sinks.
                    aggregation.resize(PLAYBACK_AGGREGATION_MIN_BYTES, 0);
                    let block: Vec<u8> = std::mem::take(&mut aggregation);
                    write_block(&sink, &block, source_rate);
                }
                break;
            }
        }

        // Poll for the sink draining rather than `sink.sleep_until_end()`,
        // which blocks its calling thread and would stall the runtime
        // worker this task happens to land on.
        while !sink.empty() {
            tokio::time::sleep(PLAYBACK_WRITE_DELAY).await;
        }
        drop(stream);
        Ok(())
    }
}

/// Writes one fixed-size aggregation block to the sink as a queued
/// `SamplesBuffer`. `rodio::Sink::append` has no failure path of its own;
/// the realistic failure mode on this hardware class is the output stream
/// dying underneath the sink, which surfaces as the stream-open error
/// `run` already propagates, not a per-block error here.
fn write_block(sink: &Sink, block: &[u8], sample_rate: u32) {
    let samples = pcm16_bytes_to_samples(block);
    let floats: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
    sink.append(rodio::buffer::SamplesBuffer::new(1, sample_rate, floats));
}

fn open_output(device_name: Option<&str>) -> DeviceResult<(OutputStream, OutputStreamHandle)> {
    use rodio::cpal::traits::{DeviceTrait, HostTrait};

    match device_name {
        Some(name) => {
            let host = rodio::cpal::default_host();
            let device = host
                .output_devices()
                .map_err(|e| DeviceError::AudioDevice(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::AudioDevice(format!("output device not found: {name}")))?;
            OutputStream::try_from_device(&device).map_err(|e| DeviceError::AudioDevice(e.to_string()))
        }
        None => OutputStream::try_default().map_err(|e| DeviceError::AudioDevice(e.to_string())),
    }
}
