//! Device engine: wires the state machine (§4.6), the connection (C5), the
//! capture/playback pipelines (C6), the LED controller, and the button
//! source into one run loop.
//!
//! Every spawned task (heartbeat, LED renderer, capture, playback, the
//! watchdog) is owned by this struct's generation counter so a reconnect
//! can cancel the previous generation deterministically (§9
//! "Background-task ownership", `SPEC_FULL.md`'s `TaskSpawner` note).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::{CaptureSession, OpusCodec, PlaybackPipeline};
use crate::button::{ButtonEvent, ButtonSource};
use crate::config::DeviceConfig;
use crate::connection::{Connection, ConnectionEvent, InboundQueue};
use crate::constants::{
    BLUETOOTH_DEFAULT_SAMPLE_RATE, INTERACTION_BOUNDARY_GAP, PLAYBACK_WATCHDOG_DELAY,
    RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY, TRANSPORT_PING_INTERVAL,
};
use crate::error::{DeviceError, DeviceResult};
use crate::gate::EchoGate;
use crate::led::LedController;
use crate::state_machine::{DeviceState, StateMachine};

/// Runs the device's full lifecycle: connect, handle button/server events,
/// reconnect on failure, repeat until the reconnect budget is exhausted.
pub struct DeviceEngine {
    config: DeviceConfig,
    state: Arc<StateMachine>,
    echo_gate: EchoGate,
    led: Arc<dyn LedController>,
    button: Mutex<Box<dyn ButtonSource>>,
    playback: Arc<PlaybackPipeline>,
}

impl DeviceEngine {
    pub fn new(
        config: DeviceConfig,
        led: Arc<dyn LedController>,
        button: Box<dyn ButtonSource>,
    ) -> Self {
        let echo_gate = EchoGate::new();
        let playback = Arc::new(PlaybackPipeline::new(echo_gate.clone(), config.output_device.clone()));

        Self {
            config,
            state: Arc::new(StateMachine::new()),
            echo_gate,
            led,
            button: Mutex::new(button),
            playback,
        }
    }

    fn output_sample_rate(&self) -> u32 {
        self.config
            .playback_sample_rate_override
            .unwrap_or(BLUETOOTH_DEFAULT_SAMPLE_RATE)
    }

    /// Builds an [`OpusCodec`] for `sample_rate` when Opus is configured,
    /// logging (not failing) if construction fails so the pipeline falls
    /// back to raw PCM16 instead of refusing to run.
    fn opus_codec(&self, sample_rate: u32) -> Option<OpusCodec> {
        if !self.config.opus_enabled {
            return None;
        }
        match OpusCodec::new(sample_rate) {
            Ok(codec) => Some(codec),
            Err(e) => {
                log::warn!("[engine] failed to initialize opus codec, falling back to pcm16: {e}");
                None
            }
        }
    }

    /// Runs forever: connect, serve one connection generation, and on
    /// failure reconnect with exponential backoff (§4.5) until
    /// `reconnect_max_attempts` is exhausted, at which point the device
    /// transitions to `failed` and the loop returns an error.
    pub async fn run(&self) -> DeviceResult<()> {
        let mut attempt: u32 = 0;

        loop {
            self.state.transition(DeviceState::Connecting);
            self.render_current().await;

            match self.connect_and_serve().await {
                Ok(()) => {
                    // Clean shutdown request (not used by the headless agent
                    // today, but keeps the loop well-defined if one is added).
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("[engine] connection generation ended: {e}");
                    attempt += 1;
                    if attempt > self.config.reconnect_max_attempts {
                        self.state.transition(DeviceState::Error);
                        self.render_current().await;
                        return Err(DeviceError::ReconnectExhausted(
                            self.config.reconnect_max_attempts,
                        ));
                    }

                    self.state.transition(DeviceState::Offline);
                    self.render_current().await;

                    let delay = backoff_delay(attempt);
                    log::info!("[engine] reconnecting in {delay:?} (attempt {attempt})");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn render_current(&self) {
        self.led.render(self.state.led_pattern()).await;
    }

    /// Dials the gateway and serves frames/button events until the
    /// connection drops, at which point this returns `Ok(())` so the outer
    /// loop can decide whether to reconnect (it always does, by returning
    /// an error here on any non-clean termination).
    async fn connect_and_serve(&self) -> DeviceResult<()> {
        let cancel_token = CancellationToken::new();
        let (connection, mut events, inbound) =
            Connection::connect(&self.config, cancel_token.clone()).await?;
        let connection = Arc::new(connection);

        // Successful connect resets the reconnect budget (§4.5).
        self.state.transition(DeviceState::Idle);
        self.render_current().await;
        log::info!(
            "[engine] connected, session_id={}",
            connection.session_id()
        );

        let led_task = self.spawn_led_renderer();
        let heartbeat_task = spawn_heartbeat(Arc::clone(&connection), cancel_token.clone());

        let mut capture: Option<CaptureSession> = None;
        let mut last_outbound_send: Option<Instant> = None;
        let mut watchdog: Option<JoinHandle<()>> = None;

        let result = loop {
            tokio::select! {
                biased;

                button_event = self.next_button_event() => {
                    match button_event {
                        Some(ButtonEvent::Pressed) if self.state.current() == DeviceState::Idle => {
                            self.begin_listening(&connection, &inbound, &mut capture, &mut last_outbound_send).await;
                        }
                        Some(ButtonEvent::Released) if self.state.current() == DeviceState::Listening => {
                            self.end_listening(&connection, &mut capture).await;
                            watchdog = Some(self.spawn_watchdog(Arc::clone(&inbound)));
                        }
                        Some(_) => {}
                        None => {
                            log::warn!("[engine] button source closed; continuing without button input");
                        }
                    }
                }

                event = events.recv() => {
                    match event {
                        Some(ConnectionEvent::Status { status, message }) => {
                            log::debug!("[engine] status={status} message={message:?}");
                        }
                        Some(ConnectionEvent::TextResponse { text, .. }) => {
                            log::info!("[engine] text_response: {text}");
                            if let Some(w) = watchdog.take() {
                                w.abort();
                            }
                            if self.state.current() == DeviceState::Processing {
                                self.state.transition(DeviceState::Speaking);
                                self.render_current().await;
                            }
                            let opus_codec = self.opus_codec(self.output_sample_rate());
                            if self.playback.try_start(Arc::clone(&inbound), self.output_sample_rate(), opus_codec) {
                                self.spawn_playback_completion_watch();
                            }
                        }
                        Some(ConnectionEvent::ConfigUpdate(cfg)) => {
                            log::info!("[engine] config_update: {cfg}");
                        }
                        Some(ConnectionEvent::ToyState(state)) => {
                            log::debug!("[engine] toy_state: {state}");
                        }
                        Some(ConnectionEvent::ServerError { error, message }) => {
                            log::warn!("[engine] server error: {error} ({message:?})");
                            self.state.transition(DeviceState::Error);
                            self.render_current().await;
                            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                            self.state.transition(DeviceState::Idle);
                            self.render_current().await;
                        }
                        Some(ConnectionEvent::Closed(reason)) => {
                            break Err(DeviceError::Transport(reason));
                        }
                        None => {
                            break Err(DeviceError::Transport("event channel closed".into()));
                        }
                    }
                }
            }
        };

        cancel_token.cancel();
        led_task.abort();
        heartbeat_task.abort();
        if let Some(w) = watchdog {
            w.abort();
        }
        if let Some(session) = capture {
            session.stop(&connection, self.config.capture_sample_rate).await;
        }

        result
    }

    async fn next_button_event(&self) -> Option<ButtonEvent> {
        self.button.lock().await.next_event().await
    }

    async fn begin_listening(
        &self,
        connection: &Arc<Connection>,
        inbound: &Arc<InboundQueue>,
        capture: &mut Option<CaptureSession>,
        last_outbound_send: &mut Option<Instant>,
    ) {
        // §4.5 "Interaction boundaries": a gap of >1.5s since the last
        // outbound audio send starts a new interaction; drain any residual
        // inbound entries so stale audio from a prior turn cannot bleed
        // into this one's playback.
        let is_new_interaction = last_outbound_send
            .map(|t| t.elapsed() > INTERACTION_BOUNDARY_GAP)
            .unwrap_or(true);
        if is_new_interaction {
            let dropped = inbound.drain();
            if dropped > 0 {
                log::debug!("[engine] drained {dropped} stale inbound entries at interaction boundary");
            }
        }

        self.state.transition(DeviceState::Listening);
        self.render_current().await;

        let opus_codec = self.opus_codec(self.config.capture_sample_rate);

        match CaptureSession::start(
            Arc::clone(connection),
            self.echo_gate.clone(),
            self.config.capture_sample_rate,
            self.config.input_device.as_deref(),
            opus_codec,
        ) {
            Ok(session) => *capture = Some(session),
            Err(e) => {
                log::error!("[engine] failed to start capture: {e}");
                self.state.transition(DeviceState::Error);
                self.render_current().await;
            }
        }
        *last_outbound_send = Some(Instant::now());
    }

    async fn end_listening(&self, connection: &Arc<Connection>, capture: &mut Option<CaptureSession>) {
        if let Some(session) = capture.take() {
            session.stop(connection, self.config.capture_sample_rate).await;
        }
        self.state.transition(DeviceState::Processing);
        self.render_current().await;
    }

    fn spawn_led_renderer(&self) -> JoinHandle<()> {
        let mut rx = self.state.subscribe();
        let led = Arc::clone(&self.led);
        tokio::spawn(async move {
            loop {
                let pattern = *rx.borrow_and_update();
                led.render(crate::led::LedPattern::for_state(pattern)).await;
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
    }

    /// Fallback watchdog (§4.6): 500 ms after the terminal outbound marker,
    /// start playback if inbound audio arrived but no `text_response` did.
    /// Advisory-only — it never cancels a playback that already started
    /// via `text_response`.
    fn spawn_watchdog(&self, inbound: Arc<InboundQueue>) -> JoinHandle<()> {
        let playback = Arc::clone(&self.playback);
        let output_sample_rate = self.output_sample_rate();
        let opus_codec = self.opus_codec(output_sample_rate);
        tokio::spawn(async move {
            tokio::time::sleep(PLAYBACK_WATCHDOG_DELAY).await;
            if inbound.len() > 0 && !playback.is_running() {
                log::info!("[engine] playback watchdog firing: audio arrived without text_response");
                playback.try_start(inbound, output_sample_rate, opus_codec);
            }
        })
    }

    /// Not a spawned cancellable task per se — `speaking -> idle` happens
    /// once the playback task (already spawned by `try_start`) finishes;
    /// this just watches `playback.is_running()` to drive the state
    /// transition without the playback pipeline needing to know about the
    /// state machine.
    fn spawn_playback_completion_watch(&self) {
        let playback = Arc::clone(&self.playback);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            while playback.is_running() {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            if state.current() == DeviceState::Speaking {
                state.transition(DeviceState::Idle);
            }
        });
    }
}

fn spawn_heartbeat(connection: Arc<Connection>, cancel_token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TRANSPORT_PING_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => return,
                _ = interval.tick() => {
                    if let Err(e) = connection.send_ping().await {
                        log::warn!("[engine] heartbeat ping failed: {e}");
                        return;
                    }
                }
            }
        }
    })
}

/// `delay = base * 2^(attempt-1)`, capped at `RECONNECT_MAX_DELAY` (§4.5).
fn backoff_delay(attempt: u32) -> std::time::Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    RECONNECT_BASE_DELAY
        .saturating_mul(factor)
        .min(RECONNECT_MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), RECONNECT_BASE_DELAY);
        assert_eq!(backoff_delay(2), RECONNECT_BASE_DELAY * 2);
        assert_eq!(backoff_delay(3), RECONNECT_BASE_DELAY * 4);
        assert_eq!(backoff_delay(20), RECONNECT_MAX_DELAY);
    }
}
