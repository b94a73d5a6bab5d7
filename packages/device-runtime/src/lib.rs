//! Client-side device audio engine.
//!
//! Implements the device half of the system: the frame codec lives in
//! `toygateway-protocol`; this crate builds the device connection (C5) and
//! the capture/playback/state-machine audio engine (C6) on top of it.
//!
//! # Architecture
//!
//! - [`connection`]: WebSocket client, reconnect/backoff, inbound audio queue (C5)
//! - [`audio`]: capture pipeline, playback/jitter-buffer pipeline, Opus codec (C6)
//! - [`state_machine`]: the seven-state device state machine (§4.6)
//! - [`engine`]: composition root wiring connection, audio, state machine,
//!   LED controller, and button source into one run loop
//! - [`led`]: LED pattern controller contract
//! - [`button`]: button source contract
//! - [`gate`]: echo gate shared between capture and playback
//! - [`config`]: device-side runtime configuration
//! - [`error`]: centralized error types
//! - [`constants`]: named timeouts, buffer sizes, and thresholds

pub mod audio;
pub mod button;
pub mod config;
pub mod connection;
pub mod constants;
pub mod engine;
pub mod error;
pub mod gate;
pub mod led;
pub mod state_machine;

pub use config::DeviceConfig;
pub use connection::{Connection, ConnectionEvent, InboundQueue};
pub use engine::DeviceEngine;
pub use error::{DeviceError, DeviceResult};
pub use gate::EchoGate;
pub use led::{LedController, LedPattern, LoggingLedController};
pub use state_machine::{DeviceState, StateMachine};
