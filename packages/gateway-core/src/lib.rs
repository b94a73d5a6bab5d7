//! Core library for the voice-toy gateway relay.
//!
//! Implements the gateway half of the system: the frame codec lives in
//! `toygateway-protocol`, and this crate builds the session manager (C3),
//! AI dispatch (C4), and TTS provider abstraction (C2) on top of it.
//!
//! # Architecture
//!
//! - [`session`]: per-connection lifecycle, heartbeat, idle reaping (C3)
//! - [`services::dispatch`]: off-loop AI backend invocation (C4)
//! - [`services::tts`]: speech-synthesis vendor adapters and fallback (C2)
//! - [`audio`]: WAV containerization for buffered utterances
//! - [`api`]: axum router, WebSocket handler, `/health` and `/metrics`
//! - [`bootstrap`]: composition root wiring the above together
//! - [`config`]: runtime configuration
//! - [`error`]: centralized error types
//! - [`metrics`]: Prometheus registry and counters
//! - [`runtime`]: task-spawning abstraction

pub mod api;
pub mod audio;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod runtime;
pub mod services;
pub mod session;

pub use api::{start_server, AppState, ServerError};
pub use bootstrap::{bootstrap_services, BootstrappedServices};
pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use metrics::Metrics;
pub use runtime::{TaskSpawner, TokioSpawner};
pub use session::{SessionGuard, SessionHandle, SessionManager};
