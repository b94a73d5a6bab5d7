//! Error types for the device connection and audio engine.

use thiserror::Error;

/// Top-level error for device-runtime operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The WebSocket connect attempt (dial or handshake) failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A read or write on the transport failed after the connection was
    /// established; triggers reconnect (§7 "Transport errors").
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway URL, device id, or toy id could not be assembled into a
    /// valid connection target.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No usable input or output audio device was found.
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// Opus encode/decode failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Reconnect attempts were exhausted (§4.5 "transition to `failed`").
    #[error("reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
