//! Centralized error types for the gateway core library.
//!
//! Defines structured error types using `thiserror`, maps them to HTTP status
//! codes, and implements `IntoResponse` for automatic JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the gateway.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum GatewayError {
    /// Inbound frame failed to decode (malformed JSON or unknown type).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session named in a request no longer exists.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The AI backend call failed in a way the session can recover from
    /// (non-2xx, unreachable, or the request simply timed out).
    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    /// A TTS provider failed after the fallback provider was also exhausted.
    #[error("Text-to-speech service unavailable")]
    TtsFailed,

    /// Server configuration error (missing required settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error that does not fit another category.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure modes of an AI backend dispatch (§4.3 step 5 / §7 "Dispatch errors").
#[derive(Debug, Error, Serialize)]
pub enum DispatchError {
    /// The `processVoiceInteraction` call did not return within the
    /// configured timeout. Formats the literal string scenario 2 of the
    /// spec pins: `convex_timeout_after_{secs:.1}s`.
    #[error("convex_timeout_after_{0:.1}s")]
    Timeout(f64),

    /// The AI backend returned a non-2xx status.
    #[error("ai backend returned status {0}")]
    BadStatus(u16),

    /// The AI backend was unreachable or the connection failed mid-call.
    #[error("ai backend unreachable: {0}")]
    Unreachable(String),

    /// The AI backend's response body did not match the expected shape.
    #[error("ai backend returned malformed response: {0}")]
    MalformedResponse(String),
}

impl DispatchError {
    /// The `error` field value sent to the client in an `error` frame. For
    /// `Timeout` this is the exact string scenario 2 requires; other
    /// variants use a short machine-readable tag.
    pub fn wire_code(&self) -> String {
        match self {
            DispatchError::Timeout(secs) => format!("convex_timeout_after_{secs:.1}s"),
            DispatchError::BadStatus(_) => "ai_backend_error".to_string(),
            DispatchError::Unreachable(_) => "ai_backend_unreachable".to_string(),
            DispatchError::MalformedResponse(_) => "ai_backend_malformed_response".to_string(),
        }
    }
}

impl ErrorCode for GatewayError {
    fn code(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol_error",
            Self::SessionNotFound(_) => "session_not_found",
            Self::Dispatch(_) => "dispatch_error",
            Self::TtsFailed => "TTS_FAILED",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl GatewayError {
    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Protocol(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Dispatch(_) | Self::TtsFailed | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convenient Result alias for gateway-wide operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_returns_correct_code() {
        let err = GatewayError::SessionNotFound("abc".into());
        assert_eq!(err.code(), "session_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn timeout_wire_code_matches_scenario_2() {
        let err = DispatchError::Timeout(30.0);
        assert_eq!(err.wire_code(), "convex_timeout_after_30.0s");
        assert_eq!(err.to_string(), "convex_timeout_after_30.0s");
    }

    #[test]
    fn tts_failed_uses_spec_error_tag() {
        let err = GatewayError::TtsFailed;
        assert_eq!(err.code(), "TTS_FAILED");
        assert_eq!(err.to_string(), "Text-to-speech service unavailable");
    }
}
