//! `/health` and `/metrics` HTTP endpoints (§6).

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{ws::ws_handler, AppState};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    sessions: usize,
    tts_streaming: bool,
    tts_providers: Vec<String>,
    timestamp: u64,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok",
        sessions: state.sessions.active_count(),
        tts_streaming: !state.config.tts_disabled && !state.config.tts_providers.is_empty(),
        tts_providers: state.config.tts_providers.keys().cloned().collect(),
        timestamp: unix_seconds_now(),
    };
    Json(body)
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/{device_id}/{toy_id}", get(ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn unix_seconds_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
