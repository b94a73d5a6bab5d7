//! HTTP/WebSocket API layer: router construction and shared application
//! state. Handlers are thin and delegate to `session`/`services`.

use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::runtime::TokioSpawner;
use crate::services::AiDispatcher;
use crate::session::SessionManager;

pub mod http;
pub mod ws;

pub use http::create_router;

/// Errors that can occur when starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state threaded through every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub dispatcher: Arc<AiDispatcher>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
    pub spawner: TokioSpawner,
}

/// Binds and serves the gateway on `config.bind_port` until the process is
/// signalled to stop.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.config.bind_port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("gateway listening on http://{addr}");

    let app = create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
