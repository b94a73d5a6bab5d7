//! Standalone headless server for the voice-toy gateway relay.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use toygateway_core::bootstrap_services;

use crate::config::ServerConfig;

/// Gateway server - voice-toy relay and AI dispatch.
#[derive(Parser, Debug)]
#[command(name = "toygateway-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "GATEWAY_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "GATEWAY_BIND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("toygateway-server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.bind_port = port;
    }

    log::info!(
        "configuration: bind_port={}, default_tts_provider={}",
        config.bind_port,
        config.default_tts_provider
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(core_config);

    log::info!("services bootstrapped successfully");

    let app_state = services.into_app_state();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = toygateway_core::start_server(app_state).await {
            log::error!("server error: {e}");
        }
    });

    shutdown_signal().await;

    log::info!("shutdown signal received, cleaning up...");
    server_handle.abort();
    log::info!("shutdown complete");

    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
