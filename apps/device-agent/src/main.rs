//! Headless device agent: wires the audio engine to a microphone, speaker,
//! and the gateway relay.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use toygateway_device::led::LoggingLedController;
use toygateway_device::button::NoopButtonSource;
use toygateway_device::DeviceEngine;

use crate::config::AgentConfig;

/// Device agent - microphone/speaker bridge to the voice-toy gateway.
#[derive(Parser, Debug)]
#[command(name = "toygateway-device-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "DEVICE_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Gateway WebSocket base URL (overrides config file).
    #[arg(short = 'u', long, env = "DEVICE_GATEWAY_URL")]
    gateway_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("toygateway-device-agent v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        AgentConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(gateway_url) = args.gateway_url {
        config.gateway_url = gateway_url;
    }

    log::info!(
        "configuration: device_id={}, toy_id={}, gateway_url={}",
        config.device_id,
        config.toy_id,
        config.gateway_url
    );

    let core_config = config.to_core_config();

    let engine = DeviceEngine::new(
        core_config,
        std::sync::Arc::new(LoggingLedController),
        Box::new(NoopButtonSource),
    );

    let engine_handle = tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            log::error!("device engine error: {e}");
        }
    });

    shutdown_signal().await;

    log::info!("shutdown signal received, cleaning up...");
    engine_handle.abort();
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
