//! PiBard Gateway - control gateway for a PiBard installation.
//!
//! Serves the dashboard, the REST API and the dashboard WebSocket, talks to
//! the Snapcast server, and relays per-speaker volume changes to devices
//! over SSH or MQTT.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pibard_core::events::LoggingEventEmitter;
use pibard_core::{bootstrap_gateway, start_server};
use tokio::signal;

use crate::config::GatewayFileConfig;

/// PiBard Gateway - multi-room volume control over Snapcast and MQTT.
#[derive(Parser, Debug)]
#[command(name = "pibard-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", env = "PIBARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "PIBARD_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file and `PORT`).
    #[arg(short = 'p', long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("PiBard Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        GatewayFileConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }

    log::info!(
        "Configuration: bind_port={}, snapcast={}:{} ({:?}), mqtt={}, speaker_backend={:?}",
        config.bind_port,
        config.snapcast.host,
        config.snapcast.effective_port(),
        config.snapcast.transport,
        config
            .mqtt
            .as_ref()
            .map(|m| format!("{}:{}", m.host, m.port))
            .unwrap_or_else(|| "disabled".to_string()),
        config.speaker_backend,
    );

    let core_config = config.to_core_config();
    let services = bootstrap_gateway(&core_config)
        .await
        .context("Failed to bootstrap services")?;

    if args.log_level >= log::LevelFilter::Debug {
        services
            .event_bridge
            .set_external_emitter(Arc::new(LoggingEventEmitter));
    }

    log::info!("Services bootstrapped successfully");

    let app_state = services.app_state().context("Failed to build app state")?;
    let server_token = services.cancel_token.child_token();
    let mut server_handle = tokio::spawn(start_server(app_state, server_token));

    // Wait for a shutdown signal, or for the server to stop on its own
    tokio::select! {
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, cleaning up...");
        }
        result = &mut server_handle => {
            services.shutdown().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("HTTP server failed"),
                Err(e) => Err(e).context("HTTP server task panicked"),
            };
        }
    }

    // Graceful shutdown
    services.shutdown().await;

    match server_handle.await {
        Ok(Err(e)) => log::error!("Server error: {}", e),
        Err(e) => log::error!("Server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
