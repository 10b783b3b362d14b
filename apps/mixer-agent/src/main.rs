//! PiBard Agent - per-device mixer agent.
//!
//! Subscribes to the device's MQTT command topic and applies per-speaker
//! volume changes to the local PulseAudio sinks with `pactl`.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pibard_core::{MixerAgent, PactlMixer};
use tokio::signal;

use crate::config::AgentFileConfig;

/// PiBard Agent - applies speaker volume commands received over MQTT.
#[derive(Parser, Debug)]
#[command(name = "pibard-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", env = "PIBARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "PIBARD_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Client id (overrides config file and `CLIENT_ID`).
    #[arg(long)]
    client_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("PiBard Agent v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        AgentFileConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(id) = args.client_id {
        config.client_id = Some(id);
    }

    let core_config = config.to_core_config();
    log::info!(
        "Configuration: client_id={}, broker={}:{}, prefix={}",
        core_config.client_id,
        core_config.mqtt.host,
        core_config.mqtt.port,
        core_config.mqtt.topic_prefix,
    );

    let mixer = Arc::new(PactlMixer::local(core_config.pactl_program.clone()));
    MixerAgent::new(core_config, mixer)
        .run(shutdown_signal())
        .await;

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
