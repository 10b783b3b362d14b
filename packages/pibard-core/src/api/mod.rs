//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::audio_server::AudioServer;
use crate::config::GatewayConfig;
use crate::error::{PibardError, PibardResult};
use crate::events::BroadcastEventBridge;
use crate::services::SpeakerControl;

pub mod http;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or serve on the TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Audio-server backend for client and stream operations.
    pub audio_server: Arc<dyn AudioServer>,
    /// Backend delivering per-speaker volume changes.
    pub speaker_control: Arc<dyn SpeakerControl>,
    /// Event bridge feeding dashboard sockets.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    audio_server: Option<Arc<dyn AudioServer>>,
    speaker_control: Option<Arc<dyn SpeakerControl>>,
    event_bridge: Option<Arc<BroadcastEventBridge>>,
    ws_manager: Option<Arc<WsConnectionManager>>,
    config: Option<Arc<GatewayConfig>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audio_server(mut self, audio_server: Arc<dyn AudioServer>) -> Self {
        self.audio_server = Some(audio_server);
        self
    }

    pub fn speaker_control(mut self, control: Arc<dyn SpeakerControl>) -> Self {
        self.speaker_control = Some(control);
        self
    }

    pub fn event_bridge(mut self, bridge: Arc<BroadcastEventBridge>) -> Self {
        self.event_bridge = Some(bridge);
        self
    }

    /// Sets the WebSocket connection manager. A fresh one is created if unset.
    pub fn ws_manager(mut self, manager: Arc<WsConnectionManager>) -> Self {
        self.ws_manager = Some(manager);
        self
    }

    /// Sets the configuration. Defaults apply if unset.
    pub fn config(mut self, config: Arc<GatewayConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the `AppState`.
    ///
    /// # Errors
    ///
    /// Returns [`PibardError::Configuration`] if a required service is missing.
    pub fn build(self) -> PibardResult<AppState> {
        fn required<T>(value: Option<T>, name: &str) -> PibardResult<T> {
            value.ok_or_else(|| PibardError::Configuration(format!("{} is required", name)))
        }

        Ok(AppState {
            audio_server: required(self.audio_server, "audio_server")?,
            speaker_control: required(self.speaker_control, "speaker_control")?,
            event_bridge: required(self.event_bridge, "event_bridge")?,
            ws_manager: self.ws_manager.unwrap_or_default(),
            config: self.config.unwrap_or_default(),
        })
    }
}

impl AppState {
    /// Creates a new builder for constructing an `AppState`.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

/// Serves the API on `0.0.0.0:{bind_port}` until `shutdown` is cancelled.
pub async fn start_server(state: AppState, shutdown: CancellationToken) -> Result<(), ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.bind_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    log::info!("[Gateway] Listening on http://{}", addr);
    let app = http::create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
