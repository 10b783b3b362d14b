//! Gateway bootstrap and dependency wiring.
//!
//! This module is the composition root: the audio-server backend, the MQTT
//! connection, the speaker backend and the event bridge are created and
//! wired together here, and nowhere else.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::api::{AppState, WsConnectionManager};
use crate::audio_server::{connect_audio_server, AudioServer, ServerUpdate};
use crate::config::{GatewayConfig, SpeakerBackend};
use crate::error::{PibardError, PibardResult};
use crate::events::{BroadcastEventBridge, EventEmitter};
use crate::mqtt;
use crate::protocol_constants::EVENT_CHANNEL_CAPACITY;
use crate::services::{run_response_bridge, MqttSpeakerControl, SpeakerControl, SshSpeakerControl};

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Audio-server backend for client and stream operations.
    pub audio_server: Arc<dyn AudioServer>,
    /// Backend delivering per-speaker volume changes.
    pub speaker_control: Arc<dyn SpeakerControl>,
    /// Event bridge feeding dashboard sockets.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    pub config: Arc<GatewayConfig>,
    /// Cancelled on shutdown; stops every background task.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Builds the API state over these services.
    pub fn app_state(&self) -> PibardResult<AppState> {
        AppState::builder()
            .audio_server(Arc::clone(&self.audio_server))
            .speaker_control(Arc::clone(&self.speaker_control))
            .event_bridge(Arc::clone(&self.event_bridge))
            .ws_manager(Arc::clone(&self.ws_manager))
            .config(Arc::clone(&self.config))
            .build()
    }

    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        // Stops the MQTT bridge and the update forwarder
        self.cancel_token.cancel();

        let closed = self.ws_manager.close_all();
        if closed > 0 {
            log::info!("[Bootstrap] Closed {} WebSocket connection(s)", closed);
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Validates `config`, connects the configured audio server and wires the
/// remaining services around it.
///
/// # Errors
///
/// Returns [`PibardError::Configuration`] for invalid settings, or the
/// adapter error when the TCP control channel cannot be opened.
pub async fn bootstrap_gateway(config: &GatewayConfig) -> PibardResult<BootstrappedServices> {
    config.validate().map_err(PibardError::Configuration)?;
    let audio_server = connect_audio_server(&config.audio_server).await?;
    bootstrap_with_audio_server(config, audio_server)
}

/// Wires services around an already connected audio server.
///
/// Spawns background tasks, so it must run inside a Tokio runtime:
///
/// 1. MQTT response bridge (when a broker is configured)
/// 2. Server-update forwarder (when the backend pushes notifications)
pub fn bootstrap_with_audio_server(
    config: &GatewayConfig,
    audio_server: Arc<dyn AudioServer>,
) -> PibardResult<BootstrappedServices> {
    config.validate().map_err(PibardError::Configuration)?;

    let cancel_token = CancellationToken::new();
    let event_bridge = Arc::new(BroadcastEventBridge::new(EVENT_CHANNEL_CAPACITY));
    let ws_manager = Arc::new(WsConnectionManager::new());

    let mqtt_client = config.mqtt.as_ref().map(|mqtt_config| {
        let (client, eventloop) = mqtt::connect(mqtt_config, &mqtt::gateway_client_id());
        tokio::spawn(run_response_bridge(
            client.clone(),
            eventloop,
            mqtt_config.topic_prefix.clone(),
            Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
            cancel_token.child_token(),
        ));
        (client, mqtt_config.topic_prefix.clone())
    });

    let speaker_control: Arc<dyn SpeakerControl> = match (config.speaker_backend, mqtt_client) {
        (SpeakerBackend::Ssh, _) => Arc::new(SshSpeakerControl),
        (SpeakerBackend::Mqtt, Some((client, prefix))) => {
            Arc::new(MqttSpeakerControl::new(client, prefix))
        }
        (SpeakerBackend::Mqtt, None) => {
            return Err(PibardError::Configuration(
                "speaker_backend mqtt requires an MQTT broker".to_string(),
            ))
        }
    };
    log::info!(
        "[Bootstrap] Audio server: {}, speaker backend: {}",
        audio_server.backend(),
        speaker_control.backend()
    );

    if let Some(updates) = audio_server.subscribe_updates() {
        tokio::spawn(forward_server_updates(
            updates,
            Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
            cancel_token.child_token(),
        ));
    }

    Ok(BootstrappedServices {
        audio_server,
        speaker_control,
        event_bridge,
        ws_manager,
        config: Arc::new(config.clone()),
        cancel_token,
    })
}

/// Relays audio-server notifications to the event bridge until cancelled.
async fn forward_server_updates(
    mut updates: broadcast::Receiver<ServerUpdate>,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            update = updates.recv() => match update {
                Ok(update) => emitter.emit_server_update(update),
                Err(RecvError::Lagged(n)) => {
                    log::warn!("[Bootstrap] Dropped {} server update(s)", n);
                }
                Err(RecvError::Closed) => {
                    log::warn!("[Bootstrap] Audio server update channel closed");
                    break;
                }
            }
        }
    }
}
