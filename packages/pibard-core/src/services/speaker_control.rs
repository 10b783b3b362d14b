//! Per-speaker volume backends.
//!
//! The audio server only knows whole clients. Individual speakers behind a
//! client are separate mixer sinks on the device, reached either by running
//! the mixer over `ssh` or by publishing a command to the device's agent.

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use serde::Serialize;
use thiserror::Error;

use crate::mixer::{Mixer, MixerError, PactlMixer};
use crate::model::{sink_name, ClientInfo, Percent};
use crate::mqtt;
use crate::protocol_constants::ACTION_SET_VOLUME;

#[derive(Debug, Error)]
pub enum SpeakerControlError {
    #[error("{0}")]
    Mixer(#[from] MixerError),

    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("MQTT publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}

/// Delivers a volume change to one speaker of a client device.
#[async_trait]
pub trait SpeakerControl: Send + Sync {
    /// Short backend name for logs and `/health`.
    fn backend(&self) -> &'static str;

    async fn set_speaker_volume(
        &self,
        client: &ClientInfo,
        speaker: u8,
        volume: Percent,
    ) -> Result<(), SpeakerControlError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// SSH
// ─────────────────────────────────────────────────────────────────────────────

/// Runs `pactl` on the client's host over `ssh`.
///
/// Relies on key-based login being set up for the gateway's user.
#[derive(Debug, Default)]
pub struct SshSpeakerControl;

#[async_trait]
impl SpeakerControl for SshSpeakerControl {
    fn backend(&self) -> &'static str {
        "ssh"
    }

    async fn set_speaker_volume(
        &self,
        client: &ClientInfo,
        speaker: u8,
        volume: Percent,
    ) -> Result<(), SpeakerControlError> {
        log::info!(
            "[SpeakerControl] ssh {} speaker{} -> {}%",
            client.host,
            speaker,
            volume
        );
        PactlMixer::remote(client.host.as_str())
            .set_sink_volume(&sink_name(speaker), volume)
            .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MQTT
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SetVolumeCommand {
    action: &'static str,
    speaker: u8,
    volume: Percent,
}

/// Command payload understood by the mixer agent.
pub fn set_volume_payload(speaker: u8, volume: Percent) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&SetVolumeCommand {
        action: ACTION_SET_VOLUME,
        speaker,
        volume,
    })
}

/// Publishes a `setVolume` command for the client's mixer agent.
///
/// Fire-and-forget: success means the broker accepted the publish, not that
/// the device applied it. The agent's reply arrives via the response bridge.
pub struct MqttSpeakerControl {
    client: AsyncClient,
    topic_prefix: String,
}

impl MqttSpeakerControl {
    pub fn new(client: AsyncClient, topic_prefix: impl Into<String>) -> Self {
        Self {
            client,
            topic_prefix: topic_prefix.into(),
        }
    }

    /// Command topic of the agent on `client`'s device.
    pub fn command_topic(&self, client: &ClientInfo) -> String {
        mqtt::command_topic(&self.topic_prefix, client.device_id())
    }
}

#[async_trait]
impl SpeakerControl for MqttSpeakerControl {
    fn backend(&self) -> &'static str {
        "mqtt"
    }

    async fn set_speaker_volume(
        &self,
        client: &ClientInfo,
        speaker: u8,
        volume: Percent,
    ) -> Result<(), SpeakerControlError> {
        let topic = self.command_topic(client);
        let payload = set_volume_payload(speaker, volume)?;
        log::info!("[SpeakerControl] publish {} speaker{} -> {}%", topic, speaker, volume);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }
}
