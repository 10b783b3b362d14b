//! Runtime configuration for the gateway and the mixer agent.
//!
//! The binaries load these from YAML and environment variables; the core
//! only consumes the resolved values.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    AGENT_MQTT_CLIENT_PREFIX, DEFAULT_HTTP_PORT, DEFAULT_MQTT_PORT, DEFAULT_PACTL_PROGRAM,
    DEFAULT_SNAPCAST_HTTP_PORT, DEFAULT_SNAPCAST_TCP_PORT, DEFAULT_SPEAKER_COUNT,
    DEFAULT_TOPIC_PREFIX, MAX_SPEAKER_COUNT, SHUTDOWN_GRACE_MS, SNAPCAST_JSONRPC_PATH,
};

// ─────────────────────────────────────────────────────────────────────────────
// Audio Server
// ─────────────────────────────────────────────────────────────────────────────

/// Wire transport used to reach the audio server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioServerTransport {
    /// JSON-RPC POSTed to the HTTP control endpoint.
    #[default]
    Http,
    /// Persistent newline-delimited JSON-RPC on the TCP control port.
    Tcp,
}

impl std::str::FromStr for AudioServerTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "tcp" => Ok(Self::Tcp),
            other => Err(format!("unknown audio server transport: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioServerConfig {
    pub host: String,
    /// Control port; defaults per transport (1780 HTTP, 1705 TCP).
    pub port: Option<u16>,
    pub transport: AudioServerTransport,
    /// Outbound request timeout. `None` means no limit.
    pub request_timeout_secs: Option<u64>,
}

impl Default for AudioServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            transport: AudioServerTransport::Http,
            request_timeout_secs: None,
        }
    }
}

impl AudioServerConfig {
    /// Effective control port for the selected transport.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.transport {
            AudioServerTransport::Http => DEFAULT_SNAPCAST_HTTP_PORT,
            AudioServerTransport::Tcp => DEFAULT_SNAPCAST_TCP_PORT,
        })
    }

    /// `http://{host}:{port}/jsonrpc`
    pub fn http_endpoint(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.host,
            self.effective_port(),
            SNAPCAST_JSONRPC_PATH
        )
    }

    /// `{host}:{port}` for the TCP control connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.effective_port())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MQTT
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────────────────────────

/// How per-speaker volume commands reach a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerBackend {
    /// Run the mixer on the device over a remote shell.
    #[default]
    Ssh,
    /// Publish a command for the device's mixer agent.
    Mqtt,
}

impl std::str::FromStr for SpeakerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(Self::Ssh),
            "mqtt" => Ok(Self::Mqtt),
            other => Err(format!("unknown speaker backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub bind_port: u16,
    pub audio_server: AudioServerConfig,
    /// Broker settings. Without them the response bridge is disabled and
    /// only the `ssh` speaker backend is usable.
    pub mqtt: Option<MqttConfig>,
    pub speaker_backend: SpeakerBackend,
    /// Speakers shown per client in a new dashboard session.
    pub default_speaker_count: u8,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_port: DEFAULT_HTTP_PORT,
            audio_server: AudioServerConfig::default(),
            mqtt: None,
            speaker_backend: SpeakerBackend::default(),
            default_speaker_count: DEFAULT_SPEAKER_COUNT,
        }
    }
}

impl GatewayConfig {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_speaker_count == 0 || self.default_speaker_count > MAX_SPEAKER_COUNT {
            return Err(format!(
                "default_speaker_count must be between 1 and {}",
                MAX_SPEAKER_COUNT
            ));
        }
        if self.speaker_backend == SpeakerBackend::Mqtt && self.mqtt.is_none() {
            return Err("speaker_backend mqtt requires an MQTT broker".to_string());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mixer Agent
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Device identifier used in topics and status messages.
    pub client_id: String,
    pub mqtt: MqttConfig,
    /// How long to keep the connection alive after publishing offline.
    pub shutdown_grace_ms: u64,
    pub pactl_program: String,
}

impl AgentConfig {
    /// Config for `client_id` with default broker and mixer settings.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            mqtt: MqttConfig::default(),
            shutdown_grace_ms: SHUTDOWN_GRACE_MS,
            pactl_program: DEFAULT_PACTL_PROGRAM.to_string(),
        }
    }

    /// MQTT client identifier (`pibard-client-{id}`).
    pub fn mqtt_client_id(&self) -> String {
        format!("{}{}", AGENT_MQTT_CLIENT_PREFIX, self.client_id)
    }
}

/// The machine's hostname, used as the default agent client id.
pub fn default_client_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
