//! Agent configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use pibard_core::protocol_constants::{DEFAULT_PACTL_PROGRAM, SHUTDOWN_GRACE_MS};
use pibard_core::{default_client_id, AgentConfig, MqttConfig};
use serde::Deserialize;

/// Agent configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentFileConfig {
    /// Device identifier; must match the Snapcast client's host name.
    /// Defaults to the hostname.
    /// Override: `CLIENT_ID`
    pub client_id: Option<String>,

    /// Overrides: `MQTT_HOST`, `MQTT_PORT`, `MQTT_USER`, `MQTT_PASSWORD`,
    /// `MQTT_TOPIC_PREFIX`
    pub mqtt: MqttConfig,

    /// Time to flush the offline status before disconnecting.
    pub shutdown_grace_ms: u64,

    /// Mixer executable.
    pub pactl_program: String,
}

impl Default for AgentFileConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            mqtt: MqttConfig::default(),
            shutdown_grace_ms: SHUTDOWN_GRACE_MS,
            pactl_program: DEFAULT_PACTL_PROGRAM.to_string(),
        }
    }
}

impl AgentFileConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("CLIENT_ID").filter(|id| !id.is_empty()) {
            self.client_id = Some(id);
        }

        if let Some(host) = lookup("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(val) = lookup("MQTT_PORT") {
            match val.parse() {
                Ok(port) => self.mqtt.port = port,
                Err(e) => log::warn!("Ignoring MQTT_PORT={}: {}", val, e),
            }
        }
        if let Some(user) = lookup("MQTT_USER") {
            self.mqtt.username = Some(user);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(prefix) = lookup("MQTT_TOPIC_PREFIX") {
            self.mqtt.topic_prefix = prefix;
        }
    }

    /// Converts to pibard-core's `AgentConfig`, resolving the hostname default.
    pub fn to_core_config(&self) -> AgentConfig {
        let client_id = self.client_id.clone().unwrap_or_else(default_client_id);
        AgentConfig {
            mqtt: self.mqtt.clone(),
            shutdown_grace_ms: self.shutdown_grace_ms,
            pactl_program: self.pactl_program.clone(),
            ..AgentConfig::new(client_id)
        }
    }
}
