//! Gateway configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use pibard_core::protocol_constants::{DEFAULT_HTTP_PORT, DEFAULT_SPEAKER_COUNT};
use pibard_core::{AudioServerConfig, GatewayConfig, MqttConfig, SpeakerBackend};
use serde::Deserialize;

/// Gateway configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GatewayFileConfig {
    /// Port to bind the HTTP server to.
    /// Override: `PORT`
    pub bind_port: u16,

    /// Snapcast control endpoint.
    /// Overrides: `SNAPCAST_HOST`, `SNAPCAST_PORT`, `SNAPCAST_TRANSPORT`
    pub snapcast: AudioServerConfig,

    /// MQTT broker. Left out, the gateway runs without MQTT.
    /// Overrides: `MQTT_HOST`, `MQTT_PORT`, `MQTT_USER`, `MQTT_PASSWORD`,
    /// `MQTT_TOPIC_PREFIX` (any of them enables MQTT)
    pub mqtt: Option<MqttConfig>,

    /// `ssh` or `mqtt`.
    /// Override: `SPEAKER_BACKEND`
    pub speaker_backend: SpeakerBackend,

    /// Speakers shown per client until the dashboard changes it.
    pub default_speaker_count: u8,
}

impl Default for GatewayFileConfig {
    fn default() -> Self {
        Self {
            bind_port: DEFAULT_HTTP_PORT,
            snapcast: AudioServerConfig::default(),
            mqtt: None,
            speaker_backend: SpeakerBackend::default(),
            default_speaker_count: DEFAULT_SPEAKER_COUNT,
        }
    }
}

impl GatewayFileConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. Unparseable values are logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = parsed(&lookup, "PORT") {
            self.bind_port = port;
        }

        if let Some(host) = lookup("SNAPCAST_HOST") {
            self.snapcast.host = host;
        }
        if let Some(port) = parsed(&lookup, "SNAPCAST_PORT") {
            self.snapcast.port = Some(port);
        }
        if let Some(transport) = parsed(&lookup, "SNAPCAST_TRANSPORT") {
            self.snapcast.transport = transport;
        }

        let mqtt_keys = [
            "MQTT_HOST",
            "MQTT_PORT",
            "MQTT_USER",
            "MQTT_PASSWORD",
            "MQTT_TOPIC_PREFIX",
        ];
        if mqtt_keys.iter().any(|key| lookup(key).is_some()) {
            let mqtt = self.mqtt.get_or_insert_with(MqttConfig::default);
            if let Some(host) = lookup("MQTT_HOST") {
                mqtt.host = host;
            }
            if let Some(port) = parsed(&lookup, "MQTT_PORT") {
                mqtt.port = port;
            }
            if let Some(user) = lookup("MQTT_USER") {
                mqtt.username = Some(user);
            }
            if let Some(password) = lookup("MQTT_PASSWORD") {
                mqtt.password = Some(password);
            }
            if let Some(prefix) = lookup("MQTT_TOPIC_PREFIX") {
                mqtt.topic_prefix = prefix;
            }
        }

        if let Some(backend) = parsed(&lookup, "SPEAKER_BACKEND") {
            self.speaker_backend = backend;
        }
    }

    /// Converts to pibard-core's `GatewayConfig`.
    pub fn to_core_config(&self) -> GatewayConfig {
        GatewayConfig {
            bind_port: self.bind_port,
            audio_server: self.snapcast.clone(),
            mqtt: self.mqtt.clone(),
            speaker_backend: self.speaker_backend,
            default_speaker_count: self.default_speaker_count,
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring {}={}: {}", key, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pibard_core::AudioServerTransport;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let config = GatewayFileConfig::from_file(None).unwrap();
        assert_eq!(config.bind_port, 3000);
        assert_eq!(config.snapcast.host, "localhost");
        assert!(config.mqtt.is_none());
        assert_eq!(config.speaker_backend, SpeakerBackend::Ssh);
        assert_eq!(config.default_speaker_count, 2);
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bind_port: 8080\n\
             snapcast:\n  host: snapserver.lan\n  transport: tcp\n\
             mqtt:\n  host: broker.lan\n  topic_prefix: house\n\
             speaker_backend: mqtt\n\
             default_speaker_count: 4"
        )
        .unwrap();

        let config = GatewayFileConfig::from_file(Some(file.path())).unwrap();
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.snapcast.host, "snapserver.lan");
        assert_eq!(config.snapcast.transport, AudioServerTransport::Tcp);
        assert_eq!(config.snapcast.effective_port(), 1705);

        let mqtt = config.mqtt.as_ref().unwrap();
        assert_eq!(mqtt.host, "broker.lan");
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.topic_prefix, "house");

        let core = config.to_core_config();
        assert_eq!(core.speaker_backend, SpeakerBackend::Mqtt);
        assert_eq!(core.default_speaker_count, 4);
        assert!(core.validate().is_ok());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_port: [not, a, port]").unwrap();
        assert!(GatewayFileConfig::from_file(Some(file.path())).is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = GatewayFileConfig::default();
        config.apply_overrides(env(&[
            ("PORT", "4000"),
            ("SNAPCAST_HOST", "10.0.0.5"),
            ("SNAPCAST_PORT", "1800"),
            ("SNAPCAST_TRANSPORT", "TCP"),
            ("SPEAKER_BACKEND", "mqtt"),
        ]));

        assert_eq!(config.bind_port, 4000);
        assert_eq!(config.snapcast.host, "10.0.0.5");
        assert_eq!(config.snapcast.port, Some(1800));
        assert_eq!(config.snapcast.transport, AudioServerTransport::Tcp);
        assert_eq!(config.speaker_backend, SpeakerBackend::Mqtt);
        assert!(config.mqtt.is_none());
    }

    #[test]
    fn any_mqtt_variable_enables_mqtt() {
        let mut config = GatewayFileConfig::default();
        config.apply_overrides(env(&[("MQTT_USER", "pibard"), ("MQTT_PASSWORD", "secret")]));

        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.host, "localhost");
        assert_eq!(mqtt.username.as_deref(), Some("pibard"));
        assert_eq!(mqtt.password.as_deref(), Some("secret"));
        assert_eq!(mqtt.topic_prefix, "pibard");
    }

    #[test]
    fn unparseable_values_are_ignored() {
        let mut config = GatewayFileConfig::default();
        config.apply_overrides(env(&[("PORT", "eighty"), ("SPEAKER_BACKEND", "carrier-pigeon")]));
        assert_eq!(config.bind_port, 3000);
        assert_eq!(config.speaker_backend, SpeakerBackend::Ssh);
    }
}
