//! MQTT connection setup and topic layout.
//!
//! Topics:
//! - `{prefix}/clients/{id}/command`: gateway to agent
//! - `{prefix}/clients/{id}/response`: agent to gateway

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions};

use crate::config::MqttConfig;
use crate::protocol_constants::{
    GATEWAY_MQTT_CLIENT_PREFIX, MQTT_KEEP_ALIVE_SECS, MQTT_REQUEST_CAPACITY,
};

/// Creates a client and its event loop. Nothing connects until the loop is polled.
pub fn connect(config: &MqttConfig, client_id: &str) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(MQTT_KEEP_ALIVE_SECS));
    if let Some(username) = &config.username {
        options.set_credentials(
            username.clone(),
            config.password.clone().unwrap_or_default(),
        );
    }

    log::info!(
        "[MQTT] Broker mqtt://{}:{} as {}",
        config.host,
        config.port,
        client_id
    );
    AsyncClient::new(options, MQTT_REQUEST_CAPACITY)
}

/// Unique client identifier for a gateway instance.
pub fn gateway_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", GATEWAY_MQTT_CLIENT_PREFIX, &id[..8])
}

pub fn command_topic(prefix: &str, client_id: &str) -> String {
    format!("{}/clients/{}/command", prefix, client_id)
}

pub fn response_topic(prefix: &str, client_id: &str) -> String {
    format!("{}/clients/{}/response", prefix, client_id)
}

/// Wildcard filter matching every device's response topic.
pub fn response_filter(prefix: &str) -> String {
    format!("{}/clients/+/response", prefix)
}

/// Extracts `{id}` from `{prefix}/clients/{id}/response`.
pub fn client_id_from_response_topic<'a>(prefix: &str, topic: &'a str) -> Option<&'a str> {
    let id = topic
        .strip_prefix(prefix)?
        .strip_prefix("/clients/")?
        .strip_suffix("/response")?;
    (!id.is_empty() && !id.contains('/')).then_some(id)
}
