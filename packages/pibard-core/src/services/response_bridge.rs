//! MQTT response bridge.
//!
//! Subscribes to every device's response topic and rebroadcasts each message
//! to the dashboards as a `clientResponse` event.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::events::{ClientResponse, EventEmitter};
use crate::mqtt;
use crate::protocol_constants::MQTT_RECONNECT_DELAY_MS;

/// Builds the event for a message on `{prefix}/clients/{id}/response`.
///
/// Payloads that are not JSON are passed on as a string. Returns `None` for
/// topics outside the response layout.
pub fn parse_client_response(prefix: &str, topic: &str, payload: &[u8]) -> Option<ClientResponse> {
    let client_id = mqtt::client_id_from_response_topic(prefix, topic)?;
    let message = serde_json::from_slice::<Value>(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()));
    Some(ClientResponse {
        client_id: client_id.to_string(),
        message,
    })
}

/// Drives the gateway's MQTT connection until `cancel` fires.
///
/// The event loop also carries publishes made through `client` (the `mqtt`
/// speaker backend), so it must run whenever MQTT is configured.
pub async fn run_response_bridge(
    client: AsyncClient,
    mut eventloop: EventLoop,
    prefix: String,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
) {
    let filter = mqtt::response_filter(&prefix);
    let mut connected = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected = true;
                    log::info!("[MQTT] Connected, subscribing to {}", filter);
                    if let Err(e) = client.try_subscribe(&filter, QoS::AtLeastOnce) {
                        log::error!("[MQTT] Failed to subscribe to {}: {}", filter, e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    match parse_client_response(&prefix, &p.topic, &p.payload) {
                        Some(response) => {
                            log::debug!("[MQTT] Response from {}", response.client_id);
                            emitter.emit_client_response(response);
                        }
                        None => log::debug!("[MQTT] Ignoring message on {}", p.topic),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if connected {
                        log::warn!("[MQTT] Connection lost: {}", e);
                        connected = false;
                    } else {
                        log::debug!("[MQTT] Connection attempt failed: {}", e);
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(MQTT_RECONNECT_DELAY_MS)) => {}
                    }
                }
            }
        }
    }

    if let Err(e) = client.try_disconnect() {
        log::debug!("[MQTT] Disconnect request failed: {}", e);
    }
    let _ = tokio::time::timeout(Duration::from_millis(100), eventloop.poll()).await;
    log::info!("[MQTT] Response bridge stopped");
}
