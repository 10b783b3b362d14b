//! Event system for real-time dashboard updates.
//!
//! This module provides:
//! - [`EventEmitter`] trait for services to emit events
//! - [`BroadcastEventBridge`] for WebSocket transport
//! - [`BroadcastEvent`], the envelope pushed to every dashboard socket

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

pub use crate::audio_server::ServerUpdate;

use serde::Serialize;
use serde_json::Value;

/// Events broadcast to connected dashboards.
///
/// Serialized as `{"type": "...", "payload": {...}}`, the same framing the
/// WebSocket protocol uses in both directions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Notification pushed by the audio server.
    ServerUpdate(ServerUpdate),

    /// Status message published by a device's mixer agent.
    ClientResponse(ClientResponse),
}

/// A device response relayed from `{prefix}/clients/{id}/response`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub client_id: String,
    /// The device's message, verbatim if it was JSON, else as a string.
    pub message: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_type_payload_framing() {
        let event = BroadcastEvent::ClientResponse(ClientResponse {
            client_id: "kitchen".into(),
            message: json!({ "status": "online", "client": "kitchen" }),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "clientResponse",
                "payload": { "clientId": "kitchen", "message": { "status": "online", "client": "kitchen" } }
            })
        );

        let event = BroadcastEvent::ServerUpdate(ServerUpdate {
            method: "Client.OnVolumeChanged".into(),
            params: json!({ "id": "c1" }),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "serverUpdate");
        assert_eq!(value["payload"]["method"], "Client.OnVolumeChanged");
    }
}
