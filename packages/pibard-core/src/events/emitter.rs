//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, enabling testing and alternative transport implementations.

use super::{ClientResponse, ServerUpdate};

/// Trait for emitting domain events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a notification received from the audio server.
    fn emit_server_update(&self, event: ServerUpdate);

    /// Emits a device response received over MQTT.
    fn emit_client_response(&self, event: ClientResponse);
}

/// No-op emitter for tests and for running without an external sink.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_server_update(&self, _event: ServerUpdate) {}

    fn emit_client_response(&self, _event: ClientResponse) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_server_update(&self, event: ServerUpdate) {
        tracing::debug!(?event, "server_update");
    }

    fn emit_client_response(&self, event: ClientResponse) {
        tracing::debug!(?event, "client_response");
    }
}
