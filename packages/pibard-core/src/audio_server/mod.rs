//! Audio-server adapter.
//!
//! Wraps the Snapcast control API behind the [`AudioServer`] trait. The wire
//! transport is pluggable: [`HttpRpcTransport`] POSTs one request per call,
//! [`TcpRpcTransport`] keeps a control connection open and also forwards the
//! server's change notifications. Which one is used is a configuration choice
//! (see [`connect_audio_server`]).
//!
//! Nothing is cached. Every call goes to the server, including client
//! resolution, which re-reads the full status and scans it.

mod http;
pub mod rpc;
mod tcp;
#[cfg(test)]
pub(crate) mod test_fixtures;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::{AudioServerConfig, AudioServerTransport};
use crate::model::{ClientInfo, GetStatusResult, Percent, ServerStatus};
use crate::protocol_constants::{
    METHOD_CLIENT_SET_STREAM, METHOD_CLIENT_SET_VOLUME, METHOD_SERVER_GET_STATUS,
};

pub use http::HttpRpcTransport;
pub use tcp::TcpRpcTransport;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while talking to the audio server.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request to the server failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success HTTP status.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Server returned a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response could not be decoded.
    #[error("Malformed response: {0}")]
    Parse(String),

    /// Control connection I/O failed.
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    /// Control connection went away before the response arrived.
    #[error("Control connection closed")]
    Closed,

    /// No response within the configured request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Convenient Result alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Server-originated notification (e.g. `Client.OnVolumeChanged`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerUpdate {
    pub method: String,
    pub params: Value,
}

/// Capability set of the audio server as seen by the gateway.
#[async_trait]
pub trait AudioServer: Send + Sync {
    /// Short backend name for logs and `/health`.
    fn backend(&self) -> &'static str;

    /// Fetches all groups and streams.
    async fn get_status(&self) -> AdapterResult<ServerStatus>;

    /// Sets a client's volume and mute flag.
    async fn set_client_volume(
        &self,
        client_id: &str,
        volume: Percent,
        muted: bool,
    ) -> AdapterResult<()>;

    /// Switches the stream a client listens to.
    async fn set_client_stream(&self, client_id: &str, stream_id: &str) -> AdapterResult<()>;

    /// Resolves a client's host and display name.
    ///
    /// Returns `Ok(None)` when the server does not know the client.
    async fn resolve_client(&self, client_id: &str) -> AdapterResult<Option<ClientInfo>> {
        Ok(self.get_status().await?.find_client(client_id))
    }

    /// Subscribes to server notifications, if the backend receives any.
    fn subscribe_updates(&self) -> Option<broadcast::Receiver<ServerUpdate>> {
        None
    }
}

/// A JSON-RPC 2.0 transport to the audio server.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sends one request and returns its `result`.
    async fn call(&self, method: &str, params: Value) -> AdapterResult<Value>;

    fn subscribe_updates(&self) -> Option<broadcast::Receiver<ServerUpdate>> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapcast Adapter
// ─────────────────────────────────────────────────────────────────────────────

/// [`AudioServer`] implementation speaking the Snapcast method set over any
/// [`RpcTransport`].
pub struct SnapcastAdapter<T> {
    transport: T,
}

impl<T: RpcTransport> SnapcastAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: RpcTransport> AudioServer for SnapcastAdapter<T> {
    fn backend(&self) -> &'static str {
        self.transport.name()
    }

    async fn get_status(&self) -> AdapterResult<ServerStatus> {
        let result = self
            .transport
            .call(METHOD_SERVER_GET_STATUS, json!({}))
            .await?;
        let parsed: GetStatusResult =
            serde_json::from_value(result).map_err(|e| AdapterError::Parse(e.to_string()))?;
        Ok(parsed.server)
    }

    async fn set_client_volume(
        &self,
        client_id: &str,
        volume: Percent,
        muted: bool,
    ) -> AdapterResult<()> {
        let params = json!({
            "id": client_id,
            "volume": { "percent": volume.value(), "muted": muted },
        });
        self.transport
            .call(METHOD_CLIENT_SET_VOLUME, params)
            .await
            .map(|_| ())
    }

    async fn set_client_stream(&self, client_id: &str, stream_id: &str) -> AdapterResult<()> {
        let params = json!({ "id": client_id, "stream_id": stream_id });
        self.transport
            .call(METHOD_CLIENT_SET_STREAM, params)
            .await
            .map(|_| ())
    }

    fn subscribe_updates(&self) -> Option<broadcast::Receiver<ServerUpdate>> {
        self.transport.subscribe_updates()
    }
}

/// Builds the configured audio-server backend.
///
/// The TCP backend connects immediately; the HTTP backend connects per call.
pub async fn connect_audio_server(
    config: &AudioServerConfig,
) -> AdapterResult<Arc<dyn AudioServer>> {
    let timeout = config.request_timeout_secs.map(Duration::from_secs);
    match config.transport {
        AudioServerTransport::Http => {
            let transport = HttpRpcTransport::new(config.http_endpoint(), timeout)?;
            log::info!("[RPC] Using HTTP transport: {}", transport.endpoint());
            Ok(Arc::new(SnapcastAdapter::new(transport)))
        }
        AudioServerTransport::Tcp => {
            let addr = config.socket_addr();
            let transport = TcpRpcTransport::connect(&addr, timeout).await?;
            log::info!("[RPC] Connected TCP control channel to {}", addr);
            Ok(Arc::new(SnapcastAdapter::new(transport)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Transport that records calls and replays a canned result.
    struct RecordingTransport {
        calls: Mutex<Vec<(String, Value)>>,
        result: Value,
    }

    impl RecordingTransport {
        fn new(result: Value) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                result,
            }
        }
    }

    #[async_trait]
    impl RpcTransport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn call(&self, method: &str, params: Value) -> AdapterResult<Value> {
            self.calls.lock().push((method.to_string(), params));
            Ok(self.result.clone())
        }
    }

    #[tokio::test]
    async fn set_client_volume_sends_snapcast_params() {
        let adapter = SnapcastAdapter::new(RecordingTransport::new(json!({})));
        adapter
            .set_client_volume("c1", Percent::new(40).unwrap(), false)
            .await
            .unwrap();

        let calls = adapter.transport.calls.lock();
        assert_eq!(calls[0].0, "Client.SetVolume");
        assert_eq!(
            calls[0].1,
            json!({ "id": "c1", "volume": { "percent": 40, "muted": false } })
        );
    }

    #[tokio::test]
    async fn set_client_stream_sends_stream_id() {
        let adapter = SnapcastAdapter::new(RecordingTransport::new(json!({})));
        adapter.set_client_stream("c1", "radio").await.unwrap();

        let calls = adapter.transport.calls.lock();
        assert_eq!(calls[0].0, "Client.SetStream");
        assert_eq!(calls[0].1, json!({ "id": "c1", "stream_id": "radio" }));
    }

    #[tokio::test]
    async fn resolve_client_scans_status() {
        let status = test_fixtures::status_json();
        let adapter = SnapcastAdapter::new(RecordingTransport::new(status));

        let info = adapter.resolve_client("c2").await.unwrap().unwrap();
        assert_eq!(info.host, "192.168.1.21");
        assert!(adapter.resolve_client("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_status_is_a_parse_error() {
        let adapter = SnapcastAdapter::new(RecordingTransport::new(json!({ "unexpected": 1 })));
        let err = adapter.get_status().await.unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
    }
}
