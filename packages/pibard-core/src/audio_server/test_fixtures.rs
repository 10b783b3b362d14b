//! Shared test fixtures for audio-server status payloads and a mock backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use super::{AdapterError, AdapterResult, AudioServer, ServerUpdate};
use crate::model::{GetStatusResult, Percent, ServerStatus};

/// `Server.GetStatus` result with two groups, one client each, and two streams.
pub fn status_json() -> Value {
    json!({
        "server": {
            "groups": [
                {
                    "id": "g1",
                    "name": "Kitchen",
                    "stream_id": "default",
                    "muted": false,
                    "clients": [{
                        "id": "c1",
                        "connected": true,
                        "host": { "ip": "192.168.1.20", "name": "kitchen-pi", "mac": "b8:27:eb:00:00:01" },
                        "config": { "name": "Kitchen", "latency": 0, "volume": { "percent": 35, "muted": false } }
                    }]
                },
                {
                    "id": "g2",
                    "name": "",
                    "stream_id": "radio",
                    "muted": false,
                    "clients": [{
                        "id": "c2",
                        "connected": false,
                        "host": { "ip": "192.168.1.21", "name": "porch-pi", "mac": "b8:27:eb:00:00:02" },
                        "config": { "name": "", "latency": 0, "volume": { "percent": 80, "muted": true } }
                    }]
                }
            ],
            "streams": [
                {
                    "id": "default",
                    "status": "playing",
                    "uri": { "raw": "pipe:///tmp/snapfifo?name=Spotify", "query": { "name": "Spotify" } },
                    "properties": {}
                },
                {
                    "id": "radio",
                    "status": "idle",
                    "uri": { "raw": "pipe:///tmp/radio?name=Radio", "query": { "name": "Radio" } },
                    "properties": { "name": "Web Radio" }
                }
            ]
        }
    })
}

/// Parsed form of [`status_json`].
pub fn status() -> ServerStatus {
    serde_json::from_value::<GetStatusResult>(status_json())
        .expect("fixture parses")
        .server
}

/// Call recorded by [`MockAudioServer`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    GetStatus,
    SetVolume(String, u8, bool),
    SetStream(String, String),
}

/// In-memory audio server.
///
/// Writes mutate the held status so a following `get_status` observes them;
/// unknown client ids fail like a real server's RPC error.
pub struct MockAudioServer {
    status: Mutex<ServerStatus>,
    calls: Mutex<Vec<MockCall>>,
    fail: Mutex<bool>,
    updates: Option<broadcast::Sender<ServerUpdate>>,
}

impl MockAudioServer {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(status()),
            calls: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
            updates: None,
        }
    }

    pub fn empty() -> Self {
        let mock = Self::new();
        *mock.status.lock() = ServerStatus::default();
        mock
    }

    /// Mock that also exposes a notification channel.
    pub fn with_updates() -> (Self, broadcast::Sender<ServerUpdate>) {
        let (tx, _) = broadcast::channel(16);
        let mut mock = Self::new();
        mock.updates = Some(tx.clone());
        (mock, tx)
    }

    /// Makes every subsequent call fail with a transport error.
    pub fn fail_all(&self) {
        *self.fail.lock() = true;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    fn check(&self) -> AdapterResult<()> {
        if *self.fail.lock() {
            Err(AdapterError::Closed)
        } else {
            Ok(())
        }
    }

    fn unknown_client(client_id: &str) -> AdapterError {
        AdapterError::Rpc {
            code: -32603,
            message: format!("Client not found: {}", client_id),
        }
    }
}

#[async_trait]
impl AudioServer for MockAudioServer {
    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn get_status(&self) -> AdapterResult<ServerStatus> {
        self.calls.lock().push(MockCall::GetStatus);
        self.check()?;
        Ok(self.status.lock().clone())
    }

    async fn set_client_volume(
        &self,
        client_id: &str,
        volume: Percent,
        muted: bool,
    ) -> AdapterResult<()> {
        self.calls
            .lock()
            .push(MockCall::SetVolume(client_id.to_string(), volume.value(), muted));
        self.check()?;

        let mut status = self.status.lock();
        let client = status
            .groups
            .iter_mut()
            .flat_map(|g| g.clients.iter_mut())
            .find(|c| c.id == client_id)
            .ok_or_else(|| Self::unknown_client(client_id))?;
        client.config.volume.percent = volume;
        client.config.volume.muted = muted;
        Ok(())
    }

    async fn set_client_stream(&self, client_id: &str, stream_id: &str) -> AdapterResult<()> {
        self.calls
            .lock()
            .push(MockCall::SetStream(client_id.to_string(), stream_id.to_string()));
        self.check()?;

        let mut status = self.status.lock();
        let group = status
            .groups
            .iter_mut()
            .find(|g| g.clients.iter().any(|c| c.id == client_id))
            .ok_or_else(|| Self::unknown_client(client_id))?;
        group.stream_id = stream_id.to_string();
        Ok(())
    }

    fn subscribe_updates(&self) -> Option<broadcast::Receiver<ServerUpdate>> {
        self.updates.as_ref().map(|tx| tx.subscribe())
    }
}
