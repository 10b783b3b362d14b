//! Data model for Snapcast server state and the views served to the dashboard.
//!
//! The upstream types mirror the JSON returned by `Server.GetStatus` closely
//! enough to deserialize it; fields the gateway never reads are ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::SINK_NAME_PREFIX;

// ─────────────────────────────────────────────────────────────────────────────
// Percent
// ─────────────────────────────────────────────────────────────────────────────

/// A volume level in percent, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Percent(u8);

impl Percent {
    pub const MIN: Percent = Percent(0);
    pub const MAX: Percent = Percent(100);

    /// Returns `None` when `value` is above 100.
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (value <= 100).then_some(Self(value))
    }

    /// Clamps any integer into range.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Percent {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=100).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(format!("volume {} is outside 0-100", value))
        }
    }
}

impl From<Percent> for u8 {
    fn from(p: Percent) -> Self {
        p.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the mixer sink addressed by a speaker index.
#[must_use]
pub fn sink_name(speaker: u8) -> String {
    format!("{}{}", SINK_NAME_PREFIX, speaker)
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream (Snapcast) Types
// ─────────────────────────────────────────────────────────────────────────────

/// `result` of a `Server.GetStatus` call.
#[derive(Debug, Clone, Deserialize)]
pub struct GetStatusResult {
    pub server: ServerStatus,
}

/// Groups and streams known to the audio server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stream_id: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub clients: Vec<Client>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub host: Host,
    pub config: ClientConfig,
    #[serde(default)]
    pub connected: bool,
}

impl Client {
    /// Configured name, falling back to the host name.
    pub fn display_name(&self) -> &str {
        if self.config.name.is_empty() {
            &self.host.name
        } else {
            &self.config.name
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mac: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub name: String,
    pub volume: Volume,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub percent: Percent,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub uri: Option<StreamUri>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamUri {
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

impl Stream {
    /// `properties.name`, then `uri.query.name`, then the id.
    pub fn display_name(&self) -> &str {
        self.properties
            .get("name")
            .and_then(|v| v.as_str())
            .or_else(|| {
                self.uri
                    .as_ref()
                    .and_then(|u| u.query.get("name"))
                    .map(String::as_str)
            })
            .unwrap_or(&self.id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution & Views
// ─────────────────────────────────────────────────────────────────────────────

/// Host/name pair resolved for a client id, used to address per-speaker commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: String,
    /// IP address reported by the server.
    pub host: String,
    /// Hostname reported by the device; may be empty.
    pub host_name: String,
    pub name: String,
}

impl ClientInfo {
    /// Identifier a mixer agent on this device listens under: its hostname,
    /// or the client id when the server reports none.
    pub fn device_id(&self) -> &str {
        if self.host_name.is_empty() {
            &self.id
        } else {
            &self.host_name
        }
    }
}

/// Flattened client as served by `GET /api/clients`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub id: String,
    pub name: String,
    pub host: String,
    pub volume: Percent,
    pub muted: bool,
    pub connected: bool,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: String,
    pub name: String,
    pub stream_id: String,
    pub muted: bool,
    pub clients: Vec<ClientView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamView {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl ServerStatus {
    /// Scans every group for `client_id`.
    pub fn find_client(&self, client_id: &str) -> Option<ClientInfo> {
        self.groups
            .iter()
            .flat_map(|g| g.clients.iter())
            .find(|c| c.id == client_id)
            .map(|c| ClientInfo {
                id: c.id.clone(),
                host: c.host.ip.clone(),
                host_name: c.host.name.clone(),
                name: c.display_name().to_string(),
            })
    }

    pub fn group_views(&self) -> Vec<GroupView> {
        self.groups
            .iter()
            .map(|g| GroupView {
                id: g.id.clone(),
                name: g.name.clone(),
                stream_id: g.stream_id.clone(),
                muted: g.muted,
                clients: g
                    .clients
                    .iter()
                    .map(|c| ClientView {
                        id: c.id.clone(),
                        name: c.display_name().to_string(),
                        host: c.host.ip.clone(),
                        volume: c.config.volume.percent,
                        muted: c.config.volume.muted,
                        connected: c.connected,
                        group: g.id.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Streams keyed by id.
    pub fn stream_views(&self) -> BTreeMap<String, StreamView> {
        self.streams
            .iter()
            .map(|s| {
                (
                    s.id.clone(),
                    StreamView {
                        id: s.id.clone(),
                        name: s.display_name().to_string(),
                        status: s.status.clone(),
                    },
                )
            })
            .collect()
    }
}
