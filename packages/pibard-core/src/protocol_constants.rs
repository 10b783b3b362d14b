//! Fixed protocol constants shared by the gateway and the mixer agent.
//!
//! Topic layouts, RPC method names and payload shapes are part of the wire
//! contract with Snapcast, the dashboard and deployed agents. Changing them
//! breaks compatibility with devices already in the field.

// ─────────────────────────────────────────────────────────────────────────────
// Service Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in logs and health responses.
pub const APP_NAME: &str = "PiBard";

/// Service identifier returned by `/health`.
pub const SERVICE_ID: &str = "pibard-gateway";

// ─────────────────────────────────────────────────────────────────────────────
// Snapcast JSON-RPC
// ─────────────────────────────────────────────────────────────────────────────

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Full server status query (groups, clients, streams).
pub const METHOD_SERVER_GET_STATUS: &str = "Server.GetStatus";

/// Sets a client's volume percent and mute flag.
pub const METHOD_CLIENT_SET_VOLUME: &str = "Client.SetVolume";

/// Assigns a stream to a client.
pub const METHOD_CLIENT_SET_STREAM: &str = "Client.SetStream";

/// Default Snapcast HTTP control port (`/jsonrpc` endpoint).
pub const DEFAULT_SNAPCAST_HTTP_PORT: u16 = 1780;

/// Default Snapcast raw TCP control port (newline-delimited JSON-RPC).
pub const DEFAULT_SNAPCAST_TCP_PORT: u16 = 1705;

/// Path of the JSON-RPC endpoint on the Snapcast HTTP server.
pub const SNAPCAST_JSONRPC_PATH: &str = "/jsonrpc";

// ─────────────────────────────────────────────────────────────────────────────
// MQTT
// ─────────────────────────────────────────────────────────────────────────────

/// Default topic prefix for all PiBard topics.
pub const DEFAULT_TOPIC_PREFIX: &str = "pibard";

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Keep-alive interval for broker connections (seconds).
pub const MQTT_KEEP_ALIVE_SECS: u64 = 30;

/// Capacity of the rumqttc request channel.
pub const MQTT_REQUEST_CAPACITY: usize = 32;

/// Delay before polling the event loop again after a connection error.
pub const MQTT_RECONNECT_DELAY_MS: u64 = 1000;

/// Prefix for the agent's MQTT client identifier (`pibard-client-{id}`).
pub const AGENT_MQTT_CLIENT_PREFIX: &str = "pibard-client-";

/// Prefix for the gateway's MQTT client identifier.
pub const GATEWAY_MQTT_CLIENT_PREFIX: &str = "pibard-gateway-";

/// Only command action understood by the mixer agent.
pub const ACTION_SET_VOLUME: &str = "setVolume";

// ─────────────────────────────────────────────────────────────────────────────
// Mixer
// ─────────────────────────────────────────────────────────────────────────────

/// Sink name prefix; speaker `n` maps to sink `speaker{n}`.
pub const SINK_NAME_PREFIX: &str = "speaker";

/// Default mixer program.
pub const DEFAULT_PACTL_PROGRAM: &str = "pactl";

/// Default remote shell program.
pub const DEFAULT_SSH_PROGRAM: &str = "ssh";

/// Grace period between publishing the offline status and disconnecting.
pub const SHUTDOWN_GRACE_MS: u64 = 500;

// ─────────────────────────────────────────────────────────────────────────────
// Gateway / Dashboard
// ─────────────────────────────────────────────────────────────────────────────

/// Default HTTP listen port for the gateway.
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Capacity of the broadcast channel feeding WebSocket sessions.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Speakers shown per client until the session says otherwise.
pub const DEFAULT_SPEAKER_COUNT: u8 = 2;

/// Upper bound for per-client speaker count in a dashboard session.
pub const MAX_SPEAKER_COUNT: u8 = 8;

/// Initial volume for a speaker the session has not touched yet.
pub const DEFAULT_SPEAKER_VOLUME: u8 = 70;
