//! PiBard Core - shared library for PiBard.
//!
//! PiBard is a control layer over a multi-room Snapcast installation. Each
//! playback device may drive several physical speakers through separate
//! PulseAudio sinks (`speaker1`, `speaker2`, ...), and PiBard lets a browser
//! dashboard adjust both the Snapcast client and each of those speakers.
//!
//! # Architecture
//!
//! - [`audio_server`]: Snapcast JSON-RPC adapter (HTTP or TCP transport)
//! - [`agent`]: mixer agent running on each device, fed over MQTT
//! - [`mixer`]: `pactl` invocation, local or over SSH
//! - [`services`]: per-speaker volume routing and the MQTT response bridge
//! - [`api`]: REST routes and the dashboard WebSocket
//! - [`dashboard`]: per-connection dashboard state and the served page
//! - [`events`]: event system for real-time dashboard updates
//! - [`bootstrap`]: gateway composition root
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! - [`AudioServer`](audio_server::AudioServer): client and stream operations
//! - [`SpeakerControl`](services::SpeakerControl): per-speaker delivery
//! - [`Mixer`](mixer::Mixer): sink volume on the local machine
//! - [`EventEmitter`](events::EventEmitter): emitting domain events

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod api;
pub mod audio_server;
pub mod bootstrap;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod mixer;
pub mod model;
pub mod mqtt;
pub mod protocol_constants;
pub mod services;

// Re-export commonly used types at the crate root
pub use agent::{AgentCommand, AgentState, AgentStatus, MixerAgent};
pub use audio_server::{connect_audio_server, AdapterError, AudioServer, ServerUpdate};
pub use config::{
    default_client_id, AgentConfig, AudioServerConfig, AudioServerTransport, GatewayConfig,
    MqttConfig, SpeakerBackend,
};
pub use error::{ErrorCode, PibardError, PibardResult};
pub use events::{BroadcastEvent, BroadcastEventBridge, ClientResponse, EventEmitter};
pub use mixer::{Mixer, MixerError, PactlMixer};
pub use model::{ClientInfo, Percent};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_gateway, bootstrap_with_audio_server, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError, WsConnectionManager};
