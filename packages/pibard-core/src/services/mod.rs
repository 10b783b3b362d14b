//! Application services layer.
//!
//! Orchestrates between the API layer and infrastructure (audio server,
//! mixer, MQTT).

pub mod response_bridge;
pub mod speaker_control;
pub mod speaker_volume;

pub use response_bridge::{parse_client_response, run_response_bridge};
pub use speaker_control::{
    MqttSpeakerControl, SpeakerControl, SpeakerControlError, SshSpeakerControl,
};
pub use speaker_volume::set_speaker_volume;
