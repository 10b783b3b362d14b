//! Command and status payloads exchanged with the mixer agent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Percent;
use crate::protocol_constants::ACTION_SET_VOLUME;

/// Why an inbound command could not be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid command payload: {0}")]
    Malformed(String),

    #[error("Unknown command: {0}")]
    UnknownAction(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

/// A validated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentCommand {
    SetVolume { speaker: u8, volume: Percent },
}

/// Wire shape before validation; every field but `action` may be absent.
#[derive(Debug, Deserialize)]
struct RawCommand {
    action: String,
    #[serde(default)]
    speaker: Option<i64>,
    #[serde(default)]
    volume: Option<i64>,
}

impl AgentCommand {
    /// Parses `{action, speaker, volume}`.
    ///
    /// The action is checked before the other fields, so an unknown action is
    /// reported as such even when the rest of the payload is incomplete.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let raw: RawCommand =
            serde_json::from_slice(payload).map_err(|e| CommandError::Malformed(e.to_string()))?;

        if raw.action != ACTION_SET_VOLUME {
            return Err(CommandError::UnknownAction(raw.action));
        }

        let speaker = raw.speaker.ok_or(CommandError::MissingField("speaker"))?;
        let volume = raw.volume.ok_or(CommandError::MissingField("volume"))?;

        let speaker = u8::try_from(speaker)
            .ok()
            .filter(|s| *s >= 1)
            .ok_or(CommandError::OutOfRange {
                field: "speaker",
                value: speaker,
            })?;
        let volume = Percent::try_from(volume).map_err(|_| CommandError::OutOfRange {
            field: "volume",
            value: volume,
        })?;

        Ok(Self::SetVolume { speaker, volume })
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::SetVolume { .. } => ACTION_SET_VOLUME,
        }
    }
}

/// Status published on the device's response topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AgentStatus {
    Online {
        client: String,
    },
    Offline {
        client: String,
    },
    Success {
        action: String,
        speaker: u8,
        volume: Percent,
    },
    Error {
        message: String,
    },
}

impl AgentStatus {
    pub fn error(err: impl ToString) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}
