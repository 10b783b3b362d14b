//! Local audio mixer control (`pactl set-sink-volume`).
//!
//! The agent runs the mixer on its own device; the gateway's `ssh` speaker
//! backend runs the same command on a remote device. Arguments are passed as
//! an argument vector, never through a local shell.

use std::io;
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::model::Percent;
use crate::protocol_constants::{DEFAULT_PACTL_PROGRAM, DEFAULT_SSH_PROGRAM};

#[derive(Debug, Error)]
pub enum MixerError {
    /// The mixer (or remote shell) could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The mixer ran but reported failure.
    #[error("Mixer command failed ({status}): {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Sets the volume of a named sink.
#[async_trait]
pub trait Mixer: Send + Sync {
    async fn set_sink_volume(&self, sink: &str, volume: Percent) -> Result<(), MixerError>;
}

/// Where the mixer program runs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Local,
    Remote { ssh_program: String, host: String },
}

/// [`Mixer`] backed by `pactl`, locally or on a remote host via `ssh`.
#[derive(Debug, Clone)]
pub struct PactlMixer {
    program: String,
    target: Target,
}

impl PactlMixer {
    /// Runs `program` on this machine.
    pub fn local(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            target: Target::Local,
        }
    }

    /// Runs `pactl` on `host` through `ssh`.
    pub fn remote(host: impl Into<String>) -> Self {
        Self {
            program: DEFAULT_PACTL_PROGRAM.to_string(),
            target: Target::Remote {
                ssh_program: DEFAULT_SSH_PROGRAM.to_string(),
                host: host.into(),
            },
        }
    }

    /// Program and argument vector for one volume change.
    fn command_line(&self, sink: &str, volume: Percent) -> (String, Vec<String>) {
        let level = format!("{}%", volume);
        match &self.target {
            Target::Local => (
                self.program.clone(),
                vec!["set-sink-volume".to_string(), sink.to_string(), level],
            ),
            // ssh joins the trailing arguments into one remote command string.
            Target::Remote { ssh_program, host } => (
                ssh_program.clone(),
                vec![
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                    host.clone(),
                    format!("{} set-sink-volume {} {}", self.program, sink, level),
                ],
            ),
        }
    }
}

impl Default for PactlMixer {
    fn default() -> Self {
        Self::local(DEFAULT_PACTL_PROGRAM)
    }
}

#[async_trait]
impl Mixer for PactlMixer {
    async fn set_sink_volume(&self, sink: &str, volume: Percent) -> Result<(), MixerError> {
        let (program, args) = self.command_line(sink, volume);
        log::debug!("[Mixer] {} {}", program, args.join(" "));

        let output = Command::new(&program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MixerError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(MixerError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
