//! Dashboard page and per-connection session state.
//!
//! Each dashboard socket owns one [`DashboardSession`]. It keeps the last
//! fetched client list plus the speaker table (volume and mute per speaker),
//! which exists only here: devices are never asked for their current speaker
//! levels, so what the session last sent is what it shows.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{PibardError, PibardResult};
use crate::model::{GroupView, Percent, StreamView};
use crate::protocol_constants::{DEFAULT_SPEAKER_VOLUME, MAX_SPEAKER_COUNT};

/// The dashboard page served at `/`.
pub const INDEX_HTML: &str = include_str!("../../assets/index.html");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpeakerState {
    /// Last volume the user chose; kept while muted.
    pub volume: Percent,
    pub muted: bool,
}

impl Default for SpeakerState {
    fn default() -> Self {
        Self {
            volume: Percent::clamped(i64::from(DEFAULT_SPEAKER_VOLUME)),
            muted: false,
        }
    }
}

/// Volume change a session operation asks the gateway to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerCommand {
    pub client_id: String,
    pub speaker: u8,
    pub volume: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerCard {
    pub index: u8,
    pub volume: Percent,
    pub muted: bool,
}

/// One client as rendered on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCard {
    pub id: String,
    pub name: String,
    pub host: String,
    pub group_id: String,
    pub group_name: String,
    pub stream_id: String,
    pub volume: Percent,
    pub muted: bool,
    pub connected: bool,
    pub speakers: Vec<SpeakerCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub cards: Vec<ClientCard>,
    pub streams: Vec<StreamView>,
}

/// Per-connection dashboard state.
#[derive(Debug)]
pub struct DashboardSession {
    default_speaker_count: u8,
    groups: Vec<GroupView>,
    streams: BTreeMap<String, StreamView>,
    speakers: HashMap<(String, u8), SpeakerState>,
    speaker_counts: HashMap<String, u8>,
}

impl DashboardSession {
    pub fn new(default_speaker_count: u8) -> Self {
        Self {
            default_speaker_count: default_speaker_count.clamp(1, MAX_SPEAKER_COUNT),
            groups: Vec::new(),
            streams: BTreeMap::new(),
            speakers: HashMap::new(),
            speaker_counts: HashMap::new(),
        }
    }

    /// Replaces the client list wholesale.
    pub fn apply_clients(&mut self, groups: Vec<GroupView>) {
        self.groups = groups;
    }

    pub fn apply_streams(&mut self, streams: BTreeMap<String, StreamView>) {
        self.streams = streams;
    }

    pub fn speaker_count(&self, client_id: &str) -> u8 {
        self.speaker_counts
            .get(client_id)
            .copied()
            .unwrap_or(self.default_speaker_count)
    }

    pub fn speaker(&self, client_id: &str, speaker: u8) -> SpeakerState {
        self.speakers
            .get(&(client_id.to_string(), speaker))
            .copied()
            .unwrap_or_default()
    }

    /// Stores `volume` for the speaker and unmutes it.
    pub fn set_speaker_volume(
        &mut self,
        client_id: &str,
        speaker: u8,
        volume: Percent,
    ) -> PibardResult<SpeakerCommand> {
        self.check_speaker(client_id, speaker)?;
        let entry = self.entry(client_id, speaker);
        entry.volume = volume;
        entry.muted = false;
        Ok(SpeakerCommand {
            client_id: client_id.to_string(),
            speaker,
            volume,
        })
    }

    /// Muting sends 0 and keeps the stored volume; unmuting sends it back.
    pub fn toggle_speaker_mute(
        &mut self,
        client_id: &str,
        speaker: u8,
    ) -> PibardResult<SpeakerCommand> {
        self.check_speaker(client_id, speaker)?;
        let entry = self.entry(client_id, speaker);
        entry.muted = !entry.muted;
        let volume = if entry.muted {
            Percent::MIN
        } else {
            entry.volume
        };
        Ok(SpeakerCommand {
            client_id: client_id.to_string(),
            speaker,
            volume,
        })
    }

    pub fn set_speaker_count(&mut self, client_id: &str, count: u8) -> PibardResult<()> {
        if count == 0 || count > MAX_SPEAKER_COUNT {
            return Err(PibardError::InvalidRequest(format!(
                "speaker count must be between 1 and {}",
                MAX_SPEAKER_COUNT
            )));
        }
        self.speaker_counts.insert(client_id.to_string(), count);
        Ok(())
    }

    /// Renders the current state.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let cards = self
            .groups
            .iter()
            .flat_map(|group| {
                group.clients.iter().map(move |client| (group, client))
            })
            .map(|(group, client)| {
                let speakers = (1..=self.speaker_count(&client.id))
                    .map(|index| {
                        let state = self.speaker(&client.id, index);
                        SpeakerCard {
                            index,
                            volume: state.volume,
                            muted: state.muted,
                        }
                    })
                    .collect();
                ClientCard {
                    id: client.id.clone(),
                    name: client.name.clone(),
                    host: client.host.clone(),
                    group_id: group.id.clone(),
                    group_name: group.name.clone(),
                    stream_id: group.stream_id.clone(),
                    volume: client.volume,
                    muted: client.muted,
                    connected: client.connected,
                    speakers,
                }
            })
            .collect();

        DashboardSnapshot {
            cards,
            streams: self.streams.values().cloned().collect(),
        }
    }

    fn check_speaker(&self, client_id: &str, speaker: u8) -> PibardResult<()> {
        let count = self.speaker_count(client_id);
        if speaker == 0 || speaker > count {
            return Err(PibardError::InvalidRequest(format!(
                "speaker {} out of range 1..={} for {}",
                speaker, count, client_id
            )));
        }
        Ok(())
    }

    fn entry(&mut self, client_id: &str, speaker: u8) -> &mut SpeakerState {
        self.speakers
            .entry((client_id.to_string(), speaker))
            .or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_server::test_fixtures;

    fn pct(v: u8) -> Percent {
        Percent::new(v).unwrap()
    }

    #[test]
    fn new_speakers_default_to_seventy_unmuted() {
        let session = DashboardSession::new(2);
        assert_eq!(
            session.speaker("c1", 1),
            SpeakerState {
                volume: pct(70),
                muted: false
            }
        );
    }

    #[test]
    fn mute_then_unmute_restores_previous_volume() {
        let mut session = DashboardSession::new(2);
        session.set_speaker_volume("c1", 2, pct(45)).unwrap();

        let mute = session.toggle_speaker_mute("c1", 2).unwrap();
        assert_eq!(mute.volume, Percent::MIN);
        assert!(session.speaker("c1", 2).muted);
        assert_eq!(session.speaker("c1", 2).volume, pct(45));

        let unmute = session.toggle_speaker_mute("c1", 2).unwrap();
        assert_eq!(unmute.volume, pct(45));
        assert!(!session.speaker("c1", 2).muted);
    }

    #[test]
    fn setting_volume_clears_mute() {
        let mut session = DashboardSession::new(2);
        session.toggle_speaker_mute("c1", 1).unwrap();
        let cmd = session.set_speaker_volume("c1", 1, pct(20)).unwrap();
        assert_eq!(cmd.volume, pct(20));
        assert!(!session.speaker("c1", 1).muted);
    }

    #[test]
    fn speaker_index_is_bounded_by_count() {
        let mut session = DashboardSession::new(2);
        assert!(session.set_speaker_volume("c1", 3, pct(20)).is_err());
        assert!(session.set_speaker_volume("c1", 0, pct(20)).is_err());

        session.set_speaker_count("c1", 4).unwrap();
        assert!(session.set_speaker_volume("c1", 3, pct(20)).is_ok());
        assert!(session.set_speaker_count("c1", 0).is_err());
        assert!(session.set_speaker_count("c1", MAX_SPEAKER_COUNT + 1).is_err());
    }

    #[test]
    fn snapshot_renders_one_card_per_client() {
        let status = test_fixtures::status();
        let mut session = DashboardSession::new(2);
        session.apply_clients(status.group_views());
        session.apply_streams(status.stream_views());
        session.set_speaker_count("c2", 3).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.cards.len(), 2);
        assert_eq!(snapshot.cards[0].speakers.len(), 2);
        assert_eq!(snapshot.cards[1].speakers.len(), 3);
        assert_eq!(snapshot.cards[1].stream_id, "radio");
        assert_eq!(snapshot.streams.len(), 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["cards"][0]["groupId"], "g1");
        assert_eq!(json["cards"][0]["speakers"][0]["volume"], 70);
    }

    #[test]
    fn apply_clients_replaces_previous_list() {
        let status = test_fixtures::status();
        let mut session = DashboardSession::new(2);
        session.apply_clients(status.group_views());
        session.apply_clients(Vec::new());
        assert!(session.snapshot().cards.is_empty());
    }
}
