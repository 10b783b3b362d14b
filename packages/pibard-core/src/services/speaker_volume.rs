//! Per-speaker volume orchestration.

use crate::audio_server::AudioServer;
use crate::error::{PibardError, PibardResult};
use crate::model::Percent;
use crate::services::speaker_control::SpeakerControl;

/// Resolves `client_id` through the audio server, then hands the change to
/// the configured speaker backend.
///
/// Client resolution always re-reads the server status.
pub async fn set_speaker_volume(
    audio_server: &dyn AudioServer,
    control: &dyn SpeakerControl,
    client_id: &str,
    speaker: u8,
    volume: Percent,
) -> PibardResult<()> {
    if speaker == 0 {
        return Err(PibardError::InvalidRequest(
            "speaker index starts at 1".to_string(),
        ));
    }

    let client = audio_server
        .resolve_client(client_id)
        .await?
        .ok_or_else(|| PibardError::ClientNotFound(client_id.to_string()))?;

    log::debug!(
        "[Speakers] {} ({}) speaker {} -> {}% via {}",
        client.id,
        client.host,
        speaker,
        volume,
        control.backend()
    );
    control.set_speaker_volume(&client, speaker, volume).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio_server::test_fixtures::MockAudioServer;
    use crate::mixer::MixerError;
    use crate::model::ClientInfo;
    use crate::services::speaker_control::SpeakerControlError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records every delivered command; optionally fails.
    #[derive(Default)]
    pub(crate) struct RecordingSpeakerControl {
        pub calls: Mutex<Vec<(String, String, u8, u8)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl SpeakerControl for RecordingSpeakerControl {
        fn backend(&self) -> &'static str {
            "recording"
        }

        async fn set_speaker_volume(
            &self,
            client: &ClientInfo,
            speaker: u8,
            volume: Percent,
        ) -> Result<(), SpeakerControlError> {
            if self.fail {
                return Err(SpeakerControlError::Mixer(MixerError::Spawn {
                    program: "ssh".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                }));
            }
            self.calls.lock().push((
                client.id.clone(),
                client.host.clone(),
                speaker,
                volume.value(),
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn resolves_host_before_dispatch() {
        let server = MockAudioServer::new();
        let control = RecordingSpeakerControl::default();

        set_speaker_volume(&server, &control, "c2", 2, Percent::new(55).unwrap())
            .await
            .unwrap();

        assert_eq!(
            *control.calls.lock(),
            vec![("c2".to_string(), "192.168.1.21".to_string(), 2, 55)]
        );
    }

    #[tokio::test]
    async fn unknown_client_is_not_dispatched() {
        let server = MockAudioServer::empty();
        let control = RecordingSpeakerControl::default();

        let err = set_speaker_volume(&server, &control, "c1", 2, Percent::new(55).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, PibardError::ClientNotFound(ref id) if id == "c1"));
        assert!(control.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn speaker_zero_is_rejected() {
        let server = MockAudioServer::new();
        let control = RecordingSpeakerControl::default();

        let err = set_speaker_volume(&server, &control, "c1", 0, Percent::new(55).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PibardError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let server = MockAudioServer::new();
        let control = RecordingSpeakerControl {
            fail: true,
            ..Default::default()
        };

        let err = set_speaker_volume(&server, &control, "c1", 1, Percent::new(10).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "mixer_spawn_failed");
    }
}
