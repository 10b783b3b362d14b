//! Command dispatch with per-sink serialization.
//!
//! Each sink gets one worker task fed by an unbounded FIFO queue. Commands
//! for the same sink apply in arrival order; commands for different sinks
//! run concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rumqttc::{AsyncClient, QoS};
use thiserror::Error;
use tokio::sync::mpsc;

use super::command::{AgentCommand, AgentStatus};
use super::state::StateTracker;
use crate::mixer::Mixer;
use crate::model::{sink_name, Percent};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode status: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("MQTT publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}

/// Sink for agent status messages.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, status: &AgentStatus) -> Result<(), PublishError>;

    /// Non-blocking variant for use inside the event-loop task.
    fn try_publish(&self, status: &AgentStatus) -> Result<(), PublishError>;
}

/// Publishes statuses to the device's response topic.
pub struct MqttStatusPublisher {
    client: AsyncClient,
    topic: String,
}

impl MqttStatusPublisher {
    pub fn new(client: AsyncClient, topic: String) -> Self {
        Self { client, topic }
    }
}

#[async_trait]
impl StatusPublisher for MqttStatusPublisher {
    async fn publish(&self, status: &AgentStatus) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(status)?;
        self.client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    fn try_publish(&self, status: &AgentStatus) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(status)?;
        self.client
            .try_publish(&self.topic, QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Job {
    speaker: u8,
    volume: Percent,
}

/// Routes parsed commands to per-sink workers.
pub struct CommandDispatcher {
    mixer: Arc<dyn Mixer>,
    publisher: Arc<dyn StatusPublisher>,
    state: Arc<StateTracker>,
    workers: DashMap<String, mpsc::UnboundedSender<Job>>,
}

impl CommandDispatcher {
    pub fn new(
        mixer: Arc<dyn Mixer>,
        publisher: Arc<dyn StatusPublisher>,
        state: Arc<StateTracker>,
    ) -> Self {
        Self {
            mixer,
            publisher,
            state,
            workers: DashMap::new(),
        }
    }

    /// Handles one inbound command payload. Never fails; every outcome is
    /// reported as a status message.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, payload: &[u8]) {
        match AgentCommand::parse(payload) {
            Ok(AgentCommand::SetVolume { speaker, volume }) => {
                log::info!("[Agent] setVolume speaker={} volume={}", speaker, volume);
                self.enqueue(Job { speaker, volume });
            }
            Err(e) => {
                log::warn!("[Agent] Rejected command: {}", e);
                let publisher = Arc::clone(&self.publisher);
                tokio::spawn(async move {
                    publish_logged(publisher.as_ref(), &AgentStatus::error(e)).await;
                });
            }
        }
    }

    fn enqueue(&self, job: Job) {
        let sink = sink_name(job.speaker);
        let mut entry = self
            .workers
            .entry(sink.clone())
            .or_insert_with(|| self.spawn_worker(sink.clone()));

        if let Err(mpsc::error::SendError(job)) = entry.send(job) {
            // worker exited; replace it
            let tx = self.spawn_worker(sink);
            let _ = tx.send(job);
            *entry = tx;
        }
    }

    fn spawn_worker(&self, sink: String) -> mpsc::UnboundedSender<Job> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let mixer = Arc::clone(&self.mixer);
        let publisher = Arc::clone(&self.publisher);
        let state = Arc::clone(&self.state);

        log::debug!("[Agent] Starting worker for {}", sink);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                state.begin_execution();
                let status = match mixer.set_sink_volume(&sink, job.volume).await {
                    Ok(()) => {
                        log::info!("[Agent] {} set to {}%", sink, job.volume);
                        AgentStatus::Success {
                            action: AgentCommand::SetVolume {
                                speaker: job.speaker,
                                volume: job.volume,
                            }
                            .action()
                            .to_string(),
                            speaker: job.speaker,
                            volume: job.volume,
                        }
                    }
                    Err(e) => {
                        log::error!("[Agent] {} volume change failed: {}", sink, e);
                        AgentStatus::error(e)
                    }
                };
                publish_logged(publisher.as_ref(), &status).await;
                state.end_execution();
            }
            log::debug!("[Agent] Worker for {} stopped", sink);
        });
        tx
    }
}

async fn publish_logged(publisher: &dyn StatusPublisher, status: &AgentStatus) {
    if let Err(e) = publisher.publish(status).await {
        log::warn!("[Agent] Failed to publish status: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::AgentState;
    use crate::mixer::MixerError;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Records applied volumes; `speaker1` waits for `speaker2` when gated.
    struct MockMixer {
        applied: Mutex<Vec<(String, u8)>>,
        gate: Option<Notify>,
        fail_sink: Option<&'static str>,
    }

    impl MockMixer {
        fn new() -> Self {
            Self {
                applied: Mutex::new(Vec::new()),
                gate: None,
                fail_sink: None,
            }
        }
    }

    #[async_trait]
    impl Mixer for MockMixer {
        async fn set_sink_volume(&self, sink: &str, volume: Percent) -> Result<(), MixerError> {
            if let Some(gate) = &self.gate {
                match sink {
                    "speaker1" => gate.notified().await,
                    _ => gate.notify_one(),
                }
            }
            if self.fail_sink == Some(sink) {
                return Err(MixerError::Spawn {
                    program: "pactl".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            self.applied.lock().push((sink.to_string(), volume.value()));
            Ok(())
        }
    }

    /// Forwards every published status into a channel.
    struct ChannelPublisher(mpsc::UnboundedSender<AgentStatus>);

    #[async_trait]
    impl StatusPublisher for ChannelPublisher {
        async fn publish(&self, status: &AgentStatus) -> Result<(), PublishError> {
            self.try_publish(status)
        }

        fn try_publish(&self, status: &AgentStatus) -> Result<(), PublishError> {
            let _ = self.0.send(status.clone());
            Ok(())
        }
    }

    fn dispatcher(
        mixer: Arc<MockMixer>,
    ) -> (
        CommandDispatcher,
        mpsc::UnboundedReceiver<AgentStatus>,
        Arc<StateTracker>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(StateTracker::new());
        state.connected();
        state.ready();
        let dispatcher =
            CommandDispatcher::new(mixer, Arc::new(ChannelPublisher(tx)), Arc::clone(&state));
        (dispatcher, rx, state)
    }

    async fn next_status(rx: &mut mpsc::UnboundedReceiver<AgentStatus>) -> AgentStatus {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("status within timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn set_volume_runs_mixer_and_reports_success() {
        let mixer = Arc::new(MockMixer::new());
        let (dispatcher, mut rx, state) = dispatcher(Arc::clone(&mixer));

        dispatcher.dispatch(br#"{"action":"setVolume","speaker":1,"volume":30}"#);

        assert_eq!(
            next_status(&mut rx).await,
            AgentStatus::Success {
                action: "setVolume".into(),
                speaker: 1,
                volume: Percent::new(30).unwrap(),
            }
        );
        assert_eq!(*mixer.applied.lock(), vec![("speaker1".to_string(), 30)]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.current(), AgentState::Idle);
    }

    #[tokio::test]
    async fn unknown_action_never_reports_success() {
        let mixer = Arc::new(MockMixer::new());
        let (dispatcher, mut rx, _) = dispatcher(Arc::clone(&mixer));

        dispatcher.dispatch(br#"{"action":"reboot","speaker":1,"volume":30}"#);

        assert_eq!(
            next_status(&mut rx).await,
            AgentStatus::Error {
                message: "Unknown command: reboot".into()
            }
        );
        assert!(mixer.applied.lock().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_reports_error() {
        let mixer = Arc::new(MockMixer::new());
        let (dispatcher, mut rx, _) = dispatcher(mixer);

        dispatcher.dispatch(b"{\"action\":");

        assert!(matches!(next_status(&mut rx).await, AgentStatus::Error { .. }));
    }

    #[tokio::test]
    async fn mixer_failure_reports_error() {
        let mixer = Arc::new(MockMixer {
            fail_sink: Some("speaker2"),
            ..MockMixer::new()
        });
        let (dispatcher, mut rx, _) = dispatcher(mixer);

        dispatcher.dispatch(br#"{"action":"setVolume","speaker":2,"volume":10}"#);

        match next_status(&mut rx).await {
            AgentStatus::Error { message } => assert!(message.contains("pactl")),
            other => panic!("Expected error status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn same_sink_commands_apply_in_arrival_order() {
        let mixer = Arc::new(MockMixer::new());
        let (dispatcher, mut rx, _) = dispatcher(Arc::clone(&mixer));

        for volume in [10, 20, 30, 40] {
            let payload = format!(r#"{{"action":"setVolume","speaker":1,"volume":{}}}"#, volume);
            dispatcher.dispatch(payload.as_bytes());
        }
        for _ in 0..4 {
            next_status(&mut rx).await;
        }

        let volumes: Vec<u8> = mixer.applied.lock().iter().map(|(_, v)| *v).collect();
        assert_eq!(volumes, vec![10, 20, 30, 40]);
    }

    #[tokio::test]
    async fn different_sinks_run_concurrently() {
        // speaker1 blocks until speaker2 has run; serializing across sinks would stall.
        let mixer = Arc::new(MockMixer {
            gate: Some(Notify::new()),
            ..MockMixer::new()
        });
        let (dispatcher, mut rx, _) = dispatcher(Arc::clone(&mixer));

        dispatcher.dispatch(br#"{"action":"setVolume","speaker":1,"volume":10}"#);
        dispatcher.dispatch(br#"{"action":"setVolume","speaker":2,"volume":20}"#);

        next_status(&mut rx).await;
        next_status(&mut rx).await;
        assert_eq!(mixer.applied.lock().len(), 2);
    }
}
