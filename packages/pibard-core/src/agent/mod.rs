//! Mixer agent.
//!
//! Runs on each playback device. Listens on `{prefix}/clients/{id}/command`,
//! applies volume changes through the local [`Mixer`], and reports results on
//! `{prefix}/clients/{id}/response`.

mod command;
mod dispatch;
mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{Event, EventLoop, Packet, QoS};

use crate::config::AgentConfig;
use crate::mixer::Mixer;
use crate::mqtt;
use crate::protocol_constants::MQTT_RECONNECT_DELAY_MS;

pub use command::{AgentCommand, AgentStatus, CommandError};
pub use dispatch::{CommandDispatcher, MqttStatusPublisher, PublishError, StatusPublisher};
pub use state::{AgentState, StateTracker};

/// A configured agent, ready to [`run`](MixerAgent::run).
pub struct MixerAgent {
    config: AgentConfig,
    mixer: Arc<dyn Mixer>,
    state: Arc<StateTracker>,
}

impl MixerAgent {
    pub fn new(config: AgentConfig, mixer: Arc<dyn Mixer>) -> Self {
        Self {
            config,
            mixer,
            state: Arc::new(StateTracker::new()),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state.current()
    }

    /// Drives the MQTT connection until `shutdown` resolves, then announces
    /// offline and disconnects.
    ///
    /// Connection errors are logged and retried after a fixed delay.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let client_id = self.config.client_id.clone();
        let prefix = self.config.mqtt.topic_prefix.clone();
        let command_topic = mqtt::command_topic(&prefix, &client_id);
        let response_topic = mqtt::response_topic(&prefix, &client_id);

        let (client, mut eventloop) = mqtt::connect(&self.config.mqtt, &self.config.mqtt_client_id());
        let publisher = Arc::new(MqttStatusPublisher::new(client.clone(), response_topic));
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&self.mixer),
            Arc::clone(&publisher) as Arc<dyn StatusPublisher>,
            Arc::clone(&self.state),
        );

        log::info!("[Agent] Starting agent for client {}", client_id);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        on_connack(&self.state, publisher.as_ref(), &client_id, &command_topic, |topic| {
                            client.try_subscribe(topic, QoS::AtLeastOnce)
                        });
                    }
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        if p.topic == command_topic {
                            dispatcher.dispatch(&p.payload);
                        } else {
                            log::debug!("[Agent] Ignoring message on {}", p.topic);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if self.state.current() != AgentState::Disconnected {
                            log::warn!("[Agent] Connection lost: {}", e);
                        } else {
                            log::debug!("[Agent] Connection attempt failed: {}", e);
                        }
                        self.state.disconnected();
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(Duration::from_millis(MQTT_RECONNECT_DELAY_MS)) => {}
                        }
                    }
                }
            }
        }

        log::info!("[Agent] Shutting down");
        on_shutdown(publisher.as_ref(), &client_id);
        drive_for(&mut eventloop, Duration::from_millis(self.config.shutdown_grace_ms)).await;

        if let Err(e) = client.try_disconnect() {
            log::debug!("[Agent] Disconnect request failed: {}", e);
        }
        drive_for(&mut eventloop, Duration::from_millis(100)).await;
        self.state.disconnected();
    }
}

/// Broker accepted the connection: subscribe, announce online, go idle.
///
/// Runs on every (re)connect; a failed subscribe is logged and the agent
/// still announces itself.
fn on_connack<S>(
    state: &StateTracker,
    publisher: &dyn StatusPublisher,
    client_id: &str,
    command_topic: &str,
    subscribe: S,
) where
    S: FnOnce(&str) -> Result<(), rumqttc::ClientError>,
{
    state.connected();
    match subscribe(command_topic) {
        Ok(()) => log::info!("[Agent] Subscribed to {}", command_topic),
        Err(e) => log::error!("[Agent] Failed to subscribe to {}: {}", command_topic, e),
    }
    let online = AgentStatus::Online {
        client: client_id.to_string(),
    };
    if let Err(e) = publisher.try_publish(&online) {
        log::warn!("[Agent] Failed to announce online: {}", e);
    }
    state.ready();
}

/// Queues the offline status. The caller keeps the event loop running for
/// the grace period so it reaches the broker before the disconnect.
fn on_shutdown(publisher: &dyn StatusPublisher, client_id: &str) {
    let offline = AgentStatus::Offline {
        client: client_id.to_string(),
    };
    if let Err(e) = publisher.try_publish(&offline) {
        log::warn!("[Agent] Failed to announce offline: {}", e);
    }
}

/// Keeps polling the event loop for `duration` so queued packets go out.
async fn drive_for(eventloop: &mut EventLoop, duration: Duration) {
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = eventloop.poll() => {
                if event.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<AgentStatus>>,
    }

    #[async_trait]
    impl StatusPublisher for RecordingPublisher {
        async fn publish(&self, status: &AgentStatus) -> Result<(), PublishError> {
            self.try_publish(status)
        }

        fn try_publish(&self, status: &AgentStatus) -> Result<(), PublishError> {
            self.sent.lock().push(status.clone());
            Ok(())
        }
    }

    #[test]
    fn connack_subscribes_then_announces_online() {
        let state = StateTracker::new();
        let publisher = RecordingPublisher::default();
        let mut subscribed = None;

        on_connack(&state, &publisher, "kitchen-pi", "pibard/clients/kitchen-pi/command", |topic| {
            assert_eq!(state.current(), AgentState::Connected);
            subscribed = Some(topic.to_string());
            Ok(())
        });

        assert_eq!(subscribed.as_deref(), Some("pibard/clients/kitchen-pi/command"));
        assert_eq!(
            *publisher.sent.lock(),
            vec![AgentStatus::Online { client: "kitchen-pi".into() }]
        );
        assert_eq!(
            serde_json::to_value(&publisher.sent.lock()[0]).unwrap(),
            serde_json::json!({ "status": "online", "client": "kitchen-pi" })
        );
        assert_eq!(state.current(), AgentState::Idle);
    }

    #[test]
    fn failed_subscribe_still_announces_online() {
        let state = StateTracker::new();
        let publisher = RecordingPublisher::default();

        on_connack(&state, &publisher, "kitchen-pi", "t", |_| {
            Err(rumqttc::ClientError::TryRequest(rumqttc::Request::Disconnect(
                rumqttc::Disconnect,
            )))
        });

        assert_eq!(publisher.sent.lock().len(), 1);
        assert_eq!(state.current(), AgentState::Idle);
    }

    #[test]
    fn reconnect_announces_online_again() {
        let state = StateTracker::new();
        let publisher = RecordingPublisher::default();

        on_connack(&state, &publisher, "kitchen-pi", "t", |_| Ok(()));
        state.disconnected();
        assert_eq!(state.current(), AgentState::Disconnected);
        on_connack(&state, &publisher, "kitchen-pi", "t", |_| Ok(()));

        assert_eq!(publisher.sent.lock().len(), 2);
        assert_eq!(state.current(), AgentState::Idle);
    }

    #[test]
    fn shutdown_announces_offline() {
        let publisher = RecordingPublisher::default();
        on_shutdown(&publisher, "kitchen-pi");

        assert_eq!(
            serde_json::to_value(&publisher.sent.lock()[0]).unwrap(),
            serde_json::json!({ "status": "offline", "client": "kitchen-pi" })
        );
    }

    #[tokio::test]
    async fn run_returns_on_shutdown_without_broker() {
        let mut config = AgentConfig::new("kitchen-pi");
        config.mqtt.host = "127.0.0.1".into();
        config.mqtt.port = 1;
        config.shutdown_grace_ms = 50;

        let mixer = Arc::new(crate::mixer::PactlMixer::local("true"));
        let agent = MixerAgent::new(config, mixer);
        assert_eq!(agent.state(), AgentState::Disconnected);

        tokio::time::timeout(Duration::from_secs(5), agent.run(std::future::ready(())))
            .await
            .expect("agent stops after shutdown");
    }
}
