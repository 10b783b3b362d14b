//! WebSocket handler for the dashboard push channel.
//!
//! Frames are JSON text `{"type": ..., "payload": ...}` in both directions.
//! Nothing is sent on connect; the page asks with `refresh`.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::api::AppState;
use crate::dashboard::{DashboardSession, DashboardSnapshot, SpeakerCommand};
use crate::error::PibardResult;
use crate::model::Percent;
use crate::services::set_speaker_volume;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Message Types
// ─────────────────────────────────────────────────────────────────────────────

/// Incoming WebSocket message envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum WsIncoming {
    SetVolume(SetVolumeRequest),
    SetStream(SetStreamRequest),
    SetSpeakerVolume(SpeakerVolumeRequest),
    ToggleSpeakerMute(SpeakerRequest),
    SetSpeakerCount(SpeakerCountRequest),
    Refresh,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVolumeRequest {
    pub client_id: String,
    pub volume: i64,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStreamRequest {
    pub client_id: String,
    pub stream_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerVolumeRequest {
    pub client_id: String,
    pub speaker: u8,
    pub volume: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerRequest {
    pub client_id: String,
    pub speaker: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerCountRequest {
    pub client_id: String,
    pub count: u8,
}

/// Outgoing replies to a single socket. Broadcast events are sent as-is.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WsOutgoing {
    Dashboard { payload: DashboardSnapshot },
    Error { message: String },
}

impl WsOutgoing {
    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self)
            .ok()
            .map(|s| Message::Text(s.into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message Handling
// ─────────────────────────────────────────────────────────────────────────────

/// Refetches clients and streams into the session and renders it.
pub async fn refresh(state: &AppState, session: &mut DashboardSession) -> PibardResult<WsOutgoing> {
    let status = state.audio_server.get_status().await?;
    session.apply_clients(status.group_views());
    session.apply_streams(status.stream_views());
    Ok(WsOutgoing::Dashboard {
        payload: session.snapshot(),
    })
}

async fn deliver(state: &AppState, command: SpeakerCommand) -> PibardResult<()> {
    set_speaker_volume(
        state.audio_server.as_ref(),
        state.speaker_control.as_ref(),
        &command.client_id,
        command.speaker,
        command.volume,
    )
    .await
}

/// Handles one client message; returns the reply for this socket, if any.
///
/// Client-level changes (`setVolume`, `setStream`) reply only on failure;
/// the resulting state arrives with the next refresh or server update.
pub async fn handle_message(
    state: &AppState,
    session: &mut DashboardSession,
    msg: WsIncoming,
) -> Option<WsOutgoing> {
    dispatch(state, session, msg).await.unwrap_or_else(|e| {
        log::warn!("[WS] Request failed: {}", e);
        Some(WsOutgoing::Error {
            message: e.to_string(),
        })
    })
}

async fn dispatch(
    state: &AppState,
    session: &mut DashboardSession,
    msg: WsIncoming,
) -> PibardResult<Option<WsOutgoing>> {
    match msg {
        WsIncoming::SetVolume(req) => {
            let volume = Percent::clamped(req.volume);
            log::info!(
                "[WS] setVolume {} -> {}% (muted={})",
                req.client_id,
                volume,
                req.muted
            );
            state
                .audio_server
                .set_client_volume(&req.client_id, volume, req.muted)
                .await?;
            Ok(None)
        }
        WsIncoming::SetStream(req) => {
            log::info!("[WS] setStream {} -> {}", req.client_id, req.stream_id);
            state
                .audio_server
                .set_client_stream(&req.client_id, &req.stream_id)
                .await?;
            Ok(None)
        }
        WsIncoming::SetSpeakerVolume(req) => {
            let command = session.set_speaker_volume(
                &req.client_id,
                req.speaker,
                Percent::clamped(req.volume),
            )?;
            deliver(state, command).await?;
            Ok(Some(WsOutgoing::Dashboard {
                payload: session.snapshot(),
            }))
        }
        WsIncoming::ToggleSpeakerMute(req) => {
            let command = session.toggle_speaker_mute(&req.client_id, req.speaker)?;
            deliver(state, command).await?;
            Ok(Some(WsOutgoing::Dashboard {
                payload: session.snapshot(),
            }))
        }
        WsIncoming::SetSpeakerCount(req) => {
            session.set_speaker_count(&req.client_id, req.count)?;
            Ok(Some(WsOutgoing::Dashboard {
                payload: session.snapshot(),
            }))
        }
        WsIncoming::Refresh => refresh(state, session).await.map(Some),
    }
}

/// Parses and handles one text frame. Frames that do not parse get an
/// error reply.
pub async fn handle_text(
    state: &AppState,
    session: &mut DashboardSession,
    text: &str,
) -> Option<WsOutgoing> {
    match serde_json::from_str::<WsIncoming>(text) {
        Ok(incoming) => handle_message(state, session, incoming).await,
        Err(e) => {
            log::debug!("[WS] Unparseable message: {}", e);
            Some(WsOutgoing::Error {
                message: format!("Invalid message: {}", e),
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Loop
// ─────────────────────────────────────────────────────────────────────────────

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.event_bridge.subscribe();
    let mut session = DashboardSession::new(state.config.default_speaker_count);

    let conn_guard = state.ws_manager.register();
    let cancel_token = conn_guard.cancel_token().clone();

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {}", conn_guard.id());
                break;
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text(&state, &mut session, text.as_str()).await;
                        if let Some(msg) = reply.and_then(|r| r.to_message()) {
                            if sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("[WS] {} lagged, dropped {} event(s)", conn_guard.id(), skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
                // In-progress edits are discarded; the page re-renders from fresh state.
                let reply = refresh(&state, &mut session).await.unwrap_or_else(|e| {
                    log::warn!("[WS] Refresh after event failed: {}", e);
                    WsOutgoing::Error { message: e.to_string() }
                });
                if let Some(msg) = reply.to_message() {
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    let _ = sender.close().await;
}
