//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::dashboard::INDEX_HTML;
use crate::error::{PibardError, PibardResult};
use crate::model::{GroupView, Percent, StreamView};
use crate::protocol_constants::{APP_NAME, SERVICE_ID};
use crate::services::set_speaker_volume;

/// `{"success": true}`
fn api_ok() -> Json<serde_json::Value> {
    Json(json!({ "success": true }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/health", get(health_check))
        .route("/api/clients", get(list_clients))
        .route("/api/streams", get(list_streams))
        .route(
            "/api/speakers/{client_id}/{speaker_id}/volume",
            post(set_speaker_volume_handler),
        )
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn dashboard_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Liveness check. Does not contact the audio server.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "app": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "audioServer": state.audio_server.backend(),
        "speakerBackend": state.speaker_control.backend(),
        "connections": state.ws_manager.connection_count(),
    }))
}

async fn list_clients(State(state): State<AppState>) -> PibardResult<Json<Vec<GroupView>>> {
    let status = state.audio_server.get_status().await?;
    Ok(Json(status.group_views()))
}

async fn list_streams(
    State(state): State<AppState>,
) -> PibardResult<Json<BTreeMap<String, StreamView>>> {
    let status = state.audio_server.get_status().await?;
    Ok(Json(status.stream_views()))
}

#[derive(Debug, Deserialize)]
struct SpeakerVolumeBody {
    volume: i64,
}

async fn set_speaker_volume_handler(
    Path((client_id, speaker_id)): Path<(String, String)>,
    State(state): State<AppState>,
    body: Result<Json<SpeakerVolumeBody>, JsonRejection>,
) -> PibardResult<impl IntoResponse> {
    let Json(body) = body.map_err(|e| PibardError::InvalidRequest(e.body_text()))?;
    let speaker: u8 = speaker_id
        .parse()
        .map_err(|_| PibardError::InvalidRequest(format!("invalid speaker id: {}", speaker_id)))?;

    set_speaker_volume(
        state.audio_server.as_ref(),
        state.speaker_control.as_ref(),
        &client_id,
        speaker,
        Percent::clamped(body.volume),
    )
    .await?;
    Ok(api_ok())
}
