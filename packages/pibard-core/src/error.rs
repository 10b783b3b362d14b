//! Centralized error types for the PiBard core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::audio_server::AdapterError;
use crate::mixer::MixerError;
use crate::services::speaker_control::SpeakerControlError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for AdapterError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Rpc { .. } => "rpc_error",
            Self::Parse(_) => "rpc_parse_error",
            Self::Io(_) => "connection_failed",
            Self::Closed => "connection_closed",
            Self::Timeout(_) => "request_timeout",
        }
    }
}

impl ErrorCode for MixerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "mixer_spawn_failed",
            Self::Failed { .. } => "mixer_command_failed",
        }
    }
}

impl ErrorCode for SpeakerControlError {
    fn code(&self) -> &'static str {
        match self {
            Self::Mixer(e) => e.code(),
            Self::Encode(_) => "command_encode_failed",
            Self::Mqtt(_) => "mqtt_publish_failed",
        }
    }
}

/// Application-wide error type for the gateway.
#[derive(Debug, Error)]
pub enum PibardError {
    /// Call to the audio server failed (transport, protocol or RPC error).
    #[error("Audio server request failed: {0}")]
    Adapter(#[from] AdapterError),

    /// Client id is unknown to the audio server.
    #[error("Client {0} not found")]
    ClientNotFound(String),

    /// Per-speaker command could not be delivered or executed.
    #[error("Speaker control failed: {0}")]
    SpeakerControl(#[from] SpeakerControlError),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Gateway configuration error (missing or inconsistent settings).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PibardError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Adapter(e) => e.code(),
            Self::ClientNotFound(_) => "client_not_found",
            Self::SpeakerControl(e) => e.code(),
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an HTTP status code.
    ///
    /// Unknown clients report 500 like every other failed control request;
    /// the dashboard only distinguishes success from failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type PibardResult<T> = Result<T, PibardError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for PibardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("[Gateway] {}", self);
        } else {
            log::warn!("[Gateway] {}", self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
