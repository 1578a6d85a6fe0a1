//! Request and response bodies of the ingestion endpoint
//!
//! All bodies are JSON objects.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// `POST /music/update`
#[derive(Debug, Clone, Deserialize)]
pub struct TrackUpdate {
    /// Track title, empty to clear the status
    #[serde(default)]
    pub track: String,
}

/// `POST /music/toggle`
#[derive(Debug, Clone, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub action: String,
}

/// Requested transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Enable,
    Disable,
}

impl ToggleRequest {
    /// Case-insensitive action lookup
    pub fn parse(&self) -> Option<ToggleAction> {
        match self.action.trim().to_lowercase().as_str() {
            "enable" => Some(ToggleAction::Enable),
            "disable" => Some(ToggleAction::Disable),
            _ => None,
        }
    }
}

/// Generic `{"status": ..., "message": ...}` body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            message: None,
        }
    }

    pub fn with_message(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: Some(message.into()),
        }
    }
}

/// `GET /music/state`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateResponse {
    /// True only while live mirroring is on
    pub enabled: bool,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Errors surfaced to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Music manager not initialized")]
    NotInitialized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Profile update failed: {0}")]
    Upstream(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotInitialized => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) | ApiError::UnknownAction(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::NotInitialized => error!("request received before status manager was installed"),
            ApiError::BadRequest(msg) => debug!(%msg, "malformed request"),
            ApiError::UnknownAction(action) => debug!(%action, "unknown toggle action"),
            ApiError::Upstream(msg) => error!(%msg, "profile update failed during request"),
        }

        (status, Json(StatusResponse::with_message("error", self.to_string()))).into_response()
    }
}
