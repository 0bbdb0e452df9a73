//! Error taxonomy for the logbook.
//!
//! Extraction and polling failures are absorbed where they occur (empty
//! parameter map, `connected = false` in the snapshot); only validation,
//! lookup, and duplicate errors travel up to the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LogbookError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no such print job: {0}")]
    JobNotFound(Uuid),
    #[error("no such maintenance event: {0}")]
    MaintenanceNotFound(Uuid),
    #[error("a print with filename \"{0}\" was already added recently")]
    Duplicate(String),
    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the external printer controller. These never reach a
/// job record; the poller folds them into the connectivity snapshot.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response status: {0}")]
    Status(u16),
    #[error("malformed status payload: {0}")]
    Payload(String),
}

impl IntoResponse for LogbookError {
    fn into_response(self) -> Response {
        let status = match &self {
            LogbookError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LogbookError::JobNotFound(_) | LogbookError::MaintenanceNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            LogbookError::Duplicate(_) => StatusCode::CONFLICT,
            LogbookError::Controller(_) | LogbookError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
