//! Error types and error handling for the application
//!
//! `AppError` is what the turn pipeline and the HTTP layer return. Subtask
//! failures never surface here; they are recorded on the subtask and reported.

use crate::calendar::CalendarError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// Each variant maps to an HTTP status via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Decomposition produced no subtasks, a dangling dependency or a cycle
    #[error("Invalid task graph: {0}")]
    InvalidGraph(String),

    /// No stored session for the user
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Request is malformed or does not fit the session state
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Session storage failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Calendar access failed outside a subtask
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// Intent extraction could not produce a usable result
    #[error("Intent extraction failed: {0}")]
    Intent(String),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidGraph(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Calendar(CalendarError::AccountNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Calendar(_) => StatusCode::BAD_GATEWAY,
            AppError::Intent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
