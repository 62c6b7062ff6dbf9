//! Session API handlers

use super::SharedAssistant;
use crate::error::AppError;
use crate::orchestrator::FeedbackRequest;
use crate::session::PendingState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of what a session is waiting on
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Session owner
    pub user_id: String,
    /// "graph" or "clarification"
    pub state: &'static str,
    /// Id of the parked graph
    pub graph_id: Option<String>,
    /// The pending question
    pub feedback_request: Option<FeedbackRequest>,
    /// Last write
    pub updated_at: DateTime<Utc>,
}

/// GET /api/sessions/:user_id - Inspect the parked session
pub async fn get_session(
    State(assistant): State<SharedAssistant>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = assistant.session(&user_id).await?;
    let graph_id = match &snapshot.pending {
        PendingState::Graph(graph) => Some(graph.id.clone()),
        PendingState::Clarification(_) => None,
    };
    Ok(Json(SessionResponse {
        feedback_request: snapshot.feedback_request(),
        state: snapshot.pending.as_str(),
        graph_id,
        updated_at: snapshot.updated_at,
        user_id: snapshot.user_id,
    }))
}

/// DELETE /api/sessions/:user_id - Discard the parked session
pub async fn discard_session(
    State(assistant): State<SharedAssistant>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    assistant.discard_session(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
