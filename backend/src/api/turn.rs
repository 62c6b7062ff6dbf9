//! Turn API handler

use super::SharedAssistant;
use crate::assistant::TurnResponse;
use crate::error::AppError;
use axum::{extract::State, response::Json};
use serde::Deserialize;

/// Turn request
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    /// Session owner
    pub user_id: String,
    /// The user's message
    #[serde(default)]
    pub message: String,
    /// Reply to the pending confirmation, selection or clarification
    #[serde(default)]
    pub feedback: Option<String>,
}

/// POST /api/turn - Advance a conversation by one turn
///
/// # Returns
/// * `Ok(Json<TurnResponse>)` - Final report or the next question
/// * `Err(AppError)` - Invalid request, unusable decomposition or storage failure
pub async fn run_turn(
    State(assistant): State<SharedAssistant>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    tracing::debug!(
        user_id = %request.user_id,
        has_feedback = request.feedback.is_some(),
        "Turn request"
    );
    let response = assistant
        .run_turn(&request.user_id, &request.message, request.feedback.as_deref())
        .await?;
    Ok(Json(response))
}
