//! API module
//!
//! HTTP surface of the assistant: one endpoint per conversation turn and a
//! pair for inspecting or discarding a user's parked session.

pub mod sessions;
pub mod turn;

use crate::assistant::Assistant;
use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared handler state
pub type SharedAssistant = Arc<Assistant>;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" when the server answers
    pub status: String,
    /// Crate version
    pub version: String,
}

/// GET /api/health - Liveness check
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Routes of the assistant API
pub fn router(assistant: SharedAssistant) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/turn", post(turn::run_turn))
        .route(
            "/api/sessions/:user_id",
            get(sessions::get_session).delete(sessions::discard_session),
        )
        .with_state(assistant)
}
