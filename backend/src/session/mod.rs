//! Session persistence
//!
//! Between turns the only state kept for a user is what the previous turn left
//! unfinished: a task graph parked on a confirmation or selection, or a
//! clarification question awaiting an answer. Finished graphs are cleared.

mod sqlite;

pub use sqlite::SqliteSessionStore;

use crate::error::AppError;
use crate::orchestrator::{FeedbackRequest, TaskGraph};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Clarification asked before any graph was built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingClarification {
    /// Message that could not be acted on
    pub original_message: String,
    /// Question put to the user
    pub prompt: String,
}

/// What a session is waiting for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PendingState {
    /// Graph paused on a confirmation or selection
    Graph(TaskGraph),
    /// Question about an unclear request
    Clarification(PendingClarification),
}

impl PendingState {
    /// Short name for logs and the `state` column
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingState::Graph(_) => "graph",
            PendingState::Clarification(_) => "clarification",
        }
    }
}

/// Persisted state of one user's conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Owner of the session
    pub user_id: String,
    /// What the next turn should resume
    pub pending: PendingState,
    /// Last time the snapshot was written
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Snapshot of a parked graph
    pub fn parked(graph: TaskGraph) -> Self {
        Self {
            user_id: graph.owner_id.clone(),
            pending: PendingState::Graph(graph),
            updated_at: Utc::now(),
        }
    }

    /// Snapshot of an open clarification
    pub fn clarifying(
        user_id: impl Into<String>,
        original_message: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            pending: PendingState::Clarification(PendingClarification {
                original_message: original_message.into(),
                prompt: prompt.into(),
            }),
            updated_at: Utc::now(),
        }
    }

    /// The question the user still has to answer
    pub fn feedback_request(&self) -> Option<FeedbackRequest> {
        match &self.pending {
            PendingState::Graph(graph) => graph.awaiting.clone(),
            PendingState::Clarification(c) => {
                Some(crate::orchestrator::gate::clarification_request(c.prompt.clone()))
            }
        }
    }
}

/// Storage for session snapshots, one per user
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Snapshot for `user_id`, if one exists
    async fn load(&self, user_id: &str) -> Result<Option<SessionSnapshot>, AppError>;

    /// Insert or replace the user's snapshot
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), AppError>;

    /// Remove the user's snapshot; returns whether one existed
    async fn clear(&self, user_id: &str) -> Result<bool, AppError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionSnapshot>>,
}

impl InMemorySessionStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, user_id: &str) -> Result<Option<SessionSnapshot>, AppError> {
        Ok(self.sessions.read().await.get(user_id).cloned())
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .insert(snapshot.user_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self.sessions.write().await.remove(user_id).is_some())
    }
}
