//! SQLite-backed session store

use super::{SessionSnapshot, SessionStore};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

/// Session snapshots in a SQLite database, stored as JSON
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (or create) the database and run migrations
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file, or a `sqlite:` URL
    ///
    /// # Returns
    /// * `Ok(SqliteSessionStore)` if successful
    /// * `Err(AppError::Persistence)` if the file or schema could not be set up
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        if !db_path.starts_with("sqlite:") {
            if let Some(parent) = PathBuf::from(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AppError::Persistence(format!("Failed to create db directory: {}", e))
                    })?;
                }
            }
        }

        let connection_string = if db_path.starts_with("sqlite:") {
            db_path.to_string()
        } else {
            format!("sqlite:{}", db_path)
        };

        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| AppError::Persistence(format!("Invalid database path: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to connect to database: {}", e)))?;

        info!("Connected to session database at: {}", db_path);

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), AppError> {
        let migration_sql = include_str!("../../migrations/001_create_sessions.sql");

        // Strip comments, then run statement by statement
        let cleaned: String = migration_sql
            .lines()
            .map(|line| line.split("--").next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        for statement in cleaned.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::Persistence(format!(
                        "Migration failed: {} - Statement: {}",
                        e,
                        statement.chars().take(100).collect::<String>()
                    ))
                })?;
        }

        debug!("Session migrations completed");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, user_id: &str) -> Result<Option<SessionSnapshot>, AppError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT snapshot FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::Persistence(format!("Failed to load session: {}", e)))?;

        let Some((json,)) = row else {
            return Ok(None);
        };
        let snapshot: SessionSnapshot = serde_json::from_str(&json)
            .map_err(|e| AppError::Persistence(format!("Corrupt session snapshot: {}", e)))?;

        debug!(user_id = %user_id, state = snapshot.pending.as_str(), "Loaded session");
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), AppError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| AppError::Persistence(format!("Failed to encode session: {}", e)))?;

        sqlx::query(
            "INSERT INTO sessions (user_id, state, snapshot, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                state = excluded.state,
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at",
        )
        .bind(&snapshot.user_id)
        .bind(snapshot.pending.as_str())
        .bind(json)
        .bind(snapshot.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to save session: {}", e)))?;

        debug!(
            user_id = %snapshot.user_id,
            state = snapshot.pending.as_str(),
            "Saved session"
        );
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to clear session: {}", e)))?;

        debug!(user_id = %user_id, removed = result.rows_affected(), "Cleared session");
        Ok(result.rows_affected() > 0)
    }
}
