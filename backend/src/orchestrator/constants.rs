//! Orchestrator constants
//!
//! Centralized constants used throughout the orchestrator module.

/// Replies that let a gated subtask run
pub const CONFIRM_WORDS: &[&str] = &["yes", "y", "confirm", "ok", "proceed"];

/// Replies that cancel a gated subtask
pub const CANCEL_WORDS: &[&str] = &["no", "n", "cancel", "stop"];

/// Replies that switch a multi-target confirmation into a selection
pub const SELECT_WORDS: &[&str] = &["select", "s"];

/// Error recorded on a subtask the user cancelled
pub const CANCELLED_BY_USER: &str = "cancelled by user";

/// Targets listed in a confirmation prompt before the "... and N more" suffix
pub const MAX_LISTED_TARGETS: usize = 5;

/// Unrecognised replies tolerated before a gated subtask is cancelled
pub const DEFAULT_MAX_FEEDBACK_RETRIES: u32 = 3;

/// Search window when a search does not name one
pub const DEFAULT_SEARCH_HORIZON_DAYS: i64 = 30;

/// Suggestions returned when the caller does not name a maximum
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;
