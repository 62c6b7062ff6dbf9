//! Executor error types
//!
//! Errors a subtask executor can report. The scheduler records them on the
//! failing subtask; they never escape the graph.

use crate::availability::AvailabilityError;
use crate::calendar::{CalendarError, EventRef};
use thiserror::Error;

/// Errors that can occur while executing one subtask
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Parameters are malformed or missing
    #[error("Validation error: {0}")]
    Validation(String),

    /// A calendar call failed; never retried automatically
    #[error("Calendar operation failed: {0}")]
    ExternalOperation(#[from] CalendarError),

    /// More than one event could be the target
    #[error("{} events match, a selection is required", candidates.len())]
    Ambiguous {
        /// Events the user has to choose from
        candidates: Vec<EventRef>,
    },

    /// The user declined or the confirmation was abandoned
    #[error("{0}")]
    Cancelled(String),
}

impl From<AvailabilityError> for ExecutionError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::InvalidQuery(msg) => ExecutionError::Validation(msg),
        }
    }
}
