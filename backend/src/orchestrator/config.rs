//! Orchestrator configuration
//!
//! Centralized configuration for orchestrator components.

use super::constants::{DEFAULT_MAX_FEEDBACK_RETRIES, DEFAULT_SEARCH_HORIZON_DAYS};
use crate::availability::MAX_HORIZON_DAYS;
use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Unrecognised feedback replies tolerated before the gated subtask is cancelled
    pub max_feedback_retries: u32,
    /// Intents classified below this confidence become a clarification request
    pub min_intent_confidence: f64,
    /// Search window in days when a request names none
    pub search_horizon_days: i64,
    /// Maximum message length in characters
    pub max_message_length: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_feedback_retries: DEFAULT_MAX_FEEDBACK_RETRIES,
            min_intent_confidence: 0.5,
            search_horizon_days: DEFAULT_SEARCH_HORIZON_DAYS,
            max_message_length: 10000, // 10KB
        }
    }
}

impl OrchestratorConfig {
    /// Validate the configuration
    ///
    /// # Returns
    /// * `Ok(())` - All values are usable
    /// * `Err(AppError)` - If validation fails
    pub fn validate(&self) -> Result<(), AppError> {
        if !(0.0..=1.0).contains(&self.min_intent_confidence) {
            return Err(AppError::InvalidRequest(format!(
                "min_intent_confidence must be between 0 and 1, got {}",
                self.min_intent_confidence
            )));
        }
        if self.search_horizon_days <= 0 || self.search_horizon_days > MAX_HORIZON_DAYS {
            return Err(AppError::InvalidRequest(format!(
                "search_horizon_days must be between 1 and {}, got {}",
                MAX_HORIZON_DAYS, self.search_horizon_days
            )));
        }
        if self.max_message_length == 0 {
            return Err(AppError::InvalidRequest(
                "max_message_length must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
