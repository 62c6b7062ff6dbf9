//! Orchestrator utility functions
//!
//! Hashing helpers for logging and input checks shared by the turn pipeline.

use super::graph::TaskGraph;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compute a short hash for a user message
///
/// Returns an 8-character hexadecimal hash so messages can be correlated in
/// logs without writing their text.
///
/// # Arguments
/// * `message` - The message to hash
///
/// # Returns
/// * `String` - 8-character hexadecimal hash
pub fn hash_message(message: &str) -> String {
    let mut hasher = DefaultHasher::new();
    message.hash(&mut hasher);
    format!("{:016x}", hasher.finish())[..8].to_string()
}

/// Compute a short hash for a graph's shape
///
/// Based on the subtask kinds and dependency counts, so two graphs decomposed
/// the same way hash alike regardless of their generated ids.
pub fn hash_graph(graph: &TaskGraph) -> String {
    let mut hasher = DefaultHasher::new();
    graph.len().hash(&mut hasher);
    for subtask in graph.subtasks() {
        subtask.kind().as_str().hash(&mut hasher);
        subtask.depends_on.len().hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())[..8].to_string()
}

/// Validate an incoming message
///
/// # Returns
/// * `Ok(&str)` - The trimmed message
/// * `Err(String)` - Empty or longer than `max_length` characters
pub fn validate_message(message: &str, max_length: usize) -> Result<&str, String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err("Message cannot be empty".to_string());
    }
    let length = trimmed.chars().count();
    if length > max_length {
        return Err(format!(
            "Message too long: {} characters (max {})",
            length, max_length
        ));
    }
    Ok(trimmed)
}
