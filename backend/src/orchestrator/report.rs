//! Response aggregation
//!
//! Folds the subtasks of a finished graph into one report. Every subtask is
//! listed: completed ones with their summary, failed ones with their error and
//! blocked ones with the dependencies they were waiting on.

use super::graph::TaskGraph;
use super::types::{SubTaskKind, SubTaskStatus};
use serde::{Deserialize, Serialize};

/// Overall outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every subtask completed
    Success,
    /// Some completed, some did not
    Partial,
    /// Nothing completed
    Failed,
}

impl ReportStatus {
    /// Convert the status to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Success => "success",
            ReportStatus::Partial => "partial",
            ReportStatus::Failed => "failed",
        }
    }
}

/// How one subtask ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// Completed with this summary
    Completed {
        /// One-line summary
        summary: String,
    },
    /// Failed with this error
    Failed {
        /// Error text
        error: String,
    },
    /// Never ran because a dependency did not complete
    Blocked {
        /// Ids of the unmet dependencies
        waiting_on: Vec<String>,
    },
}

/// Report line for one subtask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Subtask id
    pub subtask_id: String,
    /// Subtask description
    pub description: String,
    /// Subtask kind
    pub kind: SubTaskKind,
    /// Outcome
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Final report of a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Graph id
    pub graph_id: String,
    /// Overall outcome
    pub status: ReportStatus,
    /// Completed subtasks
    pub completed: usize,
    /// Failed subtasks
    pub failed: usize,
    /// Subtasks that never ran
    pub blocked: usize,
    /// One entry per subtask, in insertion order
    pub entries: Vec<ReportEntry>,
    /// Rendered text for the user
    pub message: String,
}

impl ExecutionReport {
    /// Build the report for a graph with no runnable subtask left
    pub fn from_graph(graph: &TaskGraph) -> Self {
        let entries: Vec<ReportEntry> = graph
            .subtasks()
            .iter()
            .enumerate()
            .map(|(position, subtask)| {
                let outcome = match subtask.status {
                    SubTaskStatus::Completed => EntryOutcome::Completed {
                        summary: subtask
                            .result
                            .as_ref()
                            .map(|r| r.summary.clone())
                            .unwrap_or_default(),
                    },
                    SubTaskStatus::Failed => EntryOutcome::Failed {
                        error: subtask
                            .error
                            .clone()
                            .unwrap_or_else(|| "unknown error".to_string()),
                    },
                    _ => EntryOutcome::Blocked {
                        waiting_on: graph.unmet_dependencies(position),
                    },
                };
                ReportEntry {
                    subtask_id: subtask.id.clone(),
                    description: subtask.description.clone(),
                    kind: subtask.kind(),
                    outcome,
                }
            })
            .collect();

        let completed = entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Completed { .. }))
            .count();
        let failed = entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Failed { .. }))
            .count();
        let blocked = entries.len() - completed - failed;

        let status = if completed == entries.len() {
            ReportStatus::Success
        } else if completed == 0 {
            ReportStatus::Failed
        } else {
            ReportStatus::Partial
        };

        let message = render(status, completed, failed, blocked, &entries, graph);
        Self {
            graph_id: graph.id.clone(),
            status,
            completed,
            failed,
            blocked,
            entries,
            message,
        }
    }
}

fn render(
    status: ReportStatus,
    completed: usize,
    failed: usize,
    blocked: usize,
    entries: &[ReportEntry],
    graph: &TaskGraph,
) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(match status {
        ReportStatus::Success => {
            format!("Task completed successfully! Executed {} operations.", completed)
        }
        ReportStatus::Partial => format!(
            "Task partially completed. {} succeeded, {} failed.",
            completed,
            failed + blocked
        ),
        ReportStatus::Failed => format!(
            "Task failed. {} succeeded, {} failed.",
            completed,
            failed + blocked
        ),
    });

    for entry in entries {
        lines.push(match &entry.outcome {
            EntryOutcome::Completed { summary } => format!("- {}: {}", entry.description, summary),
            EntryOutcome::Failed { error } => format!("Failed: {} - {}", entry.description, error),
            EntryOutcome::Blocked { waiting_on } => {
                let names: Vec<&str> = waiting_on
                    .iter()
                    .filter_map(|id| graph.get(id))
                    .map(|s| s.description.as_str())
                    .collect();
                format!(
                    "Blocked: {} - waiting on {}",
                    entry.description,
                    if names.is_empty() {
                        "a search result".to_string()
                    } else {
                        names.join(", ")
                    }
                )
            }
        });
    }
    lines.join("\n")
}
