//! Confirmation gate
//!
//! Builds the feedback requests that pause a graph and interprets the user's
//! replies. The gate never executes anything; the scheduler acts on its verdicts.

use super::constants::{CANCEL_WORDS, CONFIRM_WORDS, MAX_LISTED_TARGETS, SELECT_WORDS};
use super::types::{SubTask, SubTaskKind, SubTaskParams};
use crate::calendar::EventRef;
use serde::{Deserialize, Serialize};

/// What the paused graph needs from the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// Yes/no approval
    Confirmation,
    /// Pick one or more numbered options
    Selection,
    /// Free text appended to the original request
    Clarification,
}

impl FeedbackKind {
    /// Convert the kind to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Confirmation => "confirmation",
            FeedbackKind::Selection => "selection",
            FeedbackKind::Clarification => "clarification",
        }
    }
}

/// One answer the user can give
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackOption {
    /// Text shown to the user
    pub label: String,
    /// Reply that picks this option
    pub value: String,
    /// Event behind a selection option
    #[serde(default)]
    pub event: Option<EventRef>,
}

/// A question that pauses the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// Kind of answer expected
    pub kind: FeedbackKind,
    /// Question text, identical on every re-issue
    pub prompt: String,
    /// Allowed answers
    #[serde(default)]
    pub options: Vec<FeedbackOption>,
    /// Subtask the request gates
    #[serde(default)]
    pub subtask_id: Option<String>,
    /// Unrecognised replies so far
    #[serde(default)]
    pub attempts: u32,
    /// Last reply received
    #[serde(default)]
    pub response: Option<String>,
    /// Why the last reply was rejected
    #[serde(default)]
    pub last_error: Option<String>,
}

impl FeedbackRequest {
    fn new(kind: FeedbackKind, prompt: String, options: Vec<FeedbackOption>) -> Self {
        Self {
            kind,
            prompt,
            options,
            subtask_id: None,
            attempts: 0,
            response: None,
            last_error: None,
        }
    }

    /// Attach the gated subtask
    pub fn for_subtask(mut self, id: impl Into<String>) -> Self {
        self.subtask_id = Some(id.into());
        self
    }

    /// Events behind the selection options, in option order
    pub fn option_events(&self) -> Vec<EventRef> {
        self.options.iter().filter_map(|o| o.event.clone()).collect()
    }

    /// Prompt preceded by the rejection message, if any
    pub fn display_text(&self) -> String {
        match &self.last_error {
            Some(err) => format!("{}\n\n{}", err, self.prompt),
            None => self.prompt.clone(),
        }
    }
}

/// Interpretation of a confirmation reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationReply {
    /// Run the subtask
    Proceed,
    /// Fail the subtask as cancelled
    Cancel,
    /// Narrow the targets first
    Select,
    /// Anything else
    Unrecognized,
}

/// Interpretation of a selection reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReply {
    /// Zero-based option indices, in the order given, without duplicates
    Selected(Vec<usize>),
    /// Fail the subtask as cancelled
    Cancel,
    /// Rejected input with the message to show
    Invalid(String),
}

fn list_targets(targets: &[EventRef], limit: usize) -> String {
    let mut lines: Vec<String> = targets
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, t)| format!("{}. {}", i + 1, t.label()))
        .collect();
    if targets.len() > limit {
        lines.push(format!("... and {} more", targets.len() - limit));
    }
    lines.join("\n")
}

fn yes_no_options(with_select: bool) -> Vec<FeedbackOption> {
    let mut options = vec![
        FeedbackOption {
            label: "Yes, proceed".to_string(),
            value: "yes".to_string(),
            event: None,
        },
        FeedbackOption {
            label: "No, cancel".to_string(),
            value: "no".to_string(),
            event: None,
        },
    ];
    if with_select {
        options.push(FeedbackOption {
            label: "Select specific events".to_string(),
            value: "select".to_string(),
            event: None,
        });
    }
    options
}

/// Confirmation request for a gated subtask
///
/// Deletes and updates list the affected events (first five, then "... and N
/// more"); other kinds repeat the subtask description.
pub fn confirmation_request(subtask: &SubTask) -> FeedbackRequest {
    let targets = subtask.params.targets().unwrap_or_default();
    let prompt = match (&subtask.params, targets.len()) {
        (SubTaskParams::Delete(_), n) if n > 0 => format!(
            "Are you sure you want to delete {} event(s)?\n{}",
            n,
            list_targets(targets, MAX_LISTED_TARGETS)
        ),
        (SubTaskParams::Update(p), n) if n > 0 => format!(
            "Are you sure you want to update {} event(s) ({})?\n{}",
            n,
            p.patch.changed_fields().join(", "),
            list_targets(targets, MAX_LISTED_TARGETS)
        ),
        _ => format!("Please confirm: {}", subtask.description),
    };

    FeedbackRequest::new(
        FeedbackKind::Confirmation,
        prompt,
        yes_no_options(targets.len() > 1),
    )
    .for_subtask(&subtask.id)
}

/// Selection request over candidate events
pub fn selection_request(subtask: &SubTask, candidates: &[EventRef]) -> FeedbackRequest {
    let verb = match subtask.kind() {
        SubTaskKind::Delete => "delete",
        SubTaskKind::Update => "update",
        _ => "use",
    };
    let prompt = format!(
        "Found {} matching events. Which should I {}? Reply with numbers separated by commas.\n{}",
        candidates.len(),
        verb,
        list_targets(candidates, candidates.len())
    );
    let options = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| FeedbackOption {
            label: c.label(),
            value: (i + 1).to_string(),
            event: Some(c.clone()),
        })
        .collect();

    FeedbackRequest::new(FeedbackKind::Selection, prompt, options).for_subtask(&subtask.id)
}

/// Clarification request; not tied to any subtask
pub fn clarification_request(prompt: impl Into<String>) -> FeedbackRequest {
    FeedbackRequest::new(FeedbackKind::Clarification, prompt.into(), Vec::new())
}

fn normalize(reply: &str) -> String {
    reply.trim().to_lowercase()
}

/// Interpret a confirmation reply, case-insensitively
pub fn parse_confirmation(reply: &str) -> ConfirmationReply {
    let reply = normalize(reply);
    if CONFIRM_WORDS.contains(&reply.as_str()) {
        ConfirmationReply::Proceed
    } else if CANCEL_WORDS.contains(&reply.as_str()) {
        ConfirmationReply::Cancel
    } else if SELECT_WORDS.contains(&reply.as_str()) {
        ConfirmationReply::Select
    } else {
        ConfirmationReply::Unrecognized
    }
}

/// Interpret a selection reply of comma-separated 1-based indices
pub fn parse_selection(reply: &str, option_count: usize) -> SelectionReply {
    let normalized = normalize(reply);
    if CANCEL_WORDS.contains(&normalized.as_str()) {
        return SelectionReply::Cancel;
    }

    let mut selected = Vec::new();
    for part in normalized.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let index: usize = match part.parse() {
            Ok(index) => index,
            Err(_) => {
                return SelectionReply::Invalid(format!(
                    "Invalid input '{}'. Please enter numbers separated by commas",
                    reply.trim()
                ))
            }
        };
        if index == 0 || index > option_count {
            return SelectionReply::Invalid(format!(
                "Invalid selection: {}. Please select from 1 to {}.",
                index, option_count
            ));
        }
        if !selected.contains(&(index - 1)) {
            selected.push(index - 1);
        }
    }

    if selected.is_empty() {
        return SelectionReply::Invalid(format!(
            "Invalid input '{}'. Please enter numbers separated by commas",
            reply.trim()
        ));
    }
    SelectionReply::Selected(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::{DeleteParams, SubTaskStatus};
    use chrono::{TimeZone, Utc};

    fn target(n: u32) -> EventRef {
        EventRef {
            account: "work".to_string(),
            event_id: format!("e{}", n),
            title: format!("Meeting {}", n),
            start: Utc.with_ymd_and_hms(2026, 10, 20, 9 + n, 0, 0).unwrap(),
        }
    }

    fn delete_subtask(targets: Vec<EventRef>) -> SubTask {
        SubTask {
            id: "t1".to_string(),
            description: "Delete meetings".to_string(),
            params: SubTaskParams::Delete(DeleteParams { targets }),
            depends_on: vec![],
            require_confirmation: false,
            confirmed: false,
            status: SubTaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    #[test]
    fn test_confirmation_words() {
        for word in ["yes", "Y", " ok ", "Proceed", "confirm"] {
            assert_eq!(parse_confirmation(word), ConfirmationReply::Proceed);
        }
        for word in ["no", "N", "cancel", "STOP"] {
            assert_eq!(parse_confirmation(word), ConfirmationReply::Cancel);
        }
        assert_eq!(parse_confirmation("select"), ConfirmationReply::Select);
        assert_eq!(parse_confirmation("maybe"), ConfirmationReply::Unrecognized);
        assert_eq!(parse_confirmation(""), ConfirmationReply::Unrecognized);
    }

    #[test]
    fn test_delete_prompt_lists_first_five() {
        let request = confirmation_request(&delete_subtask((0..7).map(target).collect()));
        assert_eq!(request.kind, FeedbackKind::Confirmation);
        assert!(request.prompt.starts_with("Are you sure you want to delete 7 event(s)?"));
        assert!(request.prompt.contains("5. Meeting 4 - 2026-10-20 13:00"));
        assert!(!request.prompt.contains("Meeting 5"));
        assert!(request.prompt.ends_with("... and 2 more"));
        assert_eq!(request.options.len(), 3);
        assert_eq!(request.subtask_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_single_target_has_no_select_option() {
        let request = confirmation_request(&delete_subtask(vec![target(0)]));
        assert_eq!(request.options.len(), 2);
    }

    #[test]
    fn test_selection_parsing() {
        assert_eq!(parse_selection("1", 2), SelectionReply::Selected(vec![0]));
        assert_eq!(parse_selection(" 2, 1,2 ", 2), SelectionReply::Selected(vec![1, 0]));
        assert_eq!(parse_selection("cancel", 2), SelectionReply::Cancel);
        assert_eq!(
            parse_selection("3", 2),
            SelectionReply::Invalid("Invalid selection: 3. Please select from 1 to 2.".to_string())
        );
        assert_eq!(
            parse_selection("first", 2),
            SelectionReply::Invalid(
                "Invalid input 'first'. Please enter numbers separated by commas".to_string()
            )
        );
        assert!(matches!(parse_selection(" , ", 2), SelectionReply::Invalid(_)));
    }

    #[test]
    fn test_selection_request_options_carry_events() {
        let subtask = delete_subtask(vec![]);
        let request = selection_request(&subtask, &[target(0), target(1)]);
        assert_eq!(request.kind, FeedbackKind::Selection);
        assert_eq!(request.option_events(), vec![target(0), target(1)]);
        assert_eq!(request.options[1].value, "2");
    }
}
