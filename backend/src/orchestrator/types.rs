//! Subtask types
//!
//! A subtask is one calendar operation inside a [`TaskGraph`](super::TaskGraph).
//! Its parameters are a tagged union with one record per kind, validated when
//! the graph is built.

use crate::availability::{
    AvailabilityCheck, FreeSlot, NextSlot, SuggestedTime, TimeOfDay, UtilizationSummary,
    WorkingHours, MAX_DURATION_MINUTES,
};
use crate::calendar::{Attendee, Event, EventPatch, EventRef, NewEvent, ResponseStatus, TimeWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation a subtask performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskKind {
    /// Text search across accounts
    Search,
    /// Create an event
    Create,
    /// Patch existing events
    Update,
    /// Delete existing events
    Delete,
    /// Find a free slot and book it
    Schedule,
    /// Report attendee responses
    Rsvp,
    /// Free-time style query
    Availability,
    /// Anything that does not touch a calendar
    General,
}

impl SubTaskKind {
    /// Convert the kind to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SubTaskKind::Search => "search",
            SubTaskKind::Create => "create",
            SubTaskKind::Update => "update",
            SubTaskKind::Delete => "delete",
            SubTaskKind::Schedule => "schedule",
            SubTaskKind::Rsvp => "rsvp",
            SubTaskKind::Availability => "availability",
            SubTaskKind::General => "general",
        }
    }

    /// Kinds that are always gated on confirmation
    pub fn is_destructive(&self) -> bool {
        matches!(self, SubTaskKind::Update | SubTaskKind::Delete)
    }
}

/// Lifecycle of a subtask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    /// Not started
    #[default]
    Pending,
    /// Currently executing
    InProgress,
    /// Needs targets from a search that has not completed yet
    WaitingOnSearch,
    /// Paused on a feedback request
    WaitingOnUser,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl SubTaskStatus {
    /// Convert the status to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SubTaskStatus::Pending => "pending",
            SubTaskStatus::InProgress => "in_progress",
            SubTaskStatus::WaitingOnSearch => "waiting_on_search",
            SubTaskStatus::WaitingOnUser => "waiting_on_user",
            SubTaskStatus::Completed => "completed",
            SubTaskStatus::Failed => "failed",
        }
    }

    /// Completed or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubTaskStatus::Completed | SubTaskStatus::Failed)
    }
}

/// Search parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Text to look for
    pub query: String,
    /// Range to search, defaults to the next 30 days
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// Maximum matches
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Create parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateParams {
    /// Event to create
    pub event: NewEvent,
    /// Account label, default account when absent
    #[serde(default)]
    pub account: Option<String>,
}

/// Update parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateParams {
    /// Events to patch; resolved from the latest search when empty
    #[serde(default)]
    pub targets: Vec<EventRef>,
    /// Fields to change
    pub patch: EventPatch,
}

/// Delete parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteParams {
    /// Events to delete; resolved from the latest search when empty
    #[serde(default)]
    pub targets: Vec<EventRef>,
}

/// Schedule parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleParams {
    /// Title of the event to book
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Location
    #[serde(default)]
    pub location: String,
    /// Invited people
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    /// Meeting length
    pub duration_minutes: i64,
    /// Range to search for a slot
    pub window: TimeWindow,
    /// Overrides the configured working hours
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
    /// Allow Saturday and Sunday
    #[serde(default)]
    pub include_weekends: bool,
    /// Account to book in, default account when absent
    #[serde(default)]
    pub account: Option<String>,
}

/// RSVP report parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpParams {
    /// Restrict to events matching this text
    #[serde(default)]
    pub query: Option<String>,
    /// Range to inspect, defaults to the next 30 days
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// Only report attendees with this response
    #[serde(default)]
    pub status_filter: Option<ResponseStatus>,
}

/// Which availability question to answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AvailabilityQuery {
    /// All free slots in the window
    FreeTime,
    /// Is this exact range free
    Check {
        /// Start of the range
        start: DateTime<Utc>,
        /// End of the range
        end: DateTime<Utc>,
    },
    /// First free slot from now
    NextAvailable,
    /// Best scored meeting times
    Suggest {
        /// Preferred time-of-day buckets
        #[serde(default)]
        preferred: Vec<TimeOfDay>,
        /// Maximum suggestions
        max: usize,
    },
    /// Utilization summary
    Summary,
}

/// Availability parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityParams {
    /// Question to answer
    pub query: AvailabilityQuery,
    /// Range to inspect
    pub window: TimeWindow,
    /// Required meeting length
    pub duration_minutes: i64,
    /// Overrides the configured working hours
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
    /// Count Saturday and Sunday
    #[serde(default)]
    pub include_weekends: bool,
}

/// General parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralParams {
    /// The user's message
    pub message: String,
}

/// Kind-specific parameters of a subtask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubTaskParams {
    /// Search
    Search(SearchParams),
    /// Create
    Create(CreateParams),
    /// Update
    Update(UpdateParams),
    /// Delete
    Delete(DeleteParams),
    /// Schedule
    Schedule(ScheduleParams),
    /// RSVP report
    Rsvp(RsvpParams),
    /// Availability query
    Availability(AvailabilityParams),
    /// General message
    General(GeneralParams),
}

fn require_window(window: &TimeWindow, what: &str) -> Result<(), String> {
    if window.is_empty() {
        return Err(format!("{} window end must be after start", what));
    }
    Ok(())
}

fn require_duration(minutes: i64) -> Result<(), String> {
    if minutes <= 0 {
        return Err(format!("duration must be positive, got {} minutes", minutes));
    }
    if minutes > MAX_DURATION_MINUTES {
        return Err(format!(
            "duration cannot exceed {} minutes, got {}",
            MAX_DURATION_MINUTES, minutes
        ));
    }
    Ok(())
}

impl SubTaskParams {
    /// Kind the parameters belong to
    pub fn kind(&self) -> SubTaskKind {
        match self {
            SubTaskParams::Search(_) => SubTaskKind::Search,
            SubTaskParams::Create(_) => SubTaskKind::Create,
            SubTaskParams::Update(_) => SubTaskKind::Update,
            SubTaskParams::Delete(_) => SubTaskKind::Delete,
            SubTaskParams::Schedule(_) => SubTaskKind::Schedule,
            SubTaskParams::Rsvp(_) => SubTaskKind::Rsvp,
            SubTaskParams::Availability(_) => SubTaskKind::Availability,
            SubTaskParams::General(_) => SubTaskKind::General,
        }
    }

    /// Check required fields
    ///
    /// Update and Delete may have no targets yet; those are resolved from a
    /// search at dispatch time.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            SubTaskParams::Search(p) => {
                if p.query.trim().is_empty() {
                    return Err("search is missing required parameter 'query'".to_string());
                }
                if let Some(window) = &p.window {
                    require_window(window, "search")?;
                }
                if p.limit == Some(0) {
                    return Err("search limit must be at least 1".to_string());
                }
                Ok(())
            }
            SubTaskParams::Create(p) => p.event.validate(),
            SubTaskParams::Update(p) => {
                if p.patch.is_empty() {
                    return Err("update has no fields to change".to_string());
                }
                if let (Some(start), Some(end)) = (p.patch.start, p.patch.end) {
                    if end <= start {
                        return Err("update would set end before start".to_string());
                    }
                }
                Ok(())
            }
            SubTaskParams::Delete(_) => Ok(()),
            SubTaskParams::Schedule(p) => {
                if p.title.trim().is_empty() {
                    return Err("schedule is missing required parameter 'title'".to_string());
                }
                require_duration(p.duration_minutes)?;
                require_window(&p.window, "schedule")?;
                if let Some(hours) = &p.working_hours {
                    hours.validate().map_err(|e| e.to_string())?;
                }
                Ok(())
            }
            SubTaskParams::Rsvp(p) => match &p.window {
                Some(window) => require_window(window, "rsvp"),
                None => Ok(()),
            },
            SubTaskParams::Availability(p) => {
                require_window(&p.window, "availability")?;
                require_duration(p.duration_minutes)?;
                if let Some(hours) = &p.working_hours {
                    hours.validate().map_err(|e| e.to_string())?;
                }
                match &p.query {
                    AvailabilityQuery::Check { start, end } if end <= start => {
                        Err("availability check end must be after start".to_string())
                    }
                    AvailabilityQuery::Suggest { max: 0, .. } => {
                        Err("suggestion count must be at least 1".to_string())
                    }
                    _ => Ok(()),
                }
            }
            SubTaskParams::General(_) => Ok(()),
        }
    }

    /// Targets of an Update or Delete
    pub fn targets(&self) -> Option<&[EventRef]> {
        match self {
            SubTaskParams::Update(p) => Some(&p.targets),
            SubTaskParams::Delete(p) => Some(&p.targets),
            _ => None,
        }
    }

    /// Replace the targets of an Update or Delete; other kinds are left alone
    pub fn set_targets(&mut self, targets: Vec<EventRef>) {
        match self {
            SubTaskParams::Update(p) => p.targets = targets,
            SubTaskParams::Delete(p) => p.targets = targets,
            _ => {}
        }
    }
}

/// RSVP state of one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpEntry {
    /// The event
    pub event: EventRef,
    /// Attendees, filtered by status when a filter was given
    pub attendees: Vec<Attendee>,
}

/// Structured result of a completed subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputData {
    /// Events found by a search
    Events {
        /// Matches in start order
        events: Vec<Event>,
    },
    /// A created or scheduled event
    Created {
        /// The new event
        event: Event,
    },
    /// Events patched by an update
    Updated {
        /// Events after the patch
        events: Vec<Event>,
        /// Per-target error text
        failures: Vec<String>,
    },
    /// Events removed by a delete
    Deleted {
        /// Deleted targets
        targets: Vec<EventRef>,
        /// Per-target error text
        failures: Vec<String>,
    },
    /// RSVP report
    Rsvps {
        /// One entry per event
        entries: Vec<RsvpEntry>,
    },
    /// Free slots
    FreeSlots {
        /// Slots in chronological order
        slots: Vec<FreeSlot>,
    },
    /// Exact-window check
    Check {
        /// The check result
        check: AvailabilityCheck,
    },
    /// Next-slot search
    NextSlot {
        /// First free slot, if any
        next: Option<NextSlot>,
    },
    /// Scored suggestions
    Suggestions {
        /// Best first
        suggestions: Vec<SuggestedTime>,
    },
    /// Utilization summary
    Summary {
        /// The summary
        summary: UtilizationSummary,
    },
    /// Message answered without calendar access
    Acknowledged {
        /// Reply text
        message: String,
    },
}

/// Result recorded on a completed subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// One-line summary for the report
    pub summary: String,
    /// Structured payload
    pub data: OutputData,
}

impl TaskOutput {
    /// Events carried by a search result
    pub fn events(&self) -> Option<&[Event]> {
        match &self.data {
            OutputData::Events { events } => Some(events),
            _ => None,
        }
    }
}

/// One atomic operation inside a task graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique id within the graph
    pub id: String,
    /// Human-readable description
    pub description: String,
    /// Kind-specific parameters
    pub params: SubTaskParams,
    /// Ids of subtasks that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Gate on confirmation even when the kind does not require it
    #[serde(default)]
    pub require_confirmation: bool,
    /// The user already approved this subtask
    #[serde(default)]
    pub confirmed: bool,
    /// Current status
    #[serde(default)]
    pub status: SubTaskStatus,
    /// Output once completed
    #[serde(default)]
    pub result: Option<TaskOutput>,
    /// Error text once failed
    #[serde(default)]
    pub error: Option<String>,
}

impl SubTask {
    /// Kind derived from the parameters
    pub fn kind(&self) -> SubTaskKind {
        self.params.kind()
    }

    /// True when the subtask must be confirmed before it runs
    pub fn needs_confirmation(&self) -> bool {
        !self.confirmed && (self.require_confirmation || self.kind().is_destructive())
    }
}

/// Subtask as handed over by intent decomposition
///
/// Dependencies are indices into the skeleton list; ids are assigned when the
/// graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskSkeleton {
    /// Human-readable description
    pub description: String,
    /// Kind-specific parameters
    pub params: SubTaskParams,
    /// Indices of skeletons this one depends on
    #[serde(default)]
    pub depends_on: Vec<usize>,
    /// Gate on confirmation even when the kind does not require it
    #[serde(default)]
    pub require_confirmation: bool,
}

impl SubTaskSkeleton {
    /// Skeleton without dependencies
    pub fn new(description: impl Into<String>, params: SubTaskParams) -> Self {
        Self {
            description: description.into(),
            params,
            depends_on: Vec::new(),
            require_confirmation: false,
        }
    }

    /// Add dependencies by index
    pub fn depends_on(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.depends_on.extend(indices);
        self
    }

    /// Force a confirmation prompt
    pub fn with_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, h, 0, 0).unwrap()
    }

    #[test]
    fn test_params_serialize_with_kind_tag() {
        let params = SubTaskParams::Search(SearchParams {
            query: "Soham".to_string(),
            window: None,
            limit: Some(5),
        });
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["kind"], "search");
        assert_eq!(json["query"], "Soham");

        let back: SubTaskParams = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), SubTaskKind::Search);
    }

    #[test]
    fn test_validation_rejects_missing_fields() {
        let search = SubTaskParams::Search(SearchParams {
            query: " ".to_string(),
            window: None,
            limit: None,
        });
        assert!(search.validate().unwrap_err().contains("'query'"));

        let update = SubTaskParams::Update(UpdateParams {
            targets: vec![],
            patch: EventPatch::default(),
        });
        assert!(update.validate().is_err());

        let availability = SubTaskParams::Availability(AvailabilityParams {
            query: AvailabilityQuery::Check { start: at(10), end: at(9) },
            window: TimeWindow::new(at(0), at(23)),
            duration_minutes: 30,
            working_hours: None,
            include_weekends: false,
        });
        assert!(availability.validate().is_err());
    }

    #[test]
    fn test_validation_bounds_durations() {
        let suggest = |duration_minutes| {
            SubTaskParams::Availability(AvailabilityParams {
                query: AvailabilityQuery::Suggest {
                    preferred: vec![],
                    max: 5,
                },
                window: TimeWindow::new(at(0), at(23)),
                duration_minutes,
                working_hours: None,
                include_weekends: false,
            })
        };
        assert!(suggest(60).validate().is_ok());
        assert!(suggest(-15).validate().is_err());
        assert!(suggest(i64::MAX)
            .validate()
            .unwrap_err()
            .contains("cannot exceed"));
    }

    #[test]
    fn test_delete_without_targets_is_valid() {
        assert!(SubTaskParams::Delete(DeleteParams::default()).validate().is_ok());
    }

    #[test]
    fn test_destructive_kinds_need_confirmation() {
        let mut subtask = SubTask {
            id: "t1".to_string(),
            description: "Delete".to_string(),
            params: SubTaskParams::Delete(DeleteParams::default()),
            depends_on: vec![],
            require_confirmation: false,
            confirmed: false,
            status: SubTaskStatus::Pending,
            result: None,
            error: None,
        };
        assert!(subtask.needs_confirmation());
        subtask.confirmed = true;
        assert!(!subtask.needs_confirmation());

        subtask.params = SubTaskParams::General(GeneralParams {
            message: "hi".to_string(),
        });
        subtask.confirmed = false;
        assert!(!subtask.needs_confirmation());
        subtask.require_confirmation = true;
        assert!(subtask.needs_confirmation());
    }
}
