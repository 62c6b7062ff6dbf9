//! Calendar data types
//!
//! Shared by the access facade, the availability engine and the subtask executors.
//! All timestamps are UTC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a new window
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when the window contains no time at all
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when `[start, end)` shares any time with this window
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }

    /// True when `instant` falls inside the window
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Intersection of two windows, `None` when they do not overlap
    pub fn intersect(&self, other: &TimeWindow) -> Option<TimeWindow> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TimeWindow { start, end })
    }

    /// Length of the window in whole minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Attendee response to an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Attendee accepted
    Accepted,
    /// Attendee declined
    Declined,
    /// Attendee tentatively accepted
    Tentative,
    /// No response yet
    #[default]
    NeedsAction,
}

impl ResponseStatus {
    /// Convert the status to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Declined => "declined",
            ResponseStatus::Tentative => "tentative",
            ResponseStatus::NeedsAction => "needs_action",
        }
    }
}

/// A person invited to an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Email address
    pub email: String,
    /// Display name, if the provider reports one
    #[serde(default)]
    pub name: Option<String>,
    /// Response to the invitation
    #[serde(default)]
    pub status: ResponseStatus,
}

impl Attendee {
    /// Attendee who has not answered yet
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            status: ResponseStatus::NeedsAction,
        }
    }

    /// Set the response status
    pub fn with_status(mut self, status: ResponseStatus) -> Self {
        self.status = status;
        self
    }

    /// Name when known, email otherwise
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// A calendar event as returned by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Provider-assigned identifier, unique within its account
    pub id: String,
    /// Event title
    pub title: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Start time
    pub start: DateTime<Utc>,
    /// End time
    pub end: DateTime<Utc>,
    /// Location text
    #[serde(default)]
    pub location: String,
    /// Invited people
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    /// Label of the account the event lives in
    #[serde(default)]
    pub account_label: String,
}

impl Event {
    /// The event's time range
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Case-insensitive substring match over title, description, location and attendees
    ///
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.location.to_lowercase().contains(needle)
            || self.attendees.iter().any(|a| {
                a.email.to_lowercase().contains(needle)
                    || a.name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(needle))
            })
    }

    /// Build a target reference for this event
    pub fn to_ref(&self) -> EventRef {
        EventRef {
            account: self.account_label.clone(),
            event_id: self.id.clone(),
            title: self.title.clone(),
            start: self.start,
        }
    }
}

/// Data needed to create an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Event title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Start time
    pub start: DateTime<Utc>,
    /// End time
    pub end: DateTime<Utc>,
    /// Location
    #[serde(default)]
    pub location: String,
    /// Invited people
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

impl NewEvent {
    /// Check that the event has a title and a positive duration
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("event title cannot be empty".to_string());
        }
        if self.end <= self.start {
            return Err(format!(
                "event end {} must be after start {}",
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            ));
        }
        Ok(())
    }
}

/// Partial update of an event; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New start time
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// New end time
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// New location
    #[serde(default)]
    pub location: Option<String>,
}

impl EventPatch {
    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.location.is_none()
    }

    /// Apply the patch in place
    pub fn apply(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(start) = self.start {
            event.start = start;
        }
        if let Some(end) = self.end {
            event.end = end;
        }
        if let Some(location) = &self.location {
            event.location = location.clone();
        }
    }

    /// Names of the fields this patch changes
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.start.is_some() {
            fields.push("start");
        }
        if self.end.is_some() {
            fields.push("end");
        }
        if self.location.is_some() {
            fields.push("location");
        }
        fields
    }
}

/// Pointer to an event in a specific account
///
/// Update and delete subtasks act on these rather than on full events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    /// Account label
    pub account: String,
    /// Event id within the account
    pub event_id: String,
    /// Title at the time the reference was taken
    pub title: String,
    /// Start at the time the reference was taken
    pub start: DateTime<Utc>,
}

impl EventRef {
    /// "Title - 2026-10-20 09:00"
    pub fn label(&self) -> String {
        format!("{} - {}", self.title, self.start.format("%Y-%m-%d %H:%M"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, h, m, 0).unwrap()
    }

    #[test]
    fn test_window_intersect() {
        let a = TimeWindow::new(at(9, 0), at(12, 0));
        let b = TimeWindow::new(at(11, 0), at(14, 0));
        assert_eq!(a.intersect(&b), Some(TimeWindow::new(at(11, 0), at(12, 0))));

        let c = TimeWindow::new(at(12, 0), at(13, 0));
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn test_event_matches_attendee_name() {
        let event = Event {
            id: "e1".to_string(),
            title: "Sync".to_string(),
            description: String::new(),
            start: at(9, 0),
            end: at(10, 0),
            location: String::new(),
            attendees: vec![Attendee {
                email: "s@example.com".to_string(),
                name: Some("Soham".to_string()),
                status: ResponseStatus::Accepted,
            }],
            account_label: "work".to_string(),
        };
        assert!(event.matches("soham"));
        assert!(event.matches("sync"));
        assert!(!event.matches("lunch"));
    }

    #[test]
    fn test_new_event_validation() {
        let mut event = NewEvent {
            title: "Standup".to_string(),
            description: String::new(),
            start: at(9, 0),
            end: at(9, 15),
            location: String::new(),
            attendees: vec![],
        };
        assert!(event.validate().is_ok());

        event.end = at(9, 0);
        assert!(event.validate().unwrap_err().contains("must be after"));

        event.end = at(9, 15);
        event.title = "  ".to_string();
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_patch_apply_and_fields() {
        let mut event = Event {
            id: "e1".to_string(),
            title: "Old".to_string(),
            description: String::new(),
            start: at(9, 0),
            end: at(10, 0),
            location: String::new(),
            attendees: vec![],
            account_label: "work".to_string(),
        };
        let patch = EventPatch {
            title: Some("New".to_string()),
            location: Some("Room A".to_string()),
            ..Default::default()
        };
        assert_eq!(patch.changed_fields(), vec!["title", "location"]);
        patch.apply(&mut event);
        assert_eq!(event.title, "New");
        assert_eq!(event.location, "Room A");
        assert!(EventPatch::default().is_empty());
    }
}
