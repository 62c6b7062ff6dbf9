//! Intent extraction
//!
//! The contract between the conversation layer and the orchestrator: a message
//! is classified into an [`Intent`] and then decomposed into the ordered
//! [`SubTaskSkeleton`] list a [`TaskGraph`](crate::orchestrator::TaskGraph) is
//! built from. [`RuleBasedExtractor`] is the bundled keyword implementation.

mod parse;
mod rules;

pub use rules::RuleBasedExtractor;

use crate::availability::{TimeOfDay, WorkingHours};
use crate::calendar::{Attendee, EventPatch, ResponseStatus, TimeWindow};
use crate::error::AppError;
use crate::orchestrator::{AvailabilityQuery, SubTaskSkeleton};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Find events
    Search,
    /// Create an event at a known time
    Create,
    /// Change existing events
    Update,
    /// Remove existing events
    Delete,
    /// Find a free slot and book it
    Schedule,
    /// Attendee responses
    Rsvp,
    /// Free time, conflicts, suggestions or utilization
    Availability,
    /// Several dependent operations
    Compound,
    /// Not enough information to act
    Clarify,
    /// Anything else
    General,
}

impl IntentKind {
    /// Convert the kind to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Search => "search",
            IntentKind::Create => "create",
            IntentKind::Update => "update",
            IntentKind::Delete => "delete",
            IntentKind::Schedule => "schedule",
            IntentKind::Rsvp => "rsvp",
            IntentKind::Availability => "availability",
            IntentKind::Compound => "compound",
            IntentKind::Clarify => "clarify",
            IntentKind::General => "general",
        }
    }
}

/// Values pulled out of the message
///
/// Relative dates are already resolved against [`IntentContext::now`], so
/// decomposition is a pure function of the intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentEntities {
    /// Search term
    pub query: Option<String>,
    /// Operation applied to the search result of a compound request
    pub action: Option<IntentKind>,
    /// Event title for create and schedule
    pub title: Option<String>,
    /// Explicit start time
    pub start: Option<DateTime<Utc>>,
    /// Range the request is about
    pub window: TimeWindow,
    /// Whether `window` came from the message rather than the default
    pub window_explicit: bool,
    /// Meeting length
    pub duration_minutes: i64,
    /// Preferred time-of-day buckets
    pub preferred: Vec<TimeOfDay>,
    /// Count Saturday and Sunday as working days
    pub include_weekends: bool,
    /// Attendees given by email
    pub attendees: Vec<Attendee>,
    /// Changes requested by an update
    pub patch: EventPatch,
    /// Availability question
    pub availability: Option<AvailabilityQuery>,
    /// Attendee status filter for RSVP questions
    pub status_filter: Option<ResponseStatus>,
    /// Question to ask when the intent is not actionable
    pub clarification: Option<String>,
}

/// Classified message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Classification
    pub kind: IntentKind,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Extracted values
    pub entities: IntentEntities,
}

/// Inputs classification depends on besides the message
#[derive(Debug, Clone)]
pub struct IntentContext {
    /// Reference instant for relative dates
    pub now: DateTime<Utc>,
    /// Labels of the user's connected accounts
    pub accounts: Vec<String>,
    /// Working hours requests are evaluated against
    pub working_hours: WorkingHours,
    /// Meeting length when the message names none
    pub default_duration_minutes: i64,
}

impl IntentContext {
    /// Context at `now` with default working hours and a 60 minute meeting
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            accounts: Vec::new(),
            working_hours: WorkingHours::default(),
            default_duration_minutes: 60,
        }
    }
}

/// Intent extraction collaborator
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Classify a message
    async fn classify(&self, message: &str, context: &IntentContext) -> Result<Intent, AppError>;

    /// Break an intent into ordered subtask skeletons
    ///
    /// Dependencies are indices into the returned list.
    async fn decompose(
        &self,
        intent: &Intent,
        message: &str,
    ) -> Result<Vec<SubTaskSkeleton>, AppError>;
}
