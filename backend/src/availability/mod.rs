//! Availability engine
//!
//! Answers "when am I free" style questions across every connected account:
//!
//! 1. busy aggregation through the [`CalendarSet`]
//! 2. per-day clipping to working hours (weekends optional)
//! 3. merge with buffer
//! 4. gap extraction into [`FreeSlot`]s
//! 5. chronological concatenation
//!
//! Availability checks, next-slot search, suggestions and utilization
//! summaries are all built on the same steps.

pub mod intervals;
pub mod scoring;
pub mod summary;

pub use intervals::{BusyInterval, FreeSlot};
pub use scoring::{SuggestedTime, TimeOfDay};
pub use summary::{AvailabilityStatus, SlotDistribution, UtilizationSummary};

use crate::calendar::{CalendarSet, TimeWindow};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Granularity "now" is rounded up to before searching for the next slot
pub const NEXT_SLOT_ROUNDING_MINUTES: i64 = 15;

/// Longest meeting the engine will look for: one week
pub const MAX_DURATION_MINUTES: i64 = 7 * 24 * 60;

/// Largest merge buffer accepted from configuration
pub const MAX_BUFFER_MINUTES: i64 = 24 * 60;

/// Longest next-slot or search horizon accepted from configuration
pub const MAX_HORIZON_DAYS: i64 = 366;

/// Errors raised for malformed availability queries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityError {
    /// The query itself is invalid
    #[error("Invalid availability query: {0}")]
    InvalidQuery(String),
}

/// Daily working-hours window, whole hours in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    /// First working hour (0-23)
    pub start_hour: u32,
    /// Hour the working day ends (1-24)
    pub end_hour: u32,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self::new(9, 17)
    }
}

impl WorkingHours {
    /// Create a working-hours window
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Reject empty or out-of-range windows
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.end_hour > 24 {
            return Err(AvailabilityError::InvalidQuery(format!(
                "working hours end {} is past midnight",
                self.end_hour
            )));
        }
        if self.start_hour >= self.end_hour {
            return Err(AvailabilityError::InvalidQuery(format!(
                "working hours start {} must be before end {}",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }

    /// Length of the working day in minutes
    pub fn span_minutes(&self) -> i64 {
        (self.end_hour as i64 - self.start_hour as i64) * 60
    }

    /// The working-hours window on `date`
    pub fn window_on(&self, date: NaiveDate) -> TimeWindow {
        let midnight = date.and_time(NaiveTime::MIN).and_utc();
        TimeWindow::new(
            midnight + Duration::hours(self.start_hour as i64),
            midnight + Duration::hours(self.end_hour as i64),
        )
    }
}

/// Engine defaults, usually loaded from the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    /// Working hours used when a query does not name its own
    pub working_hours: WorkingHours,
    /// Gap under which two busy periods are merged
    pub buffer_minutes: i64,
    /// Meeting length used when a request does not state one
    pub default_duration_minutes: i64,
    /// How far ahead the next-slot search looks
    pub next_slot_horizon_days: i64,
    /// Per-account cap on fetched events
    pub max_events_per_account: usize,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            working_hours: WorkingHours::default(),
            buffer_minutes: 15,
            default_duration_minutes: 60,
            next_slot_horizon_days: 14,
            max_events_per_account: 250,
        }
    }
}

impl AvailabilityConfig {
    /// Check the working hours and numeric bounds
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        self.working_hours.validate()?;
        if !(0..=MAX_BUFFER_MINUTES).contains(&self.buffer_minutes) {
            return Err(AvailabilityError::InvalidQuery(format!(
                "buffer must be between 0 and {} minutes, got {}",
                MAX_BUFFER_MINUTES, self.buffer_minutes
            )));
        }
        if self.default_duration_minutes <= 0 || self.next_slot_horizon_days <= 0 {
            return Err(AvailabilityError::InvalidQuery(
                "default duration and horizon must be positive".to_string(),
            ));
        }
        if self.default_duration_minutes > MAX_DURATION_MINUTES {
            return Err(AvailabilityError::InvalidQuery(format!(
                "default duration cannot exceed {} minutes",
                MAX_DURATION_MINUTES
            )));
        }
        if self.next_slot_horizon_days > MAX_HORIZON_DAYS {
            return Err(AvailabilityError::InvalidQuery(format!(
                "next-slot horizon cannot exceed {} days",
                MAX_HORIZON_DAYS
            )));
        }
        Ok(())
    }
}

/// One free-time style query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    /// Range to search
    pub window: TimeWindow,
    /// Required meeting length
    pub duration_minutes: i64,
    /// Overrides the configured working hours
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
    /// Count Saturdays and Sundays
    #[serde(default)]
    pub include_weekends: bool,
}

impl AvailabilityRequest {
    /// Request using the configured working hours, weekdays only
    pub fn new(window: TimeWindow, duration_minutes: i64) -> Self {
        Self {
            window,
            duration_minutes,
            working_hours: None,
            include_weekends: false,
        }
    }

    /// Use specific working hours
    pub fn with_working_hours(mut self, hours: WorkingHours) -> Self {
        self.working_hours = Some(hours);
        self
    }

    /// Include weekends
    pub fn including_weekends(mut self, include: bool) -> Self {
        self.include_weekends = include;
        self
    }

    /// Check window, duration and working hours
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.window.is_empty() {
            return Err(AvailabilityError::InvalidQuery(
                "time window end must be after start".to_string(),
            ));
        }
        if self.duration_minutes <= 0 {
            return Err(AvailabilityError::InvalidQuery(format!(
                "duration must be positive, got {} minutes",
                self.duration_minutes
            )));
        }
        if self.duration_minutes > MAX_DURATION_MINUTES {
            return Err(AvailabilityError::InvalidQuery(format!(
                "duration cannot exceed {} minutes, got {}",
                MAX_DURATION_MINUTES, self.duration_minutes
            )));
        }
        if let Some(hours) = &self.working_hours {
            hours.validate()?;
        }
        Ok(())
    }
}

/// Overlap between a requested window and an existing event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Title of the conflicting event
    pub title: String,
    /// Account the event lives in
    pub account: String,
    /// Start of the overlapping part
    pub start: DateTime<Utc>,
    /// End of the overlapping part
    pub end: DateTime<Utc>,
}

/// Result of checking an exact window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    /// Window that was checked
    pub window: TimeWindow,
    /// True when nothing overlaps
    pub available: bool,
    /// Every overlap, in start order
    pub conflicts: Vec<Conflict>,
}

/// First free slot found by the forward search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextSlot {
    /// The slot
    pub slot: FreeSlot,
    /// Days between the search start and the slot
    pub found_in_days: i64,
    /// Rounded instant the search began at
    pub searched_from: DateTime<Utc>,
}

/// Round up to the next 15-minute boundary; aligned instants are kept
pub fn round_up_to_quarter_hour(instant: DateTime<Utc>) -> DateTime<Utc> {
    let step = NEXT_SLOT_ROUNDING_MINUTES * 60;
    let nanos = instant.timestamp_subsec_nanos() as i64;
    let rem = instant.timestamp().rem_euclid(step);
    if rem == 0 && nanos == 0 {
        return instant;
    }
    instant + Duration::seconds(step - rem) - Duration::nanoseconds(nanos)
}

/// Availability queries over a user's connected calendars
#[derive(Debug, Clone)]
pub struct AvailabilityEngine {
    calendars: CalendarSet,
    config: AvailabilityConfig,
}

impl AvailabilityEngine {
    /// Create an engine over `calendars`
    pub fn new(calendars: CalendarSet, config: AvailabilityConfig) -> Self {
        Self { calendars, config }
    }

    /// Engine defaults
    pub fn config(&self) -> &AvailabilityConfig {
        &self.config
    }

    fn hours_for(&self, request: &AvailabilityRequest) -> WorkingHours {
        request.working_hours.unwrap_or(self.config.working_hours)
    }

    /// Step 1: busy intervals from every account overlapping `window`, sorted by start
    pub async fn busy_intervals(&self, window: TimeWindow) -> Vec<BusyInterval> {
        let events = self
            .calendars
            .list_all(window, self.config.max_events_per_account)
            .await;
        let intervals = intervals::project_events(&events);
        tracing::debug!(
            accounts = self.calendars.accounts().len(),
            events = events.len(),
            intervals = intervals.len(),
            "Aggregated busy intervals"
        );
        intervals
    }

    /// Free slots of at least the requested duration
    pub async fn free_slots(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Vec<FreeSlot>, AvailabilityError> {
        request.validate()?;
        let busy = self.busy_intervals(request.window).await;
        Ok(intervals::compute_free_slots(
            &busy,
            request.window,
            self.hours_for(request),
            request.include_weekends,
            self.config.buffer_minutes,
            request.duration_minutes,
        ))
    }

    /// Check whether `window` is entirely free
    ///
    /// Conflicts are computed against the unmerged intervals so each one names
    /// a single event and its exact overlap.
    pub async fn check_availability(
        &self,
        window: TimeWindow,
    ) -> Result<AvailabilityCheck, AvailabilityError> {
        if window.is_empty() {
            return Err(AvailabilityError::InvalidQuery(
                "time window end must be after start".to_string(),
            ));
        }

        let conflicts: Vec<Conflict> = self
            .busy_intervals(window)
            .await
            .into_iter()
            .filter_map(|interval| {
                window.intersect(&interval.window()).map(|overlap| Conflict {
                    title: interval.label,
                    account: interval.source_account,
                    start: overlap.start,
                    end: overlap.end,
                })
            })
            .collect();

        Ok(AvailabilityCheck {
            window,
            available: conflicts.is_empty(),
            conflicts,
        })
    }

    /// First free slot from `now` (rounded up to 15 minutes) within the horizon
    pub async fn next_available(
        &self,
        now: DateTime<Utc>,
        duration_minutes: i64,
        working_hours: Option<WorkingHours>,
        include_weekends: bool,
    ) -> Result<Option<NextSlot>, AvailabilityError> {
        let from = round_up_to_quarter_hour(now);
        let end = Duration::try_days(self.config.next_slot_horizon_days.min(MAX_HORIZON_DAYS))
            .and_then(|horizon| from.checked_add_signed(horizon))
            .ok_or_else(|| {
                AvailabilityError::InvalidQuery("next-slot horizon is out of range".to_string())
            })?;
        let window = TimeWindow::new(from, end);
        let mut request =
            AvailabilityRequest::new(window, duration_minutes).including_weekends(include_weekends);
        request.working_hours = working_hours;

        let slots = self.free_slots(&request).await?;
        Ok(slots.into_iter().next().map(|slot| NextSlot {
            found_in_days: (slot.start.date_naive() - from.date_naive()).num_days(),
            searched_from: from,
            slot,
        }))
    }

    /// Best candidate starts inside the free slots, highest score first
    pub async fn suggest_meeting_times(
        &self,
        request: &AvailabilityRequest,
        preferred: &[TimeOfDay],
        max: usize,
    ) -> Result<Vec<SuggestedTime>, AvailabilityError> {
        let slots = self.free_slots(request).await?;
        Ok(scoring::suggest(
            &slots,
            request.duration_minutes,
            self.hours_for(request),
            preferred,
            max,
        ))
    }

    /// Busy/free totals for the request window
    pub async fn utilization_summary(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<UtilizationSummary, AvailabilityError> {
        request.validate()?;
        let busy = self.busy_intervals(request.window).await;
        Ok(summary::summarize(
            &busy,
            request.window,
            self.hours_for(request),
            request.include_weekends,
            self.config.buffer_minutes,
        ))
    }
}
