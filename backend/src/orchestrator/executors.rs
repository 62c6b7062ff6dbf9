//! Subtask executors
//!
//! One executor per [`SubTaskKind`], looked up in an [`ExecutorRegistry`].
//! Executors only read the graph; the scheduler records whatever they return.

use super::constants::{DEFAULT_MAX_SUGGESTIONS, DEFAULT_SEARCH_HORIZON_DAYS};
use super::error::ExecutionError;
use super::graph::TaskGraph;
use super::types::{
    AvailabilityQuery, OutputData, RsvpEntry, SubTask, SubTaskKind, SubTaskParams, TaskOutput,
};
use crate::availability::{
    AvailabilityConfig, AvailabilityEngine, AvailabilityRequest, MAX_HORIZON_DAYS,
};
use crate::calendar::{CalendarError, CalendarSet, NewEvent, ResponseStatus, TimeWindow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything an executor may touch
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Connected accounts of the graph owner
    pub calendars: CalendarSet,
    /// Availability engine over the same accounts
    pub availability: AvailabilityEngine,
    /// Reference instant for "now"-relative defaults
    pub now: DateTime<Utc>,
    /// Search window in days when a subtask names none
    pub search_horizon_days: i64,
}

impl ExecutionContext {
    /// Context over `calendars` with the given engine defaults
    pub fn new(calendars: CalendarSet, config: AvailabilityConfig, now: DateTime<Utc>) -> Self {
        Self {
            availability: AvailabilityEngine::new(calendars.clone(), config),
            calendars,
            now,
            search_horizon_days: DEFAULT_SEARCH_HORIZON_DAYS,
        }
    }

    /// Override the default search window
    pub fn with_search_horizon(mut self, days: i64) -> Self {
        self.search_horizon_days = days;
        self
    }

    fn default_window(&self) -> TimeWindow {
        let days = self.search_horizon_days.clamp(1, MAX_HORIZON_DAYS);
        TimeWindow::new(self.now, self.now + Duration::days(days))
    }

    fn per_account_limit(&self) -> usize {
        self.availability.config().max_events_per_account
    }
}

/// Executes one kind of subtask
#[async_trait]
pub trait SubTaskExecutor: Send + Sync {
    /// Kind handled by this executor
    fn kind(&self) -> SubTaskKind;

    /// Run the subtask
    ///
    /// # Arguments
    /// * `subtask` - The subtask to run, parameters already validated
    /// * `graph` - The owning graph, read-only
    /// * `ctx` - Calendars and availability engine
    ///
    /// # Returns
    /// * `Ok(TaskOutput)` - Summary and structured result
    /// * `Err(ExecutionError)` - Recorded on the subtask by the scheduler
    async fn execute(
        &self,
        subtask: &SubTask,
        graph: &TaskGraph,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError>;
}

/// Lookup table from kind to executor
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<SubTaskKind, Arc<dyn SubTaskExecutor>>,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.executors.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("ExecutorRegistry").field("kinds", &kinds).finish()
    }
}

impl ExecutorRegistry {
    /// Registry with the built-in executor for every kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(SearchExecutor));
        registry.register(Arc::new(CreateExecutor));
        registry.register(Arc::new(UpdateExecutor));
        registry.register(Arc::new(DeleteExecutor));
        registry.register(Arc::new(ScheduleExecutor));
        registry.register(Arc::new(RsvpExecutor));
        registry.register(Arc::new(AvailabilityExecutor));
        registry.register(Arc::new(GeneralExecutor));
        registry
    }

    /// Add or replace the executor for its kind
    pub fn register(&mut self, executor: Arc<dyn SubTaskExecutor>) {
        self.executors.insert(executor.kind(), executor);
    }

    /// Executor for `kind`
    pub fn get(&self, kind: SubTaskKind) -> Option<Arc<dyn SubTaskExecutor>> {
        self.executors.get(&kind).cloned()
    }
}

fn mismatch(subtask: &SubTask, expected: SubTaskKind) -> ExecutionError {
    ExecutionError::Validation(format!(
        "subtask '{}' has {} parameters, expected {}",
        subtask.id,
        subtask.kind().as_str(),
        expected.as_str()
    ))
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%a %Y-%m-%d %H:%M").to_string()
}

/// Text search across all accounts
#[derive(Debug, Default)]
pub struct SearchExecutor;

#[async_trait]
impl SubTaskExecutor for SearchExecutor {
    fn kind(&self) -> SubTaskKind {
        SubTaskKind::Search
    }

    async fn execute(
        &self,
        subtask: &SubTask,
        _graph: &TaskGraph,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError> {
        let SubTaskParams::Search(params) = &subtask.params else {
            return Err(mismatch(subtask, SubTaskKind::Search));
        };
        let window = params.window.unwrap_or_else(|| ctx.default_window());
        let events = ctx
            .calendars
            .search(&params.query, window, ctx.per_account_limit(), params.limit)
            .await;

        Ok(TaskOutput {
            summary: format!("Found {} event(s) matching '{}'", events.len(), params.query),
            data: OutputData::Events { events },
        })
    }
}

/// Creates one event
#[derive(Debug, Default)]
pub struct CreateExecutor;

#[async_trait]
impl SubTaskExecutor for CreateExecutor {
    fn kind(&self) -> SubTaskKind {
        SubTaskKind::Create
    }

    async fn execute(
        &self,
        subtask: &SubTask,
        _graph: &TaskGraph,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError> {
        let SubTaskParams::Create(params) = &subtask.params else {
            return Err(mismatch(subtask, SubTaskKind::Create));
        };
        let account = ctx.calendars.account_or_default(params.account.as_deref())?;
        let event = account.create_event(params.event.clone()).await?;

        Ok(TaskOutput {
            summary: format!(
                "Created '{}' on {} in {}",
                event.title,
                format_instant(event.start),
                event.account_label
            ),
            data: OutputData::Created { event },
        })
    }
}

/// Patches every target
#[derive(Debug, Default)]
pub struct UpdateExecutor;

#[async_trait]
impl SubTaskExecutor for UpdateExecutor {
    fn kind(&self) -> SubTaskKind {
        SubTaskKind::Update
    }

    async fn execute(
        &self,
        subtask: &SubTask,
        _graph: &TaskGraph,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError> {
        let SubTaskParams::Update(params) = &subtask.params else {
            return Err(mismatch(subtask, SubTaskKind::Update));
        };
        if params.targets.is_empty() {
            return Err(ExecutionError::Validation("update has no target events".to_string()));
        }

        let mut updated = Vec::new();
        let mut failures = Vec::new();
        for target in &params.targets {
            let result = match ctx.calendars.account(&target.account) {
                Ok(account) => account.update_event(&target.event_id, params.patch.clone()).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(event) => updated.push(event),
                Err(e) => {
                    tracing::warn!(event_id = %target.event_id, error = %e, "Update failed");
                    failures.push(format!("{}: {}", target.title, e));
                }
            }
        }

        if updated.is_empty() {
            return Err(CalendarError::Provider(failures.join("; ")).into());
        }

        let titles: Vec<&str> = updated.iter().map(|e| e.title.as_str()).collect();
        let mut summary = format!("Updated {} event(s): {}", updated.len(), titles.join(", "));
        if !failures.is_empty() {
            summary.push_str(&format!("; {} failed: {}", failures.len(), failures.join("; ")));
        }

        Ok(TaskOutput {
            summary,
            data: OutputData::Updated {
                events: updated,
                failures,
            },
        })
    }
}

/// Deletes every target
#[derive(Debug, Default)]
pub struct DeleteExecutor;

#[async_trait]
impl SubTaskExecutor for DeleteExecutor {
    fn kind(&self) -> SubTaskKind {
        SubTaskKind::Delete
    }

    async fn execute(
        &self,
        subtask: &SubTask,
        _graph: &TaskGraph,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError> {
        let SubTaskParams::Delete(params) = &subtask.params else {
            return Err(mismatch(subtask, SubTaskKind::Delete));
        };
        if params.targets.is_empty() {
            return Err(ExecutionError::Validation("delete has no target events".to_string()));
        }

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for target in &params.targets {
            let result = match ctx.calendars.account(&target.account) {
                Ok(account) => account.delete_event(&target.event_id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(true) => deleted.push(target.clone()),
                Ok(false) => {
                    failures.push(format!("{}: provider refused the delete", target.title))
                }
                Err(e) => {
                    tracing::warn!(event_id = %target.event_id, error = %e, "Delete failed");
                    failures.push(format!("{}: {}", target.title, e));
                }
            }
        }

        if deleted.is_empty() {
            return Err(CalendarError::Provider(failures.join("; ")).into());
        }

        let titles: Vec<&str> = deleted.iter().map(|t| t.title.as_str()).collect();
        let mut summary = format!("Deleted {} event(s): {}", deleted.len(), titles.join(", "));
        if !failures.is_empty() {
            summary.push_str(&format!("; {} failed: {}", failures.len(), failures.join("; ")));
        }

        Ok(TaskOutput {
            summary,
            data: OutputData::Deleted {
                targets: deleted,
                failures,
            },
        })
    }
}

/// Books the first free slot that fits
#[derive(Debug, Default)]
pub struct ScheduleExecutor;

#[async_trait]
impl SubTaskExecutor for ScheduleExecutor {
    fn kind(&self) -> SubTaskKind {
        SubTaskKind::Schedule
    }

    async fn execute(
        &self,
        subtask: &SubTask,
        _graph: &TaskGraph,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError> {
        let SubTaskParams::Schedule(params) = &subtask.params else {
            return Err(mismatch(subtask, SubTaskKind::Schedule));
        };

        let mut request = AvailabilityRequest::new(params.window, params.duration_minutes)
            .including_weekends(params.include_weekends);
        request.working_hours = params.working_hours;

        let slots = ctx.availability.free_slots(&request).await?;
        let slot = slots.first().ok_or_else(|| {
            ExecutionError::Validation(format!(
                "no free slot of {} minutes between {} and {}",
                params.duration_minutes,
                format_instant(params.window.start),
                format_instant(params.window.end)
            ))
        })?;

        let start = slot.start;
        let end = start + Duration::minutes(params.duration_minutes);
        let account = ctx.calendars.account_or_default(params.account.as_deref())?;
        let event = account
            .create_event(NewEvent {
                title: params.title.clone(),
                description: params.description.clone(),
                start,
                end,
                location: params.location.clone(),
                attendees: params.attendees.clone(),
            })
            .await?;

        Ok(TaskOutput {
            summary: format!(
                "Scheduled '{}' on {} for {} minutes in {}",
                event.title,
                format_instant(event.start),
                params.duration_minutes,
                event.account_label
            ),
            data: OutputData::Created { event },
        })
    }
}

/// Reports attendee responses
#[derive(Debug, Default)]
pub struct RsvpExecutor;

#[async_trait]
impl SubTaskExecutor for RsvpExecutor {
    fn kind(&self) -> SubTaskKind {
        SubTaskKind::Rsvp
    }

    async fn execute(
        &self,
        subtask: &SubTask,
        _graph: &TaskGraph,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError> {
        let SubTaskParams::Rsvp(params) = &subtask.params else {
            return Err(mismatch(subtask, SubTaskKind::Rsvp));
        };
        let window = params.window.unwrap_or_else(|| ctx.default_window());
        let events = match &params.query {
            Some(query) => {
                ctx.calendars
                    .search(query, window, ctx.per_account_limit(), None)
                    .await
            }
            None => ctx.calendars.list_all(window, ctx.per_account_limit()).await,
        };

        let entries: Vec<RsvpEntry> = events
            .iter()
            .filter(|e| !e.attendees.is_empty())
            .filter_map(|e| {
                let attendees: Vec<_> = e
                    .attendees
                    .iter()
                    .filter(|a| params.status_filter.map_or(true, |s| a.status == s))
                    .cloned()
                    .collect();
                (!attendees.is_empty()).then(|| RsvpEntry {
                    event: e.to_ref(),
                    attendees,
                })
            })
            .collect();

        let mut counts: HashMap<ResponseStatus, usize> = HashMap::new();
        for attendee in entries.iter().flat_map(|e| &e.attendees) {
            *counts.entry(attendee.status).or_default() += 1;
        }
        let tally = [
            ResponseStatus::Accepted,
            ResponseStatus::Declined,
            ResponseStatus::Tentative,
            ResponseStatus::NeedsAction,
        ]
        .iter()
        .map(|s| format!("{} {}", counts.get(s).copied().unwrap_or(0), s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

        Ok(TaskOutput {
            summary: format!("RSVPs for {} event(s): {}", entries.len(), tally),
            data: OutputData::Rsvps { entries },
        })
    }
}

/// Answers availability questions through the engine
#[derive(Debug, Default)]
pub struct AvailabilityExecutor;

#[async_trait]
impl SubTaskExecutor for AvailabilityExecutor {
    fn kind(&self) -> SubTaskKind {
        SubTaskKind::Availability
    }

    async fn execute(
        &self,
        subtask: &SubTask,
        _graph: &TaskGraph,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError> {
        let SubTaskParams::Availability(params) = &subtask.params else {
            return Err(mismatch(subtask, SubTaskKind::Availability));
        };
        let mut request = AvailabilityRequest::new(params.window, params.duration_minutes)
            .including_weekends(params.include_weekends);
        request.working_hours = params.working_hours;
        let engine = &ctx.availability;

        let output = match &params.query {
            AvailabilityQuery::FreeTime => {
                let slots = engine.free_slots(&request).await?;
                TaskOutput {
                    summary: format!(
                        "Found {} free slot(s) of at least {} minutes",
                        slots.len(),
                        params.duration_minutes
                    ),
                    data: OutputData::FreeSlots { slots },
                }
            }
            AvailabilityQuery::Check { start, end } => {
                let check = engine
                    .check_availability(TimeWindow::new(*start, *end))
                    .await?;
                let summary = if check.available {
                    format!("Free from {} to {}", format_instant(*start), format_instant(*end))
                } else {
                    let titles: Vec<&str> =
                        check.conflicts.iter().map(|c| c.title.as_str()).collect();
                    format!(
                        "Busy: {} conflict(s) ({})",
                        check.conflicts.len(),
                        titles.join(", ")
                    )
                };
                TaskOutput {
                    summary,
                    data: OutputData::Check { check },
                }
            }
            AvailabilityQuery::NextAvailable => {
                let next = engine
                    .next_available(
                        ctx.now,
                        params.duration_minutes,
                        params.working_hours,
                        params.include_weekends,
                    )
                    .await?;
                let summary = match &next {
                    Some(found) => format!(
                        "Next available: {} ({} minutes free, in {} day(s))",
                        format_instant(found.slot.start),
                        found.slot.duration_minutes,
                        found.found_in_days
                    ),
                    None => format!(
                        "No free slot of {} minutes in the next {} days",
                        params.duration_minutes,
                        engine.config().next_slot_horizon_days
                    ),
                };
                TaskOutput {
                    summary,
                    data: OutputData::NextSlot { next },
                }
            }
            AvailabilityQuery::Suggest { preferred, max } => {
                let max = if *max == 0 { DEFAULT_MAX_SUGGESTIONS } else { *max };
                let suggestions = engine.suggest_meeting_times(&request, preferred, max).await?;
                let summary = match suggestions.first() {
                    Some(best) => format!(
                        "Suggested {} time(s); best is {} (score {:.2})",
                        suggestions.len(),
                        format_instant(best.start),
                        best.score
                    ),
                    None => "No suitable meeting times found".to_string(),
                };
                TaskOutput {
                    summary,
                    data: OutputData::Suggestions { suggestions },
                }
            }
            AvailabilityQuery::Summary => {
                let summary = engine.utilization_summary(&request).await?;
                TaskOutput {
                    summary: format!(
                        "{:.0}% utilized ({}): {:.1} of {:.1} working hours busy",
                        summary.utilization_percent,
                        summary.status.as_str(),
                        summary.busy_hours,
                        summary.total_hours
                    ),
                    data: OutputData::Summary { summary },
                }
            }
        };
        Ok(output)
    }
}

/// Answers without touching a calendar
#[derive(Debug, Default)]
pub struct GeneralExecutor;

/// Reply for messages that are not calendar operations
pub const GENERAL_REPLY: &str =
    "I can search, create, update, delete and schedule calendar events, check RSVPs, and find free time.";

#[async_trait]
impl SubTaskExecutor for GeneralExecutor {
    fn kind(&self) -> SubTaskKind {
        SubTaskKind::General
    }

    async fn execute(
        &self,
        subtask: &SubTask,
        _graph: &TaskGraph,
        _ctx: &ExecutionContext,
    ) -> Result<TaskOutput, ExecutionError> {
        let SubTaskParams::General(_) = &subtask.params else {
            return Err(mismatch(subtask, SubTaskKind::General));
        };
        Ok(TaskOutput {
            summary: GENERAL_REPLY.to_string(),
            data: OutputData::Acknowledged {
                message: GENERAL_REPLY.to_string(),
            },
        })
    }
}
