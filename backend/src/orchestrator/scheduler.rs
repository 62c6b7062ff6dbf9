//! Task graph scheduler
//!
//! Runs a graph serially: a Kahn-style ready queue hands out subtasks whose
//! dependencies have all completed, lowest insertion index first. Destructive
//! or flagged subtasks stop at the confirmation gate, which parks the whole
//! graph until the next turn supplies a reply.
//!
//! Executor errors are recorded on their own subtask and never abort the graph.
//! Dependents of a failed or cancelled subtask stay Pending and show up as
//! blocked in the final report.

use super::constants::{CANCELLED_BY_USER, DEFAULT_MAX_FEEDBACK_RETRIES};
use super::error::ExecutionError;
use super::executors::{ExecutionContext, ExecutorRegistry};
use super::gate::{self, ConfirmationReply, FeedbackKind, FeedbackRequest, SelectionReply};
use super::graph::TaskGraph;
use super::report::ExecutionReport;
use super::types::{SubTaskKind, SubTaskStatus};
use crate::calendar::EventRef;
use crate::error::AppError;
use std::collections::BTreeSet;

/// Where a run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Paused on this request; the graph must be persisted
    Waiting(FeedbackRequest),
    /// Nothing left to run
    Finished(ExecutionReport),
}

/// Ready queue over graph positions
///
/// `remaining[i]` counts dependencies of `i` that have not completed. A
/// position enters `ready` when that count reaches zero.
struct ReadyQueue {
    ready: BTreeSet<usize>,
    remaining: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    parked: Vec<usize>,
}

impl ReadyQueue {
    fn build(graph: &TaskGraph) -> Self {
        let n = graph.len();
        let mut remaining = vec![0; n];
        let mut dependents = vec![Vec::new(); n];
        for (position, count) in remaining.iter_mut().enumerate() {
            for dep in graph.dependency_positions(position) {
                dependents[dep].push(position);
                if graph.at(dep).status != SubTaskStatus::Completed {
                    *count += 1;
                }
            }
        }

        let ready = (0..n)
            .filter(|&p| {
                remaining[p] == 0
                    && matches!(
                        graph.at(p).status,
                        SubTaskStatus::Pending | SubTaskStatus::WaitingOnSearch
                    )
            })
            .collect();

        Self {
            ready,
            remaining,
            dependents,
            parked: Vec::new(),
        }
    }

    fn pop(&mut self) -> Option<usize> {
        self.ready.pop_first()
    }

    fn remove(&mut self, position: usize) {
        self.ready.remove(&position);
    }

    fn complete(&mut self, position: usize, graph: &TaskGraph) {
        for &dependent in &self.dependents[position] {
            self.remaining[dependent] = self.remaining[dependent].saturating_sub(1);
            let unblocked = self.remaining[dependent] == 0;
            if unblocked && graph.at(dependent).status == SubTaskStatus::Pending {
                self.ready.insert(dependent);
            }
        }
    }

    fn park(&mut self, position: usize) {
        self.parked.push(position);
    }

    fn unpark_all(&mut self) {
        self.ready.extend(self.parked.drain(..));
    }
}

/// Serial executor of task graphs
#[derive(Debug, Clone)]
pub struct Scheduler {
    registry: ExecutorRegistry,
    max_feedback_retries: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(ExecutorRegistry::with_defaults(), DEFAULT_MAX_FEEDBACK_RETRIES)
    }
}

impl Scheduler {
    /// Scheduler over `registry`
    ///
    /// After `max_feedback_retries` unrecognised replies a gated subtask is
    /// cancelled; 0 disables the bound.
    pub fn new(registry: ExecutorRegistry, max_feedback_retries: u32) -> Self {
        Self {
            registry,
            max_feedback_retries,
        }
    }

    /// Run until the graph finishes or pauses for feedback
    pub async fn run(&self, graph: &mut TaskGraph, ctx: &ExecutionContext) -> RunOutcome {
        self.drive(graph, ctx, None).await
    }

    /// Apply a reply to the paused graph and keep running
    ///
    /// # Arguments
    /// * `graph` - A graph with a pending confirmation or selection request
    /// * `reply` - The user's raw reply
    /// * `ctx` - Calendars and availability engine
    ///
    /// # Returns
    /// * `Ok(RunOutcome)` - Where the run stopped next
    /// * `Err(AppError::InvalidRequest)` - Nothing to resume, or a clarification
    pub async fn resume(
        &self,
        graph: &mut TaskGraph,
        reply: &str,
        ctx: &ExecutionContext,
    ) -> Result<RunOutcome, AppError> {
        let mut request = graph.awaiting.take().ok_or_else(|| {
            AppError::InvalidRequest("No feedback is pending for this task".to_string())
        })?;

        if request.kind == FeedbackKind::Clarification {
            graph.awaiting = Some(request);
            return Err(AppError::InvalidRequest(
                "Clarifications restart intent extraction and cannot resume a task".to_string(),
            ));
        }

        let Some(position) = request
            .subtask_id
            .as_deref()
            .and_then(|id| graph.position(id))
        else {
            graph.awaiting = Some(request);
            return Err(AppError::InvalidRequest(
                "Feedback request does not name a subtask".to_string(),
            ));
        };
        request.response = Some(reply.to_string());

        tracing::debug!(
            graph_id = %graph.id,
            subtask_id = %graph.at(position).id,
            feedback_kind = request.kind.as_str(),
            "Resuming with feedback"
        );

        let outcome = if request.kind == FeedbackKind::Confirmation {
            match gate::parse_confirmation(reply) {
                ConfirmationReply::Proceed => {
                    self.approve(graph, position, None);
                    self.drive(graph, ctx, Some(position)).await
                }
                ConfirmationReply::Cancel => {
                    self.cancel(graph, position, CANCELLED_BY_USER.to_string());
                    self.drive(graph, ctx, None).await
                }
                ConfirmationReply::Select
                    if graph.at(position).params.targets().is_some_and(|t| t.len() > 1) =>
                {
                    let targets = graph
                        .at(position)
                        .params
                        .targets()
                        .map(<[EventRef]>::to_vec)
                        .unwrap_or_default();
                    let selection = gate::selection_request(graph.at(position), &targets);
                    RunOutcome::Waiting(self.pause(graph, position, selection))
                }
                ConfirmationReply::Select | ConfirmationReply::Unrecognized => {
                    self.retry(graph, position, request, None, ctx).await
                }
            }
        } else {
            match gate::parse_selection(reply, request.options.len()) {
                SelectionReply::Selected(indices) => {
                    let events = request.option_events();
                    let chosen: Vec<EventRef> = indices
                        .iter()
                        .filter_map(|&i| events.get(i).cloned())
                        .collect();
                    self.approve(graph, position, Some(chosen));
                    self.drive(graph, ctx, Some(position)).await
                }
                SelectionReply::Cancel => {
                    self.cancel(graph, position, CANCELLED_BY_USER.to_string());
                    self.drive(graph, ctx, None).await
                }
                SelectionReply::Invalid(message) => {
                    self.retry(graph, position, request, Some(message), ctx).await
                }
            }
        };
        Ok(outcome)
    }

    async fn drive(
        &self,
        graph: &mut TaskGraph,
        ctx: &ExecutionContext,
        first: Option<usize>,
    ) -> RunOutcome {
        let mut queue = ReadyQueue::build(graph);

        if let Some(position) = first {
            queue.remove(position);
            if let Some(request) = self.step(graph, ctx, position, &mut queue).await {
                return RunOutcome::Waiting(request);
            }
        }

        while let Some(position) = queue.pop() {
            if let Some(request) = self.step(graph, ctx, position, &mut queue).await {
                return RunOutcome::Waiting(request);
            }
        }

        // Nothing can complete a search any more
        for position in 0..graph.len() {
            if graph.at(position).status == SubTaskStatus::WaitingOnSearch {
                self.fail(
                    graph,
                    position,
                    ExecutionError::Validation(
                        "no search result to take target events from".to_string(),
                    ),
                );
            }
        }

        graph.current_subtask_id = None;
        let report = ExecutionReport::from_graph(graph);
        tracing::info!(
            graph_id = %graph.id,
            status = report.status.as_str(),
            completed = report.completed,
            failed = report.failed,
            blocked = report.blocked,
            "Task graph finished"
        );
        RunOutcome::Finished(report)
    }

    /// Resolve, gate or dispatch one ready subtask; `Some` means the graph paused
    async fn step(
        &self,
        graph: &mut TaskGraph,
        ctx: &ExecutionContext,
        position: usize,
        queue: &mut ReadyQueue,
    ) -> Option<FeedbackRequest> {
        let subtask = graph.at(position);
        if !matches!(
            subtask.status,
            SubTaskStatus::Pending | SubTaskStatus::WaitingOnSearch
        ) || !graph.dependencies_completed(position)
        {
            return None;
        }

        let needs_targets = subtask.kind().is_destructive()
            && subtask.params.targets().is_some_and(|t| t.is_empty());
        if needs_targets {
            match resolve_targets(graph) {
                Ok(Some(targets)) => graph.at_mut(position).params.set_targets(targets),
                Ok(None) if graph.has_outstanding_search() => {
                    graph.at_mut(position).status = SubTaskStatus::WaitingOnSearch;
                    queue.park(position);
                    tracing::debug!(
                        subtask_id = %graph.at(position).id,
                        "Waiting on search for target events"
                    );
                    return None;
                }
                Ok(None) => {
                    self.fail(
                        graph,
                        position,
                        ExecutionError::Validation(
                            "no search result to take target events from".to_string(),
                        ),
                    );
                    return None;
                }
                Err(ExecutionError::Ambiguous { candidates }) => {
                    let request = gate::selection_request(graph.at(position), &candidates);
                    return Some(self.pause(graph, position, request));
                }
                Err(err) => {
                    self.fail(graph, position, err);
                    return None;
                }
            }
        }

        if graph.at(position).needs_confirmation() {
            let request = gate::confirmation_request(graph.at(position));
            return Some(self.pause(graph, position, request));
        }

        self.dispatch(graph, ctx, position, queue).await
    }

    async fn dispatch(
        &self,
        graph: &mut TaskGraph,
        ctx: &ExecutionContext,
        position: usize,
        queue: &mut ReadyQueue,
    ) -> Option<FeedbackRequest> {
        let kind = graph.at(position).kind();
        let id = graph.at(position).id.clone();

        graph.at_mut(position).status = SubTaskStatus::InProgress;
        graph.current_subtask_id = Some(id.clone());
        tracing::debug!(subtask_id = %id, kind = kind.as_str(), "Dispatching subtask");

        let subtask = graph.at(position).clone();
        let result = match self.registry.get(kind) {
            Some(executor) => executor.execute(&subtask, graph, ctx).await,
            None => Err(ExecutionError::Validation(format!(
                "no executor registered for {}",
                kind.as_str()
            ))),
        };
        graph.current_subtask_id = None;

        match result {
            Ok(output) => {
                tracing::debug!(subtask_id = %id, summary = %output.summary, "Subtask completed");
                let completed = graph.at_mut(position);
                completed.status = SubTaskStatus::Completed;
                completed.result = Some(output);
                graph.record_completion(&id);
                queue.complete(position, graph);
                if kind == SubTaskKind::Search {
                    queue.unpark_all();
                }
                None
            }
            Err(err) => {
                self.fail(graph, position, err);
                None
            }
        }
    }

    async fn retry(
        &self,
        graph: &mut TaskGraph,
        position: usize,
        mut request: FeedbackRequest,
        error: Option<String>,
        ctx: &ExecutionContext,
    ) -> RunOutcome {
        request.attempts += 1;
        if self.max_feedback_retries > 0 && request.attempts >= self.max_feedback_retries {
            tracing::warn!(
                subtask_id = %graph.at(position).id,
                attempts = request.attempts,
                "Cancelling after repeated unrecognised replies"
            );
            self.cancel(
                graph,
                position,
                format!("cancelled after {} unrecognised replies", request.attempts),
            );
            return self.drive(graph, ctx, None).await;
        }

        request.last_error = error;
        graph.awaiting = Some(request.clone());
        RunOutcome::Waiting(request)
    }

    fn pause(
        &self,
        graph: &mut TaskGraph,
        position: usize,
        request: FeedbackRequest,
    ) -> FeedbackRequest {
        let subtask = graph.at_mut(position);
        subtask.status = SubTaskStatus::WaitingOnUser;
        let id = subtask.id.clone();

        tracing::debug!(
            subtask_id = %id,
            feedback_kind = request.kind.as_str(),
            "Pausing for user feedback"
        );
        graph.current_subtask_id = Some(id);
        graph.awaiting = Some(request.clone());
        request
    }

    fn approve(&self, graph: &mut TaskGraph, position: usize, targets: Option<Vec<EventRef>>) {
        let subtask = graph.at_mut(position);
        if let Some(targets) = targets {
            subtask.params.set_targets(targets);
        }
        subtask.confirmed = true;
        subtask.status = SubTaskStatus::Pending;
        graph.awaiting = None;
    }

    fn cancel(&self, graph: &mut TaskGraph, position: usize, reason: String) {
        graph.awaiting = None;
        graph.current_subtask_id = None;
        self.fail(graph, position, ExecutionError::Cancelled(reason));
    }

    fn fail(&self, graph: &mut TaskGraph, position: usize, err: ExecutionError) {
        let subtask = graph.at_mut(position);
        tracing::debug!(subtask_id = %subtask.id, error = %err, "Subtask failed");
        subtask.status = SubTaskStatus::Failed;
        subtask.error = Some(err.to_string());
    }
}

/// Targets for an Update/Delete from the latest completed search
///
/// `Ok(None)` means no search has completed yet. An empty result is a
/// validation error and more than one match is [`ExecutionError::Ambiguous`].
fn resolve_targets(graph: &TaskGraph) -> Result<Option<Vec<EventRef>>, ExecutionError> {
    let Some(search) = graph.latest_completed_search() else {
        return Ok(None);
    };
    let candidates: Vec<EventRef> = search
        .result
        .as_ref()
        .and_then(|r| r.events())
        .map(|events| events.iter().map(|e| e.to_ref()).collect())
        .unwrap_or_default();

    match candidates.len() {
        0 => Err(ExecutionError::Validation(
            "no events matched the search".to_string(),
        )),
        1 => Ok(Some(candidates)),
        _ => Err(ExecutionError::Ambiguous { candidates }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::AvailabilityConfig;
    use crate::calendar::{CalendarSet, Event, InMemoryCalendar};
    use crate::orchestrator::executors::SubTaskExecutor;
    use crate::orchestrator::types::{
        DeleteParams, GeneralParams, OutputData, SearchParams, SubTask, SubTaskParams,
        SubTaskSkeleton, TaskOutput,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, h, 0, 0).unwrap()
    }

    fn event(id: &str, title: &str, hour: u32) -> Event {
        Event {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            start: at(hour),
            end: at(hour + 1),
            location: String::new(),
            attendees: vec![],
            account_label: String::new(),
        }
    }

    fn context(events: Vec<Event>) -> (Arc<InMemoryCalendar>, ExecutionContext) {
        let work = Arc::new(InMemoryCalendar::with_events("work", events));
        let calendars = CalendarSet::default().with_account(work.clone());
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        (work, ExecutionContext::new(calendars, AvailabilityConfig::default(), now))
    }

    fn search(q: &str) -> SubTaskSkeleton {
        SubTaskSkeleton::new(
            format!("Search for '{}'", q),
            SubTaskParams::Search(SearchParams {
                query: q.to_string(),
                window: None,
                limit: None,
            }),
        )
    }

    fn delete() -> SubTaskSkeleton {
        SubTaskSkeleton::new(
            "Delete matching events",
            SubTaskParams::Delete(DeleteParams::default()),
        )
    }

    fn general(name: &str) -> SubTaskSkeleton {
        SubTaskSkeleton::new(
            name,
            SubTaskParams::General(GeneralParams {
                message: name.to_string(),
            }),
        )
    }

    /// Records execution order and checks the dependency law on every call
    struct Recorder {
        order: Arc<Mutex<Vec<String>>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl SubTaskExecutor for Recorder {
        fn kind(&self) -> SubTaskKind {
            SubTaskKind::General
        }

        async fn execute(
            &self,
            subtask: &SubTask,
            graph: &TaskGraph,
            _ctx: &ExecutionContext,
        ) -> Result<TaskOutput, ExecutionError> {
            for dep in &subtask.depends_on {
                assert_eq!(graph.get(dep).map(|s| s.status), Some(SubTaskStatus::Completed));
            }
            assert_eq!(subtask.status, SubTaskStatus::InProgress);
            self.order.lock().unwrap().push(subtask.description.clone());
            if self.fail_on.as_deref() == Some(subtask.description.as_str()) {
                return Err(ExecutionError::Validation("boom".to_string()));
            }
            Ok(TaskOutput {
                summary: "ok".to_string(),
                data: OutputData::Acknowledged {
                    message: "ok".to_string(),
                },
            })
        }
    }

    fn recording_scheduler(fail_on: Option<&str>) -> (Scheduler, Arc<Mutex<Vec<String>>>) {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ExecutorRegistry::with_defaults();
        registry.register(Arc::new(Recorder {
            order: order.clone(),
            fail_on: fail_on.map(str::to_string),
        }));
        (Scheduler::new(registry, 3), order)
    }

    #[tokio::test]
    async fn test_ready_ties_follow_insertion_order() {
        let (scheduler, order) = recording_scheduler(None);
        let (_, ctx) = context(vec![]);
        // c depends on a; b and d are independent
        let mut graph = TaskGraph::from_skeletons(
            "u1",
            "",
            vec![general("a"), general("b"), general("c").depends_on([0]), general("d")],
        )
        .unwrap();

        let RunOutcome::Finished(report) = scheduler.run(&mut graph, &ctx).await else {
            panic!("expected finished run");
        };
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(report.completed, 4);
    }

    #[tokio::test]
    async fn test_failure_blocks_only_dependents() {
        let (scheduler, order) = recording_scheduler(Some("a"));
        let (_, ctx) = context(vec![]);
        let mut graph = TaskGraph::from_skeletons(
            "u1",
            "",
            vec![general("a"), general("b").depends_on([0]), general("c")],
        )
        .unwrap();

        let RunOutcome::Finished(report) = scheduler.run(&mut graph, &ctx).await else {
            panic!("expected finished run");
        };
        assert_eq!(*order.lock().unwrap(), vec!["a", "c"]);
        assert_eq!(graph.at(1).status, SubTaskStatus::Pending);
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.blocked, 1);
        assert!(report.message.contains("Failed: a - Validation error: boom"));
        assert!(report.message.contains("Blocked: b - waiting on a"));
    }

    #[tokio::test]
    async fn test_single_match_asks_for_confirmation() {
        let (work, ctx) = context(vec![event("a", "Sync with Soham", 9)]);
        let scheduler = Scheduler::default();
        let mut graph =
            TaskGraph::from_skeletons("u1", "", vec![search("Soham"), delete().depends_on([0])])
                .unwrap();

        let RunOutcome::Waiting(request) = scheduler.run(&mut graph, &ctx).await else {
            panic!("expected confirmation");
        };
        assert_eq!(request.kind, FeedbackKind::Confirmation);
        assert!(request.prompt.contains("1. Sync with Soham - 2026-10-20 09:00"));
        assert_eq!(graph.at(1).status, SubTaskStatus::WaitingOnUser);
        assert_eq!(work.len().await, 1);

        let outcome = scheduler.resume(&mut graph, "YES", &ctx).await.unwrap();
        let RunOutcome::Finished(report) = outcome else {
            panic!("expected finished run");
        };
        assert_eq!(report.completed, 2);
        assert_eq!(work.len().await, 0);
    }

    #[tokio::test]
    async fn test_several_matches_are_ambiguous() {
        let (work, ctx) = context(vec![event("a", "Sync A", 10), event("b", "Sync B", 14)]);
        let scheduler = Scheduler::default();
        let skeletons = vec![search("Sync"), delete().depends_on([0])];
        let mut graph = TaskGraph::from_skeletons("u1", "delete", skeletons).unwrap();

        let RunOutcome::Waiting(request) = scheduler.run(&mut graph, &ctx).await else {
            panic!("expected a selection request");
        };
        assert_eq!(request.kind, FeedbackKind::Selection);
        assert_eq!(request.options.len(), 2);
        assert!(matches!(
            resolve_targets(&graph),
            Err(ExecutionError::Ambiguous { candidates }) if candidates.len() == 2
        ));
        assert_eq!(work.len().await, 2);
    }

    #[tokio::test]
    async fn test_cancel_marks_failed_and_continues() {
        let (work, ctx) = context(vec![event("a", "Sync with Soham", 9)]);
        let scheduler = Scheduler::default();
        let mut graph = TaskGraph::from_skeletons(
            "u1",
            "",
            vec![search("Soham"), delete().depends_on([0]), general("after").depends_on([1])],
        )
        .unwrap();

        scheduler.run(&mut graph, &ctx).await;
        let RunOutcome::Finished(report) = scheduler.resume(&mut graph, "no", &ctx).await.unwrap()
        else {
            panic!("expected finished run");
        };
        assert_eq!(graph.at(1).error.as_deref(), Some("cancelled by user"));
        assert_eq!(graph.at(2).status, SubTaskStatus::Pending);
        assert_eq!(report.blocked, 1);
        assert_eq!(work.len().await, 1);
    }

    #[tokio::test]
    async fn test_unrecognised_replies_auto_cancel() {
        let (work, ctx) = context(vec![event("a", "Sync with Soham", 9)]);
        let scheduler = Scheduler::default();
        let mut graph =
            TaskGraph::from_skeletons("u1", "", vec![search("Soham"), delete().depends_on([0])])
                .unwrap();

        let RunOutcome::Waiting(first) = scheduler.run(&mut graph, &ctx).await else {
            panic!("expected confirmation");
        };
        for attempt in 1..3 {
            let RunOutcome::Waiting(again) =
                scheduler.resume(&mut graph, "maybe", &ctx).await.unwrap()
            else {
                panic!("expected re-issued prompt");
            };
            assert_eq!(again.prompt, first.prompt);
            assert_eq!(again.attempts, attempt);
        }

        let RunOutcome::Finished(report) =
            scheduler.resume(&mut graph, "dunno", &ctx).await.unwrap()
        else {
            panic!("expected cancellation");
        };
        assert_eq!(
            graph.at(1).error.as_deref(),
            Some("cancelled after 3 unrecognised replies")
        );
        assert_eq!(report.failed, 1);
        assert_eq!(work.len().await, 1);
    }

    #[tokio::test]
    async fn test_waiting_on_search_without_declared_dependency() {
        let (work, ctx) = context(vec![event("a", "Sync with Soham", 9)]);
        let scheduler = Scheduler::default();
        // Delete is listed first and does not depend on the search
        let mut graph =
            TaskGraph::from_skeletons("u1", "", vec![delete(), search("Soham")]).unwrap();

        let RunOutcome::Waiting(request) = scheduler.run(&mut graph, &ctx).await else {
            panic!("expected confirmation");
        };
        assert_eq!(graph.at(1).status, SubTaskStatus::Completed);
        assert_eq!(request.subtask_id.as_deref(), Some(graph.at(0).id.as_str()));

        scheduler.resume(&mut graph, "y", &ctx).await.unwrap();
        assert_eq!(work.len().await, 0);
    }

    #[tokio::test]
    async fn test_no_search_fails_target_resolution() {
        let (_, ctx) = context(vec![]);
        let scheduler = Scheduler::default();
        let mut graph = TaskGraph::from_skeletons("u1", "", vec![delete()]).unwrap();

        let RunOutcome::Finished(report) = scheduler.run(&mut graph, &ctx).await else {
            panic!("expected finished run");
        };
        assert!(graph.at(0).error.as_deref().unwrap().contains("no search result"));
        assert_eq!(report.status, crate::orchestrator::ReportStatus::Failed);
    }

    #[tokio::test]
    async fn test_confirmation_select_switches_to_selection() {
        let (work, ctx) = context(vec![event("a", "Standup", 9), event("b", "Review", 11)]);
        let scheduler = Scheduler::default();
        let targets: Vec<EventRef> = ["a", "b"]
            .iter()
            .map(|id| EventRef {
                account: "work".to_string(),
                event_id: id.to_string(),
                title: id.to_string(),
                start: at(9),
            })
            .collect();
        let mut graph = TaskGraph::from_skeletons(
            "u1",
            "",
            vec![SubTaskSkeleton::new(
                "Delete both",
                SubTaskParams::Delete(DeleteParams { targets }),
            )],
        )
        .unwrap();

        scheduler.run(&mut graph, &ctx).await;
        let RunOutcome::Waiting(selection) =
            scheduler.resume(&mut graph, "select", &ctx).await.unwrap()
        else {
            panic!("expected selection");
        };
        assert_eq!(selection.kind, FeedbackKind::Selection);
        assert_eq!(selection.options.len(), 2);

        scheduler.resume(&mut graph, "2", &ctx).await.unwrap();
        assert_eq!(work.len().await, 1);
    }

    #[tokio::test]
    async fn test_resume_without_pending_feedback() {
        let (_, ctx) = context(vec![]);
        let mut graph = TaskGraph::from_skeletons("u1", "", vec![general("a")]).unwrap();
        let result = Scheduler::default().resume(&mut graph, "yes", &ctx).await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }
}
