//! Conversation turns
//!
//! [`Assistant::run_turn`] is the single entry point of the conversation
//! layer. A turn either resumes what the user's session is waiting on or
//! starts a new request: classify, decompose, build a graph and run it until
//! it finishes or pauses. Whatever is left unfinished is persisted.

use crate::availability::AvailabilityConfig;
use crate::calendar::CalendarSet;
use crate::error::AppError;
use crate::intent::{IntentContext, IntentExtractor, IntentKind};
use crate::orchestrator::gate::clarification_request;
use crate::orchestrator::utils::{hash_graph, hash_message, validate_message};
use crate::orchestrator::{
    ExecutionContext, ExecutionReport, ExecutorRegistry, FeedbackRequest, OrchestratorConfig,
    RunOutcome, Scheduler, TaskGraph,
};
use crate::session::{PendingState, SessionSnapshot, SessionStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const DEFAULT_CLARIFICATION: &str =
    "Could you tell me more about what you'd like to do with your calendar?";

/// Result of one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Text to show the user: the final report or the pending question
    pub report: String,
    /// Whether the session is waiting on the user
    pub still_waiting: bool,
    /// The pending question, when waiting
    pub feedback_request: Option<FeedbackRequest>,
    /// Structured report, when the graph finished
    pub execution: Option<ExecutionReport>,
}

impl TurnResponse {
    fn waiting(request: FeedbackRequest) -> Self {
        Self {
            report: request.display_text(),
            still_waiting: true,
            feedback_request: Some(request),
            execution: None,
        }
    }

    fn finished(report: ExecutionReport) -> Self {
        Self {
            report: report.message.clone(),
            still_waiting: false,
            feedback_request: None,
            execution: Some(report),
        }
    }
}

/// Turn pipeline over one calendar backend and one session store
pub struct Assistant {
    extractor: Arc<dyn IntentExtractor>,
    store: Arc<dyn SessionStore>,
    scheduler: Scheduler,
    calendars: CalendarSet,
    user_calendars: RwLock<HashMap<String, CalendarSet>>,
    availability: AvailabilityConfig,
    config: OrchestratorConfig,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    fixed_now: Option<DateTime<Utc>>,
}

impl Assistant {
    /// Create an assistant
    ///
    /// # Arguments
    /// * `extractor` - Intent extraction collaborator
    /// * `store` - Session persistence
    /// * `calendars` - Accounts used for users without their own set
    /// * `availability` - Engine defaults
    /// * `config` - Turn pipeline settings
    pub fn new(
        extractor: Arc<dyn IntentExtractor>,
        store: Arc<dyn SessionStore>,
        calendars: CalendarSet,
        availability: AvailabilityConfig,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            extractor,
            store,
            scheduler: Scheduler::new(
                ExecutorRegistry::with_defaults(),
                config.max_feedback_retries,
            ),
            calendars,
            user_calendars: RwLock::new(HashMap::new()),
            availability,
            config,
            user_locks: Mutex::new(HashMap::new()),
            fixed_now: None,
        }
    }

    /// Evaluate every turn at `now` instead of the wall clock
    pub fn with_fixed_now(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    /// Give `user_id` its own connected accounts
    pub async fn connect_calendars(&self, user_id: impl Into<String>, calendars: CalendarSet) {
        self.user_calendars
            .write()
            .await
            .insert(user_id.into(), calendars);
    }

    /// Stored session of `user_id`
    ///
    /// # Returns
    /// * `Err(AppError::SessionNotFound)` - Nothing is pending for the user
    pub async fn session(&self, user_id: &str) -> Result<SessionSnapshot, AppError> {
        self.store
            .load(user_id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(user_id.to_string()))
    }

    /// Drop whatever the user's session is waiting on
    pub async fn discard_session(&self, user_id: &str) -> Result<(), AppError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        if self.store.clear(user_id).await? {
            info!(user_id = %user_id, "Discarded session");
            Ok(())
        } else {
            Err(AppError::SessionNotFound(user_id.to_string()))
        }
    }

    /// Advance the user's conversation by one turn
    ///
    /// Turns of the same user run one at a time; different users run
    /// concurrently.
    ///
    /// # Arguments
    /// * `user_id` - Session owner
    /// * `message` - New message, or the reply when `feedback` is absent and
    ///   the session is waiting
    /// * `feedback` - Explicit reply to the pending question
    ///
    /// # Returns
    /// * `Ok(TurnResponse)` - Final report or the next question
    /// * `Err(AppError)` - Invalid input, unusable decomposition or storage failure
    pub async fn run_turn(
        &self,
        user_id: &str,
        message: &str,
        feedback: Option<&str>,
    ) -> Result<TurnResponse, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidRequest("user_id cannot be empty".to_string()));
        }
        let lock = self.user_lock(user_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.turn(user_id, message, feedback).await
        };
        self.release_lock(user_id, lock).await;
        result
    }

    async fn turn(
        &self,
        user_id: &str,
        message: &str,
        feedback: Option<&str>,
    ) -> Result<TurnResponse, AppError> {
        let reply = feedback.unwrap_or(message);
        match self.store.load(user_id).await?.map(|s| s.pending) {
            Some(PendingState::Graph(graph)) => self.resume(graph, reply).await,
            Some(PendingState::Clarification(pending)) => {
                let combined = format!(
                    "{}. Additional context: {}",
                    pending.original_message,
                    reply.trim()
                );
                debug!(
                    user_id = %user_id,
                    message_hash = %hash_message(&combined),
                    "Clarification answered, reclassifying"
                );
                self.store.clear(user_id).await?;
                self.start(user_id, &combined).await
            }
            None => self.start(user_id, message).await,
        }
    }

    async fn start(&self, user_id: &str, message: &str) -> Result<TurnResponse, AppError> {
        let message = match validate_message(message, self.config.max_message_length) {
            Ok(m) => m,
            Err(_) if message.trim().is_empty() => "",
            Err(e) => return Err(AppError::InvalidRequest(e)),
        };

        let calendars = self.calendars_for(user_id).await;
        let context = IntentContext {
            now: self.now(),
            accounts: calendars.labels(),
            working_hours: self.availability.working_hours,
            default_duration_minutes: self.availability.default_duration_minutes,
        };

        let intent = self.extractor.classify(message, &context).await?;
        info!(
            user_id = %user_id,
            message_hash = %hash_message(message),
            intent = intent.kind.as_str(),
            confidence = intent.confidence,
            "Classified message"
        );

        if intent.kind == IntentKind::Clarify
            || intent.confidence < self.config.min_intent_confidence
        {
            let prompt = intent
                .entities
                .clarification
                .clone()
                .unwrap_or_else(|| DEFAULT_CLARIFICATION.to_string());
            self.store
                .save(&SessionSnapshot::clarifying(user_id, message, prompt.clone()))
                .await?;
            return Ok(TurnResponse::waiting(clarification_request(prompt)));
        }

        let skeletons = self.extractor.decompose(&intent, message).await?;
        let mut graph = TaskGraph::from_skeletons(user_id, message, skeletons)?;
        info!(
            graph_id = %graph.id,
            graph_hash = %hash_graph(&graph),
            subtasks = graph.len(),
            "Built task graph"
        );

        let ctx = self.execution_context(calendars);
        let outcome = self.scheduler.run(&mut graph, &ctx).await;
        self.settle(graph, outcome).await
    }

    async fn resume(&self, mut graph: TaskGraph, reply: &str) -> Result<TurnResponse, AppError> {
        let calendars = self.calendars_for(&graph.owner_id).await;
        let ctx = self.execution_context(calendars);
        let outcome = self.scheduler.resume(&mut graph, reply, &ctx).await?;
        self.settle(graph, outcome).await
    }

    /// Persist a paused graph or clear a finished one
    async fn settle(
        &self,
        graph: TaskGraph,
        outcome: RunOutcome,
    ) -> Result<TurnResponse, AppError> {
        match outcome {
            RunOutcome::Waiting(request) => {
                debug!(
                    graph_id = %graph.id,
                    feedback_kind = request.kind.as_str(),
                    "Parking graph"
                );
                self.store.save(&SessionSnapshot::parked(graph)).await?;
                Ok(TurnResponse::waiting(request))
            }
            RunOutcome::Finished(report) => {
                info!(
                    graph_id = %graph.id,
                    status = report.status.as_str(),
                    completed = report.completed,
                    failed = report.failed,
                    blocked = report.blocked,
                    "Graph finished"
                );
                if let Err(e) = self.store.clear(&graph.owner_id).await {
                    warn!(graph_id = %graph.id, error = %e, "Failed to clear finished session");
                }
                Ok(TurnResponse::finished(report))
            }
        }
    }

    fn execution_context(&self, calendars: CalendarSet) -> ExecutionContext {
        ExecutionContext::new(calendars, self.availability.clone(), self.now())
            .with_search_horizon(self.config.search_horizon_days)
    }

    async fn calendars_for(&self, user_id: &str) -> CalendarSet {
        self.user_calendars
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| self.calendars.clone())
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the user's lock entry once no other turn holds or awaits it
    async fn release_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        drop(lock);
        if locks
            .get(user_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(user_id);
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{Event, InMemoryCalendar};
    use crate::intent::RuleBasedExtractor;
    use crate::session::InMemorySessionStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
    }

    fn event(id: &str, title: &str, day: u32, hour: u32) -> Event {
        Event {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            start: Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 3, day, hour + 1, 0, 0).unwrap(),
            location: String::new(),
            attendees: Vec::new(),
            account_label: String::new(),
        }
    }

    fn assistant(events: Vec<Event>) -> (Assistant, Arc<InMemoryCalendar>) {
        let work = Arc::new(InMemoryCalendar::with_events("work", events));
        let calendars = CalendarSet::default().with_account(work.clone());
        let assistant = Assistant::new(
            Arc::new(RuleBasedExtractor::new()),
            Arc::new(InMemorySessionStore::new()),
            calendars,
            AvailabilityConfig::default(),
            OrchestratorConfig::default(),
        )
        .with_fixed_now(now());
        (assistant, work)
    }

    #[tokio::test]
    async fn test_unclear_message_asks_then_reruns() {
        let (assistant, work) = assistant(vec![event("e1", "Sync with Soham", 11, 10)]);

        let first = assistant.run_turn("u1", "delete it", None).await.unwrap();
        assert!(first.still_waiting);
        assert!(assistant.session("u1").await.is_ok());

        // "delete it. Additional context: with Soham" now names a target
        let second = assistant
            .run_turn("u1", "", Some("with Soham"))
            .await
            .unwrap();
        assert!(second.still_waiting);
        assert!(second.report.contains("Are you sure you want to delete 1 event(s)?"));

        let third = assistant.run_turn("u1", "yes", None).await.unwrap();
        assert!(!third.still_waiting);
        assert_eq!(work.len().await, 0);
        assert!(matches!(
            assistant.session("u1").await,
            Err(AppError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_general_message_finishes_immediately() {
        let (assistant, _) = assistant(Vec::new());
        let response = assistant.run_turn("u1", "hello there", None).await.unwrap();
        assert!(!response.still_waiting);
        assert!(response.execution.is_some());
        assert!(response.report.starts_with("Task completed successfully!"));
    }

    #[tokio::test]
    async fn test_discard_session() {
        let (assistant, _) = assistant(Vec::new());
        assistant.run_turn("u1", "", None).await.unwrap();
        assistant.discard_session("u1").await.unwrap();
        assert!(matches!(
            assistant.discard_session("u1").await,
            Err(AppError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_locks_released_after_turn() {
        let (assistant, _) = assistant(Vec::new());
        assistant.run_turn("u1", "hello there", None).await.unwrap();
        assistant.run_turn("u2", "", None).await.unwrap();
        assert!(assistant.user_locks.lock().await.is_empty());

        // A turn still waiting on the lock keeps the entry alive
        let held = assistant.user_lock("u3").await;
        assistant.run_turn("u3", "hello there", None).await.unwrap();
        assert!(assistant.user_locks.lock().await.contains_key("u3"));
        assistant.release_lock("u3", held).await;
        assert!(assistant.user_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_huge_duration_asks_instead_of_failing() {
        let (assistant, work) = assistant(Vec::new());

        let create = assistant
            .run_turn(
                "u1",
                "create lunch at 3pm tomorrow for 100000000000000000000 hours",
                None,
            )
            .await
            .unwrap();
        assert!(create.still_waiting);
        assert!(create.report.contains("up to a week"));

        // The corrected length replaces the one in the original message
        let corrected = assistant.run_turn("u1", "", Some("1 hour")).await.unwrap();
        assert!(!corrected.still_waiting);
        assert_eq!(work.len().await, 1);

        let suggest = assistant
            .run_turn(
                "u2",
                "suggest best times for 100000000000000000000 hours this week",
                None,
            )
            .await
            .unwrap();
        assert!(suggest.still_waiting);
    }

    #[tokio::test]
    async fn test_overlong_message_rejected() {
        let (assistant, _) = assistant(Vec::new());
        let long = "a".repeat(10_001);
        assert!(matches!(
            assistant.run_turn("u1", &long, None).await,
            Err(AppError::InvalidRequest(_))
        ));
    }
}
