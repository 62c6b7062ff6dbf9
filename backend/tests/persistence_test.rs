//! Parked graphs survive a restart
//!
//! A confirmation pause is written to SQLite; a second assistant opened on the
//! same file picks the graph up and finishes it.

use calendar_assistant_backend::assistant::Assistant;
use calendar_assistant_backend::availability::AvailabilityConfig;
use calendar_assistant_backend::calendar::{CalendarSet, Event, InMemoryCalendar};
use calendar_assistant_backend::intent::RuleBasedExtractor;
use calendar_assistant_backend::orchestrator::{FeedbackKind, OrchestratorConfig, ReportStatus};
use calendar_assistant_backend::session::{PendingState, SessionStore, SqliteSessionStore};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

fn standup() -> Event {
    Event {
        id: "standup-1".to_string(),
        title: "Team Standup".to_string(),
        description: String::new(),
        start: Utc.with_ymd_and_hms(2025, 3, 11, 9, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 3, 11, 9, 30, 0).unwrap(),
        location: String::new(),
        attendees: Vec::new(),
        account_label: String::new(),
    }
}

async fn open(path: &str, calendars: CalendarSet) -> (Assistant, Arc<SqliteSessionStore>) {
    let store = Arc::new(SqliteSessionStore::new(path).await.unwrap());
    let assistant = Assistant::new(
        Arc::new(RuleBasedExtractor::new()),
        store.clone(),
        calendars,
        AvailabilityConfig::default(),
        OrchestratorConfig::default(),
    )
    .with_fixed_now(now());
    (assistant, store)
}

#[tokio::test]
async fn test_parked_graph_resumes_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.db");
    let path = path.to_str().unwrap();

    let account = Arc::new(InMemoryCalendar::with_events("work", vec![standup()]));
    let calendars = CalendarSet::default().with_account(account.clone());

    {
        let (assistant, store) = open(path, calendars.clone()).await;
        let response = assistant
            .run_turn("alice", "delete the meeting called standup", None)
            .await
            .unwrap();
        assert!(response.still_waiting);
        assert_eq!(
            response.feedback_request.as_ref().map(|r| r.kind),
            Some(FeedbackKind::Confirmation)
        );

        let snapshot = store.load("alice").await.unwrap().unwrap();
        assert!(matches!(snapshot.pending, PendingState::Graph(ref g) if g.is_waiting()));
    }

    let (assistant, store) = open(path, calendars).await;
    let response = assistant.run_turn("alice", "", Some("yes")).await.unwrap();
    assert!(!response.still_waiting);
    let report = response.execution.unwrap();
    assert_eq!(report.status, ReportStatus::Success);
    assert_eq!(account.len().await, 0);
    assert!(store.load("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_is_reported_and_clears_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.db");

    let account = Arc::new(InMemoryCalendar::with_events("work", vec![standup()]));
    let calendars = CalendarSet::default().with_account(account.clone());
    let (assistant, store) = open(path.to_str().unwrap(), calendars).await;

    assistant
        .run_turn("bob", "remove events named standup", None)
        .await
        .unwrap();
    let response = assistant.run_turn("bob", "no", None).await.unwrap();

    assert!(!response.still_waiting);
    assert!(response.report.contains("Failed: Delete the matching events - cancelled by user"));
    assert_eq!(account.len().await, 1);
    assert!(store.load("bob").await.unwrap().is_none());
}
