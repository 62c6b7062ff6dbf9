//! End-to-end scenarios for the scheduler and the availability engine
//!
//! These tests run against in-memory calendars:
//! 1. Busy merging and free slots (Scenario A)
//! 2. Selection after an ambiguous search (Scenario B)
//! 3. Unrecognised confirmation replies (Scenario C)
//! 4. Utilization summary (Scenario D)
//! 5. Suggestion scoring cap (Scenario E)
//! 6. Failures only block their own dependents

use calendar_assistant_backend::availability::{
    AvailabilityConfig, AvailabilityEngine, AvailabilityRequest, TimeOfDay, WorkingHours,
};
use calendar_assistant_backend::calendar::{CalendarSet, Event, InMemoryCalendar, TimeWindow};
use calendar_assistant_backend::orchestrator::{
    DeleteParams, EntryOutcome, ExecutionContext, FeedbackKind, GeneralParams, ReportStatus,
    RunOutcome, Scheduler, SearchParams, SubTaskParams, SubTaskSkeleton, SubTaskStatus, TaskGraph,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
}

fn event(id: &str, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
    Event {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        start,
        end,
        location: String::new(),
        attendees: Vec::new(),
        account_label: String::new(),
    }
}

fn calendars(events: Vec<Event>) -> (CalendarSet, Arc<InMemoryCalendar>) {
    let account = Arc::new(InMemoryCalendar::with_events("work", events));
    (CalendarSet::default().with_account(account.clone()), account)
}

fn context(calendars: CalendarSet) -> ExecutionContext {
    // Monday 2025-03-10
    ExecutionContext::new(calendars, AvailabilityConfig::default(), at(10, 8, 0))
}

fn search_then_delete(query: &str) -> Vec<SubTaskSkeleton> {
    vec![
        SubTaskSkeleton::new(
            format!("Search for '{}'", query),
            SubTaskParams::Search(SearchParams {
                query: query.to_string(),
                window: None,
                limit: None,
            }),
        ),
        SubTaskSkeleton::new(
            "Delete the matching events",
            SubTaskParams::Delete(DeleteParams::default()),
        )
        .depends_on([0]),
    ]
}

fn general(text: &str) -> SubTaskSkeleton {
    SubTaskSkeleton::new(
        text,
        SubTaskParams::General(GeneralParams {
            message: text.to_string(),
        }),
    )
}

#[tokio::test]
async fn test_scenario_a_buffer_merges_close_meetings() {
    let (set, _) = calendars(vec![
        event("e1", "Standup", at(11, 9, 0), at(11, 10, 0)),
        event("e2", "Review", at(11, 10, 10), at(11, 11, 0)),
    ]);
    let engine = AvailabilityEngine::new(set, AvailabilityConfig::default());
    let request = AvailabilityRequest::new(TimeWindow::new(at(11, 0, 0), at(12, 0, 0)), 30);

    let slots = engine.free_slots(&request).await.unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].start, at(11, 11, 0));
    assert_eq!(slots[0].end, at(11, 17, 0));
    assert_eq!(slots[0].duration_minutes, 360);
}

#[tokio::test]
async fn test_scenario_b_selection_narrows_targets() {
    let (set, account) = calendars(vec![
        event("e1", "Sync with Soham", at(11, 10, 0), at(11, 11, 0)),
        event("e2", "Soham 1:1", at(12, 14, 0), at(12, 15, 0)),
    ]);
    let ctx = context(set);
    let scheduler = Scheduler::default();
    let mut graph = TaskGraph::from_skeletons("u1", "delete Soham", search_then_delete("Soham"))
        .unwrap();

    let RunOutcome::Waiting(request) = scheduler.run(&mut graph, &ctx).await else {
        panic!("expected a selection request");
    };
    assert_eq!(request.kind, FeedbackKind::Selection);
    assert_eq!(request.options.len(), 2);
    assert_eq!(graph.at(1).status, SubTaskStatus::WaitingOnUser);

    let outcome = scheduler.resume(&mut graph, "1", &ctx).await.unwrap();
    let RunOutcome::Finished(report) = outcome else {
        panic!("expected the graph to finish");
    };
    assert_eq!(report.status, ReportStatus::Success);
    assert_eq!(report.completed, 2);

    // Only the first match is gone
    assert_eq!(account.len().await, 1);
    assert_eq!(graph.at(1).params.targets().unwrap()[0].event_id, "e1");
}

#[tokio::test]
async fn test_scenario_c_unrecognised_reply_reissues_prompt() {
    let (set, account) = calendars(vec![event(
        "e1",
        "Sync with Soham",
        at(11, 10, 0),
        at(11, 11, 0),
    )]);
    let ctx = context(set);
    let scheduler = Scheduler::default();
    let mut graph = TaskGraph::from_skeletons("u1", "delete Soham", search_then_delete("Soham"))
        .unwrap();

    let RunOutcome::Waiting(first) = scheduler.run(&mut graph, &ctx).await else {
        panic!("expected a confirmation request");
    };
    assert_eq!(first.kind, FeedbackKind::Confirmation);

    let RunOutcome::Waiting(second) = scheduler.resume(&mut graph, "maybe", &ctx).await.unwrap()
    else {
        panic!("expected the same confirmation again");
    };
    assert_eq!(second.prompt, first.prompt);
    assert_eq!(second.attempts, 1);
    assert_eq!(graph.at(1).status, SubTaskStatus::WaitingOnUser);
    assert_eq!(account.len().await, 1);
}

#[tokio::test]
async fn test_scenario_d_utilization_summary() {
    // Two busy hours on each weekday of the week of 2025-03-10
    let events = (10..15)
        .map(|day| event(&format!("e{}", day), "Focus", at(day, 10, 0), at(day, 12, 0)))
        .collect();
    let (set, _) = calendars(events);
    let engine = AvailabilityEngine::new(set, AvailabilityConfig::default());
    let request = AvailabilityRequest::new(TimeWindow::new(at(10, 0, 0), at(15, 0, 0)), 30)
        .with_working_hours(WorkingHours::new(9, 17));

    let summary = engine.utilization_summary(&request).await.unwrap();
    assert_eq!(summary.days_counted, 5);
    assert!((summary.total_hours - 40.0).abs() < 1e-9);
    assert!((summary.busy_hours - 10.0).abs() < 1e-9);
    assert!((summary.free_hours - 30.0).abs() < 1e-9);
    assert!((summary.utilization_percent - 25.0).abs() < 1e-9);
    assert_eq!(summary.status.as_str(), "very_available");
}

#[tokio::test]
async fn test_scenario_e_tuesday_morning_scores_one() {
    let (set, _) = calendars(Vec::new());
    let engine = AvailabilityEngine::new(set, AvailabilityConfig::default());
    // Tuesday 2025-03-11, only 10:00-11:00 is inside the window
    let request = AvailabilityRequest::new(TimeWindow::new(at(11, 10, 0), at(11, 11, 0)), 60);

    let suggestions = engine
        .suggest_meeting_times(&request, &[TimeOfDay::Morning], 5)
        .await
        .unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].start, at(11, 10, 0));
    assert_eq!(suggestions[0].score, 1.0);
}

#[tokio::test]
async fn test_failure_blocks_only_dependents() {
    let (set, _) = calendars(Vec::new());
    let ctx = context(set);
    let mut skeletons = search_then_delete("nobody");
    skeletons.push(general("Follow up on the deletion").depends_on([1]));
    skeletons.push(general("Say hello"));
    let mut graph = TaskGraph::from_skeletons("u1", "compound", skeletons).unwrap();

    let RunOutcome::Finished(report) = Scheduler::default().run(&mut graph, &ctx).await else {
        panic!("nothing should need confirmation");
    };
    assert_eq!(report.status, ReportStatus::Partial);
    assert_eq!((report.completed, report.failed, report.blocked), (2, 1, 1));
    assert!(matches!(
        &report.entries[1].outcome,
        EntryOutcome::Failed { error } if error.contains("no events matched")
    ));
    assert!(matches!(
        &report.entries[2].outcome,
        EntryOutcome::Blocked { waiting_on } if waiting_on == &vec![graph.at(1).id.clone()]
    ));
    assert!(report
        .message
        .starts_with("Task partially completed. 2 succeeded, 2 failed."));
}

#[tokio::test]
async fn test_next_available_skips_busy_morning() {
    let (set, _) = calendars(vec![event("e1", "Offsite", at(10, 9, 0), at(10, 12, 0))]);
    let engine = AvailabilityEngine::new(set, AvailabilityConfig::default());

    let next = engine
        .next_available(at(10, 8, 7), 60, None, false)
        .await
        .unwrap()
        .unwrap();
    // The slot opens where the offsite ends
    assert_eq!(next.slot.start, at(10, 12, 0));
    assert_eq!(next.found_in_days, 0);
    assert_eq!(next.searched_from, at(10, 8, 15));
    assert!(next.slot.end - next.slot.start >= Duration::minutes(60));
}
