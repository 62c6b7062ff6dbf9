//! In-memory calendar account
//!
//! Backs the bundled server (seeded from a JSON fixture) and the test suite.

use super::{CalendarAccount, CalendarError, Event, EventPatch, NewEvent, TimeWindow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Calendar account held entirely in memory
#[derive(Debug)]
pub struct InMemoryCalendar {
    label: String,
    events: RwLock<BTreeMap<String, Event>>,
}

/// One account in a fixture file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountFixture {
    /// Account label
    pub label: String,
    /// Events to seed
    #[serde(default)]
    pub events: Vec<Event>,
}

impl InMemoryCalendar {
    /// Empty account
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            events: RwLock::new(BTreeMap::new()),
        }
    }

    /// Account pre-populated with events
    ///
    /// The events' `account_label` is overwritten with this account's label.
    pub fn with_events(label: impl Into<String>, events: Vec<Event>) -> Self {
        let label = label.into();
        let events = events
            .into_iter()
            .map(|mut e| {
                e.account_label = label.clone();
                (e.id.clone(), e)
            })
            .collect();
        Self {
            label,
            events: RwLock::new(events),
        }
    }

    /// Load accounts from a JSON fixture (`[{"label": ..., "events": [...]}]`)
    pub fn load_fixture_file<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, CalendarError> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CalendarError::Provider(format!(
                "Failed to read fixture {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let fixtures: Vec<AccountFixture> = serde_json::from_str(&json)
            .map_err(|e| CalendarError::Provider(format!("Invalid fixture JSON: {}", e)))?;

        Ok(fixtures
            .into_iter()
            .map(|f| Self::with_events(f.label, f.events))
            .collect())
    }

    /// Number of stored events
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// True when the account holds no events
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl CalendarAccount for InMemoryCalendar {
    fn label(&self) -> &str {
        &self.label
    }

    async fn list_events(
        &self,
        window: TimeWindow,
        limit: usize,
    ) -> Result<Vec<Event>, CalendarError> {
        let events = self.events.read().await;
        let mut found: Vec<Event> = events
            .values()
            .filter(|e| {
                // Degenerate events are still reported; consumers decide what to drop.
                window.overlaps(e.start, e.end) || (e.end <= e.start && window.contains(e.start))
            })
            .cloned()
            .collect();
        found.sort_by_key(|e| e.start);
        found.truncate(limit);
        Ok(found)
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>, CalendarError> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn create_event(&self, data: NewEvent) -> Result<Event, CalendarError> {
        data.validate().map_err(CalendarError::InvalidEvent)?;

        let event = Event {
            id: Uuid::new_v4().to_string(),
            title: data.title,
            description: data.description,
            start: data.start,
            end: data.end,
            location: data.location,
            attendees: data.attendees,
            account_label: self.label.clone(),
        };
        self.events
            .write()
            .await
            .insert(event.id.clone(), event.clone());

        tracing::debug!(account = %self.label, event_id = %event.id, "Created event");
        Ok(event)
    }

    async fn update_event(&self, id: &str, patch: EventPatch) -> Result<Event, CalendarError> {
        let mut events = self.events.write().await;
        let current = events
            .get(id)
            .ok_or_else(|| CalendarError::EventNotFound(id.to_string()))?;

        let mut updated = current.clone();
        patch.apply(&mut updated);
        if updated.end <= updated.start {
            return Err(CalendarError::InvalidEvent(format!(
                "update would leave event '{}' with end before start",
                id
            )));
        }
        events.insert(id.to_string(), updated.clone());

        tracing::debug!(account = %self.label, event_id = %id, "Updated event");
        Ok(updated)
    }

    async fn delete_event(&self, id: &str) -> Result<bool, CalendarError> {
        let removed = self.events.write().await.remove(id).is_some();
        tracing::debug!(account = %self.label, event_id = %id, removed, "Deleted event");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    fn new_event(title: &str, start_hour: u32, end_hour: u32) -> NewEvent {
        NewEvent {
            title: title.to_string(),
            description: String::new(),
            start: Utc.with_ymd_and_hms(2026, 10, 20, start_hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 10, 20, end_hour, 0, 0).unwrap(),
            location: String::new(),
            attendees: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let cal = InMemoryCalendar::new("work");
        let created = cal.create_event(new_event("Planning", 9, 10)).await.unwrap();
        assert_eq!(created.account_label, "work");

        let fetched = cal.get_event(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Planning");

        let patch = EventPatch {
            title: Some("Roadmap".to_string()),
            ..Default::default()
        };
        let updated = cal.update_event(&created.id, patch).await.unwrap();
        assert_eq!(updated.title, "Roadmap");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_event() {
        let cal = InMemoryCalendar::new("work");
        let result = cal.create_event(new_event("Backwards", 10, 9)).await;
        assert!(matches!(result, Err(CalendarError::InvalidEvent(_))));
        assert!(cal.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_missing_event() {
        let cal = InMemoryCalendar::new("work");
        let result = cal.update_event("nope", EventPatch::default()).await;
        assert_eq!(result, Err(CalendarError::EventNotFound("nope".to_string())));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cal = InMemoryCalendar::new("work");
        let created = cal.create_event(new_event("Planning", 9, 10)).await.unwrap();

        assert!(cal.delete_event(&created.id).await.unwrap());
        assert!(cal.delete_event(&created.id).await.unwrap());
        assert!(cal.delete_event("never-existed").await.unwrap());
        assert_eq!(cal.len().await, 0);
    }

    #[tokio::test]
    async fn test_list_events_window_and_limit() {
        let cal = InMemoryCalendar::new("work");
        cal.create_event(new_event("A", 9, 10)).await.unwrap();
        cal.create_event(new_event("B", 11, 12)).await.unwrap();
        cal.create_event(new_event("C", 15, 16)).await.unwrap();

        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2026, 10, 20, 9, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 20, 14, 0, 0).unwrap(),
        );
        let found = cal.list_events(window, 10).await.unwrap();
        let titles: Vec<_> = found.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);

        assert_eq!(cal.list_events(window, 1).await.unwrap().len(), 1);
    }

    #[test]
    fn test_load_fixture_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"[{"label": "me@example.com", "events": [
                {"id": "e1", "title": "Standup",
                 "start": "2026-10-20T09:00:00Z", "end": "2026-10-20T09:15:00Z"}
            ]}]"#,
        )
        .unwrap();

        let accounts = InMemoryCalendar::load_fixture_file(file.path()).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].label(), "me@example.com");
    }
}
