//! Calendar access facade
//!
//! Uniform create/read/update/delete/list over every connected calendar account.
//! Provider integrations (and their token lifecycle) live behind the
//! [`CalendarAccount`] trait; the rest of the crate only sees a [`CalendarSet`].

pub mod memory;
pub mod types;

pub use memory::InMemoryCalendar;
pub use types::{
    Attendee, Event, EventPatch, EventRef, NewEvent, ResponseStatus, TimeWindow,
};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by calendar accounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// No connected account carries the requested label
    #[error("Calendar account not found: {0}")]
    AccountNotFound(String),

    /// The account has no event with this id
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// The event data was rejected
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The provider call itself failed
    #[error("Calendar provider error: {0}")]
    Provider(String),
}

/// One connected calendar account
///
/// Implementations must tolerate concurrent calls: several sessions may hit the
/// same account at once.
#[async_trait]
pub trait CalendarAccount: Send + Sync {
    /// Label identifying the account (usually its email)
    fn label(&self) -> &str;

    /// Events overlapping `window`, ordered by start, at most `limit` of them
    async fn list_events(&self, window: TimeWindow, limit: usize)
        -> Result<Vec<Event>, CalendarError>;

    /// Fetch a single event
    async fn get_event(&self, id: &str) -> Result<Option<Event>, CalendarError>;

    /// Create an event and return it with its assigned id
    async fn create_event(&self, data: NewEvent) -> Result<Event, CalendarError>;

    /// Apply a patch and return the updated event
    async fn update_event(&self, id: &str, patch: EventPatch) -> Result<Event, CalendarError>;

    /// Delete an event
    ///
    /// Deleting an event that does not exist returns `Ok(true)`.
    async fn delete_event(&self, id: &str) -> Result<bool, CalendarError>;
}

/// The set of accounts connected for one user
#[derive(Clone, Default)]
pub struct CalendarSet {
    accounts: Vec<Arc<dyn CalendarAccount>>,
}

impl std::fmt::Debug for CalendarSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarSet")
            .field("accounts", &self.labels())
            .finish()
    }
}

impl CalendarSet {
    /// Build a set from already connected accounts
    pub fn new(accounts: Vec<Arc<dyn CalendarAccount>>) -> Self {
        Self { accounts }
    }

    /// Add an account
    pub fn with_account(mut self, account: Arc<dyn CalendarAccount>) -> Self {
        self.accounts.push(account);
        self
    }

    /// All connected accounts, in connection order
    pub fn accounts(&self) -> &[Arc<dyn CalendarAccount>] {
        &self.accounts
    }

    /// True when no account is connected
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Labels of all accounts
    pub fn labels(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.label().to_string()).collect()
    }

    /// Look up an account by label
    pub fn account(&self, label: &str) -> Result<&Arc<dyn CalendarAccount>, CalendarError> {
        self.accounts
            .iter()
            .find(|a| a.label() == label)
            .ok_or_else(|| CalendarError::AccountNotFound(label.to_string()))
    }

    /// The first connected account
    pub fn default_account(&self) -> Result<&Arc<dyn CalendarAccount>, CalendarError> {
        self.accounts
            .first()
            .ok_or_else(|| {
                CalendarError::AccountNotFound("no connected calendar accounts".to_string())
            })
    }

    /// Named account when given, default account otherwise
    pub fn account_or_default(
        &self,
        label: Option<&str>,
    ) -> Result<&Arc<dyn CalendarAccount>, CalendarError> {
        match label {
            Some(label) => self.account(label),
            None => self.default_account(),
        }
    }

    /// Events from every account overlapping `window`, sorted by start
    ///
    /// An account that fails is logged and skipped.
    pub async fn list_all(&self, window: TimeWindow, limit: usize) -> Vec<Event> {
        let mut events = Vec::new();
        for account in &self.accounts {
            match account.list_events(window, limit).await {
                Ok(found) => {
                    tracing::debug!(
                        account = %account.label(),
                        events = found.len(),
                        "Fetched events from account"
                    );
                    events.extend(found);
                }
                Err(e) => {
                    tracing::warn!(
                        account = %account.label(),
                        error = %e,
                        "Failed to list events, skipping account"
                    );
                }
            }
        }
        events.sort_by_key(|e| e.start);
        events
    }

    /// Text search across all accounts
    ///
    /// Case-insensitive substring match over title, description, location and
    /// attendees. Stops once `limit` matches are collected.
    pub async fn search(
        &self,
        query: &str,
        window: TimeWindow,
        per_account_limit: usize,
        limit: Option<usize>,
    ) -> Vec<Event> {
        let needle = query.trim().to_lowercase();
        let mut matches = Vec::new();
        for event in self.list_all(window, per_account_limit).await {
            if event.matches(&needle) {
                matches.push(event);
                if limit.is_some_and(|l| matches.len() >= l) {
                    break;
                }
            }
        }
        matches
    }
}
