//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults. Unparseable values fall back to the default.

use crate::availability::{AvailabilityConfig, WorkingHours};
use crate::orchestrator::OrchestratorConfig;
use std::env;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
    /// Availability engine defaults
    pub availability: AvailabilityConfig,
    /// Turn pipeline and scheduler settings
    pub orchestrator: OrchestratorConfig,
    /// JSON file of accounts and events to seed the in-memory calendars
    pub calendar_fixture: Option<String>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// SQLite file holding session snapshots
    pub database_path: String,
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let availability_defaults = AvailabilityConfig::default();
        let orchestrator_defaults = OrchestratorConfig::default();

        Self {
            server: ServerConfig {
                port: parsed("PORT", 8080),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            persistence: PersistenceConfig {
                database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| {
                    if let Some(home) = env::var_os("HOME") {
                        format!("{}/.calendar-assistant/sessions.db", home.to_string_lossy())
                    } else {
                        ".calendar-assistant/sessions.db".to_string()
                    }
                }),
            },
            availability: AvailabilityConfig {
                working_hours: WorkingHours::new(
                    parsed(
                        "WORKING_HOURS_START",
                        availability_defaults.working_hours.start_hour,
                    ),
                    parsed("WORKING_HOURS_END", availability_defaults.working_hours.end_hour),
                ),
                buffer_minutes: parsed("BUFFER_MINUTES", availability_defaults.buffer_minutes),
                default_duration_minutes: parsed(
                    "DEFAULT_MEETING_MINUTES",
                    availability_defaults.default_duration_minutes,
                ),
                next_slot_horizon_days: parsed(
                    "NEXT_SLOT_HORIZON_DAYS",
                    availability_defaults.next_slot_horizon_days,
                ),
                max_events_per_account: parsed(
                    "MAX_EVENTS_PER_ACCOUNT",
                    availability_defaults.max_events_per_account,
                ),
            },
            orchestrator: OrchestratorConfig {
                max_feedback_retries: parsed(
                    "MAX_FEEDBACK_RETRIES",
                    orchestrator_defaults.max_feedback_retries,
                ),
                min_intent_confidence: parsed(
                    "MIN_INTENT_CONFIDENCE",
                    orchestrator_defaults.min_intent_confidence,
                ),
                ..orchestrator_defaults
            },
            calendar_fixture: env::var("CALENDAR_FIXTURE")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
