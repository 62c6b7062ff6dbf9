//! Meeting-time scoring and suggestions

use super::intervals::FreeSlot;
use super::WorkingHours;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Base score every candidate starts from
pub const BASE_SCORE: f64 = 0.5;
/// Bonus for starting inside the core working hours
pub const CORE_HOURS_BONUS: f64 = 0.2;
/// Bonus for a weekday
pub const WEEKDAY_BONUS: f64 = 0.1;
/// Bonus for Tuesday to Thursday
pub const MIDWEEK_BONUS: f64 = 0.1;
/// Bonus for starting on the hour
pub const ROUND_HOUR_BONUS: f64 = 0.05;
/// Bonus for starting on the half hour
pub const HALF_HOUR_BONUS: f64 = 0.02;
/// Spacing between candidate starts inside a free slot
pub const CANDIDATE_STEP_MINUTES: i64 = 30;

/// Coarse time-of-day bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 08:00 to 12:00
    Morning,
    /// 12:00 to 17:00
    Afternoon,
    /// 17:00 to 20:00
    Evening,
    /// Anything else
    Other,
}

impl TimeOfDay {
    /// Bucket for an hour of the day
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            8..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=19 => TimeOfDay::Evening,
            _ => TimeOfDay::Other,
        }
    }

    /// Parse a bucket name, case-insensitive
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "morning" => Some(TimeOfDay::Morning),
            "afternoon" => Some(TimeOfDay::Afternoon),
            "evening" => Some(TimeOfDay::Evening),
            _ => None,
        }
    }

    /// Convert the bucket to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Other => "other",
        }
    }

    fn preference_bonus(&self) -> f64 {
        match self {
            TimeOfDay::Morning | TimeOfDay::Afternoon => 0.2,
            TimeOfDay::Evening => 0.1,
            TimeOfDay::Other => 0.0,
        }
    }
}

/// A scored candidate meeting start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTime {
    /// Candidate start
    pub start: DateTime<Utc>,
    /// Candidate end (start + requested duration)
    pub end: DateTime<Utc>,
    /// Score in `[0, 1]`
    pub score: f64,
    /// Bucket of the start hour
    pub time_of_day: TimeOfDay,
    /// Free minutes from the candidate start to the end of its slot
    pub available_minutes: i64,
    /// Reasons the candidate scored the way it did
    pub notes: Vec<String>,
}

fn minute_of_day(instant: DateTime<Utc>) -> u32 {
    instant.hour() * 60 + instant.minute()
}

/// Score a candidate start
///
/// # Arguments
/// * `start` - Candidate meeting start
/// * `hours` - Working hours the core range is derived from
/// * `preferred` - Caller-preferred time-of-day buckets
///
/// # Returns
/// The score together with the notes explaining it. Capped at 1.0.
pub fn score_start(
    start: DateTime<Utc>,
    hours: WorkingHours,
    preferred: &[TimeOfDay],
) -> (f64, Vec<String>) {
    let mut score = BASE_SCORE;
    let mut notes = Vec::new();

    let minute = minute_of_day(start);
    let core_start = (hours.start_hour + 1) * 60;
    let core_end = hours.end_hour.saturating_sub(2) * 60;
    if minute >= core_start && minute < core_end {
        score += CORE_HOURS_BONUS;
        notes.push("Core working hours".to_string());
    }

    let weekday = start.weekday();
    if !matches!(weekday, Weekday::Sat | Weekday::Sun) {
        score += WEEKDAY_BONUS;
    }
    if matches!(weekday, Weekday::Tue | Weekday::Wed | Weekday::Thu) {
        score += MIDWEEK_BONUS;
        notes.push("Mid-week".to_string());
    }

    let bucket = TimeOfDay::from_hour(start.hour());
    if preferred.contains(&bucket) {
        score += bucket.preference_bonus();
        notes.push(format!("Preferred {}", bucket.as_str()));
    }

    match start.minute() {
        0 => {
            score += ROUND_HOUR_BONUS;
            notes.push("Starts on the hour".to_string());
        }
        30 => score += HALF_HOUR_BONUS,
        _ => {}
    }

    (score.min(1.0), notes)
}

/// Next start on the 30-minute grid strictly after `instant`
fn next_grid_point(instant: DateTime<Utc>) -> DateTime<Utc> {
    let step = CANDIDATE_STEP_MINUTES * 60;
    let secs = instant.timestamp();
    let rem = secs.rem_euclid(step);
    let nanos = instant.timestamp_subsec_nanos() as i64;
    instant + Duration::seconds(step - rem) - Duration::nanoseconds(nanos)
}

/// Score candidate starts inside free slots and keep the best `max`
///
/// Ties keep chronological order. A duration too large to represent yields
/// no candidates.
pub fn suggest(
    slots: &[FreeSlot],
    duration_minutes: i64,
    hours: WorkingHours,
    preferred: &[TimeOfDay],
    max: usize,
) -> Vec<SuggestedTime> {
    let Some(duration) = Duration::try_minutes(duration_minutes) else {
        return Vec::new();
    };
    let mut candidates = Vec::new();

    for slot in slots {
        let mut start = slot.start;
        while let Some(end) = start.checked_add_signed(duration).filter(|end| *end <= slot.end) {
            let (score, notes) = score_start(start, hours, preferred);
            candidates.push(SuggestedTime {
                start,
                end,
                score,
                time_of_day: TimeOfDay::from_hour(start.hour()),
                available_minutes: (slot.end - start).num_minutes(),
                notes,
            });
            start = next_grid_point(start);
        }
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(max);
    candidates
}
