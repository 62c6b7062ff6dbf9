//! Busy interval algebra
//!
//! Pure functions behind the engine: projection of events into busy intervals,
//! per-day clipping, merge-with-buffer and gap extraction. Nothing here touches
//! a calendar account, so every step is tested directly.

use super::{WorkingHours, MAX_BUFFER_MINUTES};
use crate::calendar::{Event, TimeWindow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Occupied time taken from one or more events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    /// Start, always before `end`
    pub start: DateTime<Utc>,
    /// End
    pub end: DateTime<Utc>,
    /// Event title, or several titles joined by " / " after merging
    pub label: String,
    /// Account the interval came from
    pub source_account: String,
}

impl BusyInterval {
    /// The interval's time range
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Length in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// A gap long enough for the requested meeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSlot {
    /// Start
    pub start: DateTime<Utc>,
    /// End
    pub end: DateTime<Utc>,
    /// Length of the gap, never below the requested duration
    pub duration_minutes: i64,
    /// Full weekday name of `start`, e.g. "Tuesday"
    pub weekday: String,
}

impl FreeSlot {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
            weekday: start.format("%A").to_string(),
        }
    }
}

/// Turn events into busy intervals, dropping the ones without a positive duration
pub fn project_events(events: &[Event]) -> Vec<BusyInterval> {
    let mut intervals: Vec<BusyInterval> = events
        .iter()
        .filter_map(|event| {
            if event.end <= event.start {
                tracing::warn!(
                    event_id = %event.id,
                    account = %event.account_label,
                    "Dropping event with end before start"
                );
                return None;
            }
            Some(BusyInterval {
                start: event.start,
                end: event.end,
                label: event.title.clone(),
                source_account: event.account_label.clone(),
            })
        })
        .collect();
    intervals.sort_by_key(|i| i.start);
    intervals
}

/// True for Saturday and Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The working-hours window of each day in `window`
///
/// Each day's window is intersected with the query window, so a query that
/// starts mid-day only yields the remainder of that day. Weekends are skipped
/// unless `include_weekends` is set; days left empty by the intersection are
/// skipped too.
pub fn day_windows(
    window: TimeWindow,
    hours: WorkingHours,
    include_weekends: bool,
) -> Vec<TimeWindow> {
    if window.is_empty() {
        return Vec::new();
    }

    let first = window.start.date_naive();
    let last = (window.end - Duration::nanoseconds(1)).date_naive();

    let mut days = Vec::new();
    let mut date = first;
    while date <= last {
        if include_weekends || !is_weekend(date) {
            if let Some(day) = hours.window_on(date).intersect(&window) {
                days.push(day);
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    days
}

/// Intervals cut down to `day`; intervals with no overlap are discarded
pub fn clip_to_day(intervals: &[BusyInterval], day: TimeWindow) -> Vec<BusyInterval> {
    intervals
        .iter()
        .filter_map(|interval| {
            day.intersect(&interval.window()).map(|clipped| BusyInterval {
                start: clipped.start,
                end: clipped.end,
                label: interval.label.clone(),
                source_account: interval.source_account.clone(),
            })
        })
        .collect()
}

/// Merge intervals whose gap is within `buffer_minutes` (clamped to one day)
///
/// Output intervals never overlap and every gap between neighbours is
/// strictly longer than the buffer.
pub fn merge_with_buffer(intervals: &[BusyInterval], buffer_minutes: i64) -> Vec<BusyInterval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|i| i.start);

    let buffer = Duration::minutes(buffer_minutes.clamp(0, MAX_BUFFER_MINUTES));
    let mut merged: Vec<BusyInterval> = Vec::with_capacity(sorted.len());

    for next in sorted {
        match merged.last_mut() {
            Some(running) if next.start <= running.end + buffer => {
                running.end = running.end.max(next.end);
                let already_named = running.label.split(" / ").any(|l| l == next.label);
                if !already_named {
                    running.label = format!("{} / {}", running.label, next.label);
                }
                if running.source_account != next.source_account
                    && !running.source_account.split(", ").any(|a| a == next.source_account)
                {
                    running.source_account =
                        format!("{}, {}", running.source_account, next.source_account);
                }
            }
            _ => merged.push(next),
        }
    }
    merged
}

/// Gaps of at least `min_minutes` inside `day`, around sorted merged intervals
pub fn extract_gaps(merged: &[BusyInterval], day: TimeWindow, min_minutes: i64) -> Vec<FreeSlot> {
    let mut slots = Vec::new();
    let mut cursor = day.start;

    let mut push_gap = |from: DateTime<Utc>, to: DateTime<Utc>| {
        if to > from && (to - from).num_minutes() >= min_minutes {
            slots.push(FreeSlot::new(from, to));
        }
    };

    for interval in merged {
        push_gap(cursor, interval.start.min(day.end));
        cursor = cursor.max(interval.end);
    }
    push_gap(cursor, day.end);

    slots
}

/// Steps 2-5: clip per day, merge, extract gaps and concatenate chronologically
pub fn compute_free_slots(
    busy: &[BusyInterval],
    window: TimeWindow,
    hours: WorkingHours,
    include_weekends: bool,
    buffer_minutes: i64,
    duration_minutes: i64,
) -> Vec<FreeSlot> {
    day_windows(window, hours, include_weekends)
        .into_iter()
        .flat_map(|day| {
            let clipped = clip_to_day(busy, day);
            let merged = merge_with_buffer(&clipped, buffer_minutes);
            extract_gaps(&merged, day, duration_minutes)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2026-10-20 is a Tuesday
    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, h, m, 0).unwrap()
    }

    fn busy(start: DateTime<Utc>, end: DateTime<Utc>, label: &str) -> BusyInterval {
        BusyInterval {
            start,
            end,
            label: label.to_string(),
            source_account: "work".to_string(),
        }
    }

    fn nine_to_five() -> WorkingHours {
        WorkingHours::new(9, 17)
    }

    #[test]
    fn test_merge_within_buffer_joins_labels() {
        let intervals = vec![
            busy(at(20, 9, 0), at(20, 10, 0), "Standup"),
            busy(at(20, 10, 10), at(20, 11, 0), "Review"),
        ];
        let merged = merge_with_buffer(&intervals, 15);
        assert_eq!(merged, vec![busy(at(20, 9, 0), at(20, 11, 0), "Standup / Review")]);
    }

    #[test]
    fn test_merge_keeps_gaps_longer_than_buffer() {
        let intervals = vec![
            busy(at(20, 13, 0), at(20, 14, 0), "C"),
            busy(at(20, 9, 0), at(20, 10, 0), "A"),
            busy(at(20, 10, 16), at(20, 11, 0), "B"),
            busy(at(20, 10, 30), at(20, 10, 45), "B"),
        ];
        let merged = merge_with_buffer(&intervals, 15);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].label, "B");
        for pair in merged.windows(2) {
            assert!(pair[1].start - pair[0].end > Duration::minutes(15));
        }
    }

    #[test]
    fn test_merge_buffer_out_of_range() {
        let intervals = vec![
            busy(at(20, 9, 0), at(20, 10, 0), "A"),
            busy(at(20, 14, 0), at(20, 15, 0), "B"),
        ];
        // Clamped to a day, so everything on the same day joins
        assert_eq!(merge_with_buffer(&intervals, i64::MAX).len(), 1);
        assert_eq!(merge_with_buffer(&intervals, -30).len(), 2);
    }

    #[test]
    fn test_huge_duration_finds_no_slots() {
        let window = TimeWindow::new(at(20, 0, 0), at(21, 0, 0));
        assert!(compute_free_slots(&[], window, nine_to_five(), false, 15, i64::MAX).is_empty());
        assert_eq!(compute_free_slots(&[], window, nine_to_five(), false, 15, 480).len(), 1);
    }

    #[test]
    fn test_interval_ending_at_day_start_leaves_day_free() {
        let day = TimeWindow::new(at(20, 9, 0), at(20, 17, 0));
        let merged = vec![busy(at(20, 8, 0), at(20, 9, 0), "Breakfast")];
        let slots = extract_gaps(&merged, day, 30);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, at(20, 9, 0));
        assert_eq!(slots[0].duration_minutes, 480);
    }

    #[test]
    fn test_merge_contained_interval_keeps_later_end() {
        let intervals = vec![
            busy(at(20, 9, 0), at(20, 12, 0), "Offsite"),
            busy(at(20, 10, 0), at(20, 11, 0), "Call"),
        ];
        let merged = merge_with_buffer(&intervals, 0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].end, at(20, 12, 0));
        assert_eq!(merged[0].label, "Offsite / Call");
    }

    #[test]
    fn test_free_slots_single_day() {
        let intervals = vec![
            busy(at(20, 9, 0), at(20, 10, 0), "Standup"),
            busy(at(20, 10, 10), at(20, 11, 0), "Review"),
        ];
        let window = TimeWindow::new(at(20, 0, 0), at(21, 0, 0));
        let slots = compute_free_slots(&intervals, window, nine_to_five(), false, 15, 30);

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, at(20, 11, 0));
        assert_eq!(slots[0].end, at(20, 17, 0));
        assert_eq!(slots[0].duration_minutes, 360);
        assert_eq!(slots[0].weekday, "Tuesday");
    }

    #[test]
    fn test_short_gaps_are_not_slots() {
        let intervals = vec![
            busy(at(20, 9, 30), at(20, 12, 0), "Workshop"),
            busy(at(20, 12, 45), at(20, 17, 0), "Offsite"),
        ];
        let window = TimeWindow::new(at(20, 0, 0), at(21, 0, 0));
        let slots = compute_free_slots(&intervals, window, nine_to_five(), false, 0, 60);
        assert!(slots.is_empty());

        let slots = compute_free_slots(&intervals, window, nine_to_five(), false, 0, 30);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.duration_minutes >= 30));
    }

    #[test]
    fn test_weekends_skipped_unless_included() {
        // Friday 23rd through Monday 26th
        let window = TimeWindow::new(at(23, 0, 0), at(27, 0, 0));
        let weekdays = day_windows(window, nine_to_five(), false);
        assert_eq!(weekdays.len(), 2);
        assert_eq!(weekdays[1].start, at(26, 9, 0));

        let all = day_windows(window, nine_to_five(), true);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_day_window_respects_query_start() {
        let window = TimeWindow::new(at(20, 13, 20), at(21, 0, 0));
        let days = day_windows(window, nine_to_five(), false);
        assert_eq!(days, vec![TimeWindow::new(at(20, 13, 20), at(20, 17, 0))]);
    }

    #[test]
    fn test_clip_discards_outside_intervals() {
        let day = TimeWindow::new(at(20, 9, 0), at(20, 17, 0));
        let intervals = vec![
            busy(at(20, 7, 0), at(20, 8, 0), "Gym"),
            busy(at(20, 8, 30), at(20, 9, 30), "Breakfast"),
            busy(at(20, 16, 30), at(20, 19, 0), "Dinner"),
        ];
        let clipped = clip_to_day(&intervals, day);
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped[0].start, at(20, 9, 0));
        assert_eq!(clipped[1].end, at(20, 17, 0));
    }

    #[test]
    fn test_project_drops_degenerate_events() {
        let good = Event {
            id: "a".to_string(),
            title: "Good".to_string(),
            description: String::new(),
            start: at(20, 9, 0),
            end: at(20, 10, 0),
            location: String::new(),
            attendees: vec![],
            account_label: "work".to_string(),
        };
        let mut bad = good.clone();
        bad.id = "b".to_string();
        bad.end = bad.start;

        let intervals = project_events(&[bad, good]);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].label, "Good");
    }
}
