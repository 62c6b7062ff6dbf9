//! Utilization summary

use super::intervals::{clip_to_day, day_windows, extract_gaps, merge_with_buffer, BusyInterval};
use super::WorkingHours;
use crate::calendar::TimeWindow;
use serde::{Deserialize, Serialize};

/// Shortest gap counted as a free slot in summaries
pub const SUMMARY_MIN_SLOT_MINUTES: i64 = 15;

/// Qualitative availability derived from utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    /// Below 30% utilization
    VeryAvailable,
    /// Below 60%
    ModeratelyAvailable,
    /// Below 80%
    LimitedAvailability,
    /// 80% and above
    VeryBusy,
}

impl AvailabilityStatus {
    /// Status for a utilization percentage
    pub fn from_utilization(percent: f64) -> Self {
        if percent < 30.0 {
            AvailabilityStatus::VeryAvailable
        } else if percent < 60.0 {
            AvailabilityStatus::ModeratelyAvailable
        } else if percent < 80.0 {
            AvailabilityStatus::LimitedAvailability
        } else {
            AvailabilityStatus::VeryBusy
        }
    }

    /// Convert the status to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::VeryAvailable => "very_available",
            AvailabilityStatus::ModeratelyAvailable => "moderately_available",
            AvailabilityStatus::LimitedAvailability => "limited_availability",
            AvailabilityStatus::VeryBusy => "very_busy",
        }
    }
}

/// Free slots bucketed by length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDistribution {
    /// Under one hour
    pub short: usize,
    /// One to two hours
    pub medium: usize,
    /// Over two hours
    pub long: usize,
}

/// Busy/free totals over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSummary {
    /// Window the summary covers
    pub window: TimeWindow,
    /// Days that contributed working hours
    pub days_counted: usize,
    /// Working span of a full day, in hours
    pub working_hours_per_day: f64,
    /// Working hours over all counted days
    pub total_hours: f64,
    /// Busy time inside working hours
    pub busy_hours: f64,
    /// `total_hours - busy_hours`
    pub free_hours: f64,
    /// Busy share of the total, 0-100
    pub utilization_percent: f64,
    /// Qualitative status
    pub status: AvailabilityStatus,
    /// Busy intervals seen in the window
    pub events_count: usize,
    /// Free slots of at least 15 minutes
    pub free_slots_count: usize,
    /// Longest free slot, 0 when there is none
    pub longest_slot_minutes: i64,
    /// Free slots by length
    pub slot_distribution: SlotDistribution,
}

fn hours(minutes: i64) -> f64 {
    minutes as f64 / 60.0
}

/// Summarize busy intervals over `window`
///
/// Busy time is the union of clipped intervals, so overlapping events are not
/// counted twice. Free slots are merged with `buffer_minutes` like the free-time
/// query.
pub fn summarize(
    busy: &[BusyInterval],
    window: TimeWindow,
    working_hours: WorkingHours,
    include_weekends: bool,
    buffer_minutes: i64,
) -> UtilizationSummary {
    let days = day_windows(window, working_hours, include_weekends);

    let mut total_minutes = 0;
    let mut busy_minutes = 0;
    let mut slots = Vec::new();

    for day in &days {
        total_minutes += day.duration_minutes();

        let clipped = clip_to_day(busy, *day);
        busy_minutes += merge_with_buffer(&clipped, 0)
            .iter()
            .map(BusyInterval::duration_minutes)
            .sum::<i64>();

        let merged = merge_with_buffer(&clipped, buffer_minutes);
        slots.extend(extract_gaps(&merged, *day, SUMMARY_MIN_SLOT_MINUTES));
    }

    let mut distribution = SlotDistribution::default();
    for slot in &slots {
        match slot.duration_minutes {
            m if m < 60 => distribution.short += 1,
            m if m <= 120 => distribution.medium += 1,
            _ => distribution.long += 1,
        }
    }

    let utilization_percent = if total_minutes > 0 {
        busy_minutes as f64 / total_minutes as f64 * 100.0
    } else {
        0.0
    };

    UtilizationSummary {
        window,
        days_counted: days.len(),
        working_hours_per_day: hours(working_hours.span_minutes()),
        total_hours: hours(total_minutes),
        busy_hours: hours(busy_minutes),
        free_hours: hours(total_minutes - busy_minutes),
        utilization_percent,
        status: AvailabilityStatus::from_utilization(utilization_percent),
        events_count: busy.iter().filter(|b| window.overlaps(b.start, b.end)).count(),
        free_slots_count: slots.len(),
        longest_slot_minutes: slots.iter().map(|s| s.duration_minutes).max().unwrap_or(0),
        slot_distribution: distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    // Week of Monday 2026-10-19
    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, h, m, 0).unwrap()
    }

    fn busy(start: DateTime<Utc>, end: DateTime<Utc>) -> BusyInterval {
        BusyInterval {
            start,
            end,
            label: "Busy".to_string(),
            source_account: "work".to_string(),
        }
    }

    #[test]
    fn test_week_with_ten_busy_hours() {
        // Two busy hours per weekday
        let intervals: Vec<_> = (19..=23)
            .map(|d| busy(at(d, 10, 0), at(d, 12, 0)))
            .collect();
        let window = TimeWindow::new(at(19, 0, 0), at(26, 0, 0));

        let summary = summarize(&intervals, window, WorkingHours::new(9, 17), false, 15);
        assert_eq!(summary.days_counted, 5);
        assert_eq!(summary.total_hours, 40.0);
        assert_eq!(summary.busy_hours, 10.0);
        assert_eq!(summary.free_hours, 30.0);
        assert_eq!(summary.utilization_percent, 25.0);
        assert_eq!(summary.status, AvailabilityStatus::VeryAvailable);
        assert_eq!(summary.status.as_str(), "very_available");
        // 09-10 is exactly an hour (medium), 12-17 is long
        assert_eq!(summary.slot_distribution.medium, 5);
        assert_eq!(summary.slot_distribution.long, 5);
        assert_eq!(summary.longest_slot_minutes, 300);
    }

    #[test]
    fn test_overlapping_events_counted_once() {
        let intervals = vec![
            busy(at(20, 9, 0), at(20, 11, 0)),
            busy(at(20, 10, 0), at(20, 12, 0)),
        ];
        let window = TimeWindow::new(at(20, 0, 0), at(21, 0, 0));
        let summary = summarize(&intervals, window, WorkingHours::new(9, 17), false, 0);
        assert_eq!(summary.busy_hours, 3.0);
        assert_eq!(summary.events_count, 2);
    }

    #[test]
    fn test_status_thresholds() {
        use AvailabilityStatus::*;
        assert_eq!(AvailabilityStatus::from_utilization(29.9), VeryAvailable);
        assert_eq!(AvailabilityStatus::from_utilization(30.0), ModeratelyAvailable);
        assert_eq!(AvailabilityStatus::from_utilization(60.0), LimitedAvailability);
        assert_eq!(AvailabilityStatus::from_utilization(80.0), VeryBusy);
    }

    #[test]
    fn test_empty_window() {
        // Saturday only
        let window = TimeWindow::new(at(24, 0, 0), at(25, 0, 0));
        let summary = summarize(&[], window, WorkingHours::new(9, 17), false, 15);
        assert_eq!(summary.days_counted, 0);
        assert_eq!(summary.utilization_percent, 0.0);
        assert_eq!(summary.longest_slot_minutes, 0);
    }
}
