//! Token-level helpers for the rule-based extractor

use crate::availability::TimeOfDay;
use crate::calendar::TimeWindow;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

/// Words that end an extracted search term or title
pub(crate) const TERM_STOPS: &[&str] = &[
    "and", "or", "from", "on", "at", "in", "to", "for", "between", "today", "tomorrow",
    "this", "next", "by",
];

/// Message split into words, keeping the original spelling next to a
/// lowercased copy used for matching
#[derive(Debug, Clone)]
pub(crate) struct Tokens {
    raw: Vec<String>,
    lower: Vec<String>,
}

impl Tokens {
    pub(crate) fn new(message: &str) -> Self {
        let raw: Vec<String> = message
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| matches!(c, ',' | '?' | '!' | ';' | '"'))
                    .trim_end_matches('.')
                    .to_string()
            })
            .filter(|w| !w.is_empty())
            .collect();
        let lower = raw.iter().map(|w| w.to_lowercase()).collect();
        Self { raw, lower }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Index of the first word in `words`
    pub(crate) fn find_any(&self, words: &[&str]) -> Option<usize> {
        self.lower.iter().position(|w| words.contains(&w.as_str()))
    }

    /// Index of the first word in `words` at or after `from`
    pub(crate) fn find_any_from(&self, from: usize, words: &[&str]) -> Option<usize> {
        self.lower
            .iter()
            .skip(from)
            .position(|w| words.contains(&w.as_str()))
            .map(|i| i + from)
    }

    pub(crate) fn has_any(&self, words: &[&str]) -> bool {
        self.find_any(words).is_some()
    }

    /// Whether the space-separated `phrase` occurs as consecutive words
    pub(crate) fn has_phrase(&self, phrase: &str) -> bool {
        let parts: Vec<&str> = phrase.split(' ').collect();
        self.lower
            .windows(parts.len())
            .any(|w| w.iter().zip(&parts).all(|(a, b)| a == b))
    }

    pub(crate) fn has_any_phrase(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.has_phrase(p))
    }

    /// Words after `index` up to the next stop word, original spelling
    pub(crate) fn term_after(&self, index: usize) -> Option<String> {
        let words: Vec<&str> = self
            .raw
            .iter()
            .zip(&self.lower)
            .skip(index + 1)
            .take_while(|(_, lower)| !TERM_STOPS.contains(&lower.as_str()))
            .map(|(raw, _)| raw.as_str())
            .collect();
        let term = words.join(" ");
        let term = term.trim_matches(|c: char| c == '\'' || c.is_whitespace());
        (!term.is_empty()).then(|| term.to_string())
    }

    /// Everything after `index`, original spelling
    pub(crate) fn rest_after(&self, index: usize) -> Option<String> {
        let rest = self.raw.get(index + 1..)?.join(" ");
        let rest = rest.trim_matches(|c: char| c == '\'' || c.is_whitespace());
        (!rest.is_empty()).then(|| rest.to_string())
    }

    pub(crate) fn lower(&self) -> &[String] {
        &self.lower
    }

    pub(crate) fn raw(&self) -> &[String] {
        &self.raw
    }
}

/// Text between the first pair of single or double quotes
///
/// A quote only opens at the start of a word and only closes at the end of
/// one, so apostrophes inside words are ignored.
pub(crate) fn quoted(message: &str) -> Option<String> {
    let chars: Vec<char> = message.chars().collect();
    let boundary = |i: Option<usize>| {
        i.and_then(|i| chars.get(i))
            .map_or(true, |c| c.is_whitespace() || c.is_ascii_punctuation())
    };
    for (open, &quote) in chars.iter().enumerate() {
        if !matches!(quote, '"' | '\'') || !boundary(open.checked_sub(1)) {
            continue;
        }
        let close = (open + 1..chars.len())
            .find(|&i| chars[i] == quote && boundary(Some(i + 1)))?;
        let inner: String = chars[open + 1..close].iter().collect();
        let inner = inner.trim();
        if !inner.is_empty() {
            return Some(inner.to_string());
        }
    }
    None
}

/// Clock time in one word ("3pm", "3:30pm", "15:00") or two ("3 pm")
///
/// Returns the time and the number of words consumed.
pub(crate) fn parse_clock(word: &str, next: Option<&str>) -> Option<(NaiveTime, usize)> {
    let (body, suffix, consumed) = if let Some(b) = word.strip_suffix("am") {
        (b, Some(false), 1)
    } else if let Some(b) = word.strip_suffix("pm") {
        (b, Some(true), 1)
    } else {
        match next {
            Some("am") => (word, Some(false), 2),
            Some("pm") => (word, Some(true), 2),
            _ => (word, None, 1),
        }
    };

    let (hour, minute) = match body.split_once(':') {
        Some((h, m)) if m.len() == 2 => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        Some(_) => return None,
        // A bare number is only a time with an am/pm marker
        None if suffix.is_some() => (body.parse::<u32>().ok()?, 0),
        None => return None,
    };

    let hour = match suffix {
        Some(pm) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            match (pm, hour) {
                (false, 12) => 0,
                (true, 12) => 12,
                (true, h) => h + 12,
                (false, h) => h,
            }
        }
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0).map(|t| (t, consumed))
}

/// First clock time following "at", or any clock-looking word
pub(crate) fn find_clock(tokens: &Tokens) -> Option<NaiveTime> {
    let lower = tokens.lower();
    let candidate = |i: usize| {
        lower
            .get(i)
            .and_then(|w| parse_clock(w, lower.get(i + 1).map(String::as_str)))
            .map(|(t, _)| t)
    };
    if let Some(at) = tokens.find_any(&["at"]) {
        if let Some(time) = candidate(at + 1) {
            return Some(time);
        }
    }
    (0..lower.len()).find_map(candidate)
}

fn weekday_from(word: &str) -> Option<Weekday> {
    match word {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Day named in the message: today, tomorrow or a weekday
///
/// Weekdays resolve to the next occurrence, today included.
pub(crate) fn find_day(tokens: &Tokens, now: DateTime<Utc>) -> Option<NaiveDate> {
    let today = now.date_naive();
    if tokens.has_any(&["tomorrow"]) {
        return today.succ_opt();
    }
    if tokens.has_any(&["today", "tonight"]) {
        return Some(today);
    }
    tokens.lower().iter().find_map(|w| {
        weekday_from(w).map(|day| {
            let ahead = (day.num_days_from_monday() as i64
                - today.weekday().num_days_from_monday() as i64)
                .rem_euclid(7);
            today + Duration::days(ahead)
        })
    })
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Date range named in the message
///
/// "today" runs from `now` to midnight, "this week" from `now` to the coming
/// Monday, "next week" is the following Monday-to-Monday span. Anything else
/// is the next `default_days` days from `now`, reported as not explicit.
pub(crate) fn find_window(
    tokens: &Tokens,
    now: DateTime<Utc>,
    default_days: i64,
) -> (TimeWindow, bool) {
    let today = now.date_naive();
    let next_monday =
        today + Duration::days(7 - today.weekday().num_days_from_monday() as i64);

    if tokens.has_phrase("next week") {
        let start = midnight(next_monday);
        return (TimeWindow::new(start, start + Duration::days(7)), true);
    }
    if tokens.has_phrase("this week") {
        return (TimeWindow::new(now, midnight(next_monday)), true);
    }
    if tokens.has_any(&["weekend"]) {
        let saturday = today
            + Duration::days(
                (Weekday::Sat.num_days_from_monday() as i64
                    - today.weekday().num_days_from_monday() as i64)
                    .rem_euclid(7),
            );
        let start = midnight(saturday).max(now);
        return (TimeWindow::new(start, midnight(saturday + Duration::days(2))), true);
    }
    if tokens.has_any(&["tomorrow"]) {
        let start = midnight(today + Duration::days(1));
        return (TimeWindow::new(start, start + Duration::days(1)), true);
    }
    if tokens.has_any(&["today", "tonight"]) {
        return (TimeWindow::new(now, midnight(today + Duration::days(1))), true);
    }
    if let Some(day) = find_day(tokens, now) {
        let start = midnight(day).max(now);
        return (TimeWindow::new(start, midnight(day + Duration::days(1))), true);
    }
    (TimeWindow::new(now, now + Duration::days(default_days)), false)
}

fn minutes_per_unit(unit: &str) -> Option<f64> {
    match unit {
        "m" | "min" | "mins" | "minute" | "minutes" => Some(1.0),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(60.0),
        _ => None,
    }
}

/// Duration starting at word `i`, with the number of words it spans
pub(crate) fn duration_at(lower: &[String], i: usize) -> Option<(i64, usize)> {
    let word = lower.get(i)?;

    // "30min", "2h"
    if let Some(at) = word.find(|c: char| c.is_ascii_alphabetic()).filter(|&at| at > 0) {
        if let (Ok(value), Some(unit)) =
            (word[..at].parse::<f64>(), minutes_per_unit(&word[at..]))
        {
            return whole_minutes(value, unit).map(|m| (m, 1));
        }
    }

    // "30 min", "an hour"
    let unit = lower.get(i + 1).and_then(|u| minutes_per_unit(u))?;
    let value = match word.as_str() {
        "a" | "an" | "one" => 1.0,
        "two" => 2.0,
        other => other.parse::<f64>().ok()?,
    };
    whole_minutes(value, unit).map(|m| (m, 2))
}

/// Positive whole minutes; values past `i64::MAX` saturate and are left to
/// the caller's upper bound
fn whole_minutes(value: f64, unit: f64) -> Option<i64> {
    let minutes = (value * unit).round();
    (minutes.is_finite() && minutes > 0.0).then_some(minutes as i64)
}

/// Meeting length: "30 min", "45 minutes", "2 hours", "1.5h", "half an hour"
///
/// The last mention wins, so a correction appended to a message replaces
/// the earlier value.
pub(crate) fn find_duration(tokens: &Tokens) -> Option<i64> {
    let lower = tokens.lower();
    let mut found = None;
    let mut i = 0;
    while i < lower.len() {
        let half_hour = match (lower.get(i + 1), lower.get(i + 2)) {
            _ if lower[i] != "half" => None,
            (Some(a), Some(h)) if a == "an" && h == "hour" => Some(3),
            (Some(h), _) if h == "hour" => Some(2),
            _ => None,
        };
        if let Some(span) = half_hour {
            found = Some(30);
            i += span;
        } else if let Some((minutes, span)) = duration_at(lower, i) {
            found = Some(minutes);
            i += span;
        } else {
            i += 1;
        }
    }
    found
}

/// Time-of-day buckets mentioned in the message
pub(crate) fn find_preferred(tokens: &Tokens) -> Vec<TimeOfDay> {
    let mut preferred = Vec::new();
    for word in tokens.lower() {
        let bucket = match word.as_str() {
            "morning" | "mornings" => Some(TimeOfDay::Morning),
            "afternoon" | "afternoons" => Some(TimeOfDay::Afternoon),
            "evening" | "evenings" => Some(TimeOfDay::Evening),
            _ => None,
        };
        if let Some(bucket) = bucket {
            if !preferred.contains(&bucket) {
                preferred.push(bucket);
            }
        }
    }
    preferred
}

/// Whether weekends should count as working days
pub(crate) fn wants_weekends(tokens: &Tokens) -> bool {
    tokens.has_any(&["weekend", "weekends", "saturday", "sunday", "sat", "sun"])
        || tokens.has_phrase("including weekends")
}

/// Combine a day and a clock time, rolling to tomorrow when no day was
/// named and the time has already passed today
pub(crate) fn resolve_start(
    day: Option<NaiveDate>,
    time: NaiveTime,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match day {
        Some(day) => day.and_time(time).and_utc(),
        None => {
            let today = now.date_naive().and_time(time).and_utc();
            if today <= now {
                today + Duration::days(1)
            } else {
                today
            }
        }
    }
}
