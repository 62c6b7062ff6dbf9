//! Keyword-driven intent extraction

use super::parse::{
    duration_at, find_clock, find_day, find_duration, find_preferred, find_window, quoted,
    resolve_start, wants_weekends, Tokens, TERM_STOPS,
};
use super::{Intent, IntentContext, IntentEntities, IntentExtractor, IntentKind};
use crate::availability::MAX_DURATION_MINUTES;
use crate::calendar::{Attendee, EventPatch, NewEvent, ResponseStatus};
use crate::error::AppError;
use crate::orchestrator::constants::DEFAULT_MAX_SUGGESTIONS;
use crate::orchestrator::{
    AvailabilityParams, AvailabilityQuery, CreateParams, DeleteParams, GeneralParams, RsvpParams,
    ScheduleParams, SearchParams, SubTaskParams, SubTaskSkeleton, UpdateParams,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

const DELETE_WORDS: &[&str] = &["delete", "remove", "cancel", "drop", "clear"];
const UPDATE_WORDS: &[&str] = &[
    "update", "change", "move", "reschedule", "rename", "edit", "modify", "push", "shift",
];
const TARGET_MARKERS: &[&str] = &[
    "with", "containing", "named", "called", "including", "about", "titled",
];
const RSVP_WORDS: &[&str] = &[
    "rsvp", "rsvps", "accepted", "declined", "tentative", "responded", "responses", "attending",
];
const AVAILABILITY_PHRASES: &[&str] = &[
    "free time",
    "free slot",
    "free slots",
    "availability",
    "available",
    "am i free",
    "are we free",
    "next available",
    "next free",
    "best time",
    "best times",
    "how busy",
    "utilization",
    "open slot",
    "open slots",
];
const SCHEDULE_WORDS: &[&str] = &["schedule", "book", "arrange", "organize", "organise"];
const CREATE_WORDS: &[&str] = &["create", "add", "put", "set", "make"];
const SEARCH_WORDS: &[&str] = &[
    "show", "list", "find", "search", "view", "display", "look", "what's", "whats", "any",
    "when", "what",
];
const TITLE_SKIP: &[&str] = &["a", "an", "the", "new", "up", "me", "my", "event"];

const DEFAULT_WINDOW_DAYS: i64 = 3;

/// Keyword implementation of [`IntentExtractor`]
///
/// Deterministic and local. Confidence is high when a rule matched with all
/// the values it needs and low when a required value is missing, in which
/// case `entities.clarification` holds the question to ask.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    /// Create an extractor
    pub fn new() -> Self {
        Self
    }

    fn entities(tokens: &Tokens, context: &IntentContext) -> IntentEntities {
        let (window, window_explicit) = find_window(tokens, context.now, DEFAULT_WINDOW_DAYS);
        IntentEntities {
            query: None,
            action: None,
            title: None,
            start: None,
            window,
            window_explicit,
            duration_minutes: find_duration(tokens).unwrap_or(context.default_duration_minutes),
            preferred: find_preferred(tokens),
            include_weekends: wants_weekends(tokens),
            attendees: tokens
                .raw()
                .iter()
                .filter(|w| w.contains('@') && w.contains('.'))
                .map(|w| Attendee::new(w.to_lowercase()))
                .collect(),
            patch: EventPatch::default(),
            availability: None,
            status_filter: None,
            clarification: None,
        }
    }

    /// Search term: quoted text first, then the words after a target marker
    fn target_term(message: &str, tokens: &Tokens, after: usize) -> Option<String> {
        quoted(message).or_else(|| {
            tokens
                .find_any_from(after, TARGET_MARKERS)
                .and_then(|i| tokens.term_after(i))
        })
    }

    fn classify_update(
        message: &str,
        tokens: &Tokens,
        verb: usize,
        context: &IntentContext,
        entities: &mut IntentEntities,
    ) {
        let renaming = tokens.lower()[verb] == "rename" || tokens.has_any(&["title", "name"]);
        let to = tokens.find_any_from(verb, &["to"]);

        if renaming {
            let title = to.and_then(|i| tokens.rest_after(i));
            entities.patch.title = title.map(|t| quoted(&t).unwrap_or(t));
        } else if let Some(time) = find_clock(tokens) {
            let start = resolve_start(find_day(tokens, context.now), time, context.now);
            if let Some(end) = end_after(start, entities.duration_minutes) {
                entities.patch.start = Some(start);
                entities.patch.end = Some(end);
            }
        }
        if tokens.has_any(&["location", "room"]) {
            if let Some(location) = to.and_then(|i| tokens.rest_after(i)) {
                entities.patch = EventPatch {
                    location: Some(location),
                    ..EventPatch::default()
                };
            }
        }

        // Quoted text is the new title when renaming, so the target comes
        // from the marker alone.
        entities.query = if renaming {
            tokens
                .find_any_from(verb, TARGET_MARKERS)
                .and_then(|i| tokens.term_after(i))
        } else {
            Self::target_term(message, tokens, verb)
        };
    }

    fn classify_availability(tokens: &Tokens, context: &IntentContext) -> AvailabilityQuery {
        if tokens.has_any_phrase(&["next available", "next free", "next open", "earliest"]) {
            AvailabilityQuery::NextAvailable
        } else if tokens.has_any_phrase(&["best time", "best times", "suggest", "recommend"]) {
            AvailabilityQuery::Suggest {
                preferred: find_preferred(tokens),
                max: DEFAULT_MAX_SUGGESTIONS,
            }
        } else if tokens.has_any_phrase(&["how busy", "utilization", "busy am i", "summary"]) {
            AvailabilityQuery::Summary
        } else if let Some((start, end)) = find_clock(tokens).and_then(|time| {
            let start = resolve_start(find_day(tokens, context.now), time, context.now);
            let minutes = find_duration(tokens).unwrap_or(context.default_duration_minutes);
            end_after(start, minutes).map(|end| (start, end))
        }) {
            AvailabilityQuery::Check { start, end }
        } else {
            AvailabilityQuery::FreeTime
        }
    }

    /// Title for create/schedule: the words after the verb, or "Meeting"
    ///
    /// Leading articles, durations and email addresses are left out.
    fn title(message: &str, tokens: &Tokens, verb: usize) -> String {
        if let Some(title) = quoted(message) {
            return title;
        }
        let (raw, lower) = (tokens.raw(), tokens.lower());
        let mut words: Vec<&str> = Vec::new();
        let mut i = verb + 1;
        while i < lower.len() && !TERM_STOPS.contains(&lower[i].as_str()) {
            if let Some((_, span)) = duration_at(lower, i) {
                i += span;
                continue;
            }
            let skip = (words.is_empty() && TITLE_SKIP.contains(&lower[i].as_str()))
                || raw[i].contains('@');
            if !skip {
                words.push(&raw[i]);
            }
            i += 1;
        }
        while words.last().is_some_and(|w| w.eq_ignore_ascii_case("with")) {
            words.pop();
        }
        let title = if words.is_empty() {
            "Meeting".to_string()
        } else {
            words.join(" ")
        };

        match tokens.find_any_from(verb, &["with"]).and_then(|i| tokens.term_after(i)) {
            Some(who) if !who.contains('@') && !title.contains(&who) => {
                format!("{} with {}", title, who)
            }
            _ => title,
        }
    }

    fn status_filter(tokens: &Tokens) -> Option<ResponseStatus> {
        if tokens.has_any(&["accepted", "attending", "coming"]) {
            Some(ResponseStatus::Accepted)
        } else if tokens.has_any(&["declined"]) {
            Some(ResponseStatus::Declined)
        } else if tokens.has_any(&["tentative", "maybe"]) {
            Some(ResponseStatus::Tentative)
        } else if tokens.has_phrase("not responded") || tokens.has_any(&["pending"]) {
            Some(ResponseStatus::NeedsAction)
        } else {
            None
        }
    }
}

fn intent(kind: IntentKind, confidence: f64, entities: IntentEntities) -> Intent {
    Intent {
        kind,
        confidence,
        entities,
    }
}

/// `start` plus `minutes`, `None` when out of range
fn end_after(start: DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    Duration::try_minutes(minutes).and_then(|d| start.checked_add_signed(d))
}

fn unclear(kind: IntentKind, question: &str, mut entities: IntentEntities) -> Intent {
    entities.clarification = Some(question.to_string());
    intent(kind, 0.3, entities)
}

#[async_trait]
impl IntentExtractor for RuleBasedExtractor {
    async fn classify(&self, message: &str, context: &IntentContext) -> Result<Intent, AppError> {
        let tokens = Tokens::new(message);
        let mut entities = Self::entities(&tokens, context);

        if tokens.is_empty() {
            return Ok(unclear(
                IntentKind::Clarify,
                "What would you like me to do with your calendar?",
                entities,
            ));
        }

        if entities.duration_minutes > MAX_DURATION_MINUTES {
            return Ok(unclear(
                IntentKind::Clarify,
                "That is too long to book. How long should it be, up to a week?",
                entities,
            ));
        }

        if let Some(verb) = tokens.find_any(DELETE_WORDS) {
            entities.query = Self::target_term(message, &tokens, verb);
            if entities.query.is_none() {
                return Ok(unclear(
                    IntentKind::Delete,
                    "Which events should I delete? For example: delete meetings with Alex",
                    entities,
                ));
            }
            entities.action = Some(IntentKind::Delete);
            return Ok(intent(IntentKind::Compound, 0.85, entities));
        }

        if let Some(verb) = tokens.find_any(UPDATE_WORDS) {
            Self::classify_update(message, &tokens, verb, context, &mut entities);
            if entities.query.is_none() {
                return Ok(unclear(
                    IntentKind::Update,
                    "Which events should I update? For example: move meetings with Alex to 3pm",
                    entities,
                ));
            }
            if entities.patch.is_empty() {
                return Ok(unclear(
                    IntentKind::Update,
                    "What should I change about the matching events?",
                    entities,
                ));
            }
            entities.action = Some(IntentKind::Update);
            return Ok(intent(IntentKind::Compound, 0.85, entities));
        }

        if tokens.has_any(RSVP_WORDS) || tokens.has_phrase("who is coming") {
            entities.status_filter = Self::status_filter(&tokens);
            entities.query = Self::target_term(message, &tokens, 0)
                .or_else(|| tokens.find_any(&["for"]).and_then(|i| tokens.term_after(i)));
            return Ok(intent(IntentKind::Rsvp, 0.85, entities));
        }

        let schedule_verb = tokens
            .find_any(SCHEDULE_WORDS)
            .or_else(|| {
                tokens
                    .has_phrase("find time")
                    .then(|| tokens.find_any(&["time"]))
                    .flatten()
            })
            .or_else(|| tokens.find_any(CREATE_WORDS));

        if tokens.has_any_phrase(AVAILABILITY_PHRASES) && schedule_verb.is_none() {
            entities.availability = Some(Self::classify_availability(&tokens, context));
            return Ok(intent(IntentKind::Availability, 0.9, entities));
        }

        if let Some(verb) = schedule_verb {
            entities.title = Some(Self::title(message, &tokens, verb));
            return Ok(match find_clock(&tokens) {
                Some(time) => {
                    entities.start = Some(resolve_start(
                        find_day(&tokens, context.now),
                        time,
                        context.now,
                    ));
                    intent(IntentKind::Create, 0.9, entities)
                }
                None => intent(IntentKind::Schedule, 0.85, entities),
            });
        }

        if tokens.has_any(SEARCH_WORDS) || tokens.has_phrase("do i have") {
            entities.query = Self::target_term(message, &tokens, 0);
            if entities.query.is_none() {
                return Ok(unclear(
                    IntentKind::Search,
                    "What should I search for? For example: find meetings with Alex",
                    entities,
                ));
            }
            return Ok(intent(IntentKind::Search, 0.85, entities));
        }

        Ok(intent(IntentKind::General, 0.6, entities))
    }

    async fn decompose(
        &self,
        intent: &Intent,
        message: &str,
    ) -> Result<Vec<SubTaskSkeleton>, AppError> {
        let e = &intent.entities;
        let search_window = e.window_explicit.then_some(e.window);
        let search = |query: &str| {
            SubTaskSkeleton::new(
                format!("Search for events matching '{}'", query),
                SubTaskParams::Search(SearchParams {
                    query: query.to_string(),
                    window: search_window,
                    limit: None,
                }),
            )
        };
        let missing = |what: &str| {
            AppError::Intent(format!(
                "{} intent is missing {}",
                intent.kind.as_str(),
                what
            ))
        };

        let skeletons = match intent.kind {
            IntentKind::Search => {
                let query = e.query.as_deref().ok_or_else(|| missing("a search term"))?;
                vec![search(query)]
            }
            IntentKind::Compound => {
                let query = e.query.as_deref().ok_or_else(|| missing("a search term"))?;
                let follow_up = match e.action {
                    Some(IntentKind::Delete) => SubTaskSkeleton::new(
                        "Delete the matching events",
                        SubTaskParams::Delete(DeleteParams::default()),
                    ),
                    Some(IntentKind::Update) => {
                        let fields = e.patch.changed_fields().join(", ");
                        SubTaskSkeleton::new(
                            format!("Update {} of the matching events", fields),
                            SubTaskParams::Update(UpdateParams {
                                targets: Vec::new(),
                                patch: e.patch.clone(),
                            }),
                        )
                    }
                    _ => return Err(missing("a delete or update action")),
                };
                vec![search(query), follow_up.depends_on([0])]
            }
            IntentKind::Create => {
                let start = e.start.ok_or_else(|| missing("a start time"))?;
                let end = end_after(start, e.duration_minutes)
                    .ok_or_else(|| missing("a duration that fits the calendar"))?;
                let title = e.title.clone().unwrap_or_else(|| "Meeting".to_string());
                vec![SubTaskSkeleton::new(
                    format!("Create '{}'", title),
                    SubTaskParams::Create(CreateParams {
                        event: NewEvent {
                            title,
                            description: String::new(),
                            start,
                            end,
                            location: String::new(),
                            attendees: e.attendees.clone(),
                        },
                        account: None,
                    }),
                )]
            }
            IntentKind::Schedule => {
                let title = e.title.clone().unwrap_or_else(|| "Meeting".to_string());
                vec![SubTaskSkeleton::new(
                    format!("Schedule '{}' ({} min)", title, e.duration_minutes),
                    SubTaskParams::Schedule(ScheduleParams {
                        title,
                        description: String::new(),
                        location: String::new(),
                        attendees: e.attendees.clone(),
                        duration_minutes: e.duration_minutes,
                        window: e.window,
                        working_hours: None,
                        include_weekends: e.include_weekends,
                        account: None,
                    }),
                )]
            }
            IntentKind::Rsvp => vec![SubTaskSkeleton::new(
                "Check attendee responses",
                SubTaskParams::Rsvp(RsvpParams {
                    query: e.query.clone(),
                    window: Some(e.window),
                    status_filter: e.status_filter,
                }),
            )],
            IntentKind::Availability => {
                let query = e.availability.clone().unwrap_or(AvailabilityQuery::FreeTime);
                let description = match &query {
                    AvailabilityQuery::FreeTime => "Find free time",
                    AvailabilityQuery::Check { .. } => "Check availability",
                    AvailabilityQuery::NextAvailable => "Find the next available slot",
                    AvailabilityQuery::Suggest { .. } => "Suggest meeting times",
                    AvailabilityQuery::Summary => "Summarize calendar utilization",
                };
                vec![SubTaskSkeleton::new(
                    description,
                    SubTaskParams::Availability(AvailabilityParams {
                        query,
                        window: e.window,
                        duration_minutes: e.duration_minutes,
                        working_hours: None,
                        include_weekends: e.include_weekends,
                    }),
                )]
            }
            IntentKind::General => vec![SubTaskSkeleton::new(
                "Reply to the message",
                SubTaskParams::General(GeneralParams {
                    message: message.to_string(),
                }),
            )],
            IntentKind::Update | IntentKind::Delete | IntentKind::Clarify => {
                return Err(missing("the details needed to act"));
            }
        };

        tracing::debug!(
            kind = %intent.kind.as_str(),
            subtasks = skeletons.len(),
            "Decomposed intent"
        );
        Ok(skeletons)
    }
}
