//! Filtering and pagination over the served snapshot (`GET /gdelt/events`).
//!
//! Parameters are parsed leniently: an unparsable value behaves as if absent.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::Event;

pub const DEFAULT_LIMIT: usize = 50;

/// Equality filters plus paging, as sent by dashboard clients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub date: Option<String>,
    pub source_actor: Option<String>,
    pub target_actor: Option<String>,
    pub event_code: Option<String>,
    pub country: Option<String>,
    pub goldstein: Option<f64>,
    pub all: bool,
    pub page: usize,
    pub limit: usize,
}

impl EventQuery {
    pub fn from_params(q: &HashMap<String, String>) -> Self {
        let text = |k: &str| q.get(k).filter(|v| !v.is_empty()).cloned();
        let limit = q
            .get("limit")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&l| l > 0)
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LIMIT);

        Self {
            date: text("date"),
            source_actor: text("sourceActor"),
            target_actor: text("targetActor"),
            event_code: text("eventCode"),
            country: text("country"),
            goldstein: q.get("goldstein").and_then(|v| v.parse().ok()),
            all: q.get("all").map(String::as_str) == Some("true"),
            page: q.get("page").and_then(|v| v.parse().ok()).unwrap_or(0),
            limit,
        }
    }

    pub fn matches(&self, ev: &Event) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }
        eq(&self.date, &ev.date)
            && eq(&self.source_actor, &ev.source_actor.code)
            && eq(&self.target_actor, &ev.target_actor.code)
            && eq(&self.event_code, &ev.event_code)
            && eq(&self.country, &ev.country)
            && self.goldstein.map_or(true, |g| ev.goldstein_scale == g)
    }

    pub fn filter<'a>(&self, events: &'a [Event]) -> Vec<&'a Event> {
        events.iter().filter(|ev| self.matches(ev)).collect()
    }
}

/// Response body; `page` is omitted for `all=true`.
#[derive(Debug, Serialize)]
pub struct EventPage<'a> {
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    pub results: Vec<&'a Event>,
}

/// Apply the query to a snapshot.
///
/// A page starting past the end yields everything from offset 0 up to the
/// capped end; the end is computed before the start is reset.
pub fn select<'a>(events: &'a [Event], query: &EventQuery) -> EventPage<'a> {
    let filtered = query.filter(events);
    let total = filtered.len();

    if query.all {
        return EventPage {
            total,
            page: None,
            results: filtered,
        };
    }

    let mut start = query.page.saturating_mul(query.limit);
    let end = start.saturating_add(query.limit).min(total);
    if start >= total {
        start = 0;
    }

    EventPage {
        total,
        page: Some(query.page),
        results: filtered[start..end].to_vec(),
    }
}
