// src/ingest/parser.rs
//! Tab-separated export rows → classified `Event`s.
//!
//! The export has no header and no quoting. Trailing rows are sometimes
//! truncated upstream, so short rows are dropped instead of failing the batch.

use metrics::counter;

use crate::geo::CountryIndex;
use crate::models::{Actor, Event};

/// Rows with fewer fields than this are discarded.
pub const MIN_FIELDS: usize = 61;

// 0-based column positions in the 2.0 export layout.
const COL_ID: usize = 0;
const COL_DATE: usize = 1;
const COL_ACTOR1: usize = 5;
const COL_ACTOR2: usize = 15;
const COL_EVENT_CODE: usize = 26;
const COL_EVENT_ROOT_CODE: usize = 28;
const COL_GOLDSTEIN: usize = 30;
const COL_NUM_MENTIONS: usize = 31;
const COL_NUM_SOURCES: usize = 32;
const COL_NUM_ARTICLES: usize = 33;
const COL_AVG_TONE: usize = 34;
const COL_LAT: usize = 56;
const COL_LNG: usize = 57;
const COL_SOURCE_URL: usize = 60;

/// Parsed events in input order plus the number of rows dropped as short.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub events: Vec<Event>,
    pub discarded: usize,
}

/// Parse and classify every row, keeping input order.
pub fn parse_events(data: &[u8], countries: &CountryIndex) -> ParsedBatch {
    let text = String::from_utf8_lossy(data);
    let mut batch = ParsedBatch::default();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < MIN_FIELDS {
            batch.discarded += 1;
            continue;
        }
        batch.events.push(event_from_fields(&fields, countries));
    }

    counter!("ingest_events_total").increment(batch.events.len() as u64);
    counter!("ingest_rows_discarded_total").increment(batch.discarded as u64);
    batch
}

/// Caller guarantees `fields.len() >= MIN_FIELDS`.
fn event_from_fields(fields: &[&str], countries: &CountryIndex) -> Event {
    let lat = parse_f64(fields[COL_LAT]);
    let lng = parse_f64(fields[COL_LNG]);

    Event {
        global_event_id: fields[COL_ID].to_string(),
        date: fields[COL_DATE].to_string(),
        source_actor: actor_at(fields, COL_ACTOR1),
        target_actor: actor_at(fields, COL_ACTOR2),
        event_code: fields[COL_EVENT_CODE].to_string(),
        event_root_code: fields[COL_EVENT_ROOT_CODE].to_string(),
        goldstein_scale: parse_f64(fields[COL_GOLDSTEIN]),
        avg_tone: parse_f64(fields[COL_AVG_TONE]),
        num_mentions: parse_i64(fields[COL_NUM_MENTIONS]),
        num_sources: parse_i64(fields[COL_NUM_SOURCES]),
        num_articles: parse_i64(fields[COL_NUM_ARTICLES]),
        source_url: fields[COL_SOURCE_URL].to_string(),
        lat,
        lng,
        country: countries.classify(lat, lng).to_string(),
    }
}

/// Actor triple {code, name, country code} starting at `start`.
fn actor_at(fields: &[&str], start: usize) -> Actor {
    Actor::new(fields[start], fields[start + 1], fields[start + 2])
}

fn parse_f64(s: &str) -> f64 {
    s.parse().unwrap_or(0.0)
}

fn parse_i64(s: &str) -> i64 {
    s.parse().unwrap_or(0)
}
