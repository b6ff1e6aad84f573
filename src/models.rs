// src/models.rs
use serde::{Deserialize, Serialize};

/// Country label for points no loaded polygon contains.
pub const OTHER_COUNTRY: &str = "Other";

/// One classified occurrence from the export feed.
///
/// Field names on the wire follow the feed's own column naming, which is what
/// dashboard clients filter and sort on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "GlobalEventID")]
    pub global_event_id: String,
    /// Feed-native date string (`YYYYMMDD`), never reparsed.
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "SourceActor")]
    pub source_actor: Actor,
    #[serde(rename = "TargetActor")]
    pub target_actor: Actor,
    #[serde(rename = "EventCode")]
    pub event_code: String,
    #[serde(rename = "EventRootCode")]
    pub event_root_code: String,
    #[serde(rename = "GoldsteinScale")]
    pub goldstein_scale: f64,
    #[serde(rename = "AvgTone")]
    pub avg_tone: f64,
    #[serde(rename = "NumMentions")]
    pub num_mentions: i64,
    #[serde(rename = "NumSources")]
    pub num_sources: i64,
    #[serde(rename = "NumArticles")]
    pub num_articles: i64,
    #[serde(rename = "SourceURL")]
    pub source_url: String,
    #[serde(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Lng")]
    pub lng: f64,
    /// Always set after classification; `OTHER_COUNTRY` when unmatched.
    #[serde(rename = "Country")]
    pub country: String,
}

/// A party referenced by an event (source or target).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CountryCode")]
    pub country_code: String,
}

impl Actor {
    pub fn new(code: &str, name: &str, country_code: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            country_code: country_code.to_string(),
        }
    }

    /// Actor as read back from durable storage, where only the code survives.
    pub fn code_only(code: String) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }
}
