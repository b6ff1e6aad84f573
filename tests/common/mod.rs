// tests/common/mod.rs
// Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gdelt_ingest::ingest::types::FeedSource;
use gdelt_ingest::{CountryIndex, EventStore, IngestError, IngestService};
use tokio::sync::Semaphore;

pub const COUNTRIES_GEOJSON: &str = include_str!("../fixtures/countries.geo.json");

pub fn countries() -> Arc<CountryIndex> {
    Arc::new(CountryIndex::from_geojson_str(COUNTRIES_GEOJSON).expect("fixture geojson"))
}

/// A 61-column export row; only the columns the parser reads are filled.
pub fn row(id: &str, lat: &str, lng: &str) -> String {
    row_with(id, lat, lng, "1.0", "https://news.example/a")
}

pub fn row_with(id: &str, lat: &str, lng: &str, goldstein: &str, url: &str) -> String {
    let mut cols = vec![String::new(); 61];
    cols[0] = id.to_string();
    cols[1] = "20240101".to_string();
    cols[5] = "USA".to_string();
    cols[6] = "UNITED STATES".to_string();
    cols[7] = "US".to_string();
    cols[15] = "FRA".to_string();
    cols[16] = "FRANCE".to_string();
    cols[17] = "FR".to_string();
    cols[26] = "042".to_string();
    cols[28] = "04".to_string();
    cols[30] = goldstein.to_string();
    cols[31] = "4".to_string();
    cols[32] = "2".to_string();
    cols[33] = "4".to_string();
    cols[34] = "-1.25".to_string();
    cols[56] = lat.to_string();
    cols[57] = lng.to_string();
    cols[60] = url.to_string();
    cols.join("\t")
}

pub fn payload(rows: &[String]) -> Vec<u8> {
    let mut s = rows.join("\n");
    s.push('\n');
    s.into_bytes()
}

/// `n` rows with ids `{prefix}{i}`, all inside the United States box.
pub fn batch(prefix: &str, n: usize) -> Vec<u8> {
    let rows: Vec<String> = (0..n)
        .map(|i| row(&format!("{prefix}{i}"), "40.7", "-74.0"))
        .collect();
    payload(&rows)
}

pub async fn memory_store() -> EventStore {
    EventStore::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite")
}

pub async fn service_with(feed: Arc<dyn FeedSource>) -> Arc<IngestService> {
    Arc::new(IngestService::new(feed, countries(), memory_store().await))
}

/// Serves queued payloads in order (repeating the last one); can be switched
/// to failing. Counts fetches.
pub struct ScriptedFeed {
    payloads: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
    pub fetches: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new(payloads: Vec<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(payloads),
            fail: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch_latest(&self) -> Result<Vec<u8>, IngestError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(IngestError::FeedIndex {
                marker: "export.CSV.zip".into(),
            });
        }
        let mut payloads = self.payloads.lock().unwrap();
        if payloads.len() > 1 {
            Ok(payloads.remove(0))
        } else {
            Ok(payloads.first().cloned().unwrap_or_default())
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Each fetch waits for one permit; tracks how many fetches overlap.
pub struct GatedFeed {
    gate: Semaphore,
    payload: Vec<u8>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub started: AtomicUsize,
}

impl GatedFeed {
    pub fn new(payload: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            payload,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        })
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for GatedFeed {
    async fn fetch_latest(&self) -> Result<Vec<u8>, IngestError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.gate.acquire().await.expect("gate open").forget();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

/// Poll `cond` every few milliseconds until it holds or `within` elapses.
pub async fn eventually<F: Fn() -> bool>(within: Duration, cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
