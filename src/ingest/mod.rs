// src/ingest/mod.rs
//! Fetch → parse & classify → persist → publish.

pub mod parser;
pub mod providers;
pub mod scheduler;
pub mod snapshot;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;

use crate::error::IngestError;
use crate::geo::CountryIndex;
use crate::models::Event;
use crate::store::EventStore;
use snapshot::Snapshot;
use types::{FeedSource, RefreshReport};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_refresh_total", "Successful refresh cycles.");
        describe_counter!("ingest_refresh_errors_total", "Failed refresh cycles.");
        describe_counter!("ingest_events_total", "Events parsed from the export feed.");
        describe_counter!(
            "ingest_rows_discarded_total",
            "Export rows dropped for having too few fields."
        );
        describe_counter!("ingest_storage_resets_total", "Daily storage wipes.");
        describe_counter!(
            "ingest_manual_triggers_total",
            "Manual refresh requests, by outcome."
        );
        describe_histogram!("ingest_refresh_ms", "Full refresh cycle time in milliseconds.");
        describe_histogram!("ingest_fetch_ms", "Feed download + extraction time in milliseconds.");
        describe_gauge!("ingest_snapshot_size", "Events in the served snapshot.");
        describe_gauge!(
            "ingest_last_refresh_ts",
            "Unix ts of the last successful refresh."
        );
    });
}

/// Owns the snapshot and drives refresh cycles against one feed and one store.
pub struct IngestService {
    source: Arc<dyn FeedSource>,
    countries: Arc<CountryIndex>,
    store: EventStore,
    snapshot: Snapshot,
}

impl IngestService {
    pub fn new(source: Arc<dyn FeedSource>, countries: Arc<CountryIndex>, store: EventStore) -> Self {
        ensure_metrics_described();
        Self {
            source,
            countries,
            store,
            snapshot: Snapshot::new(),
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Current snapshot. Never blocks on an in-flight refresh.
    pub fn events(&self) -> Arc<Vec<Event>> {
        self.snapshot.read()
    }

    pub fn is_refreshing(&self) -> bool {
        self.snapshot.is_writing()
    }

    /// Run one full cycle. Concurrent callers wait their turn.
    ///
    /// The batch is committed before it is published, so on any error both
    /// the durable table and the served snapshot stay as they were.
    pub async fn refresh(&self) -> Result<RefreshReport, IngestError> {
        let t0 = Instant::now();
        let writer = self.snapshot.write().await;

        let result = self.run_cycle().await;
        match result {
            Ok((events, discarded)) => {
                let kept = events.len();
                writer.publish(events);
                drop(writer);

                let elapsed = t0.elapsed();
                counter!("ingest_refresh_total").increment(1);
                histogram!("ingest_refresh_ms").record(elapsed.as_secs_f64() * 1_000.0);
                gauge!("ingest_snapshot_size").set(kept as f64);
                gauge!("ingest_last_refresh_ts").set(chrono::Utc::now().timestamp() as f64);

                tracing::info!(
                    target: "ingest",
                    source = self.source.name(),
                    kept,
                    discarded,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "refresh complete"
                );
                Ok(RefreshReport {
                    kept,
                    discarded,
                    elapsed,
                })
            }
            Err(e) => {
                counter!("ingest_refresh_errors_total").increment(1);
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> Result<(Vec<Event>, usize), IngestError> {
        let data = self.source.fetch_latest().await?;

        let countries = Arc::clone(&self.countries);
        let batch = tokio::task::spawn_blocking(move || parser::parse_events(&data, &countries)).await?;

        self.store.upsert_batch(&batch.events).await?;
        Ok((batch.events, batch.discarded))
    }

    /// Wipe durable storage, excluded against any refresh.
    ///
    /// The served snapshot is left alone; it is replaced by the next refresh.
    pub async fn reset_storage(&self) -> Result<u64, IngestError> {
        let _writer = self.snapshot.write().await;
        let deleted = self.store.clear().await?;
        counter!("ingest_storage_resets_total").increment(1);
        tracing::info!(target: "ingest", deleted, "durable storage reset");
        Ok(deleted)
    }
}
