// src/store.rs
//! Durable event table on SQLite.
//!
//! One row per event identifier. Only the actor codes are stored; actor names
//! and country codes live in the in-memory snapshot only.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::models::{Actor, Event};

const CREATE_TABLE: &str = "\
    CREATE TABLE IF NOT EXISTS events (
        GlobalEventID TEXT PRIMARY KEY,
        Date TEXT,
        SourceActor TEXT,
        TargetActor TEXT,
        EventCode TEXT,
        EventRootCode TEXT,
        GoldsteinScale REAL,
        AvgTone REAL,
        NumMentions INTEGER,
        NumSources INTEGER,
        NumArticles INTEGER,
        SourceURL TEXT,
        Lat REAL,
        Lng REAL,
        Country TEXT
    )";

/// Column list shared by the upsert and the full-table read.
const COLUMNS: &str = "\
    GlobalEventID, Date, SourceActor, TargetActor, EventCode, EventRootCode, \
    GoldsteinScale, AvgTone, NumMentions, NumSources, NumArticles, \
    SourceURL, Lat, Lng, Country";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(1);

/// Transactional gateway to the `events` table.
#[derive(Clone, Debug)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    ///
    /// `sqlite::memory:` URLs get a single long-lived connection so every
    /// query sees the same database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert-or-replace every event in one transaction.
    ///
    /// The statement is prepared once on the connection and re-executed per
    /// event. Any failing row rolls back the whole batch (the transaction is
    /// dropped without commit).
    pub async fn upsert_batch(&self, events: &[Event]) -> Result<(), sqlx::Error> {
        let sql = format!(
            "INSERT OR REPLACE INTO events ({COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        let mut tx = self.pool.begin().await?;
        for ev in events {
            sqlx::query(&sql)
                .bind(&ev.global_event_id)
                .bind(&ev.date)
                .bind(&ev.source_actor.code)
                .bind(&ev.target_actor.code)
                .bind(&ev.event_code)
                .bind(&ev.event_root_code)
                .bind(ev.goldstein_scale)
                .bind(ev.avg_tone)
                .bind(ev.num_mentions)
                .bind(ev.num_sources)
                .bind(ev.num_articles)
                .bind(&ev.source_url)
                .bind(ev.lat)
                .bind(ev.lng)
                .bind(&ev.country)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }

    /// Delete every row. Returns the number of rows removed.
    pub async fn clear(&self) -> Result<u64, sqlx::Error> {
        let res = sqlx::query("DELETE FROM events").execute(&self.pool).await?;
        Ok(res.rows_affected())
    }

    /// Full table contents, unordered.
    pub async fn list_all(&self) -> Result<Vec<Event>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM events");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(event_from_row).collect()
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await
    }

    /// Connectivity and pool diagnostics as a flat string map.
    ///
    /// Never fails: an unreachable database is reported as `status: down`.
    pub async fn health(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();

        let ping = tokio::time::timeout(
            HEALTH_TIMEOUT,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await;
        let err = match ping {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("ping timed out".to_string()),
        };
        if let Some(e) = err {
            tracing::warn!(error = %e, "storage health check failed");
            stats.insert("status".into(), "down".into());
            stats.insert("error".into(), format!("db down: {e}"));
            return stats;
        }

        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        stats.insert("status".into(), "up".into());
        stats.insert("message".into(), "It's healthy".into());
        stats.insert("open_connections".into(), size.to_string());
        stats.insert("idle".into(), idle.to_string());
        stats.insert("in_use".into(), size.saturating_sub(idle).to_string());
        stats
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn event_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Event, sqlx::Error> {
    Ok(Event {
        global_event_id: row.try_get("GlobalEventID")?,
        date: row.try_get("Date")?,
        source_actor: Actor::code_only(row.try_get("SourceActor")?),
        target_actor: Actor::code_only(row.try_get("TargetActor")?),
        event_code: row.try_get("EventCode")?,
        event_root_code: row.try_get("EventRootCode")?,
        goldstein_scale: row.try_get("GoldsteinScale")?,
        avg_tone: row.try_get("AvgTone")?,
        num_mentions: row.try_get("NumMentions")?,
        num_sources: row.try_get("NumSources")?,
        num_articles: row.try_get("NumArticles")?,
        source_url: row.try_get("SourceURL")?,
        lat: row.try_get("Lat")?,
        lng: row.try_get("Lng")?,
        country: row.try_get("Country")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: &str, country: &str, mentions: i64) -> Event {
        Event {
            global_event_id: id.into(),
            date: "20240101".into(),
            source_actor: Actor::new("USA", "UNITED STATES", "US"),
            target_actor: Actor::new("CHN", "CHINA", "CH"),
            event_code: "042".into(),
            event_root_code: "04".into(),
            goldstein_scale: 1.5,
            avg_tone: -0.25,
            num_mentions: mentions,
            num_sources: 1,
            num_articles: mentions,
            source_url: "https://news.example/x".into(),
            lat: 40.7,
            lng: -74.0,
            country: country.into(),
        }
    }

    async fn memory_store() -> EventStore {
        EventStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = memory_store().await;
        store
            .upsert_batch(&[ev("1", "United States", 1), ev("2", "Other", 2)])
            .await
            .unwrap();
        store.upsert_batch(&[ev("1", "Canada", 9)]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let mut rows = store.list_all().await.unwrap();
        rows.sort_by(|a, b| a.global_event_id.cmp(&b.global_event_id));
        assert_eq!(rows[0].country, "Canada");
        assert_eq!(rows[0].num_mentions, 9);
    }

    #[tokio::test]
    async fn only_actor_codes_are_durable() {
        let store = memory_store().await;
        store.upsert_batch(&[ev("1", "United States", 1)]).await.unwrap();
        let rows = store.list_all().await.unwrap();
        assert_eq!(rows[0].source_actor, Actor::code_only("USA".into()));
        assert_eq!(rows[0].target_actor.name, "");
        assert_eq!(rows[0].goldstein_scale, 1.5);
    }

    #[tokio::test]
    async fn failing_batch_commits_nothing() {
        let store = memory_store().await;
        store.upsert_batch(&[ev("keep", "Other", 1)]).await.unwrap();

        // A trigger that rejects one specific id makes the batch fail midway.
        sqlx::query(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON events \
             WHEN NEW.GlobalEventID = 'bad' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let res = store
            .upsert_batch(&[ev("a", "Other", 1), ev("bad", "Other", 1), ev("b", "Other", 1)])
            .await;
        assert!(res.is_err());

        let ids: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.global_event_id)
            .collect();
        assert_eq!(ids, vec!["keep".to_string()]);
    }

    #[tokio::test]
    async fn clear_wipes_table_and_health_reports_up() {
        let store = memory_store().await;
        store
            .upsert_batch(&[ev("1", "Other", 1), ev("2", "Other", 1)])
            .await
            .unwrap();
        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);

        let health = store.health().await;
        assert_eq!(health.get("status").map(String::as_str), Some("up"));
        assert!(health.contains_key("open_connections"));
    }
}
