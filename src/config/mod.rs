// src/config/mod.rs
//! Process configuration: optional TOML file, then environment overrides.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::providers::gdelt_http::DEFAULT_INDEX_URL;

pub const ENV_CONFIG_PATH: &str = "GDELT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/gdelt.toml";

/// Everything the service needs, passed explicitly to constructors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// sqlx SQLite URL, e.g. `sqlite://gdelt.db` or `sqlite::memory:`.
    pub database_url: String,
    pub geojson_path: PathBuf,
    pub feed_index_url: String,
    /// Serve this decompressed export file instead of downloading the feed.
    pub feed_fixture_path: Option<PathBuf>,
    pub refresh_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    /// Abort startup when the first refresh fails.
    pub initial_refresh_required: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            database_url: "sqlite://gdelt.db".into(),
            geojson_path: PathBuf::from("data/countries.geo.json"),
            feed_index_url: DEFAULT_INDEX_URL.into(),
            feed_fixture_path: None,
            refresh_interval_secs: 900,
            http_timeout_secs: 60,
            shutdown_grace_secs: 5,
            initial_refresh_required: true,
        }
    }
}

impl AppConfig {
    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $GDELT_CONFIG_PATH (must exist)
    /// 2) config/gdelt.toml
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::from_toml_file(&pb)?
            }
            Err(_) => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_toml_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Override fields from the deployment environment
    /// (`PORT`, `DB_URL`, ...). Unset variables leave the field untouched.
    pub fn apply_env<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("HOST") {
            self.host = v;
        }
        if let Some(v) = get("PORT") {
            self.port = v.trim().parse().context("PORT must be a valid u16")?;
        }
        if let Some(v) = get("DB_URL") {
            self.database_url = v;
        }
        if let Some(v) = get("GEOJSON_PATH") {
            self.geojson_path = PathBuf::from(v);
        }
        if let Some(v) = get("FEED_INDEX_URL") {
            self.feed_index_url = v;
        }
        if let Some(v) = get("FEED_FIXTURE_PATH") {
            self.feed_fixture_path = Some(PathBuf::from(v)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(v) = get("REFRESH_INTERVAL_SECS") {
            self.refresh_interval_secs = v
                .trim()
                .parse()
                .context("REFRESH_INTERVAL_SECS must be a valid u64")?;
        }
        if let Some(v) = get("HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v
                .trim()
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a valid u64")?;
        }
        if let Some(v) = get("SHUTDOWN_GRACE_SECS") {
            self.shutdown_grace_secs = v
                .trim()
                .parse()
                .context("SHUTDOWN_GRACE_SECS must be a valid u64")?;
        }
        if let Some(v) = get("INITIAL_REFRESH_REQUIRED") {
            self.initial_refresh_required = matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if self.refresh_interval_secs == 0 {
            return Err(anyhow!("refresh interval must be at least one second"));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
