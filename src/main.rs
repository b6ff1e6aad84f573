//! GDELT ingestion service binary.
//! Loads country polygons, runs the first refresh, starts the background
//! schedules and serves the HTTP API until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gdelt_ingest::ingest::providers::{gdelt_http::GdeltHttpFeed, static_feed::StaticFeed};
use gdelt_ingest::ingest::scheduler::{self, RefreshTrigger};
use gdelt_ingest::ingest::types::FeedSource;
use gdelt_ingest::metrics::Metrics;
use gdelt_ingest::{create_router, AppConfig, AppState, CountryIndex, EventStore, IngestService};

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gdelt_ingest=info,ingest=info,geo=info,tower_http=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn build_feed(cfg: &AppConfig) -> anyhow::Result<Arc<dyn FeedSource>> {
    if let Some(path) = &cfg.feed_fixture_path {
        let feed = StaticFeed::from_path(path)
            .with_context(|| format!("reading feed fixture {}", path.display()))?;
        tracing::info!(path = %path.display(), "serving export from local fixture");
        return Ok(Arc::new(feed));
    }
    let feed = GdeltHttpFeed::new(cfg.feed_index_url.clone(), cfg.http_timeout())
        .context("building feed http client")?;
    Ok(Arc::new(feed))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load().context("loading configuration")?;
    let metrics = Metrics::init(&cfg)?;

    // No classification without polygons: fail startup.
    let countries = CountryIndex::load(&cfg.geojson_path).context("loading country polygons")?;
    let store = EventStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening database {}", cfg.database_url))?;

    let feed = build_feed(&cfg)?;
    let service = Arc::new(IngestService::new(feed, Arc::new(countries), store.clone()));

    match service.refresh().await {
        Ok(report) => tracing::info!(kept = report.kept, "initial refresh complete"),
        Err(e) if cfg.initial_refresh_required => {
            return Err(e).context("initial refresh failed");
        }
        Err(e) => tracing::warn!(error = %e, "initial refresh failed; serving empty snapshot"),
    }

    let auto_refresh = scheduler::start_auto_refresh(Arc::clone(&service), cfg.refresh_interval());
    let cancel = CancellationToken::new();
    let reset_task = scheduler::start_daily_reset(Arc::clone(&service), cancel.clone());
    let (trigger, trigger_task) = RefreshTrigger::spawn(Arc::clone(&service), cancel.clone());

    let state = AppState {
        ingest: Arc::clone(&service),
        trigger,
    };
    let app = create_router(state).merge(metrics.router());

    let addr = SocketAddr::new(
        cfg.host.parse().context("HOST must be an IP address")?,
        cfg.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // --- Post-shutdown cleanup: one deadline for the whole sequence ---
    let deadline = tokio::time::Instant::now() + cfg.shutdown_grace();
    if !auto_refresh.shutdown_until(deadline).await {
        tracing::warn!("in-flight refresh abandoned after grace period");
    }
    cancel.cancel();
    for (name, task) in [("manual trigger", trigger_task), ("daily reset", reset_task)] {
        if !scheduler::join_until(deadline, task).await {
            tracing::warn!(task = name, "background task did not stop within grace period");
        }
    }
    if tokio::time::timeout_at(deadline, store.close()).await.is_err() {
        tracing::warn!("database pool did not close within grace period");
    }

    tracing::info!("graceful shutdown complete");
    Ok(())
}

/// Resolves on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
