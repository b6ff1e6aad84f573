// src/ingest/scheduler.rs
//! Background schedules around `IngestService`: periodic refresh, the
//! midnight storage wipe, and the coalescing manual-refresh trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Local, TimeZone};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::IngestService;

/// Handle to a running auto-refresh schedule.
///
/// `stop` and `shutdown` consume the handle, so a schedule can only be
/// stopped once.
pub struct AutoRefresh {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AutoRefresh {
    /// Signal the schedule to stop before its next tick. A cycle already
    /// running keeps going to completion in the background.
    pub fn stop(self) -> JoinHandle<()> {
        self.cancel.cancel();
        self.task
    }

    /// Stop and wait up to `grace` for an in-flight cycle. Returns false if
    /// the grace period ran out and the cycle was abandoned.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.shutdown_until(Instant::now() + grace).await
    }

    /// Like [`AutoRefresh::shutdown`] against an absolute deadline, so one
    /// grace period can cover several stop steps.
    pub async fn shutdown_until(self, deadline: Instant) -> bool {
        join_until(deadline, self.stop()).await
    }
}

/// Wait for `task` until `deadline`. Returns false if it was still running.
pub async fn join_until(deadline: Instant, task: JoinHandle<()>) -> bool {
    time::timeout_at(deadline, task).await.is_ok()
}

/// Refresh every `interval`, first run one interval from now. Failures are
/// logged and the schedule carries on.
pub fn start_auto_refresh(service: Arc<IngestService>, interval: Duration) -> AutoRefresh {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            target: "ingest",
            interval_secs = interval.as_secs(),
            "auto-refresh started"
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = service.refresh().await {
                        tracing::warn!(target: "ingest", error = %e, "auto-refresh failed");
                    }
                }
            }
        }
        tracing::info!(target: "ingest", "auto-refresh stopped");
    });

    AutoRefresh { cancel, task }
}

/// Wipe durable storage at every local midnight until `cancel` fires.
pub fn start_daily_reset(service: Arc<IngestService>, cancel: CancellationToken) -> JoinHandle<()> {
    start_reset_schedule(service, cancel, || until_next_midnight(Local::now()))
}

/// Wipe durable storage each time `next_wait` elapses, recomputing the wait
/// after every reset.
pub fn start_reset_schedule<F>(
    service: Arc<IngestService>,
    cancel: CancellationToken,
    next_wait: F,
) -> JoinHandle<()>
where
    F: Fn() -> Duration + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let wait = next_wait();
            tracing::debug!(target: "ingest", wait_secs = wait.as_secs(), "next storage reset scheduled");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(wait) => {
                    if let Err(e) = service.reset_storage().await {
                        tracing::error!(target: "ingest", error = %e, "storage reset failed");
                    }
                }
            }
        }
        tracing::info!(target: "ingest", "storage reset schedule stopped");
    })
}

/// Time from `now` until the start of the next calendar day in `now`'s zone.
///
/// Days whose midnight does not exist (DST gaps) resolve to the earliest
/// valid instant; an unresolvable day falls back to 24 hours.
pub fn until_next_midnight<Tz: TimeZone>(now: DateTime<Tz>) -> Duration {
    let tz = now.timezone();
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| tz.from_local_datetime(&naive).earliest());

    match next {
        Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
        None => Duration::from_secs(24 * 3600),
    }
}

/// Result of asking for a manual refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A refresh will run once the worker is free.
    Queued,
    /// A request was already pending; this one folds into it.
    Coalesced,
    /// The worker has shut down.
    Closed,
}

/// Fire-and-forget refresh requests with at most one pending at a time.
#[derive(Clone, Debug)]
pub struct RefreshTrigger {
    tx: mpsc::Sender<()>,
}

impl RefreshTrigger {
    /// Spawn the worker that drains requests into `service.refresh()`.
    pub fn spawn(service: Arc<IngestService>, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = rx.recv() => {
                        if msg.is_none() {
                            break;
                        }
                        if let Err(e) = service.refresh().await {
                            tracing::warn!(target: "ingest", error = %e, "manual refresh failed");
                        }
                    }
                }
            }
        });
        (Self { tx }, task)
    }

    /// Never waits.
    pub fn trigger(&self) -> TriggerOutcome {
        let outcome = match self.tx.try_send(()) {
            Ok(()) => TriggerOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(())) => TriggerOutcome::Coalesced,
            Err(mpsc::error::TrySendError::Closed(())) => TriggerOutcome::Closed,
        };
        let label = match outcome {
            TriggerOutcome::Queued => "queued",
            TriggerOutcome::Coalesced => "coalesced",
            TriggerOutcome::Closed => "closed",
        };
        counter!("ingest_manual_triggers_total", "outcome" => label).increment(1);
        outcome
    }
}
