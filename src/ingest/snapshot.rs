// src/ingest/snapshot.rs
//! The authoritative in-memory event set and its writer gate.

use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, MutexGuard};

use crate::models::Event;

/// Published event set plus the exclusion domain for anything that writes.
///
/// Writers (refresh, storage reset) hold the gate for their whole run, so two
/// writers never interleave. Readers only take the inner read lock long
/// enough to clone the `Arc`, so they keep seeing the previous set while a
/// writer is busy, and always see one set in full.
#[derive(Debug, Default)]
pub struct Snapshot {
    current: RwLock<Arc<Vec<Event>>>,
    gate: Mutex<()>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> Arc<Vec<Event>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Wait for exclusive write access. Callers queue; nobody is rejected.
    pub async fn write(&self) -> SnapshotWriter<'_> {
        SnapshotWriter {
            snapshot: self,
            _gate: self.gate.lock().await,
        }
    }

    /// True while a writer holds the gate.
    pub fn is_writing(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

/// Scoped write access; dropping it releases the gate.
pub struct SnapshotWriter<'a> {
    snapshot: &'a Snapshot,
    _gate: MutexGuard<'a, ()>,
}

impl SnapshotWriter<'_> {
    /// Swap in a complete new event set.
    pub fn publish(&self, events: Vec<Event>) {
        let next = Arc::new(events);
        *self
            .snapshot
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner()) = next;
    }
}
