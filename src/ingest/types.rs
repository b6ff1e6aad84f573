// src/ingest/types.rs
use std::time::Duration;

use crate::error::IngestError;

/// Where the raw export payload comes from.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Decompressed tab-separated bytes of the latest export.
    async fn fetch_latest(&self) -> Result<Vec<u8>, IngestError>;
    fn name(&self) -> &'static str;
}

/// Outcome of one successful refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub kept: usize,
    pub discarded: usize,
    pub elapsed: Duration,
}
