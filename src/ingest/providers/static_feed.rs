use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::IngestError;
use crate::ingest::types::FeedSource;

/// Serves a fixed export payload; used for offline runs and tests.
///
/// The payload can be swapped between refreshes with [`StaticFeed::set`].
pub struct StaticFeed {
    payload: Mutex<Vec<u8>>,
}

impl StaticFeed {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Mutex::new(payload.into()),
        }
    }

    /// Load the payload from a decompressed export file on disk.
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    pub fn set(&self, payload: impl Into<Vec<u8>>) {
        *self.payload.lock().unwrap_or_else(|e| e.into_inner()) = payload.into();
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch_latest(&self) -> Result<Vec<u8>, IngestError> {
        Ok(self.payload.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
