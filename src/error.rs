// src/error.rs
//! Error types for the ingestion pipeline and the country polygon loader.

use std::path::PathBuf;

/// Failure of one refresh cycle (or a storage reset).
///
/// Per-row anomalies never show up here: short rows are dropped and
/// unparsable numbers default to zero inside the parser.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The feed index had no line naming an export archive.
    #[error("feed index has no line containing '{marker}'")]
    FeedIndex { marker: String },

    /// The downloaded archive had no entry with the expected suffix.
    #[error("archive has no entry ending with '{suffix}'")]
    ArchiveContent { suffix: String },

    /// An outbound request failed or returned a non-2xx status.
    #[error("feed http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The archive could not be opened or an entry could not be read.
    #[error("feed archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("reading archive entry: {0}")]
    Io(#[from] std::io::Error),

    /// Transaction or statement failure; the whole batch was rolled back.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// The blocking parse task panicked or was cancelled.
    #[error("parse task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Startup-only failure loading the country boundary document.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing geojson: {0}")]
    Parse(#[from] serde_json::Error),
}
