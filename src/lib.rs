// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod query;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::{GeoError, IngestError};
pub use crate::geo::CountryIndex;
pub use crate::ingest::IngestService;
pub use crate::models::{Actor, Event, OTHER_COUNTRY};
pub use crate::store::EventStore;
