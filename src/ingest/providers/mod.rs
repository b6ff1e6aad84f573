// src/ingest/providers/mod.rs
pub mod gdelt_http;
pub mod static_feed;
