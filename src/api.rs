use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::ingest::scheduler::{RefreshTrigger, TriggerOutcome};
use crate::ingest::IngestService;
use crate::models::Event;
use crate::query::{self, EventQuery};

#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub trigger: RefreshTrigger,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", get(stored_events))
        .route("/gdelt/events", get(snapshot_events))
        .route("/refresh", post(refresh))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler-level failure rendered as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        let body = serde_json::json!({ "error": "Failed to query events" });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.ingest.store().health().await)
}

/// Durable table contents; bypasses the in-memory snapshot.
async fn stored_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    let events = state.ingest.store().list_all().await?;
    Ok(Json(events))
}

async fn snapshot_events(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let snapshot = state.ingest.events();
    let query = EventQuery::from_params(&q);
    Json(query::select(&snapshot, &query)).into_response()
}

/// Acknowledge immediately; the refresh runs on the trigger worker.
async fn refresh(State(state): State<AppState>) -> StatusCode {
    match state.trigger.trigger() {
        TriggerOutcome::Queued => tracing::info!(target: "ingest", "manual refresh queued"),
        TriggerOutcome::Coalesced => {
            tracing::debug!(target: "ingest", "manual refresh coalesced with pending request")
        }
        TriggerOutcome::Closed => tracing::warn!(target: "ingest", "refresh worker is not running"),
    }
    StatusCode::ACCEPTED
}
