//! Season pack API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fetchlane_core::{PackId, SeasonPackStatus, TrackerError};
use std::sync::Arc;
use tracing::warn;

use super::handlers::ErrorResponse;
use crate::state::AppState;

fn tracker_error(error: TrackerError) -> Response {
    match error {
        TrackerError::PackNotFound(_) => {
            (StatusCode::NOT_FOUND, ErrorResponse::new(error.to_string())).into_response()
        }
        TrackerError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new(error.to_string()),
        )
            .into_response(),
    }
}

/// Derived status of the live pack for a show and season.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path((show, season)): Path<(String, u32)>,
) -> Result<Json<SeasonPackStatus>, Response> {
    let pack_id = PackId::new(&show, season);
    state
        .tracker()
        .status(&pack_id)
        .await
        .map(Json)
        .map_err(tracker_error)
}

/// Record that one episode of a pack was consumed.
///
/// A pack completed by this call is released right away; if the release
/// fails it is retried at the end of the next batch.
pub async fn record_consumption(
    State(state): State<Arc<AppState>>,
    Path((show, season, episode)): Path<(String, u32, u32)>,
) -> Result<Json<SeasonPackStatus>, Response> {
    let pack_id = PackId::new(&show, season);
    let tracker = state.tracker();
    let status = tracker
        .record_consumption(&pack_id, episode)
        .await
        .map_err(tracker_error)?;

    if status.complete {
        if let Err(e) = tracker.release_if_complete(&pack_id).await {
            warn!(pack = %pack_id, error = %e, "Release after consumption failed");
        }
    }
    Ok(Json(status))
}
