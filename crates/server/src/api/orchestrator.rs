//! Orchestrator API handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fetchlane_core::{OrchestratorError, OrchestratorStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::handlers::ErrorResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    /// Block until the batch finishes and return its report.
    #[serde(default)]
    pub wait: bool,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    /// Whether another batch was already in progress. Items it holds are
    /// skipped by the new batch.
    pub already_running: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get orchestrator status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status().await)
}

/// Trigger a batch run out of band.
///
/// The batch goes through the same per-item guard as the periodic trigger,
/// so overlapping with a scheduled run never submits an item twice.
pub async fn run(State(state): State<Arc<AppState>>, Query(params): Query<RunParams>) -> Response {
    let orchestrator = Arc::clone(state.orchestrator());
    let cancel = state.shutdown().child_token();
    let already_running = orchestrator.status().await.running;

    if params.wait {
        return match orchestrator.run(&cancel).await {
            Ok(report) => (StatusCode::OK, Json(report)).into_response(),
            Err(OrchestratorError::Cancelled) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("run cancelled by shutdown"),
            )
                .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(e.to_string()),
            )
                .into_response(),
        };
    }

    tokio::spawn(async move {
        match orchestrator.run(&cancel).await {
            Ok(report) => info!(
                acquired = report.acquired,
                pending = report.pending,
                failed = report.failed,
                "Manual batch finished"
            ),
            Err(e) => warn!(error = %e, "Manual batch failed"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Batch run started".to_string(),
            already_running,
        }),
    )
        .into_response()
}
