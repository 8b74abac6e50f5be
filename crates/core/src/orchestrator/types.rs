//! Types for the batch orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote_cache::VerifyError;
use crate::store::StoreError;

/// Errors that can occur during orchestration.
///
/// Only `Backlog` and `Cancelled` ever escape a batch run; the other
/// variants are per-item and end up in the item's log line.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The backlog could not be read at all.
    #[error("backlog read failed: {0}")]
    Backlog(StoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("run cancelled")]
    Cancelled,
}

/// What happened to one item during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// A direct link was resolved and persisted.
    Acquired,
    /// No candidate acquired this pass; retried next pass.
    Pending,
    /// The item's pipeline failed; it stays pending.
    Failed,
    /// Another run is processing it, or it was already acquired.
    Skipped,
    Cancelled,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Acquired => "acquired",
            ItemOutcome::Pending => "pending",
            ItemOutcome::Failed => "failed",
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::Cancelled => "cancelled",
        }
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Items pulled from the backlog.
    pub total: usize,
    pub acquired: usize,
    pub pending: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    /// Season packs released at the end of the run.
    pub packs_released: usize,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, total: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            total,
            acquired: 0,
            pending: 0,
            failed: 0,
            skipped: 0,
            cancelled: 0,
            packs_released: 0,
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Acquired => self.acquired += 1,
            ItemOutcome::Pending => self.pending += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Items that went through the pipeline (everything but skips and cancellations).
    pub fn processed(&self) -> usize {
        self.acquired + self.pending + self.failed
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether a batch run is in progress.
    pub running: bool,
    /// Items currently held by the in-flight guard.
    pub in_flight: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<RunReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = RunReport::new(Utc::now(), 5);
        report.record(ItemOutcome::Acquired);
        report.record(ItemOutcome::Pending);
        report.record(ItemOutcome::Pending);
        report.record(ItemOutcome::Skipped);
        report.record(ItemOutcome::Cancelled);

        assert_eq!(report.acquired, 1);
        assert_eq!(report.pending, 2);
        assert_eq!(report.processed(), 3);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&ItemOutcome::Acquired).unwrap();
        assert_eq!(json, "\"acquired\"");
        assert_eq!(ItemOutcome::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn test_orchestrator_status_default() {
        let status = OrchestratorStatus::default();
        assert!(!status.running);
        assert_eq!(status.in_flight, 0);
        assert!(status.last_report.is_none());
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::Backlog(StoreError::Database("locked".to_string()));
        assert_eq!(err.to_string(), "backlog read failed: database error: locked");
        assert_eq!(OrchestratorError::Cancelled.to_string(), "run cancelled");
    }
}
