//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (batches, per-item outcomes)
//! - Search providers (requests, result counts)
//! - Remote cache (checks, compensations, pack releases)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator
// =============================================================================

/// Items processed by outcome.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fetchlane_items_processed_total", "Backlog items processed"),
        &["outcome"], // "acquired", "pending", "failed", "skipped", "cancelled"
    )
    .unwrap()
});

/// Batch run duration in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fetchlane_batch_duration_seconds",
            "Duration of one orchestrator batch",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &[],
    )
    .unwrap()
});

/// Items currently being processed.
pub static ITEMS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fetchlane_items_in_flight",
        "Backlog items currently held by the idempotency guard",
    )
    .unwrap()
});

// =============================================================================
// Search providers
// =============================================================================

/// Provider requests by provider and status.
pub static PROVIDER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fetchlane_provider_requests_total", "Release provider requests"),
        &["provider", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Results returned per provider request.
pub static PROVIDER_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fetchlane_provider_results",
            "Number of results returned per provider request",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Remote cache
// =============================================================================

/// Cache verification results.
pub static CACHE_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fetchlane_cache_checks_total", "Remote cache verifications"),
        &["result"], // "cached", "not_cached", "pending", "submit_failed", "cancelled", "error"
    )
    .unwrap()
});

/// Compensating withdrawals.
pub static COMPENSATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fetchlane_compensations_total",
            "Remote submissions withdrawn after a failed or uncached verification",
        ),
        &["result"], // "ok", "failed"
    )
    .unwrap()
});

/// Season-pack releases.
pub static PACK_RELEASES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fetchlane_pack_releases_total",
            "Completed season packs released from the remote service",
        ),
        &["result"], // "ok", "failed"
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(ITEMS_PROCESSED.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(ITEMS_IN_FLIGHT.clone()),
        // Providers
        Box::new(PROVIDER_REQUESTS.clone()),
        Box::new(PROVIDER_RESULTS.clone()),
        // Remote cache
        Box::new(CACHE_CHECKS.clone()),
        Box::new(COMPENSATIONS.clone()),
        Box::new(PACK_RELEASES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        ITEMS_PROCESSED.with_label_values(&["acquired"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"fetchlane_items_processed_total".to_string()));
    }
}
