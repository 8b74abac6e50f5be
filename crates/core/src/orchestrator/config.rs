//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the batch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the periodic trigger.
    /// When disabled, batches only run when triggered via API.
    #[serde(default)]
    pub enabled: bool,

    /// How often the periodic trigger starts a batch (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Items processed concurrently within one batch. Must be at least 1.
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,

    /// Ranked candidates tried per item before leaving it pending.
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_item: usize,
}

fn default_poll_interval() -> u64 {
    300
}

fn default_max_concurrent_items() -> usize {
    3
}

fn default_max_candidates() -> usize {
    5
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_secs: default_poll_interval(),
            max_concurrent_items: default_max_concurrent_items(),
            max_candidates_per_item: default_max_candidates(),
        }
    }
}
