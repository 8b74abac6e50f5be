use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use fetchlane_core::{BatchOrchestrator, Config, SanitizedConfig, SeasonPackTracker};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<BatchOrchestrator>,
    /// Cancelled on shutdown; shared by the periodic trigger and manual runs.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<BatchOrchestrator>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            orchestrator,
            shutdown,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Arc<BatchOrchestrator> {
        &self.orchestrator
    }

    pub fn tracker(&self) -> &Arc<SeasonPackTracker> {
        self.orchestrator.tracker()
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}
