//! Batch orchestrator for backlog acquisition.
//!
//! One run pulls every item not yet acquired and drives each through:
//! - **Search**: all providers, filtered
//! - **Rank**: torrents first (cache-verifiable), then the best NZB
//! - **Verify**: remote cache state machine, withdrawing on failure
//!
//! Items run on a small bounded pool. An in-memory guard keeps concurrent
//! runs (scheduled and manual) off the same item.

mod config;
mod guard;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use guard::{InFlightGuard, InFlightPermit};
pub use runner::BatchOrchestrator;
pub use types::{ItemOutcome, OrchestratorError, OrchestratorStatus, RunReport};
