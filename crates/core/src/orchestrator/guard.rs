//! Per-item idempotency guard shared by every run of one orchestrator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::metrics;

/// Set of item IDs currently being processed.
///
/// A scheduled run and a manual run share one guard, so an item is never
/// submitted to the remote cache by two runs at once.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked.
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `id`. Returns `None` when another run already holds it.
    pub fn try_acquire(&self, id: &str) -> Option<InFlightPermit> {
        let mut ids = self.lock();
        if !ids.insert(id.to_string()) {
            return None;
        }
        metrics::ITEMS_IN_FLIGHT.set(ids.len() as i64);
        Some(InFlightPermit {
            guard: self.clone(),
            id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Releases the claimed item when dropped.
#[derive(Debug)]
pub struct InFlightPermit {
    guard: InFlightGuard,
    id: String,
}

impl InFlightPermit {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        let mut ids = self.guard.lock();
        ids.remove(&self.id);
        metrics::ITEMS_IN_FLIGHT.set(ids.len() as i64);
    }
}
