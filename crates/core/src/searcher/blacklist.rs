//! TTL-cached blacklist.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::SearchError;

/// Where blacklist words come from.
#[async_trait]
pub trait BlacklistSource: Send + Sync {
    async fn load(&self) -> Result<Vec<String>, SearchError>;
}

/// Fixed word list, typically from `[search] blacklist`.
pub struct StaticBlacklist(pub Vec<String>);

#[async_trait]
impl BlacklistSource for StaticBlacklist {
    async fn load(&self) -> Result<Vec<String>, SearchError> {
        Ok(self.0.clone())
    }
}

struct Snapshot {
    words: Arc<Vec<String>>,
    loaded_at: Instant,
}

/// Blacklist cache refreshed on a TTL basis.
///
/// Readers share the lock; a refresh takes the write lock and re-checks
/// freshness so concurrent expiries trigger one reload.
pub struct BlacklistCache {
    source: Arc<dyn BlacklistSource>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl BlacklistCache {
    pub fn new(source: Arc<dyn BlacklistSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// A cache over a fixed list that never needs reloading.
    pub fn fixed(words: Vec<String>) -> Self {
        Self::new(Arc::new(StaticBlacklist(words)), Duration::MAX)
    }

    /// Current word list, reloading when stale.
    ///
    /// A failed reload keeps serving the previous list (or an empty one).
    pub async fn words(&self) -> Arc<Vec<String>> {
        {
            let guard = self.snapshot.read().await;
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.loaded_at.elapsed() < self.ttl {
                    return snapshot.words.clone();
                }
            }
        }

        let mut guard = self.snapshot.write().await;
        if let Some(snapshot) = guard.as_ref() {
            if snapshot.loaded_at.elapsed() < self.ttl {
                return snapshot.words.clone();
            }
        }

        match self.source.load().await {
            Ok(words) => {
                debug!(count = words.len(), "Blacklist refreshed");
                let words = Arc::new(words);
                *guard = Some(Snapshot {
                    words: words.clone(),
                    loaded_at: Instant::now(),
                });
                words
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh blacklist, keeping previous list");
                guard
                    .as_ref()
                    .map(|s| s.words.clone())
                    .unwrap_or_default()
            }
        }
    }

    /// Drop the cached list so the next read reloads it.
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }
}
