use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::SeasonPackStatus;
use crate::media::{AcquisitionRecord, PackId};
use crate::metrics;
use crate::remote_cache::RemoteCache;
use crate::store::{BacklogStore, StoreError};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no live season pack for {0}")]
    PackNotFound(PackId),
}

/// Tracks per-episode consumption of season packs and releases finished
/// packs from the remote service.
pub struct SeasonPackTracker {
    store: Arc<dyn BacklogStore>,
    remote: Arc<dyn RemoteCache>,
    /// Last computed status per pack. Derived data only.
    statuses: RwLock<HashMap<PackId, SeasonPackStatus>>,
}

impl SeasonPackTracker {
    pub fn new(store: Arc<dyn BacklogStore>, remote: Arc<dyn RemoteCache>) -> Self {
        Self {
            store,
            remote,
            statuses: RwLock::new(HashMap::new()),
        }
    }

    fn pack_records(&self, pack_id: &PackId) -> Result<Vec<AcquisitionRecord>, TrackerError> {
        let records: Vec<_> = self
            .store
            .list_season_packs()?
            .into_iter()
            .filter(|r| r.pack_id().as_ref() == Some(pack_id))
            .collect();
        if records.is_empty() {
            return Err(TrackerError::PackNotFound(pack_id.clone()));
        }
        Ok(records)
    }

    async fn recompute(
        &self,
        pack_id: &PackId,
        records: &[AcquisitionRecord],
    ) -> Result<SeasonPackStatus, TrackerError> {
        let season_items = self.store.list_season_items(pack_id)?;
        let status = SeasonPackStatus::compute(pack_id.clone(), records, &season_items);
        self.statuses
            .write()
            .await
            .insert(pack_id.clone(), status.clone());
        Ok(status)
    }

    /// Record that `episode` of the pack was consumed and return the new status.
    pub async fn record_consumption(
        &self,
        pack_id: &PackId,
        episode: u32,
    ) -> Result<SeasonPackStatus, TrackerError> {
        let mut records = self.pack_records(pack_id)?;
        for record in &mut records {
            if record.mark_consumed(episode) {
                self.store.save_acquisition(record)?;
            }
        }

        let status = self.recompute(pack_id, &records).await?;
        debug!(
            pack = %pack_id,
            episode,
            consumed = status.consumed.len(),
            total = status.total_episodes,
            complete = status.complete,
            "Recorded pack consumption"
        );
        Ok(status)
    }

    /// Current status, recomputed from the store.
    pub async fn status(&self, pack_id: &PackId) -> Result<SeasonPackStatus, TrackerError> {
        let records = self.pack_records(pack_id)?;
        self.recompute(pack_id, &records).await
    }

    /// Last status computed for a pack, without touching the store.
    pub async fn cached_status(&self, pack_id: &PackId) -> Option<SeasonPackStatus> {
        self.statuses.read().await.get(pack_id).cloned()
    }

    pub async fn is_complete(&self, pack_id: &PackId) -> Result<bool, TrackerError> {
        Ok(self.status(pack_id).await?.complete)
    }

    /// Release the pack's remote transfer if the pack is complete.
    ///
    /// Returns whether it was released. A failed delete leaves the records
    /// untouched so the next pass retries.
    pub async fn release_if_complete(&self, pack_id: &PackId) -> Result<bool, TrackerError> {
        let mut records = self.pack_records(pack_id)?;
        let status = self.recompute(pack_id, &records).await?;
        if !status.complete {
            return Ok(false);
        }

        let transfer_ids: BTreeSet<String> =
            records.iter().filter_map(|r| r.remote_id.clone()).collect();
        for transfer_id in &transfer_ids {
            if let Err(e) = self.remote.delete(transfer_id).await {
                metrics::PACK_RELEASES.with_label_values(&["failed"]).inc();
                warn!(
                    pack = %pack_id,
                    transfer_id = %transfer_id,
                    error = %e,
                    "Failed to release season pack, will retry next pass"
                );
                return Ok(false);
            }
        }

        for record in &mut records {
            record.mark_released();
            self.store.save_acquisition(record)?;
        }
        self.statuses.write().await.remove(pack_id);

        metrics::PACK_RELEASES.with_label_values(&["ok"]).inc();
        info!(pack = %pack_id, transfers = transfer_ids.len(), "Released completed season pack");
        Ok(true)
    }

    /// Release every complete pack. Errors are logged per pack.
    pub async fn release_completed(&self) -> usize {
        let packs: BTreeSet<PackId> = match self.store.list_season_packs() {
            Ok(records) => records.iter().filter_map(|r| r.pack_id()).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list season packs");
                return 0;
            }
        };

        let mut released = 0;
        for pack_id in packs {
            match self.release_if_complete(&pack_id).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => warn!(pack = %pack_id, error = %e, "Season pack release check failed"),
            }
        }
        released
    }
}
