//! Batch orchestrator implementation.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::guard::InFlightGuard;
use super::types::{ItemOutcome, OrchestratorError, OrchestratorStatus, RunReport};
use super::OrchestratorConfig;
use crate::media::{AcquisitionRecord, MediaItem, Protocol};
use crate::metrics;
use crate::ranking::{dedup_by_hash, RankedCandidates};
use crate::remote_cache::{
    CacheVerifier, Compensation, LinkTarget, LinkedRelease, SubmitRequest, VerifyError,
    VerifyOutcome,
};
use crate::searcher::{HashResolver, ReleaseCandidate, SearchAggregator};
use crate::season_pack::SeasonPackTracker;
use crate::store::BacklogStore;

/// What earlier passes left behind for one item.
struct PriorAttempts {
    /// Hash of the live season pack this episode would belong to.
    live_pack_hash: Option<String>,
    /// Release keys that already failed verification for this item.
    failed: HashSet<String>,
}

impl PriorAttempts {
    fn is_live_pack(&self, candidate: &ReleaseCandidate) -> bool {
        candidate.has_hash() && self.live_pack_hash.as_deref() == Some(candidate.info_hash.as_str())
    }

    fn has_failed(&self, candidate: &ReleaseCandidate) -> bool {
        self.failed.contains(candidate.release_key())
    }
}

/// State shared by the items of one run.
#[derive(Default)]
struct RunContext {
    /// Hashes and NZB links already found not cached during this run.
    not_cached: RwLock<HashSet<String>>,
}

impl RunContext {
    async fn is_not_cached(&self, key: &str) -> bool {
        self.not_cached.read().await.contains(key)
    }

    async fn mark_not_cached(&self, key: &str) {
        self.not_cached.write().await.insert(key.to_string());
    }
}

/// Drives the not-yet-acquired backlog through search, ranking and cache
/// verification with bounded concurrency.
///
/// Every run of one orchestrator shares the same [`InFlightGuard`], so a
/// scheduled run and a manual run never process the same item at once.
pub struct BatchOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn BacklogStore>,
    searcher: Arc<SearchAggregator>,
    resolver: Arc<HashResolver>,
    verifier: Arc<CacheVerifier>,
    tracker: Arc<SeasonPackTracker>,
    guard: InFlightGuard,
    active_runs: AtomicUsize,
    last_report: RwLock<Option<RunReport>>,
}

impl BatchOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn BacklogStore>,
        searcher: Arc<SearchAggregator>,
        resolver: Arc<HashResolver>,
        verifier: Arc<CacheVerifier>,
        tracker: Arc<SeasonPackTracker>,
    ) -> Self {
        Self {
            config,
            store,
            searcher,
            resolver,
            verifier,
            tracker,
            guard: InFlightGuard::new(),
            active_runs: AtomicUsize::new(0),
            last_report: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<SeasonPackTracker> {
        &self.tracker
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            running: self.active_runs.load(Ordering::SeqCst) > 0,
            in_flight: self.guard.len(),
            last_report: self.last_report.read().await.clone(),
        }
    }

    /// Process every item not yet acquired.
    ///
    /// Only a backlog read failure or cancellation is returned as an error;
    /// per-item failures are logged and counted in the report.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, OrchestratorError> {
        self.active_runs.fetch_add(1, Ordering::SeqCst);
        let result = self.run_batch(cancel).await;
        self.active_runs.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn run_batch(&self, cancel: &CancellationToken) -> Result<RunReport, OrchestratorError> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let timer = metrics::BATCH_DURATION.with_label_values(&[]).start_timer();
        let started_at = Utc::now();
        let items = self
            .store
            .list_items_not_acquired()
            .map_err(OrchestratorError::Backlog)?;

        info!(
            items = items.len(),
            concurrency = self.config.max_concurrent_items,
            "Starting batch run"
        );

        let ctx = RunContext::default();
        let mut report = RunReport::new(started_at, items.len());

        let outcomes: Vec<ItemOutcome> = stream::iter(items)
            .map(|item| self.process_item(item, &ctx, cancel))
            .buffered(self.config.max_concurrent_items.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            metrics::ITEMS_PROCESSED
                .with_label_values(&[outcome.as_str()])
                .inc();
            report.record(outcome);
        }

        if !cancel.is_cancelled() {
            report.packs_released = self.tracker.release_completed().await;
        }

        report.finished_at = Utc::now();
        timer.observe_duration();
        *self.last_report.write().await = Some(report.clone());

        if cancel.is_cancelled() {
            warn!(
                acquired = report.acquired,
                cancelled = report.cancelled,
                "Batch run cancelled"
            );
            return Err(OrchestratorError::Cancelled);
        }

        info!(
            total = report.total,
            acquired = report.acquired,
            pending = report.pending,
            failed = report.failed,
            skipped = report.skipped,
            packs_released = report.packs_released,
            duration_secs = report.duration_secs(),
            "Batch run complete"
        );
        Ok(report)
    }

    /// Run one item through the pipeline. Never fails the batch.
    async fn process_item(
        &self,
        item: MediaItem,
        ctx: &RunContext,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        if cancel.is_cancelled() {
            return ItemOutcome::Cancelled;
        }

        let Some(_permit) = self.guard.try_acquire(&item.id) else {
            debug!(item_id = %item.id, "Item already being processed, skipping");
            return ItemOutcome::Skipped;
        };

        match self.acquire(&item.id, ctx, cancel).await {
            Ok(outcome) => {
                debug!(item_id = %item.id, outcome = outcome.as_str(), "Item processed");
                outcome
            }
            Err(OrchestratorError::Cancelled) | Err(OrchestratorError::Verify(VerifyError::Cancelled)) => {
                debug!(item_id = %item.id, "Item processing cancelled");
                ItemOutcome::Cancelled
            }
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Item pipeline failed, leaving it pending");
                ItemOutcome::Failed
            }
        }
    }

    async fn acquire(
        &self,
        item_id: &str,
        ctx: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<ItemOutcome, OrchestratorError> {
        // Reload under the guard: a previous run may have finished this item.
        let mut item = self.store.get_item(item_id)?;
        if item.acquired {
            return Ok(ItemOutcome::Skipped);
        }
        if let Err(e) = item.validate() {
            warn!(item_id = %item.id, error = %e, "Invalid backlog item");
            return Ok(ItemOutcome::Failed);
        }

        if let Some(outcome) = self.resume_usenet(&mut item, cancel).await? {
            return Ok(outcome);
        }

        let known_pack = match item.pack_id() {
            Some(pack_id) => self.store.find_season_pack(&pack_id)?,
            None => None,
        };
        if let Some(pack) = &known_pack {
            if let Some(outcome) = self.reuse_season_pack(&mut item, pack, cancel).await? {
                return Ok(outcome);
            }
        }
        // The live pack was just checked for this episode; submitting its
        // hash again would withdraw a transfer other items still use.
        let prior = PriorAttempts {
            live_pack_hash: known_pack
                .map(|pack| pack.info_hash)
                .filter(|hash| !hash.is_empty()),
            failed: self
                .store
                .list_acquisitions_for(&item.id)?
                .iter()
                .filter(|r| r.failed)
                .map(|r| r.release_key().to_string())
                .collect(),
        };

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let candidates = self.searcher.search(&item).await;
        if candidates.is_empty() {
            info!(item_id = %item.id, item = %item.label(), "No candidates found");
            return Ok(ItemOutcome::Pending);
        }

        let (torrents, nzbs): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|c| c.protocol == Protocol::Torrent);

        if !torrents.is_empty() {
            if let Some(outcome) = self
                .try_torrents(&mut item, torrents, &prior, ctx, cancel)
                .await?
            {
                return Ok(outcome);
            }
        }
        if !nzbs.is_empty() {
            if let Some(outcome) = self.try_usenet(&mut item, nzbs, &prior, ctx, cancel).await? {
                return Ok(outcome);
            }
        }

        info!(item_id = %item.id, item = %item.label(), "No cached candidate, leaving pending");
        Ok(ItemOutcome::Pending)
    }

    /// Cache-verify torrent candidates in rank order until one links.
    async fn try_torrents(
        &self,
        item: &mut MediaItem,
        candidates: Vec<ReleaseCandidate>,
        prior: &PriorAttempts,
        ctx: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<Option<ItemOutcome>, OrchestratorError> {
        let ranked: Vec<_> = RankedCandidates::torrents(candidates)
            .take(self.config.max_candidates_per_item)
            .collect();
        let resolved = dedup_by_hash(self.resolver.resolve_all(ranked).await);

        for candidate in resolved {
            if !candidate.has_hash() {
                debug!(item_id = %item.id, title = %candidate.title, "No info hash, skipping candidate");
                continue;
            }
            if prior.is_live_pack(&candidate) {
                debug!(item_id = %item.id, hash = %candidate.info_hash, "Candidate is the live season pack, skipping");
                continue;
            }
            if prior.has_failed(&candidate) {
                debug!(item_id = %item.id, hash = %candidate.info_hash, "Candidate failed on an earlier pass, skipping");
                continue;
            }
            if ctx.is_not_cached(&candidate.info_hash).await {
                debug!(item_id = %item.id, hash = %candidate.info_hash, "Already known not cached");
                continue;
            }
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }

            let request = SubmitRequest::Hash(candidate.info_hash.clone());
            let target = LinkTarget::for_item(item, candidate.season_pack);
            match self.verifier.verify(request, &target, cancel).await {
                Ok(VerifyOutcome::Linked(linked)) => {
                    self.persist_linked(item, &candidate, &linked, target.season_pack)
                        .await?;
                    return Ok(Some(ItemOutcome::Acquired));
                }
                Ok(VerifyOutcome::NotCached) => {
                    debug!(item_id = %item.id, hash = %candidate.info_hash, "Candidate not cached");
                    ctx.mark_not_cached(&candidate.info_hash).await;
                }
                Ok(VerifyOutcome::Pending { transfer_id }) => {
                    self.persist_pending(item, &candidate, &transfer_id)?;
                    return Ok(Some(ItemOutcome::Pending));
                }
                Err(e) => self.record_failure(item, &candidate, e)?,
            }
        }
        Ok(None)
    }

    /// Hand the preferred NZB to the service. Usenet transfers are fetched
    /// in the background, so an in-progress transfer leaves the item pending
    /// with its record kept for the next pass.
    async fn try_usenet(
        &self,
        item: &mut MediaItem,
        candidates: Vec<ReleaseCandidate>,
        prior: &PriorAttempts,
        ctx: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<Option<ItemOutcome>, OrchestratorError> {
        for candidate in RankedCandidates::usenet(candidates) {
            let Some(link) = candidate.download_url.clone() else {
                debug!(item_id = %item.id, title = %candidate.title, "NZB without link, skipping");
                continue;
            };
            if ctx.is_not_cached(&link).await {
                continue;
            }
            if prior.has_failed(&candidate) {
                debug!(item_id = %item.id, title = %candidate.title, "NZB failed on an earlier pass, skipping");
                continue;
            }
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }

            let target = LinkTarget::for_item(item, candidate.season_pack);
            match self
                .verifier
                .verify(SubmitRequest::NzbLink(link.clone()), &target, cancel)
                .await
            {
                Ok(VerifyOutcome::Linked(linked)) => {
                    self.persist_linked(item, &candidate, &linked, target.season_pack)
                        .await?;
                    return Ok(Some(ItemOutcome::Acquired));
                }
                Ok(VerifyOutcome::Pending { transfer_id }) => {
                    info!(item_id = %item.id, transfer_id = %transfer_id, "Usenet transfer in progress");
                    self.persist_pending(item, &candidate, &transfer_id)?;
                    return Ok(Some(ItemOutcome::Pending));
                }
                Ok(VerifyOutcome::NotCached) => ctx.mark_not_cached(&link).await,
                Err(e) => self.record_failure(item, &candidate, e)?,
            }
        }
        Ok(None)
    }

    /// Re-poll a Usenet transfer left in progress by an earlier pass.
    async fn resume_usenet(
        &self,
        item: &mut MediaItem,
        cancel: &CancellationToken,
    ) -> Result<Option<ItemOutcome>, OrchestratorError> {
        let records = self.store.list_acquisitions_for(&item.id)?;
        let Some(mut record) = records
            .into_iter()
            .find(|r| r.is_live() && r.protocol == Protocol::Usenet)
        else {
            return Ok(None);
        };
        let Some(transfer_id) = record.remote_id.clone() else {
            return Ok(None);
        };

        let target = LinkTarget::for_item(item, record.season_pack);
        match self.verifier.resume(&transfer_id, true, &target, cancel).await {
            Ok(VerifyOutcome::Linked(linked)) => {
                if record.season_pack {
                    record.mark_pack(linked.episodes.iter().copied());
                }
                record.mark_submitted(&linked.transfer_id);
                self.store.save_acquisition(&record)?;
                item.mark_acquired(&linked.direct_link, record.season_pack);
                self.store.save_item(item)?;
                info!(item_id = %item.id, transfer_id = %transfer_id, "Usenet transfer ready, item acquired");
                Ok(Some(ItemOutcome::Acquired))
            }
            Ok(VerifyOutcome::Pending { .. }) => {
                debug!(item_id = %item.id, transfer_id = %transfer_id, "Usenet transfer still in progress");
                Ok(Some(ItemOutcome::Pending))
            }
            Ok(VerifyOutcome::NotCached) => {
                warn!(item_id = %item.id, transfer_id = %transfer_id, "Usenet transfer failed upstream, searching again");
                record.mark_failed();
                self.store.save_acquisition(&record)?;
                Ok(None)
            }
            Err(VerifyError::Cancelled) => Err(OrchestratorError::Cancelled),
            Err(e) => {
                warn!(item_id = %item.id, transfer_id = %transfer_id, error = %e, "Usenet resume failed, searching again");
                record.mark_failed();
                self.store.save_acquisition(&record)?;
                Ok(None)
            }
        }
    }

    /// Link the episode out of a season pack another item already acquired.
    /// No search and no new submission.
    async fn reuse_season_pack(
        &self,
        item: &mut MediaItem,
        pack: &AcquisitionRecord,
        cancel: &CancellationToken,
    ) -> Result<Option<ItemOutcome>, OrchestratorError> {
        let Some(pack_id) = pack.pack_id() else {
            return Ok(None);
        };
        if !pack.episodes.contains(&item.episode) {
            debug!(item_id = %item.id, pack = %pack_id, "Episode not in known pack");
            return Ok(None);
        }
        let Some(transfer_id) = pack.remote_id.clone() else {
            return Ok(None);
        };

        let target = LinkTarget::for_item(item, true);
        let linked = match self.verifier.link_existing(&transfer_id, &target, cancel).await {
            Ok(linked) => linked,
            Err(VerifyError::Cancelled) => return Err(OrchestratorError::Cancelled),
            Err(e) => {
                warn!(item_id = %item.id, pack = %pack_id, error = %e, "Season pack reuse failed, falling back to search");
                return Ok(None);
            }
        };

        let mut record = AcquisitionRecord::new(item, &pack.release_title, pack.size_bytes, pack.protocol)
            .with_hash(&pack.info_hash);
        record.mark_submitted(&transfer_id);
        record.mark_pack(pack.episodes.iter().copied());
        record.mark_pack(linked.episodes.iter().copied());

        self.store.delete_acquisitions_for(&item.id)?;
        self.store.save_acquisition(&record)?;
        item.mark_acquired(&linked.direct_link, true);
        self.store.save_item(item)?;

        info!(
            item_id = %item.id,
            pack = %pack_id,
            file = %linked.file_path,
            "Episode linked from existing season pack"
        );
        Ok(Some(ItemOutcome::Acquired))
    }

    /// Persist a linked release and mark the item acquired.
    ///
    /// A store failure withdraws a fresh non-pack transfer, since nothing
    /// would reference it afterwards.
    async fn persist_linked(
        &self,
        item: &mut MediaItem,
        candidate: &ReleaseCandidate,
        linked: &LinkedRelease,
        season_pack: bool,
    ) -> Result<(), OrchestratorError> {
        let mut record = AcquisitionRecord::new(
            item,
            &candidate.title,
            candidate.size_bytes,
            candidate.protocol,
        )
        .with_hash(&candidate.info_hash);
        record.mark_submitted(&linked.transfer_id);
        if season_pack {
            record.mark_pack(linked.episodes.iter().copied());
        }

        let persisted = self
            .store
            .delete_acquisitions_for(&item.id)
            .and_then(|_| self.store.save_acquisition(&record))
            .and_then(|_| {
                item.mark_acquired(&linked.direct_link, season_pack);
                self.store.save_item(item)
            });

        if let Err(e) = persisted {
            if !season_pack {
                Compensation {
                    transfer_id: linked.transfer_id.clone(),
                }
                .run(self.verifier.remote().as_ref())
                .await;
            }
            return Err(e.into());
        }

        info!(
            item_id = %item.id,
            item = %item.label(),
            release = %candidate.title,
            transfer_id = %linked.transfer_id,
            season_pack,
            "Item acquired"
        );
        Ok(())
    }

    fn persist_pending(
        &self,
        item: &MediaItem,
        candidate: &ReleaseCandidate,
        transfer_id: &str,
    ) -> Result<(), OrchestratorError> {
        let mut record = AcquisitionRecord::new(
            item,
            &candidate.title,
            candidate.size_bytes,
            candidate.protocol,
        )
        .with_hash(&candidate.info_hash);
        record.mark_submitted(transfer_id);
        if candidate.season_pack {
            record.mark_pack(std::iter::empty());
        }

        // Failed records stay so later passes keep skipping those releases.
        let failed: Vec<_> = self
            .store
            .list_acquisitions_for(&item.id)?
            .into_iter()
            .filter(|r| r.failed)
            .collect();
        self.store.delete_acquisitions_for(&item.id)?;
        for earlier in &failed {
            self.store.save_acquisition(earlier)?;
        }
        self.store.save_acquisition(&record)?;
        Ok(())
    }

    /// Log a failed candidate and persist a failed record when the failure
    /// happened after submission, one per item and release. Cancellation is
    /// propagated.
    fn record_failure(
        &self,
        item: &MediaItem,
        candidate: &ReleaseCandidate,
        error: VerifyError,
    ) -> Result<(), OrchestratorError> {
        match error {
            VerifyError::Cancelled => Err(OrchestratorError::Cancelled),
            VerifyError::Submit(e) => {
                warn!(item_id = %item.id, title = %candidate.title, error = %e, "Submission failed, trying next candidate");
                Ok(())
            }
            other => {
                warn!(item_id = %item.id, title = %candidate.title, error = %other, "Verification failed, trying next candidate");
                let existing = self
                    .store
                    .list_acquisitions_for(&item.id)?
                    .into_iter()
                    .find(|r| r.release_key() == candidate.release_key());
                let mut record = existing.unwrap_or_else(|| {
                    AcquisitionRecord::new(
                        item,
                        &candidate.title,
                        candidate.size_bytes,
                        candidate.protocol,
                    )
                    .with_hash(&candidate.info_hash)
                });
                record.mark_failed();
                self.store.save_acquisition(&record)?;
                Ok(())
            }
        }
    }

    /// Drop an item's acquisition records, withdrawing each transfer no
    /// other record references. Returns the number of withdrawn transfers.
    pub async fn cleanup_item(&self, item_id: &str) -> Result<usize, OrchestratorError> {
        let records = self.store.list_acquisitions_for(item_id)?;
        let shared: HashSet<String> = self
            .store
            .list_season_packs()?
            .into_iter()
            .filter(|r| r.media_id != item_id)
            .filter_map(|r| r.remote_id)
            .collect();

        let transfers: HashSet<String> = records
            .iter()
            .filter(|r| r.is_live())
            .filter_map(|r| r.remote_id.clone())
            .filter(|id| !shared.contains(id))
            .collect();

        for transfer_id in &transfers {
            Compensation {
                transfer_id: transfer_id.clone(),
            }
            .run(self.verifier.remote().as_ref())
            .await;
        }
        self.store.delete_acquisitions_for(item_id)?;

        info!(item_id = %item_id, withdrawn = transfers.len(), "Cleaned up item acquisitions");
        Ok(transfers.len())
    }

    /// Spawn the periodic trigger. It runs a batch, sleeps for the poll
    /// interval, and stops when `cancel` fires.
    pub fn spawn_periodic(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Periodic trigger started");
            loop {
                match self.run(&cancel).await {
                    Ok(_) => {}
                    Err(OrchestratorError::Cancelled) => break,
                    Err(e) => error!(error = %e, "Batch run failed"),
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Periodic trigger stopped");
        })
    }
}
