//! Cache verification state machine.
//!
//! ```text
//! Unsubmitted --submit--> Submitted --poll--> Cached --list+unlock--> Linked
//!                                       |--> NotCached   (withdrawn)
//!                                       '--> Downloading (usenet only, kept)
//! ```
//!
//! Any failure or cancellation after `Submitted` runs the [`Compensation`]
//! attached to the state, withdrawing the remote transfer. Compensation
//! failures are logged, never returned.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PlayableFilter, RemoteCache, RemoteCacheError, SubmitRequest, TransferStatus};
use crate::media::MediaItem;
use crate::metrics;

/// Errors that abort verification of one candidate.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Submission failed: {0}")]
    Submit(RemoteCacheError),

    #[error("Status poll failed: {0}")]
    Poll(RemoteCacheError),

    #[error("File listing failed: {0}")]
    Listing(RemoteCacheError),

    #[error("Link unlock failed: {0}")]
    Unlock(RemoteCacheError),

    #[error("No playable file in transfer")]
    NoPlayableFile,

    #[error("Episode {0} not found in pack")]
    EpisodeNotInPack(u32),

    #[error("Cancelled")]
    Cancelled,
}

/// Which file of a ready transfer to link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTarget {
    pub season: u32,
    /// Episode to link; `None` links the largest playable file.
    pub episode: Option<u32>,
    /// Map files to episode numbers before choosing.
    pub season_pack: bool,
}

impl LinkTarget {
    pub fn for_item(item: &MediaItem, season_pack: bool) -> Self {
        if item.is_episode() {
            Self {
                season: item.season,
                episode: Some(item.episode),
                season_pack,
            }
        } else {
            Self {
                season: 0,
                episode: None,
                season_pack: false,
            }
        }
    }
}

/// A file resolved to a direct-access link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedRelease {
    pub transfer_id: String,
    pub file_path: String,
    pub direct_link: String,
    pub size_bytes: u64,
    /// Episodes found in the listing (season packs only).
    pub episodes: BTreeSet<u32>,
}

/// Verifier states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    Unsubmitted(SubmitRequest),
    Submitted { transfer_id: String, usenet: bool },
    Cached { transfer_id: String },
    NotCached { transfer_id: String },
    /// Usenet transfer still being fetched by the service.
    Downloading { transfer_id: String },
    Linked(LinkedRelease),
}

impl CacheState {
    pub fn name(&self) -> &'static str {
        match self {
            CacheState::Unsubmitted(_) => "unsubmitted",
            CacheState::Submitted { .. } => "submitted",
            CacheState::Cached { .. } => "cached",
            CacheState::NotCached { .. } => "not_cached",
            CacheState::Downloading { .. } => "downloading",
            CacheState::Linked(_) => "linked",
        }
    }

    /// Remote transfer owned by this state, if any.
    pub fn transfer_id(&self) -> Option<&str> {
        match self {
            CacheState::Unsubmitted(_) => None,
            CacheState::Submitted { transfer_id, .. }
            | CacheState::Cached { transfer_id }
            | CacheState::NotCached { transfer_id }
            | CacheState::Downloading { transfer_id } => Some(transfer_id),
            CacheState::Linked(linked) => Some(&linked.transfer_id),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CacheState::NotCached { .. } | CacheState::Downloading { .. } | CacheState::Linked(_)
        )
    }

    /// Compensating action for a failure in this state.
    fn compensation(&self) -> Option<Compensation> {
        self.transfer_id().map(|id| Compensation {
            transfer_id: id.to_string(),
        })
    }
}

/// Result of verifying one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Linked(LinkedRelease),
    /// Not cached; the submission was withdrawn.
    NotCached,
    /// Usenet transfer accepted and still in progress.
    Pending { transfer_id: String },
}

/// Withdraws a remote transfer after a failed or negative verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compensation {
    pub transfer_id: String,
}

impl Compensation {
    pub async fn run(self, remote: &dyn RemoteCache) {
        match remote.delete(&self.transfer_id).await {
            Ok(()) => {
                metrics::COMPENSATIONS.with_label_values(&["ok"]).inc();
                debug!(transfer_id = %self.transfer_id, "Withdrew remote transfer");
            }
            Err(e) => {
                metrics::COMPENSATIONS.with_label_values(&["failed"]).inc();
                warn!(transfer_id = %self.transfer_id, error = %e, "Failed to withdraw remote transfer");
            }
        }
    }
}

/// Drives candidates through the cache state machine.
pub struct CacheVerifier {
    remote: Arc<dyn RemoteCache>,
    settle_delay: Duration,
    playable: PlayableFilter,
}

impl CacheVerifier {
    pub fn new(remote: Arc<dyn RemoteCache>, settle_delay: Duration, playable: PlayableFilter) -> Self {
        Self {
            remote,
            settle_delay,
            playable,
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteCache> {
        &self.remote
    }

    /// Submit a candidate and follow it to a terminal state.
    pub async fn verify(
        &self,
        request: SubmitRequest,
        target: &LinkTarget,
        cancel: &CancellationToken,
    ) -> Result<VerifyOutcome, VerifyError> {
        self.drive(CacheState::Unsubmitted(request), target, cancel).await
    }

    /// Re-poll a transfer submitted by an earlier pass.
    pub async fn resume(
        &self,
        transfer_id: &str,
        usenet: bool,
        target: &LinkTarget,
        cancel: &CancellationToken,
    ) -> Result<VerifyOutcome, VerifyError> {
        let state = CacheState::Submitted {
            transfer_id: transfer_id.to_string(),
            usenet,
        };
        self.drive(state, target, cancel).await
    }

    /// Link a file out of a transfer that is already known to be ready.
    ///
    /// The transfer is shared, so nothing is withdrawn on failure.
    pub async fn link_existing(
        &self,
        transfer_id: &str,
        target: &LinkTarget,
        cancel: &CancellationToken,
    ) -> Result<LinkedRelease, VerifyError> {
        if cancel.is_cancelled() {
            return Err(VerifyError::Cancelled);
        }
        self.link(transfer_id, target, cancel).await
    }

    async fn drive(
        &self,
        initial: CacheState,
        target: &LinkTarget,
        cancel: &CancellationToken,
    ) -> Result<VerifyOutcome, VerifyError> {
        let mut state = initial;

        loop {
            if cancel.is_cancelled() {
                if let Some(compensation) = state.compensation() {
                    compensation.run(self.remote.as_ref()).await;
                }
                return Err(VerifyError::Cancelled);
            }

            let next = match self.step(&state, target, cancel).await {
                Ok(next) => next,
                Err(e) => {
                    let label = match e {
                        VerifyError::Submit(_) => "submit_failed",
                        VerifyError::Cancelled => "cancelled",
                        _ => "error",
                    };
                    metrics::CACHE_CHECKS.with_label_values(&[label]).inc();
                    if let Some(compensation) = state.compensation() {
                        compensation.run(self.remote.as_ref()).await;
                    }
                    return Err(e);
                }
            };

            debug!(from = state.name(), to = next.name(), "Cache state transition");

            match next {
                CacheState::NotCached { transfer_id } => {
                    metrics::CACHE_CHECKS.with_label_values(&["not_cached"]).inc();
                    Compensation { transfer_id }.run(self.remote.as_ref()).await;
                    return Ok(VerifyOutcome::NotCached);
                }
                CacheState::Downloading { transfer_id } => {
                    metrics::CACHE_CHECKS.with_label_values(&["pending"]).inc();
                    return Ok(VerifyOutcome::Pending { transfer_id });
                }
                CacheState::Linked(linked) => {
                    info!(
                        transfer_id = %linked.transfer_id,
                        file = %linked.file_path,
                        "Linked cached release"
                    );
                    return Ok(VerifyOutcome::Linked(linked));
                }
                CacheState::Cached { .. } => {
                    metrics::CACHE_CHECKS.with_label_values(&["cached"]).inc();
                    state = next;
                }
                other => state = other,
            }
        }
    }

    /// One transition out of a non-terminal state.
    pub async fn step(
        &self,
        state: &CacheState,
        target: &LinkTarget,
        cancel: &CancellationToken,
    ) -> Result<CacheState, VerifyError> {
        match state {
            CacheState::Unsubmitted(request) => {
                let transfer = self
                    .remote
                    .submit(request)
                    .await
                    .map_err(VerifyError::Submit)?;
                debug!(transfer_id = %transfer.id, key = request.key(), "Submitted to remote cache");

                if !self.settle_delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(self.settle_delay) => {}
                        _ = cancel.cancelled() => {}
                    }
                }

                Ok(CacheState::Submitted {
                    transfer_id: transfer.id,
                    usenet: request.is_usenet(),
                })
            }
            CacheState::Submitted {
                transfer_id,
                usenet,
            } => {
                let transfer = self
                    .remote
                    .status(transfer_id)
                    .await
                    .map_err(VerifyError::Poll)?;
                let transfer_id = transfer_id.clone();
                Ok(match transfer.status {
                    TransferStatus::Ready => CacheState::Cached { transfer_id },
                    status if *usenet && status.is_in_progress() => {
                        CacheState::Downloading { transfer_id }
                    }
                    _ => {
                        debug!(
                            transfer_id = %transfer_id,
                            status = transfer.status.as_str(),
                            status_code = transfer.status_code,
                            "Transfer not cached"
                        );
                        CacheState::NotCached { transfer_id }
                    }
                })
            }
            CacheState::Cached { transfer_id } => {
                let linked = self.link(transfer_id, target, cancel).await?;
                Ok(CacheState::Linked(linked))
            }
            terminal => Ok(terminal.clone()),
        }
    }

    /// List a ready transfer, choose the file for `target` and unlock it.
    async fn link(
        &self,
        transfer_id: &str,
        target: &LinkTarget,
        cancel: &CancellationToken,
    ) -> Result<LinkedRelease, VerifyError> {
        let files = self
            .remote
            .files(transfer_id)
            .await
            .map_err(VerifyError::Listing)?;

        let (file, episodes) = if target.season_pack {
            let mapped = self.playable.map_episodes(&files, target.season);
            let episodes: BTreeSet<u32> = mapped.keys().copied().collect();
            let file = match target.episode {
                Some(episode) => mapped
                    .get(&episode)
                    .copied()
                    .ok_or(VerifyError::EpisodeNotInPack(episode))?,
                None => self
                    .playable
                    .largest(&files)
                    .ok_or(VerifyError::NoPlayableFile)?,
            };
            (file, episodes)
        } else {
            let file = self
                .playable
                .largest(&files)
                .ok_or(VerifyError::NoPlayableFile)?;
            (file, BTreeSet::new())
        };

        if cancel.is_cancelled() {
            return Err(VerifyError::Cancelled);
        }

        let direct_link = self
            .remote
            .unlock(&file.link)
            .await
            .map_err(VerifyError::Unlock)?;

        Ok(LinkedRelease {
            transfer_id: transfer_id.to_string(),
            file_path: file.path.clone(),
            direct_link,
            size_bytes: file.size_bytes,
            episodes,
        })
    }
}
