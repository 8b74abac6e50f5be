//! Mock remote cache for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::remote_cache::{
    RemoteCache, RemoteCacheError, RemoteFile, RemoteTransfer, SubmitRequest, TransferStatus,
    READY_STATUS_CODE,
};

/// Mock implementation of the RemoteCache trait.
///
/// Behavior is keyed by submission key (hash or NZB link):
/// - a key registered with [`set_cached`](Self::set_cached) polls as ready
///   and lists the given files
/// - a key with an explicit [`set_status`](Self::set_status) polls with it
/// - anything else stays queued, i.e. not cached
///
/// Every endpoint is counted, including calls that fail.
///
/// # Example
///
/// ```rust,ignore
/// let remote = MockRemoteCache::new();
/// remote.set_cached("c12f..", fixtures::movie_files("Dune.2021.2160p")).await;
///
/// // ... run the verifier ...
///
/// assert_eq!(remote.submit_count(), 1);
/// assert!(remote.live_transfers().await.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MockRemoteCache {
    cached: RwLock<HashMap<String, Vec<RemoteFile>>>,
    statuses: RwLock<HashMap<String, TransferStatus>>,
    /// Live transfers: transfer ID -> submission key.
    transfers: RwLock<BTreeMap<String, String>>,
    submitted: RwLock<Vec<String>>,
    deleted: RwLock<Vec<String>>,
    submit_error: RwLock<Option<RemoteCacheError>>,
    unlock_error: RwLock<Option<RemoteCacheError>>,
    delete_error: RwLock<Option<RemoteCacheError>>,
    submit_delay: RwLock<Duration>,
    next_id: AtomicU64,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    files_calls: AtomicUsize,
    unlock_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

fn status_code(status: TransferStatus) -> i64 {
    match status {
        TransferStatus::Queued => 0,
        TransferStatus::Downloading => 1,
        TransferStatus::Processing => 2,
        TransferStatus::Ready => READY_STATUS_CODE,
        TransferStatus::Error => 5,
    }
}

fn unknown_transfer(transfer_id: &str) -> RemoteCacheError {
    RemoteCacheError::ApiError {
        code: "MAGNET_INVALID_ID".to_string(),
        message: format!("unknown transfer {}", transfer_id),
    }
}

impl MockRemoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as fully cached with the given listing.
    pub async fn set_cached(&self, key: &str, files: Vec<RemoteFile>) {
        self.cached.write().await.insert(key.to_string(), files);
    }

    /// Force the polled status for `key`.
    pub async fn set_status(&self, key: &str, status: TransferStatus) {
        self.statuses.write().await.insert(key.to_string(), status);
    }

    pub async fn set_submit_error(&self, error: Option<RemoteCacheError>) {
        *self.submit_error.write().await = error;
    }

    pub async fn set_unlock_error(&self, error: Option<RemoteCacheError>) {
        *self.unlock_error.write().await = error;
    }

    pub async fn set_delete_error(&self, error: Option<RemoteCacheError>) {
        *self.delete_error.write().await = error;
    }

    /// Delay every submission, to hold items in flight.
    pub async fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.write().await = delay;
    }

    /// Register a live transfer for `key` without counting a submission.
    pub async fn add_transfer(&self, key: &str) -> String {
        let id = self.allocate_id();
        self.transfers
            .write()
            .await
            .insert(id.clone(), key.to_string());
        id
    }

    /// IDs of transfers not yet deleted.
    pub async fn live_transfers(&self) -> Vec<String> {
        self.transfers.read().await.keys().cloned().collect()
    }

    /// Submission keys, in call order.
    pub async fn submitted(&self) -> Vec<String> {
        self.submitted.read().await.clone()
    }

    /// Successfully deleted transfer IDs, in call order.
    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn files_count(&self) -> usize {
        self.files_calls.load(Ordering::SeqCst)
    }

    pub fn unlock_count(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    /// Delete attempts, failed ones included.
    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    async fn key_of(&self, transfer_id: &str) -> Result<String, RemoteCacheError> {
        self.transfers
            .read()
            .await
            .get(transfer_id)
            .cloned()
            .ok_or_else(|| unknown_transfer(transfer_id))
    }

    async fn status_of(&self, key: &str) -> TransferStatus {
        if let Some(status) = self.statuses.read().await.get(key) {
            return *status;
        }
        if self.cached.read().await.contains_key(key) {
            TransferStatus::Ready
        } else {
            TransferStatus::Queued
        }
    }

    async fn transfer(&self, id: String, key: String) -> RemoteTransfer {
        let status = self.status_of(&key).await;
        RemoteTransfer {
            id,
            name: key,
            status,
            status_code: status_code(status),
            size_bytes: 0,
        }
    }
}

#[async_trait]
impl RemoteCache for MockRemoteCache {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<RemoteTransfer, RemoteCacheError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.write().await.push(request.key().to_string());

        let delay = *self.submit_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.submit_error.read().await.clone() {
            return Err(error);
        }

        let id = self.allocate_id();
        self.transfers
            .write()
            .await
            .insert(id.clone(), request.key().to_string());
        Ok(self.transfer(id, request.key().to_string()).await)
    }

    async fn status(&self, transfer_id: &str) -> Result<RemoteTransfer, RemoteCacheError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let key = self.key_of(transfer_id).await?;
        Ok(self.transfer(transfer_id.to_string(), key).await)
    }

    async fn files(&self, transfer_id: &str) -> Result<Vec<RemoteFile>, RemoteCacheError> {
        self.files_calls.fetch_add(1, Ordering::SeqCst);
        let key = self.key_of(transfer_id).await?;
        self.cached
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| RemoteCacheError::ApiError {
                code: "MAGNET_NOT_READY".to_string(),
                message: format!("transfer {} is not ready", transfer_id),
            })
    }

    async fn unlock(&self, link: &str) -> Result<String, RemoteCacheError> {
        self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.unlock_error.read().await.clone() {
            return Err(error);
        }
        let name = link.rsplit('/').next().unwrap_or(link);
        Ok(format!("https://direct.example/{}", name))
    }

    async fn delete(&self, transfer_id: &str) -> Result<(), RemoteCacheError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.delete_error.read().await.clone() {
            return Err(error);
        }
        if self.transfers.write().await.remove(transfer_id).is_none() {
            return Err(unknown_transfer(transfer_id));
        }
        self.deleted.write().await.push(transfer_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_unknown_key_polls_queued() {
        let remote = MockRemoteCache::new();
        let transfer = remote
            .submit(&SubmitRequest::Hash("abc".into()))
            .await
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Queued);
        assert!(remote.files(&transfer.id).await.is_err());
    }

    #[tokio::test]
    async fn test_cached_key_lists_files() {
        let remote = MockRemoteCache::new();
        remote.set_cached("abc", fixtures::movie_files("Dune")).await;
        let transfer = remote
            .submit(&SubmitRequest::Hash("abc".into()))
            .await
            .unwrap();

        let polled = remote.status(&transfer.id).await.unwrap();
        assert_eq!(polled.status, TransferStatus::Ready);
        assert_eq!(polled.status_code, READY_STATUS_CODE);
        assert_eq!(remote.files(&transfer.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_removes_transfer() {
        let remote = MockRemoteCache::new();
        let id = remote.add_transfer("abc").await;
        assert_eq!(remote.live_transfers().await, vec![id.clone()]);

        remote.delete(&id).await.unwrap();
        assert!(remote.live_transfers().await.is_empty());
        assert_eq!(remote.deleted().await, vec![id.clone()]);
        assert!(remote.delete(&id).await.is_err());
        assert_eq!(remote.delete_count(), 2);
        assert_eq!(remote.submit_count(), 0);
    }
}
