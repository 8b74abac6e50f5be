//! Normalized types for the remote fetching service.
//!
//! Provider adapters decode their own response shapes and hand back these
//! values, so the verifier never sees provider JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the remote fetching service.
#[derive(Debug, Clone, Error)]
pub enum RemoteCacheError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unauthorized: check the remote cache API key")]
    Unauthorized,

    #[error("API error {code}: {message}")]
    ApiError { code: String, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteCacheError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteCacheError::Timeout
        } else if e.is_connect() {
            RemoteCacheError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            RemoteCacheError::Malformed(e.to_string())
        } else {
            RemoteCacheError::ApiError {
                code: "HTTP".to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// What is handed to the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SubmitRequest {
    /// Torrent content hash (lowercase hex).
    Hash(String),
    /// Link to an NZB document.
    NzbLink(String),
}

impl SubmitRequest {
    /// The hash or link identifying the submission.
    pub fn key(&self) -> &str {
        match self {
            SubmitRequest::Hash(h) => h,
            SubmitRequest::NzbLink(l) => l,
        }
    }

    /// Whether the service pulls this in the background (no upfront cache).
    pub fn is_usenet(&self) -> bool {
        matches!(self, SubmitRequest::NzbLink(_))
    }
}

/// Lifecycle of a remote transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Queued,
    Downloading,
    /// Downloaded, being moved/compressed/uploaded on the service side.
    Processing,
    /// Fully cached; files can be listed and unlocked.
    Ready,
    Error,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Queued => "queued",
            TransferStatus::Downloading => "downloading",
            TransferStatus::Processing => "processing",
            TransferStatus::Ready => "ready",
            TransferStatus::Error => "error",
        }
    }

    /// Still moving towards `Ready`.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            TransferStatus::Queued | TransferStatus::Downloading | TransferStatus::Processing
        )
    }
}

/// A transfer known to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTransfer {
    pub id: String,
    pub name: String,
    pub status: TransferStatus,
    /// Raw provider status code, kept for logs.
    pub status_code: i64,
    pub size_bytes: u64,
}

/// One file of a ready transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Path inside the transfer, `/`-separated.
    pub path: String,
    pub size_bytes: u64,
    /// Locked link; must be unlocked before use.
    pub link: String,
}

impl RemoteFile {
    /// Last path component.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// The remote fetching service contract.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &str;

    /// Upload by hash or NZB link. Returns the created transfer.
    async fn submit(&self, request: &SubmitRequest) -> Result<RemoteTransfer, RemoteCacheError>;

    /// Current state of a transfer.
    async fn status(&self, transfer_id: &str) -> Result<RemoteTransfer, RemoteCacheError>;

    /// Flattened file listing of a ready transfer.
    async fn files(&self, transfer_id: &str) -> Result<Vec<RemoteFile>, RemoteCacheError>;

    /// Resolve a locked file link into a direct-access link.
    async fn unlock(&self, link: &str) -> Result<String, RemoteCacheError>;

    /// Withdraw a transfer.
    async fn delete(&self, transfer_id: &str) -> Result<(), RemoteCacheError>;
}
