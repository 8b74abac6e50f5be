//! Backlog repository trait and errors.

use thiserror::Error;

use crate::media::{AcquisitionRecord, MediaItem, PackId};

/// Errors returned by backlog storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Item not found.
    #[error("media item not found: {0}")]
    NotFound(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),

    /// A stored blob could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Repository contract between the engine and the system of record.
///
/// Implementations must serialize concurrent writes to the same record;
/// last writer wins per record.
pub trait BacklogStore: Send + Sync {
    /// All items not yet acquired, in backlog order (oldest first).
    fn list_items_not_acquired(&self) -> Result<Vec<MediaItem>, StoreError>;

    /// Get an item by ID.
    fn get_item(&self, id: &str) -> Result<MediaItem, StoreError>;

    /// Insert or replace an item.
    fn save_item(&self, item: &MediaItem) -> Result<(), StoreError>;

    /// All acquisition records owned by an item.
    fn list_acquisitions_for(&self, media_id: &str)
        -> Result<Vec<AcquisitionRecord>, StoreError>;

    /// Insert or replace an acquisition record.
    fn save_acquisition(&self, record: &AcquisitionRecord) -> Result<(), StoreError>;

    /// Delete every acquisition record owned by an item.
    fn delete_acquisitions_for(&self, media_id: &str) -> Result<(), StoreError>;

    /// Every episode item (acquired or not) the backlog knows for a season.
    fn list_season_items(&self, pack: &PackId) -> Result<Vec<MediaItem>, StoreError>;

    /// The most recent live season-pack record for a show/season, if any.
    fn find_season_pack(&self, pack: &PackId) -> Result<Option<AcquisitionRecord>, StoreError>;

    /// All season-pack records that still hold a remote transfer.
    fn list_season_packs(&self) -> Result<Vec<AcquisitionRecord>, StoreError>;
}
