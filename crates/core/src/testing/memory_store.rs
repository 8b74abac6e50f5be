//! In-memory backlog store for testing.

use std::sync::{Mutex, MutexGuard};

use crate::media::{AcquisitionRecord, MediaItem, PackId};
use crate::store::{BacklogStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    /// Insertion order is the backlog order.
    items: Vec<MediaItem>,
    records: Vec<AcquisitionRecord>,
}

/// [`BacklogStore`] kept in memory, with the same query semantics as the
/// SQLite adapter.
#[derive(Debug, Default)]
pub struct MemoryBacklogStore {
    tables: Mutex<Tables>,
}

impl MemoryBacklogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("store mutex poisoned".to_string()))
    }

    /// Every stored record, in insertion order.
    pub fn all_acquisitions(&self) -> Vec<AcquisitionRecord> {
        self.tables()
            .map(|t| t.records.clone())
            .unwrap_or_default()
    }
}

fn in_pack(record: &AcquisitionRecord, pack: &PackId) -> bool {
    record.season_pack && record.is_live() && record.show_key == pack.show && record.season == pack.season
}

impl BacklogStore for MemoryBacklogStore {
    fn list_items_not_acquired(&self) -> Result<Vec<MediaItem>, StoreError> {
        Ok(self
            .tables()?
            .items
            .iter()
            .filter(|i| !i.acquired)
            .cloned()
            .collect())
    }

    fn get_item(&self, id: &str) -> Result<MediaItem, StoreError> {
        self.tables()?
            .items
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn save_item(&self, item: &MediaItem) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        match tables.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => tables.items.push(item.clone()),
        }
        Ok(())
    }

    fn list_acquisitions_for(&self, media_id: &str) -> Result<Vec<AcquisitionRecord>, StoreError> {
        Ok(self
            .tables()?
            .records
            .iter()
            .filter(|r| r.media_id == media_id)
            .cloned()
            .collect())
    }

    fn save_acquisition(&self, record: &AcquisitionRecord) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        match tables.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => tables.records.push(record.clone()),
        }
        Ok(())
    }

    fn delete_acquisitions_for(&self, media_id: &str) -> Result<(), StoreError> {
        self.tables()?.records.retain(|r| r.media_id != media_id);
        Ok(())
    }

    fn list_season_items(&self, pack: &PackId) -> Result<Vec<MediaItem>, StoreError> {
        let mut items: Vec<MediaItem> = self
            .tables()?
            .items
            .iter()
            .filter(|i| i.is_episode() && i.season == pack.season && i.show_key() == pack.show)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.episode);
        Ok(items)
    }

    fn find_season_pack(&self, pack: &PackId) -> Result<Option<AcquisitionRecord>, StoreError> {
        Ok(self
            .tables()?
            .records
            .iter()
            .filter(|r| in_pack(r, pack))
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    fn list_season_packs(&self) -> Result<Vec<AcquisitionRecord>, StoreError> {
        Ok(self
            .tables()?
            .records
            .iter()
            .filter(|r| r.season_pack && r.is_live())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Protocol;

    #[test]
    fn test_backlog_order_and_acquired_filter() {
        let store = MemoryBacklogStore::new();
        store.save_item(&MediaItem::movie("b", "B", None)).unwrap();
        store.save_item(&MediaItem::movie("a", "A", None)).unwrap();

        let mut done = MediaItem::movie("c", "C", None);
        done.mark_acquired("link", false);
        store.save_item(&done).unwrap();

        let ids: Vec<_> = store
            .list_items_not_acquired()
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_find_season_pack_ignores_released() {
        let store = MemoryBacklogStore::new();
        let item = MediaItem::episode("e1", "Show", 1, 1);
        let mut record = AcquisitionRecord::new(&item, "Show.S01", 1, Protocol::Torrent);
        record.mark_submitted("t1");
        record.mark_pack([1, 2]);
        store.save_acquisition(&record).unwrap();

        let pack = PackId::new("Show", 1);
        assert!(store.find_season_pack(&pack).unwrap().is_some());

        record.mark_released();
        store.save_acquisition(&record).unwrap();
        assert!(store.find_season_pack(&pack).unwrap().is_none());
        assert_eq!(store.all_acquisitions().len(), 1);
    }
}
