//! SQLite-backed backlog store.
//!
//! Items and acquisition records are stored as JSON documents with a few
//! indexed columns pulled out for the lookups the engine needs.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;

use super::{BacklogStore, StoreError};
use crate::media::{AcquisitionRecord, MediaItem, PackId};

/// SQLite-backed backlog store.
pub struct SqliteBacklogStore {
    conn: Mutex<Connection>,
}

impl SqliteBacklogStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media_items (
                id TEXT PRIMARY KEY,
                show_key TEXT NOT NULL,
                season INTEGER NOT NULL DEFAULT 0,
                episode INTEGER NOT NULL DEFAULT 0,
                acquired INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_items_acquired ON media_items(acquired, added_at);
            CREATE INDEX IF NOT EXISTS idx_media_items_season ON media_items(show_key, season);

            CREATE TABLE IF NOT EXISTS acquisitions (
                id TEXT PRIMARY KEY,
                media_id TEXT NOT NULL,
                show_key TEXT NOT NULL,
                season INTEGER NOT NULL DEFAULT 0,
                season_pack INTEGER NOT NULL DEFAULT 0,
                live INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_acquisitions_media ON acquisitions(media_id);
            CREATE INDEX IF NOT EXISTS idx_acquisitions_pack ON acquisitions(show_key, season, season_pack);
            "#,
        )
        .map_err(db_err)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    /// Run `sql` and decode the JSON blob in the first column of each row.
    fn query_json<T: DeserializeOwned>(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<T>, StoreError> {
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params, |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut decoded = Vec::new();
        for row in rows {
            let json = row.map_err(db_err)?;
            decoded.push(serde_json::from_str(&json)?);
        }
        Ok(decoded)
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl BacklogStore for SqliteBacklogStore {
    fn list_items_not_acquired(&self) -> Result<Vec<MediaItem>, StoreError> {
        let conn = self.conn()?;
        Self::query_json(
            &conn,
            "SELECT data FROM media_items WHERE acquired = 0 ORDER BY added_at ASC, rowid ASC",
            &[],
        )
    }

    fn get_item(&self, id: &str) -> Result<MediaItem, StoreError> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT data FROM media_items WHERE id = ?",
            params![id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(db_err(e)),
        }
    }

    fn save_item(&self, item: &MediaItem) -> Result<(), StoreError> {
        let data = serde_json::to_string(item)?;
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO media_items (id, show_key, season, episode, acquired, added_at, data, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   show_key = excluded.show_key,
                   season = excluded.season,
                   episode = excluded.episode,
                   acquired = excluded.acquired,
                   data = excluded.data,
                   updated_at = excluded.updated_at"#,
            params![
                item.id,
                item.show_key(),
                item.season,
                item.episode,
                item.acquired,
                item.added_at.to_rfc3339(),
                data,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn list_acquisitions_for(
        &self,
        media_id: &str,
    ) -> Result<Vec<AcquisitionRecord>, StoreError> {
        let conn = self.conn()?;
        Self::query_json(
            &conn,
            "SELECT data FROM acquisitions WHERE media_id = ? ORDER BY rowid ASC",
            &[&media_id],
        )
    }

    fn save_acquisition(&self, record: &AcquisitionRecord) -> Result<(), StoreError> {
        let data = serde_json::to_string(record)?;
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO acquisitions (id, media_id, show_key, season, season_pack, live, data, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   media_id = excluded.media_id,
                   show_key = excluded.show_key,
                   season = excluded.season,
                   season_pack = excluded.season_pack,
                   live = excluded.live,
                   data = excluded.data,
                   updated_at = excluded.updated_at"#,
            params![
                record.id,
                record.media_id,
                record.show_key,
                record.season,
                record.season_pack,
                record.is_live(),
                data,
                record.updated_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn delete_acquisitions_for(&self, media_id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM acquisitions WHERE media_id = ?", params![media_id])
            .map_err(db_err)?;
        Ok(())
    }

    fn list_season_items(&self, pack: &PackId) -> Result<Vec<MediaItem>, StoreError> {
        let conn = self.conn()?;
        Self::query_json(
            &conn,
            "SELECT data FROM media_items WHERE show_key = ? AND season = ? AND episode > 0 ORDER BY episode ASC",
            &[&pack.show, &pack.season],
        )
    }

    fn find_season_pack(&self, pack: &PackId) -> Result<Option<AcquisitionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut records = Self::query_json(
            &conn,
            "SELECT data FROM acquisitions WHERE show_key = ? AND season = ? AND season_pack = 1 AND live = 1 ORDER BY updated_at DESC LIMIT 1",
            &[&pack.show, &pack.season],
        )?;
        Ok(records.pop())
    }

    fn list_season_packs(&self) -> Result<Vec<AcquisitionRecord>, StoreError> {
        let conn = self.conn()?;
        Self::query_json(
            &conn,
            "SELECT data FROM acquisitions WHERE season_pack = 1 AND live = 1 ORDER BY rowid ASC",
            &[],
        )
    }
}
