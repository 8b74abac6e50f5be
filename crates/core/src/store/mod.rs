//! Persistence contract for the media backlog.
//!
//! The engine only talks to storage through [`BacklogStore`]. The SQLite
//! adapter keeps items and acquisition records as JSON blobs keyed by ID.

mod backlog;
mod sqlite_store;

pub use backlog::{BacklogStore, StoreError};
pub use sqlite_store::SqliteBacklogStore;
