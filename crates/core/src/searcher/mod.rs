//! Release search across providers.
//!
//! Each [`ReleaseProvider`] wraps one indexer backend (Jackett for torrents,
//! Newznab for NZBs). The [`SearchAggregator`] queries them in turn, applies
//! the title filters and hands the survivors to the ranker.

mod aggregator;
mod blacklist;
pub mod filter;
mod hash;
mod jackett;
mod newznab;
mod types;

pub use aggregator::SearchAggregator;
pub use blacklist::{BlacklistCache, BlacklistSource, StaticBlacklist};
pub use filter::{ReleaseFilter, SeriesMatch};
pub use hash::{hash_from_magnet, hash_from_torrent, HashCache, HashResolver};
pub use jackett::JackettProvider;
pub use newznab::NewznabProvider;
pub use types::*;
