//! Testing utilities and mock implementations.
//!
//! Mocks for every collaborator the engine talks to, so the orchestrator can
//! be driven end to end without providers, a remote service or a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use fetchlane_core::testing::{fixtures, MemoryBacklogStore, MockProvider, MockRemoteCache};
//!
//! let store = MemoryBacklogStore::new();
//! let remote = MockRemoteCache::new();
//! let provider = MockProvider::new("mock")
//!     .with_results(vec![fixtures::torrent("Dune.2021.2160p", 8_000, HASH)]);
//!
//! remote.set_cached(HASH, fixtures::movie_files("Dune.2021.2160p")).await;
//! ```

mod memory_store;
mod mock_provider;
mod mock_remote_cache;

pub use memory_store::MemoryBacklogStore;
pub use mock_provider::MockProvider;
pub use mock_remote_cache::MockRemoteCache;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::media::Protocol;
    use crate::remote_cache::RemoteFile;
    use crate::searcher::ReleaseCandidate;

    const GB: u64 = 1024 * 1024 * 1024;

    /// A torrent candidate with a known info hash.
    pub fn torrent(title: &str, size_bytes: u64, info_hash: &str) -> ReleaseCandidate {
        ReleaseCandidate::new(title, size_bytes, "mock").with_hash(info_hash)
    }

    /// An NZB candidate pointing at `link`.
    pub fn nzb(title: &str, size_bytes: u64, link: &str) -> ReleaseCandidate {
        ReleaseCandidate::new(title, size_bytes, "mock-nzb")
            .with_protocol(Protocol::Usenet)
            .with_download_url(link)
    }

    /// A file as listed by the remote service.
    pub fn remote_file(path: &str, size_bytes: u64) -> RemoteFile {
        RemoteFile {
            path: path.to_string(),
            size_bytes,
            link: format!("https://remote.example/dl/{}", path),
        }
    }

    /// Listing of a movie release: the feature, a sample and an NFO.
    pub fn movie_files(name: &str) -> Vec<RemoteFile> {
        vec![
            remote_file(&format!("{}/{}.mkv", name, name), 4 * GB),
            remote_file(&format!("{}/Sample/{}.sample.mkv", name, name), 50 * 1024 * 1024),
            remote_file(&format!("{}/{}.nfo", name, name), 2048),
        ]
    }

    /// Listing of a season pack holding `episodes`.
    pub fn pack_files(show: &str, season: u32, episodes: &[u32]) -> Vec<RemoteFile> {
        let dir = format!("{}.S{:02}", show, season);
        let mut files: Vec<RemoteFile> = episodes
            .iter()
            .map(|ep| {
                remote_file(
                    &format!("{}/{}.S{:02}E{:02}.mkv", dir, show, season, ep),
                    GB + u64::from(*ep),
                )
            })
            .collect();
        files.push(remote_file(&format!("{}/{}.nfo", dir, dir), 1024));
        files
    }
}
