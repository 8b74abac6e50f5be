//! Content-hash resolution for candidates published without one.
//!
//! Tries the magnet URI first, then fetches the provider's `.torrent` link.
//! Some indexers answer the download link with a redirect to a `magnet:`
//! URI, so redirects are followed by hand.

use futures::stream::{self, StreamExt};
use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use reqwest::{header::LOCATION, redirect::Policy, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{ReleaseCandidate, SearchError};
use crate::media::Protocol;

const MAX_REDIRECTS: usize = 5;
const RESOLVE_CONCURRENCY: usize = 4;

/// Extract the info hash from a magnet URI (`xt=urn:btih:`), accepting both
/// the 40-char hex and 32-char base32 encodings.
pub fn hash_from_magnet(uri: &str) -> Option<String> {
    let query = uri.strip_prefix("magnet:?")?;
    let value = query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        let value = value.strip_prefix("urn:btih:")?;
        key.starts_with("xt").then_some(value)
    })?;

    match value.len() {
        40 if value.chars().all(|c| c.is_ascii_hexdigit()) => Some(value.to_ascii_lowercase()),
        32 => base32_to_hex(value),
        _ => None,
    }
}

fn base32_to_hex(value: &str) -> Option<String> {
    let mut bits: u64 = 0;
    let mut bit_count = 0;
    let mut out = String::with_capacity(40);

    for c in value.chars() {
        let digit = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        bits = (bits << 5) | digit;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            out.push_str(&format!("{:02x}", (bits >> bit_count) & 0xff));
            bits &= (1 << bit_count) - 1;
        }
    }

    (out.len() == 40).then_some(out)
}

/// Info hash of a bencoded `.torrent` document.
pub fn hash_from_torrent(bytes: &[u8]) -> Result<String, SearchError> {
    let torrent: TorrentMetaV1Owned = torrent_from_bytes(bytes)
        .map_err(|e| SearchError::Malformed(format!("Invalid torrent: {}", e)))?;
    Ok(torrent.info_hash.as_string())
}

/// Resolved hashes keyed by download URL, with a TTL.
pub struct HashCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl HashCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, url: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(url)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(hash, _)| hash.clone())
    }

    pub async fn insert(&self, url: impl Into<String>, hash: impl Into<String>) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, at)| at.elapsed() < self.ttl);
        entries.insert(url.into(), (hash.into(), Instant::now()));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Fills in missing torrent hashes.
///
/// Cache misses take a per-URL lock and check the cache again before
/// fetching, so concurrent misses on one link fetch it once.
pub struct HashResolver {
    client: Client,
    cache: Arc<HashCache>,
    fetch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HashResolver {
    pub fn new(cache: Arc<HashCache>, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| SearchError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            cache,
            fetch_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve hashes for every torrent candidate that lacks one.
    ///
    /// Candidates that cannot be resolved are returned unchanged; they can
    /// still be ranked but never cache-verified.
    pub async fn resolve_all(&self, candidates: Vec<ReleaseCandidate>) -> Vec<ReleaseCandidate> {
        stream::iter(candidates)
            .map(|mut candidate| async move {
                if candidate.protocol == Protocol::Torrent && !candidate.has_hash() {
                    match self.resolve(&candidate).await {
                        Ok(Some(hash)) => candidate.info_hash = hash,
                        Ok(None) => {}
                        Err(e) => {
                            debug!(title = %candidate.title, error = %e, "Could not resolve info hash");
                        }
                    }
                }
                candidate
            })
            .buffered(RESOLVE_CONCURRENCY)
            .collect()
            .await
    }

    /// Resolve a single candidate's hash.
    pub async fn resolve(&self, candidate: &ReleaseCandidate) -> Result<Option<String>, SearchError> {
        if let Some(hash) = candidate.magnet_uri.as_deref().and_then(hash_from_magnet) {
            return Ok(Some(hash));
        }

        let Some(url) = candidate.download_url.as_deref() else {
            return Ok(None);
        };

        if let Some(hash) = self.cache.get(url).await {
            return Ok(Some(hash));
        }

        let lock = Arc::clone(self.fetch_locks.lock().await.entry(url.to_string()).or_default());
        let result = {
            let _fetching = lock.lock().await;
            match self.cache.get(url).await {
                Some(hash) => Ok(hash),
                None => match self.fetch_hash(url).await {
                    Ok(hash) => {
                        self.cache.insert(url, hash.clone()).await;
                        Ok(hash)
                    }
                    Err(e) => Err(e),
                },
            }
        };
        self.fetch_locks.lock().await.remove(url);
        result.map(Some)
    }

    async fn fetch_hash(&self, url: &str) -> Result<String, SearchError> {
        if let Some(hash) = hash_from_magnet(url) {
            return Ok(hash);
        }

        let mut current = url.to_string();
        for _ in 0..MAX_REDIRECTS {
            let response = self.client.get(&current).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| SearchError::Malformed("Redirect without location".to_string()))?;
                if location.starts_with("magnet:") {
                    return hash_from_magnet(location)
                        .ok_or_else(|| SearchError::Malformed("Magnet without info hash".to_string()));
                }
                current = location.to_string();
                continue;
            }

            if !status.is_success() {
                return Err(SearchError::ApiError(format!("HTTP {}", status)));
            }

            let bytes = response.bytes().await?;
            return hash_from_torrent(&bytes);
        }

        Err(SearchError::ApiError(format!("Too many redirects for {}", url)))
    }
}
