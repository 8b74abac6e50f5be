//! Types for the release search system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{MediaItem, MediaKind, Protocol};

/// Content category for provider-side filtering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    Movies,
    Tv,
}

/// A provider-agnostic search request built from a backlog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQuery {
    /// Free-text query sent to the provider.
    pub text: String,
    pub category: SearchCategory,
    /// Season targeted for series (0 for movies).
    #[serde(default)]
    pub season: u32,
    /// Year appended for movies when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
}

impl ProviderQuery {
    /// Build the query for an item.
    ///
    /// Series queries target the season rather than the episode so that both
    /// single-episode releases and season packs come back in one pass.
    pub fn for_item(item: &MediaItem) -> Self {
        match item.kind() {
            MediaKind::Movie => {
                let text = match item.year {
                    Some(year) => format!("{} {}", item.title, year),
                    None => item.title.clone(),
                };
                Self {
                    text,
                    category: SearchCategory::Movies,
                    season: 0,
                    year: item.year,
                }
            }
            MediaKind::Episode => Self {
                text: format!("{} S{:02}", item.title, item.season),
                category: SearchCategory::Tv,
                season: item.season,
                year: None,
            },
        }
    }
}

/// Inclusive episode range covered by a multi-episode release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRange {
    pub first: u32,
    pub last: u32,
}

impl EpisodeRange {
    pub fn contains(&self, episode: u32) -> bool {
        (self.first..=self.last).contains(&episode)
    }
}

/// A normalized search result from any provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    /// Release title as published.
    pub title: String,
    /// Content hash (lowercase hex). Empty until resolved.
    #[serde(default)]
    pub info_hash: String,
    /// Size in bytes.
    pub size_bytes: u64,
    #[serde(default)]
    pub seeders: u32,
    #[serde(default)]
    pub leechers: u32,
    /// Name of the provider that returned this result.
    pub source: String,
    #[serde(default)]
    pub protocol: Protocol,
    /// Magnet URI, when the provider gives one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,
    /// Link to the .torrent or .nzb document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Set by the series filter when the title looks like a season pack.
    #[serde(default)]
    pub season_pack: bool,
    /// Episode range for multi-episode releases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_range: Option<EpisodeRange>,
}

impl ReleaseCandidate {
    /// Create a torrent candidate with no links.
    pub fn new(title: impl Into<String>, size_bytes: u64, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            info_hash: String::new(),
            size_bytes,
            seeders: 0,
            leechers: 0,
            source: source.into(),
            protocol: Protocol::Torrent,
            magnet_uri: None,
            download_url: None,
            season_pack: false,
            episode_range: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.info_hash = hash.into().to_lowercase();
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    /// Whether the content hash is known.
    pub fn has_hash(&self) -> bool {
        !self.info_hash.is_empty()
    }

    /// Key a record made from this candidate is filed under, see
    /// [`AcquisitionRecord::release_key`](crate::media::AcquisitionRecord::release_key).
    pub fn release_key(&self) -> &str {
        if self.has_hash() {
            &self.info_hash
        } else {
            &self.title
        }
    }
}

/// Errors that can occur during provider searches.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search backend connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Search backend API error: {0}")]
    ApiError(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            SearchError::Malformed(e.to_string())
        } else {
            SearchError::ApiError(e.to_string())
        }
    }
}

/// A single release provider (one indexer backend).
#[async_trait]
pub trait ReleaseProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Transport of the releases this provider returns.
    fn protocol(&self) -> Protocol;

    /// Run one search. Malformed responses must surface as
    /// [`SearchError::Malformed`] rather than partial data.
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<ReleaseCandidate>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_query_includes_year() {
        let item = MediaItem::movie("m1", "Heat", Some(1995));
        let query = ProviderQuery::for_item(&item);
        assert_eq!(query.text, "Heat 1995");
        assert_eq!(query.category, SearchCategory::Movies);
        assert_eq!(query.year, Some(1995));
    }

    #[test]
    fn test_movie_query_without_year() {
        let item = MediaItem::movie("m1", "Heat", None);
        assert_eq!(ProviderQuery::for_item(&item).text, "Heat");
    }

    #[test]
    fn test_series_query_targets_season() {
        let item = MediaItem::episode("e1", "Show", 1, 7);
        let query = ProviderQuery::for_item(&item);
        assert_eq!(query.text, "Show S01");
        assert_eq!(query.category, SearchCategory::Tv);
        assert_eq!(query.season, 1);
    }

    #[test]
    fn test_candidate_hash_lowercased() {
        let candidate = ReleaseCandidate::new("X", 1, "p").with_hash("ABCDEF");
        assert_eq!(candidate.info_hash, "abcdef");
        assert!(candidate.has_hash());
    }

    #[test]
    fn test_episode_range_contains() {
        let range = EpisodeRange { first: 1, last: 5 };
        assert!(range.contains(1));
        assert!(range.contains(5));
        assert!(!range.contains(6));
    }

    #[test]
    fn test_candidate_minimal_deserialization() {
        let json = r#"{"title": "X", "size_bytes": 10, "source": "jackett"}"#;
        let parsed: ReleaseCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.protocol, Protocol::Torrent);
        assert!(!parsed.has_hash());
        assert!(parsed.episode_range.is_none());
    }
}
