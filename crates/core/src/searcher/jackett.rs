//! Jackett torrent provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::JackettConfig;
use crate::media::Protocol;

use super::{ProviderQuery, ReleaseCandidate, ReleaseProvider, SearchCategory, SearchError};

/// Jackett search backend. Queries every configured indexer concurrently
/// and concatenates their results.
pub struct JackettProvider {
    client: Client,
    config: JackettConfig,
}

impl JackettProvider {
    pub fn new(config: JackettConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the Jackett API URL for a search.
    fn build_search_url(&self, query: &ProviderQuery, indexer: &str) -> String {
        format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}&Category[]={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(indexer),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(&query.text),
            category_to_jackett_id(query.category)
        )
    }

    /// Search a single indexer.
    async fn search_indexer(
        &self,
        query: &ProviderQuery,
        indexer: &str,
    ) -> Result<Vec<ReleaseCandidate>, SearchError> {
        let url = self.build_search_url(query, indexer);
        debug!(indexer = indexer, "Searching Jackett");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await?;
        let parsed = parse_response(&body)?;

        debug!(
            indexer = indexer,
            results = parsed.Results.len(),
            "Jackett search complete"
        );

        Ok(parsed
            .Results
            .into_iter()
            .map(|r| into_candidate(r, indexer))
            .collect())
    }
}

#[async_trait]
impl ReleaseProvider for JackettProvider {
    fn name(&self) -> &str {
        "jackett"
    }

    fn protocol(&self) -> Protocol {
        Protocol::Torrent
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<ReleaseCandidate>, SearchError> {
        let search_futures: Vec<_> = self
            .config
            .indexers
            .iter()
            .map(|indexer| async move { (indexer, self.search_indexer(query, indexer).await) })
            .collect();

        let results = futures::future::join_all(search_futures).await;

        let mut candidates = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0;

        for (indexer, result) in results {
            match result {
                Ok(mut found) => {
                    succeeded += 1;
                    candidates.append(&mut found);
                }
                Err(e) => {
                    warn!(indexer = %indexer, error = %e, "Indexer search failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(candidates),
        }
    }
}

/// Map our categories to Jackett (Torznab) category IDs.
fn category_to_jackett_id(cat: SearchCategory) -> u32 {
    match cat {
        SearchCategory::Movies => 2000,
        SearchCategory::Tv => 5000,
    }
}

fn parse_response(body: &str) -> Result<JackettResponse, SearchError> {
    serde_json::from_str(body)
        .map_err(|e| SearchError::Malformed(format!("Failed to parse Jackett response: {}", e)))
}

fn into_candidate(r: JackettResult, indexer: &str) -> ReleaseCandidate {
    let seeders = r.Seeders.unwrap_or(0).max(0);
    let peers = r.Peers.unwrap_or(0).max(0);
    let mut candidate = ReleaseCandidate::new(r.Title, r.Size.unwrap_or(0).max(0) as u64, "jackett")
        .with_hash(r.InfoHash.unwrap_or_default());
    candidate.seeders = seeders as u32;
    candidate.leechers = peers.saturating_sub(seeders) as u32;
    candidate.magnet_uri = r.MagnetUri;
    candidate.download_url = r.Link;
    if indexer != "all" {
        candidate.source = format!("jackett:{}", indexer);
    }
    candidate
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
    Peers: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> JackettConfig {
        JackettConfig {
            url: url.to_string(),
            api_key: "test-key".to_string(),
            indexers: vec!["all".to_string()],
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_category_to_jackett_id() {
        assert_eq!(category_to_jackett_id(SearchCategory::Movies), 2000);
        assert_eq!(category_to_jackett_id(SearchCategory::Tv), 5000);
    }

    #[test]
    fn test_build_search_url() {
        let provider = JackettProvider::new(config("http://localhost:9117/")).unwrap();
        let query = ProviderQuery {
            text: "Show S01".to_string(),
            category: SearchCategory::Tv,
            season: 1,
            year: None,
        };

        let url = provider.build_search_url(&query, "all");
        assert!(url.starts_with("http://localhost:9117/api/v2.0/indexers/all/results"));
        assert!(url.contains("apikey=test-key"));
        assert!(url.contains("Query=Show%20S01"));
        assert!(url.contains("Category[]=5000"));
    }

    #[test]
    fn test_parse_response_maps_fields() {
        let body = r#"{"Results": [{
            "Title": "Show.S01E02.1080p.WEB-DL",
            "MagnetUri": "magnet:?xt=urn:btih:ABCDEF0123456789ABCDEF0123456789ABCDEF01",
            "Link": null,
            "InfoHash": "ABCDEF0123456789ABCDEF0123456789ABCDEF01",
            "Size": 4000000000,
            "Seeders": 40,
            "Peers": 55
        }]}"#;
        let parsed = parse_response(body).unwrap();
        let candidate = into_candidate(parsed.Results.into_iter().next().unwrap(), "all");

        assert_eq!(candidate.info_hash, "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(candidate.size_bytes, 4_000_000_000);
        assert_eq!(candidate.seeders, 40);
        assert_eq!(candidate.leechers, 15);
        assert_eq!(candidate.source, "jackett");
        assert!(candidate.magnet_uri.is_some());
    }

    #[test]
    fn test_parse_response_missing_hash_stays_empty() {
        let body = r#"{"Results": [{"Title": "Movie.2024.2160p", "Link": "http://j/dl/1", "Size": -1}]}"#;
        let parsed = parse_response(body).unwrap();
        let candidate = into_candidate(parsed.Results.into_iter().next().unwrap(), "rarbg");

        assert!(!candidate.has_hash());
        assert_eq!(candidate.size_bytes, 0);
        assert_eq!(candidate.source, "jackett:rarbg");
        assert_eq!(candidate.download_url.as_deref(), Some("http://j/dl/1"));
    }

    #[test]
    fn test_parse_response_malformed() {
        let err = parse_response("<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, SearchError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_search_unreachable_returns_error() {
        let mut cfg = config("http://127.0.0.1:1");
        cfg.timeout_secs = 2;
        let provider = JackettProvider::new(cfg).unwrap();
        let query = ProviderQuery {
            text: "x".to_string(),
            category: SearchCategory::Movies,
            season: 0,
            year: None,
        };
        assert!(provider.search(&query).await.is_err());
    }
}
