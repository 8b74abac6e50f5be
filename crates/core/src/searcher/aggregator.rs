//! Multi-provider search with title filtering.

use chrono::{Datelike, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{BlacklistCache, ProviderQuery, ReleaseCandidate, ReleaseFilter, ReleaseProvider};
use crate::media::MediaItem;
use crate::metrics;

/// Queries every registered provider for an item and filters the merged
/// results. Provider failures count as zero results.
pub struct SearchAggregator {
    providers: Vec<Arc<dyn ReleaseProvider>>,
    blacklist: Arc<BlacklistCache>,
    recent_year_window: u32,
}

impl SearchAggregator {
    pub fn new(
        providers: Vec<Arc<dyn ReleaseProvider>>,
        blacklist: Arc<BlacklistCache>,
        recent_year_window: u32,
    ) -> Self {
        Self {
            providers,
            blacklist,
            recent_year_window,
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Search all providers for `item`.
    pub async fn search(&self, item: &MediaItem) -> Vec<ReleaseCandidate> {
        self.search_in_year(item, Utc::now().year() as u32).await
    }

    /// Same as [`search`](Self::search) with the current year injected.
    pub async fn search_in_year(&self, item: &MediaItem, current_year: u32) -> Vec<ReleaseCandidate> {
        let query = ProviderQuery::for_item(item);
        let mut merged = Vec::new();

        for provider in &self.providers {
            match provider.search(&query).await {
                Ok(mut found) => {
                    metrics::PROVIDER_REQUESTS
                        .with_label_values(&[provider.name(), "success"])
                        .inc();
                    metrics::PROVIDER_RESULTS
                        .with_label_values(&[provider.name()])
                        .observe(found.len() as f64);
                    debug!(
                        item_id = %item.id,
                        provider = provider.name(),
                        results = found.len(),
                        "Provider search complete"
                    );
                    for candidate in &mut found {
                        candidate.protocol = provider.protocol();
                    }
                    merged.append(&mut found);
                }
                Err(e) => {
                    metrics::PROVIDER_REQUESTS
                        .with_label_values(&[provider.name(), "error"])
                        .inc();
                    warn!(
                        item_id = %item.id,
                        provider = provider.name(),
                        error = %e,
                        "Provider search failed, treating as zero results"
                    );
                }
            }
        }

        let filter = ReleaseFilter {
            blacklist: self.blacklist.words().await.as_ref().clone(),
            current_year,
            recent_window: self.recent_year_window,
        };
        let total = merged.len();
        let kept = filter.apply(item, merged);
        debug!(item_id = %item.id, total, kept = kept.len(), "Search results filtered");
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Protocol;
    use crate::searcher::SearchError;
    use crate::testing::MockProvider;

    fn blacklist(words: &[&str]) -> Arc<BlacklistCache> {
        Arc::new(BlacklistCache::fixed(
            words.iter().map(|w| w.to_string()).collect(),
        ))
    }

    #[tokio::test]
    async fn test_merges_providers_in_order() {
        let a = Arc::new(MockProvider::new("a").with_results(vec![
            ReleaseCandidate::new("Dune.2021.1080p", 1, "a"),
        ]));
        let b = Arc::new(MockProvider::new("b").with_results(vec![
            ReleaseCandidate::new("Dune.2021.2160p", 2, "b"),
        ]));
        let aggregator = SearchAggregator::new(vec![a.clone(), b.clone()], blacklist(&[]), 2);

        let item = MediaItem::movie("m1", "Dune", Some(2021));
        let results = aggregator.search_in_year(&item, 2026).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "a");
        assert_eq!(results[1].source, "b");
        assert_eq!(a.calls().await[0].text, "Dune 2021");
    }

    #[tokio::test]
    async fn test_provider_error_is_zero_results() {
        let failing = Arc::new(MockProvider::new("down").with_error(SearchError::Timeout));
        let working = Arc::new(MockProvider::new("up").with_results(vec![
            ReleaseCandidate::new("Show.S01E02.1080p", 1, "up"),
        ]));
        let aggregator = SearchAggregator::new(vec![failing, working], blacklist(&[]), 2);

        let item = MediaItem::episode("e1", "Show", 1, 2);
        let results = aggregator.search_in_year(&item, 2026).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_applies_blacklist_and_stamps_protocol() {
        let nzb = Arc::new(
            MockProvider::new("nzb")
                .with_protocol(Protocol::Usenet)
                .with_results(vec![
                    ReleaseCandidate::new("Dune.2021.2160p", 1, "nzb"),
                    ReleaseCandidate::new("Dune.2021.HDCAM", 1, "nzb"),
                ]),
        );
        let aggregator = SearchAggregator::new(vec![nzb], blacklist(&["hdcam"]), 2);

        let item = MediaItem::movie("m1", "Dune", Some(2021));
        let results = aggregator.search_in_year(&item, 2026).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].protocol, Protocol::Usenet);
    }

    #[tokio::test]
    async fn test_no_providers() {
        let aggregator = SearchAggregator::new(Vec::new(), blacklist(&[]), 2);
        let item = MediaItem::movie("m1", "Dune", None);
        assert!(aggregator.search(&item).await.is_empty());
        assert!(aggregator.provider_names().is_empty());
    }
}
