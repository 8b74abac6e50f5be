//! Mock release provider for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::media::Protocol;
use crate::searcher::{ProviderQuery, ReleaseCandidate, ReleaseProvider, SearchError};

/// Mock implementation of the ReleaseProvider trait.
///
/// Returns a fixed result list (or a fixed error) and records every query.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockProvider::new("jackett")
///     .with_results(vec![fixtures::torrent("Dune.2021.2160p", 8_000, "aa..")]);
///
/// let found = provider.search(&query).await?;
/// assert_eq!(provider.calls().await[0].text, "Dune 2021");
/// ```
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    protocol: Protocol,
    results: RwLock<Vec<ReleaseCandidate>>,
    error: RwLock<Option<SearchError>>,
    calls: RwLock<Vec<ProviderQuery>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: Protocol::Torrent,
            results: RwLock::new(Vec::new()),
            error: RwLock::new(None),
            calls: RwLock::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_results(mut self, results: Vec<ReleaseCandidate>) -> Self {
        *self.results.get_mut() = results;
        self
    }

    /// Every search fails with `error`.
    pub fn with_error(mut self, error: SearchError) -> Self {
        *self.error.get_mut() = Some(error);
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub async fn set_results(&self, results: Vec<ReleaseCandidate>) {
        *self.results.write().await = results;
    }

    pub async fn set_error(&self, error: Option<SearchError>) {
        *self.error.write().await = error;
    }

    /// Queries received so far.
    pub async fn calls(&self) -> Vec<ProviderQuery> {
        self.calls.read().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<ReleaseCandidate>, SearchError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.write().await.push(query.clone());

        if let Some(error) = self.error.read().await.clone() {
            return Err(error);
        }
        Ok(self.results.read().await.clone())
    }
}
