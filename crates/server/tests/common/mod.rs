//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router over the real
//! engine with mock collaborators injected, so the API can be exercised
//! without providers, a remote service or a database file.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use fetchlane_core::{
    testing::{MemoryBacklogStore, MockProvider, MockRemoteCache},
    BacklogStore, BatchOrchestrator, BlacklistCache, CacheVerifier, Config, HashCache,
    HashResolver, PlayableFilter, ReleaseProvider, RemoteCache, SearchAggregator,
    SeasonPackTracker,
};
use fetchlane_server::state::AppState;

/// Re-export fixtures for test convenience
pub use fetchlane_core::testing::fixtures;

/// Test fixture with the engine wired over mocks.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_status() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.get("/api/v1/orchestrator/status").await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// In-memory backlog - seed items and records
    pub store: Arc<MemoryBacklogStore>,
    /// Mock release provider - configure search results
    pub provider: Arc<MockProvider>,
    /// Mock remote cache - script transfer states
    pub remote: Arc<MockRemoteCache>,
    /// Shutdown token shared with the app state
    pub shutdown: CancellationToken,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default config.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryBacklogStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        let remote = Arc::new(MockRemoteCache::new());
        let shutdown = CancellationToken::new();

        let backlog: Arc<dyn BacklogStore> = store.clone();
        let remote_cache: Arc<dyn RemoteCache> = remote.clone();
        let providers: Vec<Arc<dyn ReleaseProvider>> = vec![provider.clone()];

        let searcher = Arc::new(SearchAggregator::new(
            providers,
            Arc::new(BlacklistCache::fixed(config.search.blacklist.clone())),
            config.search.recent_year_window,
        ));
        let resolver = Arc::new(
            HashResolver::new(
                Arc::new(HashCache::new(Duration::from_secs(60))),
                Duration::from_secs(1),
            )
            .expect("Failed to create hash resolver"),
        );
        let verifier = Arc::new(CacheVerifier::new(
            Arc::clone(&remote_cache),
            Duration::ZERO,
            PlayableFilter::new(&config.remote_cache.playable_extensions),
        ));
        let tracker = Arc::new(SeasonPackTracker::new(Arc::clone(&backlog), remote_cache));
        let orchestrator = Arc::new(BatchOrchestrator::new(
            config.orchestrator.clone(),
            backlog,
            searcher,
            resolver,
            verifier,
            tracker,
        ));

        let state = Arc::new(AppState::new(config, orchestrator, shutdown.clone()));
        let router = fetchlane_server::api::create_router(state);

        Self {
            router,
            store,
            provider,
            remote,
            shutdown,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request without a body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
