use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fetchlane_core::{
    load_config, validate_config, AllDebridClient, BacklogStore, BatchOrchestrator,
    BlacklistCache, CacheVerifier, Config, HashCache, HashResolver, JackettProvider,
    NewznabProvider, PlayableFilter, ReleaseProvider, RemoteCache, SearchAggregator,
    SeasonPackTracker, SqliteBacklogStore,
};
use fetchlane_core::searcher::StaticBlacklist;
use fetchlane_server::api::create_router;
use fetchlane_server::state::AppState;

/// How long a resolved info hash stays memoized.
const HASH_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("FETCHLANE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    let orchestrator = Arc::new(build_orchestrator(&config)?);
    let shutdown = CancellationToken::new();

    let periodic = if config.orchestrator.enabled {
        info!(
            interval_secs = config.orchestrator.poll_interval_secs,
            concurrency = config.orchestrator.max_concurrent_items,
            "Starting periodic batch trigger"
        );
        Some(Arc::clone(&orchestrator).spawn_periodic(shutdown.clone()))
    } else {
        info!("Periodic trigger disabled in config, batches run on demand only");
        None
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&orchestrator),
        shutdown.clone(),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, cancelling in-flight work");
            signal_token.cancel();
        })
        .await
        .context("Server error")?;

    // The server can also stop on its own error path; make sure runs stop too.
    shutdown.cancel();

    if let Some(handle) = periodic {
        info!("Stopping periodic trigger...");
        if let Err(e) = handle.await {
            warn!(error = %e, "Periodic trigger task ended abnormally");
        }
        info!("Periodic trigger stopped");
    }

    info!("Server shut down");
    Ok(())
}

/// Wire the engine from configuration.
fn build_orchestrator(config: &Config) -> Result<BatchOrchestrator> {
    let store: Arc<dyn BacklogStore> = Arc::new(
        SqliteBacklogStore::new(&config.database.path)
            .context("Failed to open backlog store")?,
    );
    info!("Backlog store initialized");

    let mut providers: Vec<Arc<dyn ReleaseProvider>> = Vec::new();
    if let Some(ref jackett) = config.search.jackett {
        info!(url = %jackett.url, indexers = ?jackett.indexers, "Initializing Jackett provider");
        providers.push(Arc::new(
            JackettProvider::new(jackett.clone()).context("Failed to create Jackett provider")?,
        ));
    }
    if let Some(ref newznab) = config.search.newznab {
        info!(url = %newznab.url, "Initializing Newznab provider");
        providers.push(Arc::new(
            NewznabProvider::new(newznab.clone()).context("Failed to create Newznab provider")?,
        ));
    }
    if providers.is_empty() {
        warn!("No release provider configured, every item will stay pending");
    }

    let blacklist = Arc::new(BlacklistCache::new(
        Arc::new(StaticBlacklist(config.search.blacklist.clone())),
        Duration::from_secs(config.search.blacklist_ttl_secs),
    ));
    let searcher = Arc::new(SearchAggregator::new(
        providers,
        blacklist,
        config.search.recent_year_window,
    ));

    let resolver = Arc::new(
        HashResolver::new(
            Arc::new(HashCache::new(HASH_CACHE_TTL)),
            Duration::from_secs(config.search.timeout_secs as u64),
        )
        .context("Failed to create hash resolver")?,
    );

    let remote: Arc<dyn RemoteCache> = Arc::new(
        AllDebridClient::new(config.remote_cache.clone())
            .context("Failed to create remote cache client")?,
    );
    info!(url = %config.remote_cache.url, "Remote cache client initialized");

    let verifier = Arc::new(CacheVerifier::new(
        Arc::clone(&remote),
        Duration::from_millis(config.remote_cache.settle_delay_ms),
        PlayableFilter::new(&config.remote_cache.playable_extensions),
    ));
    let tracker = Arc::new(SeasonPackTracker::new(Arc::clone(&store), remote));

    Ok(BatchOrchestrator::new(
        config.orchestrator.clone(),
        store,
        searcher,
        resolver,
        verifier,
        tracker,
    ))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
