pub mod config;
pub mod media;
pub mod metrics;
pub mod orchestrator;
pub mod ranking;
pub mod remote_cache;
pub mod searcher;
pub mod season_pack;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use media::{AcquisitionRecord, MediaError, MediaItem, MediaKind, PackId, Protocol};
pub use orchestrator::{
    BatchOrchestrator, ItemOutcome, OrchestratorConfig, OrchestratorError, OrchestratorStatus,
    RunReport,
};
pub use ranking::{rank, resolution_of, select_usenet, RankedCandidates};
pub use remote_cache::{
    AllDebridClient, CacheVerifier, PlayableFilter, RemoteCache, RemoteCacheError, VerifyError,
};
pub use searcher::{
    BlacklistCache, HashCache, HashResolver, JackettProvider, NewznabProvider, ReleaseCandidate,
    ReleaseProvider, SearchAggregator, SearchError,
};
pub use season_pack::{SeasonPackStatus, SeasonPackTracker, TrackerError};
pub use store::{BacklogStore, SqliteBacklogStore, StoreError};
