use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub remote_cache: RemoteCacheConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("fetchlane.db")
}

/// Search aggregation settings and provider sections.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Words rejecting a release title (case-insensitive substring).
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// How long the blacklist is cached before being reloaded.
    #[serde(default = "default_blacklist_ttl")]
    pub blacklist_ttl_secs: u64,
    /// Undated releases are accepted for movies at most this many years old.
    #[serde(default = "default_recent_year_window")]
    pub recent_year_window: u32,
    /// Timeout for hash resolution requests.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub jackett: Option<JackettConfig>,
    #[serde(default)]
    pub newznab: Option<NewznabConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            blacklist: Vec::new(),
            blacklist_ttl_secs: default_blacklist_ttl(),
            recent_year_window: default_recent_year_window(),
            timeout_secs: default_timeout(),
            jackett: None,
            newznab: None,
        }
    }
}

impl SearchConfig {
    /// Whether at least one provider section is present.
    pub fn has_provider(&self) -> bool {
        self.jackett.is_some() || self.newznab.is_some()
    }
}

fn default_blacklist_ttl() -> u64 {
    300
}

fn default_recent_year_window() -> u32 {
    2
}

fn default_timeout() -> u32 {
    30
}

/// Jackett torrent provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    /// Indexers to query; "all" uses Jackett's aggregate endpoint.
    #[serde(default = "default_indexers")]
    pub indexers: Vec<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_indexers() -> Vec<String> {
    vec!["all".to_string()]
}

/// Newznab-compatible Usenet indexer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewznabConfig {
    /// Indexer base URL (the `/api` path is appended)
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Remote fetching service (AllDebrid-compatible) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteCacheConfig {
    #[serde(default = "default_remote_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// Agent name sent with every request.
    #[serde(default = "default_agent")]
    pub agent: String,
    /// Delay between submission and the status poll.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// File extensions considered playable media.
    #[serde(default = "default_playable_extensions")]
    pub playable_extensions: Vec<String>,
}

impl Default for RemoteCacheConfig {
    fn default() -> Self {
        Self {
            url: default_remote_url(),
            api_key: String::new(),
            agent: default_agent(),
            settle_delay_ms: default_settle_delay(),
            timeout_secs: default_timeout(),
            playable_extensions: default_playable_extensions(),
        }
    }
}

fn default_remote_url() -> String {
    "https://api.alldebrid.com".to_string()
}

fn default_agent() -> String {
    "fetchlane".to_string()
}

fn default_settle_delay() -> u64 {
    2000
}

fn default_playable_extensions() -> Vec<String> {
    ["mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "webm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SanitizedSearchConfig,
    pub remote_cache: SanitizedRemoteCacheConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearchConfig {
    pub blacklist: Vec<String>,
    pub blacklist_ttl_secs: u64,
    pub recent_year_window: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jackett: Option<SanitizedJackettConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newznab: Option<SanitizedNewznabConfig>,
}

/// Sanitized Jackett config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJackettConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub indexers: Vec<String>,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNewznabConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRemoteCacheConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub agent: String,
    pub settle_delay_ms: u64,
    pub timeout_secs: u32,
    pub playable_extensions: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let search = &config.search;
        let remote = &config.remote_cache;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            search: SanitizedSearchConfig {
                blacklist: search.blacklist.clone(),
                blacklist_ttl_secs: search.blacklist_ttl_secs,
                recent_year_window: search.recent_year_window,
                jackett: search.jackett.as_ref().map(|j| SanitizedJackettConfig {
                    url: j.url.clone(),
                    api_key_configured: !j.api_key.is_empty(),
                    indexers: j.indexers.clone(),
                    timeout_secs: j.timeout_secs,
                }),
                newznab: search.newznab.as_ref().map(|n| SanitizedNewznabConfig {
                    url: n.url.clone(),
                    api_key_configured: !n.api_key.is_empty(),
                    timeout_secs: n.timeout_secs,
                }),
            },
            remote_cache: SanitizedRemoteCacheConfig {
                url: remote.url.clone(),
                api_key_configured: !remote.api_key.is_empty(),
                agent: remote.agent.clone(),
                settle_delay_ms: remote.settle_delay_ms,
                timeout_secs: remote.timeout_secs,
                playable_extensions: remote.playable_extensions.clone(),
            },
            orchestrator: config.orchestrator.clone(),
        }
    }
}
