use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Orchestrator concurrency is at least 1
/// - An enabled orchestrator has a remote-cache key and at least one provider
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_concurrent_items == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_items must be at least 1".to_string(),
        ));
    }

    if config.orchestrator.enabled {
        if config.remote_cache.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "remote_cache.api_key is required when the orchestrator is enabled".to_string(),
            ));
        }
        if !config.search.has_provider() {
            return Err(ConfigError::ValidationError(
                "at least one of search.jackett or search.newznab is required when the orchestrator is enabled"
                    .to_string(),
            ));
        }
    }

    Ok(())
}
