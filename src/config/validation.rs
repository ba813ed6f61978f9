use crate::config::types::{Config, RedisConfig, SqliteConfig, StorageConfig};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
///
/// Only the section of the selected backend is checked.
pub fn validate(config: &Config) -> ConfigResult<()> {
    match config.storage_config()? {
        StorageConfig::Memory => Ok(()),
        StorageConfig::Sqlite(sqlite) => validate_sqlite_config(&sqlite),
        StorageConfig::Redis(redis) => validate_redis_config(&redis),
    }
}

/// Validates SQLite configuration
fn validate_sqlite_config(config: &SqliteConfig) -> ConfigResult<()> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sqlite path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates Redis configuration
fn validate_redis_config(config: &RedisConfig) -> ConfigResult<()> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid redis url: {}", e)))?;

    if !matches!(url.scheme(), "redis" | "rediss" | "unix" | "redis+unix") {
        return Err(ConfigError::InvalidUrl(format!(
            "redis url must use redis://, rediss:// or unix://, got '{}'",
            url.scheme()
        )));
    }

    if config.namespace.is_empty() {
        return Err(ConfigError::Validation(
            "redis namespace cannot be empty".to_string(),
        ));
    }

    if config.namespace.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "redis namespace must not contain whitespace, got '{}'",
            config.namespace
        )));
    }

    if config.use_bloom {
        if config.bloom_capacity < 1 {
            return Err(ConfigError::Validation(format!(
                "bloom_capacity must be >= 1, got {}",
                config.bloom_capacity
            )));
        }

        if !(config.bloom_error_rate > 0.0 && config.bloom_error_rate < 1.0) {
            return Err(ConfigError::Validation(format!(
                "bloom_error_rate must be between 0 and 1 (exclusive), got {}",
                config.bloom_error_rate
            )));
        }
    }

    Ok(())
}
