use crate::storage::redis::{BloomConfig, DEFAULT_NAMESPACE};
use crate::ConfigError;
use serde::Deserialize;

/// Main configuration structure for a frontier store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageSection,
    pub sqlite: Option<SqliteConfig>,
    pub redis: Option<RedisConfig>,
}

/// Backend selection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: BackendKind,
}

/// Which engine holds the frontier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Sqlite,
    Redis,
}

/// SQLite backend configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqliteConfig {
    /// Path to the database file
    pub path: String,
}

/// Redis backend configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RedisConfig {
    /// Connection URL (e.g., "redis://127.0.0.1:6379/0")
    pub url: String,

    /// Prefix for every key written by this crawl
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Front the visited set with a Bloom filter
    #[serde(rename = "use-bloom", default)]
    pub use_bloom: bool,

    /// Expected number of visited URLs
    #[serde(rename = "bloom-capacity", default = "default_bloom_capacity")]
    pub bloom_capacity: u64,

    /// Target false-positive rate
    #[serde(rename = "bloom-error-rate", default = "default_bloom_error_rate")]
    pub bloom_error_rate: f64,
}

impl RedisConfig {
    /// Bloom sizing if the filter is enabled
    pub fn bloom(&self) -> Option<BloomConfig> {
        self.use_bloom.then(|| BloomConfig {
            capacity: self.bloom_capacity,
            error_rate: self.bloom_error_rate,
        })
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_bloom_capacity() -> u64 {
    BloomConfig::default().capacity
}

fn default_bloom_error_rate() -> f64 {
    BloomConfig::default().error_rate
}

/// A resolved backend choice with its settings
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Memory,
    Sqlite(SqliteConfig),
    Redis(RedisConfig),
}

impl Config {
    /// Resolves the selected backend to its configuration section
    pub fn storage_config(&self) -> Result<StorageConfig, ConfigError> {
        match self.storage.backend {
            BackendKind::Memory => Ok(StorageConfig::Memory),
            BackendKind::Sqlite => self
                .sqlite
                .clone()
                .map(StorageConfig::Sqlite)
                .ok_or_else(|| {
                    ConfigError::Validation(
                        "backend \"sqlite\" selected but [sqlite] section is missing".to_string(),
                    )
                }),
            BackendKind::Redis => self
                .redis
                .clone()
                .map(StorageConfig::Redis)
                .ok_or_else(|| {
                    ConfigError::Validation(
                        "backend \"redis\" selected but [redis] section is missing".to_string(),
                    )
                }),
        }
    }
}
