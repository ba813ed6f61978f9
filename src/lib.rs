//! Drill frontier: pluggable crawl-state storage
//!
//! This crate implements the persistence layer behind a breadth-first /
//! priority web crawl: visited-set deduplication, a three-lane priority
//! frontier, per-domain request counters and crawl-state checkpoints.
//! The same [`storage::StorageBackend`] contract is provided by three
//! engines: process memory, an embedded SQLite file and a shared Redis
//! deployment (optionally fronted by a Bloom filter).

pub mod config;
pub mod logging;
pub mod storage;

use thiserror::Error;

/// Main error type for frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for frontier operations
pub type Result<T> = std::result::Result<T, FrontierError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, StorageConfig};
pub use storage::{
    open_storage, CrawlState, Lane, MemoryStorage, QueueItem, RedisStorage, SqliteStorage,
    StorageBackend, StorageError,
};
