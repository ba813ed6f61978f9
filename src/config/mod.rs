//! Configuration module for frontier storage
//!
//! This module handles loading, parsing, and validating TOML configuration files
//! that select and parameterise a storage backend.
//!
//! # Example
//!
//! ```no_run
//! use drill_frontier::config::load_config;
//! use drill_frontier::storage::{open_storage, StorageBackend};
//! use std::path::Path;
//!
//! # async fn run() -> drill_frontier::Result<()> {
//! let config = load_config(Path::new("frontier.toml"))?;
//! let storage = open_storage(&config.storage_config()?)?;
//! println!("Frontier holds {} URLs", storage.queue_size().await?);
//! # Ok(())
//! # }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BackendKind, Config, RedisConfig, SqliteConfig, StorageConfig, StorageSection,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
