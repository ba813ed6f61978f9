//! Storage module for crawl frontier state
//!
//! This module holds everything a crawl driver persists between fetches:
//! - Visited-set membership with visit timestamps
//! - A three-lane (high / normal / low) FIFO frontier
//! - Per-domain request counters
//! - An opaque crawl-state checkpoint
//!
//! Three engines implement the same [`StorageBackend`] contract:
//! [`MemoryStorage`], [`SqliteStorage`] and [`RedisStorage`].

mod memory;
pub mod redis;
mod schema;
mod sqlite;
mod traits;
mod types;

pub use self::redis::{BloomConfig, MembershipMode, RedisStorage};
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{StorageBackend, StorageError, StorageResult};
pub use types::{now_timestamp, CrawlState, Lane, LaneSizes, QueueItem};

use crate::config::StorageConfig;

/// Constructs the backend described by `config`
///
/// No I/O happens here; every backend connects lazily on first use.
///
/// # Returns
///
/// * `Ok(Box<dyn StorageBackend>)` - The selected backend
/// * `Err(StorageError)` - The Redis URL could not be parsed
pub fn open_storage(config: &StorageConfig) -> Result<Box<dyn StorageBackend>, StorageError> {
    let storage: Box<dyn StorageBackend> = match config {
        StorageConfig::Memory => Box::new(MemoryStorage::new()),
        StorageConfig::Sqlite(sqlite) => Box::new(SqliteStorage::new(&sqlite.path)),
        StorageConfig::Redis(redis) => Box::new(RedisStorage::new(
            &redis.url,
            redis.namespace.clone(),
            redis.bloom(),
        )?),
    };

    tracing::info!("Using {} frontier storage", storage.backend_name());
    Ok(storage)
}
