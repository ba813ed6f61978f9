//! Storage traits and error types
//!
//! This module defines the contract every frontier backend implements and
//! the associated error types.

use crate::storage::types::{now_timestamp, CrawlState, LaneSizes, QueueItem};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for frontier storage backends
///
/// A crawl driver holds one `Box<dyn StorageBackend>` (or a concrete backend)
/// and stays agnostic of the engine behind it. No operation retries on
/// failure; retry policy belongs to the caller.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short engine name used in logs
    fn backend_name(&self) -> &'static str;

    // ===== Visited Set =====

    /// Returns true if `url` has been passed to `mark_visited`
    async fn is_visited(&self, url: &str) -> StorageResult<bool>;

    /// Records `url` as visited at `timestamp` (seconds since the epoch)
    ///
    /// Marking an already visited URL overwrites its timestamp.
    async fn mark_visited(&self, url: &str, timestamp: f64) -> StorageResult<()>;

    /// Gets the stored visit timestamp, if any
    async fn get_visit_time(&self, url: &str) -> StorageResult<Option<f64>>;

    /// Records `url` as visited now
    async fn mark_visited_now(&self, url: &str) -> StorageResult<()> {
        self.mark_visited(url, now_timestamp()).await
    }

    // ===== Frontier Queue =====

    /// Appends an item to the tail of the lane chosen by its priority sign
    ///
    /// No uniqueness check is made.
    async fn enqueue(&self, item: QueueItem) -> StorageResult<()>;

    /// Removes and returns the oldest item of the first non-empty lane
    ///
    /// Lane order follows [`crate::storage::Lane::drain_order`].
    async fn dequeue(&self, prefer_priority: Option<i64>) -> StorageResult<Option<QueueItem>>;

    /// Live item counts per lane
    async fn lane_sizes(&self) -> StorageResult<LaneSizes>;

    /// Total number of queued items across all lanes
    async fn queue_size(&self) -> StorageResult<u64> {
        Ok(self.lane_sizes().await?.total())
    }

    // ===== Domain Counters =====

    /// Gets the request count for a domain (0 if never seen)
    async fn get_domain_count(&self, domain: &str) -> StorageResult<u64>;

    /// Increments the request count for a domain by one
    async fn increment_domain_count(&self, domain: &str) -> StorageResult<()>;

    // ===== Checkpointing =====

    /// Replaces the stored crawl state
    async fn save_state(&self, state: &CrawlState) -> StorageResult<()>;

    /// Loads the last saved crawl state, or None if nothing was saved yet
    async fn load_state(&self) -> StorageResult<Option<CrawlState>>;

    // ===== Lifecycle =====

    /// Empties the visited set, all lanes, domain counters and state
    async fn clear(&self) -> StorageResult<()>;

    /// Releases any underlying connection
    ///
    /// A later operation re-opens it.
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
