//! Redis storage implementation
//!
//! A shared frontier usable by many crawler processes at once. Every key is
//! prefixed with a namespace so independent crawls can share one deployment.
//! The visited set can optionally be fronted by a RedisBloom filter; if the
//! server lacks the module the backend falls back to an exact set for the
//! rest of its lifetime.

use crate::storage::traits::{StorageBackend, StorageResult};
use crate::storage::types::{CrawlState, Lane, LaneSizes, QueueItem};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::Mutex;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "drill";

/// Bloom filter sizing, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomConfig {
    /// Expected number of distinct visited URLs
    pub capacity: u64,

    /// Target false-positive rate, strictly between 0 and 1
    pub error_rate: f64,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000_000,
            error_rate: 0.001,
        }
    }
}

/// Which structure answers `is_visited`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipMode {
    /// Bloom filter is provisioned; a filter miss is confirmed against the
    /// timestamp hash, which also holds URLs written by degraded instances
    Bloom,

    /// Exact set, chosen at provisioning time
    ExactSet,

    /// Bloom writes failed after provisioning; the exact set takes over and
    /// the timestamp hash covers URLs only the filter knew about
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Unprovisioned,
    Ready(MembershipMode),
}

/// Fully qualified key names for one namespace
#[derive(Debug, Clone)]
struct Keys {
    visited_ts: String,
    visited_set: String,
    visited_bloom: String,
    queue_high: String,
    queue_normal: String,
    queue_low: String,
    domain_counts: String,
    state: String,
}

impl Keys {
    fn new(namespace: &str) -> Self {
        let key = |suffix: &str| format!("{}:{}", namespace, suffix);
        Self {
            visited_ts: key("visited_ts"),
            visited_set: key("visited_set"),
            visited_bloom: key("visited_bloom"),
            queue_high: key("queue_high"),
            queue_normal: key("queue_normal"),
            queue_low: key("queue_low"),
            domain_counts: key("domain_counts"),
            state: key("state"),
        }
    }

    /// Every key this namespace owns
    fn all(&self) -> [&str; 8] {
        [
            &self.visited_ts,
            &self.visited_set,
            &self.visited_bloom,
            &self.queue_high,
            &self.queue_normal,
            &self.queue_low,
            &self.domain_counts,
            &self.state,
        ]
    }

    fn lane(&self, lane: Lane) -> &str {
        match lane {
            Lane::High => &self.queue_high,
            Lane::Normal => &self.queue_normal,
            Lane::Low => &self.queue_low,
        }
    }
}

/// Redis storage backend
pub struct RedisStorage {
    client: Client,
    namespace: String,
    keys: Keys,
    bloom: Option<BloomConfig>,

    /// Lazily established connection; None until first use or after `close`
    conn: Mutex<Option<ConnectionManager>>,

    membership: Mutex<Membership>,
}

impl RedisStorage {
    /// Creates a RedisStorage for the given connection URL
    ///
    /// The URL is validated here, but no connection is made until the first
    /// operation. Passing `bloom` enables the Bloom filter path.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379/0")
    /// * `namespace` - Key prefix for this crawl
    /// * `bloom` - Bloom filter sizing, or None for an exact visited set
    pub fn new(
        redis_url: &str,
        namespace: impl Into<String>,
        bloom: Option<BloomConfig>,
    ) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let namespace = namespace.into();
        let keys = Keys::new(&namespace);

        Ok(Self {
            client,
            namespace,
            keys,
            bloom,
            conn: Mutex::new(None),
            membership: Mutex::new(Membership::Unprovisioned),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the structure currently answering `is_visited`
    ///
    /// Provisions the Bloom filter first if that has not happened yet.
    pub async fn membership_mode(&self) -> StorageResult<MembershipMode> {
        let mut conn = self.connection().await?;
        self.ensure_membership(&mut conn).await
    }

    async fn connection(&self) -> StorageResult<ConnectionManager> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = ConnectionManager::new(self.client.clone()).await?;
        tracing::debug!("Connected to Redis frontier (namespace {})", self.namespace);
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Decides the membership structure once per instance
    async fn ensure_membership(
        &self,
        conn: &mut ConnectionManager,
    ) -> StorageResult<MembershipMode> {
        let mut membership = self.membership.lock().await;
        if let Membership::Ready(mode) = *membership {
            return Ok(mode);
        }

        let mode = match self.bloom {
            None => MembershipMode::ExactSet,
            Some(bloom) => self.provision_bloom(conn, bloom).await?,
        };

        *membership = Membership::Ready(mode);
        Ok(mode)
    }

    async fn provision_bloom(
        &self,
        conn: &mut ConnectionManager,
        bloom: BloomConfig,
    ) -> StorageResult<MembershipMode> {
        let reserved: Result<(), RedisError> = redis::cmd("BF.RESERVE")
            .arg(&self.keys.visited_bloom)
            .arg(bloom.error_rate)
            .arg(bloom.capacity)
            .query_async(conn)
            .await;

        match reserved {
            Ok(()) => {
                tracing::info!(
                    "Provisioned Bloom filter {} (capacity {}, error rate {})",
                    self.keys.visited_bloom,
                    bloom.capacity,
                    bloom.error_rate
                );
                Ok(MembershipMode::Bloom)
            }
            Err(e) if is_transport_error(&e) => Err(e.into()),
            // Another process already reserved it
            Err(e) if e.to_string().to_lowercase().contains("item exists") => {
                tracing::debug!("Reusing existing Bloom filter {}", self.keys.visited_bloom);
                Ok(MembershipMode::Bloom)
            }
            Err(e) => {
                tracing::warn!(
                    "Bloom filter unavailable, using exact visited set instead: {}",
                    e
                );
                Ok(MembershipMode::ExactSet)
            }
        }
    }

    async fn degrade(&self) {
        *self.membership.lock().await = Membership::Ready(MembershipMode::Degraded);
    }
}

/// Errors that say nothing about server capabilities
fn is_transport_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

#[async_trait]
impl StorageBackend for RedisStorage {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    // ===== Visited Set =====

    async fn is_visited(&self, url: &str) -> StorageResult<bool> {
        let mut conn = self.connection().await?;

        let visited: bool = match self.ensure_membership(&mut conn).await? {
            MembershipMode::Bloom => {
                let in_filter: bool = redis::cmd("BF.EXISTS")
                    .arg(&self.keys.visited_bloom)
                    .arg(url)
                    .query_async(&mut conn)
                    .await?;
                if in_filter {
                    true
                } else {
                    conn.hexists(&self.keys.visited_ts, url).await?
                }
            }
            MembershipMode::ExactSet => conn.sismember(&self.keys.visited_set, url).await?,
            MembershipMode::Degraded => {
                let in_set: bool = conn.sismember(&self.keys.visited_set, url).await?;
                if in_set {
                    true
                } else {
                    conn.hexists(&self.keys.visited_ts, url).await?
                }
            }
        };

        Ok(visited)
    }

    async fn mark_visited(&self, url: &str, timestamp: f64) -> StorageResult<()> {
        let mut conn = self.connection().await?;

        match self.ensure_membership(&mut conn).await? {
            MembershipMode::Bloom => {
                let added: Result<bool, RedisError> = redis::cmd("BF.ADD")
                    .arg(&self.keys.visited_bloom)
                    .arg(url)
                    .query_async(&mut conn)
                    .await;

                match added {
                    Ok(_) => {}
                    Err(e) if is_transport_error(&e) => return Err(e.into()),
                    Err(e) => {
                        tracing::warn!(
                            "Bloom filter write failed, switching to exact visited set: {}",
                            e
                        );
                        self.degrade().await;
                        let _: () = conn.sadd(&self.keys.visited_set, url).await?;
                    }
                }
            }
            MembershipMode::ExactSet | MembershipMode::Degraded => {
                let _: () = conn.sadd(&self.keys.visited_set, url).await?;
            }
        }

        let _: () = conn.hset(&self.keys.visited_ts, url, timestamp).await?;
        Ok(())
    }

    async fn get_visit_time(&self, url: &str) -> StorageResult<Option<f64>> {
        let mut conn = self.connection().await?;
        let timestamp: Option<f64> = conn.hget(&self.keys.visited_ts, url).await?;
        Ok(timestamp)
    }

    // ===== Frontier Queue =====

    async fn enqueue(&self, item: QueueItem) -> StorageResult<()> {
        let payload = serde_json::to_string(&item)?;
        let mut conn = self.connection().await?;
        let _: () = conn.rpush(self.keys.lane(item.lane()), payload).await?;
        Ok(())
    }

    async fn dequeue(&self, prefer_priority: Option<i64>) -> StorageResult<Option<QueueItem>> {
        let mut conn = self.connection().await?;

        for lane in Lane::drain_order(prefer_priority) {
            let key = self.keys.lane(lane);
            loop {
                let raw: Option<Vec<u8>> = conn.lpop(key, None).await?;
                let Some(raw) = raw else {
                    break;
                };

                match serde_json::from_slice::<QueueItem>(&raw) {
                    Ok(item) => return Ok(Some(item)),
                    Err(e) => {
                        tracing::warn!(
                            "Dropping malformed entry from {} lane of {}: {}",
                            lane.as_str(),
                            self.namespace,
                            e
                        );
                    }
                }
            }
        }

        Ok(None)
    }

    async fn lane_sizes(&self) -> StorageResult<LaneSizes> {
        let mut conn = self.connection().await?;
        let (high, normal, low): (u64, u64, u64) = redis::pipe()
            .llen(&self.keys.queue_high)
            .llen(&self.keys.queue_normal)
            .llen(&self.keys.queue_low)
            .query_async(&mut conn)
            .await?;

        Ok(LaneSizes { high, normal, low })
    }

    // ===== Domain Counters =====

    async fn get_domain_count(&self, domain: &str) -> StorageResult<u64> {
        let mut conn = self.connection().await?;
        let count: Option<u64> = conn.hget(&self.keys.domain_counts, domain).await?;
        Ok(count.unwrap_or(0))
    }

    async fn increment_domain_count(&self, domain: &str) -> StorageResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.hincr(&self.keys.domain_counts, domain, 1).await?;
        Ok(())
    }

    // ===== Checkpointing =====

    async fn save_state(&self, state: &CrawlState) -> StorageResult<()> {
        let payload = serde_json::to_string(state)?;
        let mut conn = self.connection().await?;
        let _: () = conn.set(&self.keys.state, payload).await?;
        Ok(())
    }

    async fn load_state(&self) -> StorageResult<Option<CrawlState>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(&self.keys.state).await?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    // ===== Lifecycle =====

    async fn clear(&self) -> StorageResult<()> {
        let mut conn = self.connection().await?;

        // Exact key names only; a namespace may contain glob characters or
        // be a prefix of another namespace's keys
        let keys = self.keys.all();
        let removed: u64 = conn.del(&keys[..]).await?;

        // The filter is gone; provision again on next use
        if self.bloom.is_some() {
            *self.membership.lock().await = Membership::Unprovisioned;
        }

        tracing::info!(
            "Cleared Redis frontier {} ({} keys removed)",
            self.namespace,
            removed
        );
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        if self.conn.lock().await.take().is_some() {
            tracing::debug!("Closed Redis frontier connection ({})", self.namespace);
        }
        Ok(())
    }
}
