//! In-process storage implementation
//!
//! Nothing survives the process. Intended for short-lived crawls and tests.

use crate::storage::traits::{StorageBackend, StorageResult};
use crate::storage::types::{CrawlState, Lane, LaneSizes, QueueItem};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryInner {
    visited: HashMap<String, f64>,
    high: VecDeque<QueueItem>,
    normal: VecDeque<QueueItem>,
    low: VecDeque<QueueItem>,
    domain_counts: HashMap<String, u64>,
    state: Option<CrawlState>,
}

impl MemoryInner {
    fn lane_mut(&mut self, lane: Lane) -> &mut VecDeque<QueueItem> {
        match lane {
            Lane::High => &mut self.high,
            Lane::Normal => &mut self.normal,
            Lane::Low => &mut self.low,
        }
    }
}

/// Volatile storage backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

impl MemoryStorage {
    /// Creates an empty MemoryStorage
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every visited URL
    pub async fn visited_urls(&self) -> HashSet<String> {
        self.inner.lock().await.visited.keys().cloned().collect()
    }

    /// Returns a copy of every domain counter
    pub async fn domain_counts(&self) -> HashMap<String, u64> {
        self.inner.lock().await.domain_counts.clone()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn is_visited(&self, url: &str) -> StorageResult<bool> {
        Ok(self.inner.lock().await.visited.contains_key(url))
    }

    async fn mark_visited(&self, url: &str, timestamp: f64) -> StorageResult<()> {
        self.inner
            .lock()
            .await
            .visited
            .insert(url.to_string(), timestamp);
        Ok(())
    }

    async fn get_visit_time(&self, url: &str) -> StorageResult<Option<f64>> {
        Ok(self.inner.lock().await.visited.get(url).copied())
    }

    async fn enqueue(&self, item: QueueItem) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        inner.lane_mut(item.lane()).push_back(item);
        Ok(())
    }

    async fn dequeue(&self, prefer_priority: Option<i64>) -> StorageResult<Option<QueueItem>> {
        let mut inner = self.inner.lock().await;
        for lane in Lane::drain_order(prefer_priority) {
            if let Some(item) = inner.lane_mut(lane).pop_front() {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    async fn lane_sizes(&self) -> StorageResult<LaneSizes> {
        let mut inner = self.inner.lock().await;
        let mut sizes = LaneSizes::default();
        for lane in Lane::ALL {
            sizes.add(lane, inner.lane_mut(lane).len() as u64);
        }
        Ok(sizes)
    }

    async fn get_domain_count(&self, domain: &str) -> StorageResult<u64> {
        Ok(self
            .inner
            .lock()
            .await
            .domain_counts
            .get(domain)
            .copied()
            .unwrap_or(0))
    }

    async fn increment_domain_count(&self, domain: &str) -> StorageResult<()> {
        *self
            .inner
            .lock()
            .await
            .domain_counts
            .entry(domain.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn save_state(&self, state: &CrawlState) -> StorageResult<()> {
        self.inner.lock().await.state = Some(state.clone());
        Ok(())
    }

    async fn load_state(&self) -> StorageResult<Option<CrawlState>> {
        Ok(self.inner.lock().await.state.clone())
    }

    async fn clear(&self) -> StorageResult<()> {
        *self.inner.lock().await = MemoryInner::default();
        tracing::info!("Cleared memory storage");
        Ok(())
    }
}
