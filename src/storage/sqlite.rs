//! SQLite storage implementation
//!
//! This module provides a single-file, crash-resumable implementation of the
//! StorageBackend trait. The connection is opened lazily on first use, at
//! which point the schema is created and older `queue` tables are migrated.

use crate::storage::schema::{initialize_schema, STATE_KEY};
use crate::storage::traits::{StorageBackend, StorageResult};
use crate::storage::types::{CrawlState, Lane, LaneSizes, QueueItem};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// SQLite storage backend
pub struct SqliteStorage {
    /// Database file, or None for a private in-memory database
    path: Option<PathBuf>,

    /// Lazily opened connection; None until first use or after `close`
    conn: Mutex<Option<Connection>>,
}

impl SqliteStorage {
    /// Creates a SqliteStorage backed by the file at `path`
    ///
    /// Nothing is opened or created until the first operation.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            conn: Mutex::new(None),
        }
    }

    /// Creates a SqliteStorage backed by a private in-memory database
    ///
    /// The data is lost when the connection is closed.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            conn: Mutex::new(None),
        }
    }

    /// Path of the database file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn open(&self) -> StorageResult<Connection> {
        let conn = match &self.path {
            Some(path) => {
                let conn = Connection::open(path)?;
                conn.execute_batch(
                    "
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = NORMAL;
                ",
                )?;
                conn
            }
            None => Connection::open_in_memory()?,
        };

        initialize_schema(&conn)?;

        tracing::debug!(
            "Opened SQLite frontier at {}",
            self.path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );

        Ok(conn)
    }

    /// Runs `f` against the connection, opening and initialising it first if needed
    ///
    /// The connection lock is held for the whole of `f`, so no other task can
    /// interleave statements with it.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send,
        T: Send,
    {
        let mut slot = self.conn.lock().await;
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.open()?,
        };
        let conn = slot.insert(conn);
        f(conn)
    }
}

/// SQL condition selecting the rows of one lane
fn lane_condition(lane: Lane) -> &'static str {
    match lane {
        Lane::High => "COALESCE(priority, 0) > 0",
        Lane::Normal => "COALESCE(priority, 0) = 0",
        Lane::Low => "COALESCE(priority, 0) < 0",
    }
}

/// Reads a queue row selected by `dequeue_sql`
fn decode_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        url: row.get(1)?,
        depth: row.get(2)?,
        priority: row.get(3)?,
        mission_id: row.get(4)?,
        mission_budget: row.get(5)?,
    })
}

/// Builds the dequeue query for a drain order: lane rank first, then FIFO by id
fn dequeue_sql(order: [Lane; 3]) -> String {
    format!(
        "SELECT id, url, depth, COALESCE(priority, 0), mission_id, mission_budget
         FROM queue
         ORDER BY CASE WHEN {} THEN 0 WHEN {} THEN 1 ELSE 2 END, id ASC
         LIMIT 1",
        lane_condition(order[0]),
        lane_condition(order[1]),
    )
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    // ===== Visited Set =====

    async fn is_visited(&self, url: &str) -> StorageResult<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM visited WHERE url = ?1", params![url], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn mark_visited(&self, url: &str, timestamp: f64) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO visited (url, timestamp) VALUES (?1, ?2)
                 ON CONFLICT(url) DO UPDATE SET timestamp = excluded.timestamp",
                params![url, timestamp],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_visit_time(&self, url: &str) -> StorageResult<Option<f64>> {
        self.with_conn(|conn| {
            let timestamp = conn
                .query_row(
                    "SELECT timestamp FROM visited WHERE url = ?1",
                    params![url],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(timestamp)
        })
        .await
    }

    // ===== Frontier Queue =====

    async fn enqueue(&self, item: QueueItem) -> StorageResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO queue (url, depth, priority, mission_id, mission_budget)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    item.url,
                    item.depth,
                    item.priority,
                    item.mission_id,
                    item.mission_budget
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn dequeue(&self, prefer_priority: Option<i64>) -> StorageResult<Option<QueueItem>> {
        let sql = dequeue_sql(Lane::drain_order(prefer_priority));

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            // Rows that no longer decode are removed so they cannot block the lane
            let item = loop {
                let row = tx
                    .query_row(&sql, [], |row| Ok((row.get::<_, i64>(0)?, decode_item(row))))
                    .optional()?;

                let Some((id, decoded)) = row else {
                    break None;
                };
                tx.execute("DELETE FROM queue WHERE id = ?1", params![id])?;

                match decoded {
                    Ok(item) => break Some(item),
                    Err(e) => tracing::warn!("Dropping undecodable queue row {}: {}", id, e),
                }
            };

            tx.commit()?;
            Ok(item)
        })
        .await
    }

    async fn lane_sizes(&self) -> StorageResult<LaneSizes> {
        self.with_conn(|conn| {
            let sizes = conn.query_row(
                &format!(
                    "SELECT
                        COALESCE(SUM(CASE WHEN {} THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN {} THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN {} THEN 1 ELSE 0 END), 0)
                     FROM queue",
                    lane_condition(Lane::High),
                    lane_condition(Lane::Normal),
                    lane_condition(Lane::Low),
                ),
                [],
                |row| {
                    Ok(LaneSizes {
                        high: row.get::<_, i64>(0)? as u64,
                        normal: row.get::<_, i64>(1)? as u64,
                        low: row.get::<_, i64>(2)? as u64,
                    })
                },
            )?;
            Ok(sizes)
        })
        .await
    }

    // ===== Domain Counters =====

    async fn get_domain_count(&self, domain: &str) -> StorageResult<u64> {
        self.with_conn(|conn| {
            let count: Option<i64> = conn
                .query_row(
                    "SELECT count FROM domain_counts WHERE domain = ?1",
                    params![domain],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count.unwrap_or(0) as u64)
        })
        .await
    }

    async fn increment_domain_count(&self, domain: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO domain_counts (domain, count) VALUES (?1, 1)
                 ON CONFLICT(domain) DO UPDATE SET count = count + 1",
                params![domain],
            )?;
            Ok(())
        })
        .await
    }

    // ===== Checkpointing =====

    async fn save_state(&self, state: &CrawlState) -> StorageResult<()> {
        let value = serde_json::to_string(state)?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![STATE_KEY, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_state(&self) -> StorageResult<Option<CrawlState>> {
        let value: Option<String> = self
            .with_conn(|conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM state WHERE key = ?1",
                        params![STATE_KEY],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    // ===== Lifecycle =====

    async fn clear(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "
                DELETE FROM visited;
                DELETE FROM queue;
                DELETE FROM domain_counts;
                DELETE FROM state;
            ",
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?;

        tracing::info!("Cleared SQLite frontier");
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close().map_err(|(_, e)| e)?;
            tracing::debug!("Closed SQLite frontier");
        }
        Ok(())
    }
}
