//! Database schema definitions and migrations
//!
//! This module contains the SQL schema for the SQLite frontier database and
//! the in-place upgrade of `queue` tables written by older versions.

use crate::storage::traits::{StorageError, StorageResult};
use rusqlite::Connection;

/// Logical key under which the single crawl state blob is stored
pub const STATE_KEY: &str = "crawl_state";

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- URLs already processed
CREATE TABLE IF NOT EXISTS visited (
    url TEXT PRIMARY KEY,
    timestamp REAL NOT NULL
);

-- Pending frontier entries, FIFO by id within a priority lane
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    priority INTEGER DEFAULT 0,
    mission_id TEXT,
    mission_budget INTEGER
);

-- Per-domain request counters
CREATE TABLE IF NOT EXISTS domain_counts (
    domain TEXT PRIMARY KEY,
    count INTEGER NOT NULL DEFAULT 0
);

-- Crawl checkpoint (JSON)
CREATE TABLE IF NOT EXISTS state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Columns added to `queue` after its first release, with their definitions
const QUEUE_MIGRATIONS: &[(&str, &str)] = &[
    ("priority", "INTEGER DEFAULT 0"),
    ("mission_id", "TEXT"),
    ("mission_budget", "INTEGER"),
];

/// Initializes the database schema
///
/// Creates missing tables, then upgrades an existing `queue` table.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    migrate_queue_columns(conn)?;
    Ok(())
}

/// Adds any `queue` columns missing from an older database
///
/// Returns the names of the columns that were added.
pub fn migrate_queue_columns(conn: &Connection) -> StorageResult<Vec<&'static str>> {
    let existing = table_columns(conn, "queue")
        .map_err(|e| StorageError::Migration(format!("cannot inspect queue table: {}", e)))?;

    let mut added = Vec::new();
    for (column, definition) in QUEUE_MIGRATIONS {
        if existing.iter().any(|c| c == column) {
            continue;
        }

        conn.execute_batch(&format!(
            "ALTER TABLE queue ADD COLUMN {} {}",
            column, definition
        ))
        .map_err(|e| StorageError::Migration(format!("cannot add queue.{}: {}", column, e)))?;

        tracing::info!("Migrated queue table: added column {}", column);
        added.push(*column);
    }

    Ok(added)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}
