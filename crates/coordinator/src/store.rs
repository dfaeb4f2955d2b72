//! Durable coordinator store
//!
//! The registry treats persistence as an external collaborator behind
//! [`CoordinatorStore`]. Two backends are provided:
//!
//! - [`SqliteCoordinatorStore`]: the production table
//! - [`InMemoryCoordinatorStore`]: for tests and embedding
//!
//! Writes report affected row counts rather than success flags so the
//! facade can tell a no-op apart from a real change.

use crate::record::CoordinatorRecord;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use qgate_common::error::Result;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Persistence interface for coordinator records
#[async_trait]
pub trait CoordinatorStore: Send + Sync {
    /// Records currently marked active, in registration order
    async fn list_active_coordinators(&self) -> Result<Vec<CoordinatorRecord>>;

    /// Insert a record; returns rows affected (0 if the key already exists)
    async fn insert_coordinator(&self, record: &CoordinatorRecord) -> Result<usize>;

    /// Delete by key; returns rows affected
    async fn delete_coordinator(&self, host: &str, port: u16) -> Result<usize>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite-backed coordinator table
///
/// Statements run on the blocking pool behind a single connection.
#[derive(Clone)]
pub struct SqliteCoordinatorStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCoordinatorStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "Coordinator store opened");
        Ok(store)
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS coordinator (
                    host TEXT NOT NULL,
                    port INTEGER NOT NULL,
                    active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (host, port)
                );
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Flip the stored liveness of a coordinator; returns rows affected
    ///
    /// Used by the external health monitor. Inactive rows are skipped by
    /// the next reload.
    pub async fn set_active(&self, host: &str, port: u16, active: bool) -> Result<usize> {
        let host = host.to_string();
        self.run(move |conn| {
            let count = conn.execute(
                "UPDATE coordinator SET active = ?1 WHERE host = ?2 AND port = ?3",
                params![active, host, port],
            )?;
            Ok(count)
        })
        .await
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl CoordinatorStore for SqliteCoordinatorStore {
    async fn list_active_coordinators(&self) -> Result<Vec<CoordinatorRecord>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT host, port, active FROM coordinator WHERE active = 1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(CoordinatorRecord {
                    host: row.get(0)?,
                    port: row.get(1)?,
                    active: row.get(2)?,
                })
            })?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
    }

    async fn insert_coordinator(&self, record: &CoordinatorRecord) -> Result<usize> {
        let record = record.clone();
        self.run(move |conn| {
            let count = conn.execute(
                "INSERT OR IGNORE INTO coordinator (host, port, active, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![record.host, record.port, record.active, Utc::now().to_rfc3339()],
            )?;
            Ok(count)
        })
        .await
    }

    async fn delete_coordinator(&self, host: &str, port: u16) -> Result<usize> {
        let host = host.to_string();
        self.run(move |conn| {
            let count = conn.execute(
                "DELETE FROM coordinator WHERE host = ?1 AND port = ?2",
                params![host, port],
            )?;
            Ok(count)
        })
        .await
    }
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// Store backed by a `Vec`, keyed like the SQLite table
#[derive(Debug, Default)]
pub struct InMemoryCoordinatorStore {
    rows: Mutex<Vec<CoordinatorRecord>>,
}

impl InMemoryCoordinatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `records`
    pub fn with_records(records: Vec<CoordinatorRecord>) -> Self {
        Self {
            rows: Mutex::new(records),
        }
    }

    pub fn contains(&self, host: &str, port: u16) -> bool {
        self.rows.lock().iter().any(|r| r.matches(host, port))
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CoordinatorStore for InMemoryCoordinatorStore {
    async fn list_active_coordinators(&self) -> Result<Vec<CoordinatorRecord>> {
        Ok(self.rows.lock().iter().filter(|r| r.active).cloned().collect())
    }

    async fn insert_coordinator(&self, record: &CoordinatorRecord) -> Result<usize> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|r| r == record) {
            return Ok(0);
        }
        rows.push(record.clone());
        Ok(1)
    }

    async fn delete_coordinator(&self, host: &str, port: u16) -> Result<usize> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| !r.matches(host, port));
        Ok(before - rows.len())
    }
}
