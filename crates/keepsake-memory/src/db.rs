use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Shared handle to the SQLite database backing both memory tiers.
///
/// Clones share one connection behind a mutex; SQLite serializes writes
/// anyway, and per-child row counts are small enough that a pool would
/// buy nothing here.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the memory database at the given path.
    pub fn open(path: &Path) -> keepsake_core::Result<Self> {
        info!(?path, "opening memory database");

        let conn = Connection::open(path)
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        // Create tables
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS memory_fragment (
                fragment_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                child_id TEXT NOT NULL,
                content TEXT NOT NULL,
                importance_score REAL NOT NULL DEFAULT 0.5,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS memory_embedding (
                embedding_id TEXT PRIMARY KEY,
                child_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                content_preview TEXT NOT NULL,
                embedding_vector BLOB NOT NULL,
                source_type TEXT NOT NULL,
                source_id TEXT NOT NULL,
                relevance_score REAL NOT NULL DEFAULT 0.0,
                access_count INTEGER NOT NULL DEFAULT 0,
                last_accessed_at TEXT,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                UNIQUE(child_id, content_hash)
            );

            CREATE INDEX IF NOT EXISTS idx_fragment_session ON memory_fragment(session_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_fragment_child ON memory_fragment(child_id, expires_at);
            CREATE INDEX IF NOT EXISTS idx_embedding_child ON memory_embedding(child_id, expires_at);
            ",
        )
        .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> keepsake_core::Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Get a reference to the raw connection (for advanced queries).
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// Format a timestamp for storage. Fixed-width UTC, so lexicographic
/// comparison in SQL matches chronological comparison.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn parse_uuid(idx: usize, raw: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Validate that a score lies in [0, 1]. NaN fails the range check.
pub(crate) fn check_unit_range(field: &str, value: f64) -> keepsake_core::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(keepsake_core::KeepsakeError::validation(
            field,
            format!("must be between 0 and 1, got {value}"),
        ));
    }
    Ok(())
}
