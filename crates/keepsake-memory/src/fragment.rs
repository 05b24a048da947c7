use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use keepsake_core::{ChildId, FragmentId, SessionId};

use crate::db::{self, Database};

/// Limit applied to session listings when the caller gives none.
pub const DEFAULT_SESSION_LIMIT: usize = 50;
/// Limit applied to per-child listings when the caller gives none.
pub const DEFAULT_CHILD_LIMIT: usize = 100;

/// Importance assigned when the caller does not score a fragment.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

/// A short-term memory row: one exchange worth of session context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFragment {
    pub fragment_id: FragmentId,
    pub session_id: SessionId,
    pub child_id: ChildId,
    pub content: String,
    pub importance_score: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Short-term tier. High churn, no dedupe; rows expire after the
/// configured TTL and the retention sweeper deletes them.
#[derive(Clone)]
pub struct FragmentStore {
    db: Database,
    ttl: chrono::Duration,
}

impl FragmentStore {
    pub fn new(db: Database, ttl: chrono::Duration) -> Self {
        Self { db, ttl }
    }

    /// Store one fragment. `expires_at` is fixed here at creation and
    /// never moves afterwards.
    pub fn create(
        &self,
        session_id: SessionId,
        child_id: ChildId,
        content: &str,
        importance: Option<f64>,
    ) -> keepsake_core::Result<MemoryFragment> {
        if content.is_empty() {
            return Err(keepsake_core::KeepsakeError::validation(
                "content",
                "must not be empty",
            ));
        }
        let importance = importance.unwrap_or(DEFAULT_IMPORTANCE);
        db::check_unit_range("importance_score", importance)?;

        let now = Utc::now();
        let fragment = MemoryFragment {
            fragment_id: Uuid::new_v4(),
            session_id,
            child_id,
            content: content.to_string(),
            importance_score: importance,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO memory_fragment
                 (fragment_id, session_id, child_id, content, importance_score, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                fragment.fragment_id.to_string(),
                fragment.session_id.to_string(),
                fragment.child_id.to_string(),
                fragment.content,
                fragment.importance_score,
                db::fmt_ts(fragment.created_at),
                db::fmt_ts(fragment.expires_at),
            ],
        )
        .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        debug!(fragment_id = %fragment.fragment_id, session_id = %session_id, "stored fragment");
        Ok(fragment)
    }

    /// Recent fragments for one session, newest first. No expiry filter:
    /// the session view keeps showing rows until the sweeper removes them.
    pub fn list_by_session(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> keepsake_core::Result<Vec<MemoryFragment>> {
        let conn = self.db.conn();
        let mut stmt = conn
            .prepare(
                "SELECT fragment_id, session_id, child_id, content, importance_score, created_at, expires_at
                 FROM memory_fragment
                 WHERE session_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        let rows = stmt
            .query_map(
                rusqlite::params![session_id.to_string(), limit as i64],
                row_to_fragment,
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Non-expired fragments for one child, most important first, then
    /// newest first within equal importance.
    pub fn list_by_child(
        &self,
        child_id: ChildId,
        limit: usize,
    ) -> keepsake_core::Result<Vec<MemoryFragment>> {
        let now = db::fmt_ts(Utc::now());
        let conn = self.db.conn();
        let mut stmt = conn
            .prepare(
                "SELECT fragment_id, session_id, child_id, content, importance_score, created_at, expires_at
                 FROM memory_fragment
                 WHERE child_id = ?1 AND expires_at > ?2
                 ORDER BY importance_score DESC, created_at DESC
                 LIMIT ?3",
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        let rows = stmt
            .query_map(
                rusqlite::params![child_id.to_string(), now, limit as i64],
                row_to_fragment,
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Delete fragments whose TTL has passed. Returns the number removed.
    /// Safe to call repeatedly and concurrently.
    pub fn sweep_expired(&self) -> keepsake_core::Result<usize> {
        let now = db::fmt_ts(Utc::now());
        let conn = self.db.conn();
        let removed = conn
            .execute(
                "DELETE FROM memory_fragment WHERE expires_at < ?1",
                rusqlite::params![now],
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        if removed > 0 {
            debug!(removed, "swept expired fragments");
        }
        Ok(removed)
    }
}

fn row_to_fragment(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryFragment> {
    Ok(MemoryFragment {
        fragment_id: db::parse_uuid(0, &row.get::<_, String>(0)?)?,
        session_id: db::parse_uuid(1, &row.get::<_, String>(1)?)?,
        child_id: db::parse_uuid(2, &row.get::<_, String>(2)?)?,
        content: row.get(3)?,
        importance_score: row.get(4)?,
        created_at: db::parse_ts(5, &row.get::<_, String>(5)?)?,
        expires_at: db::parse_ts(6, &row.get::<_, String>(6)?)?,
    })
}
