use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use keepsake_core::{ChildId, EmbeddingId, SourceType};

use crate::db::{self, Database};
use crate::similarity::{self, SimilarityIndex};

/// Limit applied to per-child listings when the caller gives none.
pub const DEFAULT_LIST_LIMIT: usize = 100;
/// Result count for similarity searches when the caller gives none.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Longest content preview stored with an embedding.
pub const MAX_PREVIEW_CHARS: usize = 256;

/// A long-term memory row: a vector-indexed fact about one child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEmbedding {
    pub embedding_id: EmbeddingId,
    pub child_id: ChildId,
    pub content_hash: String,
    pub content_preview: String,
    pub embedding_vector: Vec<f32>,
    pub source_type: SourceType,
    pub source_id: String,
    pub relevance_score: f64,
    pub access_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Caller-supplied fields for storing a new long-term memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmbedding {
    pub child_id: ChildId,
    pub content_hash: String,
    pub content_preview: String,
    pub embedding_vector: Vec<f32>,
    pub source_type: SourceType,
    pub source_id: String,
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

/// Whether a create stored a fresh row or resolved to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Inserted,
    Deduplicated,
}

/// Long-term tier. Child-scoped, deduplicated on (child_id, content_hash),
/// swept after the configured TTL.
#[derive(Clone)]
pub struct EmbeddingStore {
    db: Database,
    ttl: chrono::Duration,
    index: SimilarityIndex,
}

impl EmbeddingStore {
    pub fn new(db: Database, ttl: chrono::Duration) -> Self {
        Self {
            db,
            ttl,
            index: SimilarityIndex::new(),
        }
    }

    /// Store a long-term memory, deduplicating on (child_id, content_hash).
    ///
    /// The insert leans on the UNIQUE constraint: when a row for the pair
    /// already exists the insert is a no-op and the existing row comes back
    /// unchanged. Validation runs before anything touches the database.
    pub fn create(
        &self,
        new: NewEmbedding,
    ) -> keepsake_core::Result<(MemoryEmbedding, CreateOutcome)> {
        if new.content_hash.is_empty() {
            return Err(keepsake_core::KeepsakeError::validation(
                "content_hash",
                "must not be empty",
            ));
        }
        if new.content_preview.is_empty() {
            return Err(keepsake_core::KeepsakeError::validation(
                "content_preview",
                "must not be empty",
            ));
        }
        if new.source_id.is_empty() {
            return Err(keepsake_core::KeepsakeError::validation(
                "source_id",
                "must not be empty",
            ));
        }
        if new.embedding_vector.is_empty() {
            return Err(keepsake_core::KeepsakeError::validation(
                "embedding_vector",
                "must not be empty",
            ));
        }
        let relevance = new.relevance_score.unwrap_or(0.0);
        db::check_unit_range("relevance_score", relevance)?;

        let conn = self.db.conn();

        // The first row stored for a child fixes that child's vector
        // dimension; later writes must match it.
        if let Some(dims) = child_dims(&conn, new.child_id)? {
            if dims != new.embedding_vector.len() {
                return Err(keepsake_core::KeepsakeError::validation(
                    "embedding_vector",
                    format!(
                        "expected {dims} dimensions for this child, got {}",
                        new.embedding_vector.len()
                    ),
                ));
            }
        }

        let now = Utc::now();
        let embedding_id = Uuid::new_v4();
        let preview: String = new.content_preview.chars().take(MAX_PREVIEW_CHARS).collect();
        let blob = similarity::vector_to_bytes(&new.embedding_vector);

        let inserted = conn
            .execute(
                "INSERT INTO memory_embedding
                     (embedding_id, child_id, content_hash, content_preview, embedding_vector,
                      source_type, source_id, relevance_score, access_count, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10)
                 ON CONFLICT(child_id, content_hash) DO NOTHING",
                rusqlite::params![
                    embedding_id.to_string(),
                    new.child_id.to_string(),
                    new.content_hash,
                    preview,
                    blob,
                    new.source_type.as_str(),
                    new.source_id,
                    relevance,
                    db::fmt_ts(now),
                    db::fmt_ts(now + self.ttl),
                ],
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        // The row for the pair exists either way now; fetch it under the
        // same lock so concurrent creators all observe the same row.
        let row = fetch_by_hash(&conn, new.child_id, &new.content_hash)?.ok_or_else(|| {
            keepsake_core::KeepsakeError::Backing("embedding row missing after insert".into())
        })?;

        if inserted == 0 {
            debug!(
                embedding_id = %row.embedding_id,
                child_id = %new.child_id,
                "duplicate content hash resolved to existing embedding"
            );
            Ok((row, CreateOutcome::Deduplicated))
        } else {
            debug!(embedding_id = %row.embedding_id, child_id = %new.child_id, "stored embedding");
            Ok((row, CreateOutcome::Inserted))
        }
    }

    /// Fetch a single embedding by id.
    pub fn get(&self, id: EmbeddingId) -> keepsake_core::Result<MemoryEmbedding> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT embedding_id, child_id, content_hash, content_preview, embedding_vector,
                        source_type, source_id, relevance_score, access_count, last_accessed_at,
                        created_at, expires_at
                 FROM memory_embedding
                 WHERE embedding_id = ?1",
                rusqlite::params![id.to_string()],
                row_to_embedding,
            )
            .optional()
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        row.ok_or(keepsake_core::KeepsakeError::NotFound(id))
    }

    /// Look up a memory by its dedupe key. `None` means the content has
    /// not been stored for this child, so the caller still needs to embed it.
    pub fn find_by_content_hash(
        &self,
        child_id: ChildId,
        content_hash: &str,
    ) -> keepsake_core::Result<Option<MemoryEmbedding>> {
        let conn = self.db.conn();
        fetch_by_hash(&conn, child_id, content_hash)
    }

    /// Non-expired memories for one child, strongest relevance first.
    /// Rows never accessed sort after rows with an access timestamp.
    pub fn list_by_child(
        &self,
        child_id: ChildId,
        limit: usize,
    ) -> keepsake_core::Result<Vec<MemoryEmbedding>> {
        let now = db::fmt_ts(Utc::now());
        let conn = self.db.conn();
        let mut stmt = conn
            .prepare(
                "SELECT embedding_id, child_id, content_hash, content_preview, embedding_vector,
                        source_type, source_id, relevance_score, access_count, last_accessed_at,
                        created_at, expires_at
                 FROM memory_embedding
                 WHERE child_id = ?1 AND expires_at > ?2
                 ORDER BY relevance_score DESC, last_accessed_at IS NULL, last_accessed_at DESC
                 LIMIT ?3",
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        let rows = stmt
            .query_map(
                rusqlite::params![child_id.to_string(), now, limit as i64],
                row_to_embedding,
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Rank one child's non-expired memories against a query vector.
    /// Only that child's rows are ever considered.
    pub fn find_similar(
        &self,
        child_id: ChildId,
        query: &[f32],
        k: usize,
    ) -> keepsake_core::Result<Vec<MemoryEmbedding>> {
        if query.is_empty() {
            return Err(keepsake_core::KeepsakeError::validation(
                "query_vector",
                "must not be empty",
            ));
        }

        let candidates: Vec<MemoryEmbedding> = {
            let now = db::fmt_ts(Utc::now());
            let conn = self.db.conn();
            let mut stmt = conn
                .prepare(
                    "SELECT embedding_id, child_id, content_hash, content_preview, embedding_vector,
                            source_type, source_id, relevance_score, access_count, last_accessed_at,
                            created_at, expires_at
                     FROM memory_embedding
                     WHERE child_id = ?1 AND expires_at > ?2",
                )
                .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![child_id.to_string(), now],
                    row_to_embedding,
                )
                .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        Ok(self.index.rank(query, candidates, k))
    }

    /// Overwrite the relevance score and touch `last_accessed_at`.
    /// The access counter is left alone.
    pub fn update_relevance(
        &self,
        id: EmbeddingId,
        score: f64,
    ) -> keepsake_core::Result<MemoryEmbedding> {
        db::check_unit_range("relevance_score", score)?;

        let now = db::fmt_ts(Utc::now());
        let conn = self.db.conn();
        let changed = conn
            .execute(
                "UPDATE memory_embedding
                 SET relevance_score = ?1, last_accessed_at = ?2
                 WHERE embedding_id = ?3",
                rusqlite::params![score, now, id.to_string()],
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        if changed == 0 {
            return Err(keepsake_core::KeepsakeError::NotFound(id));
        }

        debug!(embedding_id = %id, score, "updated embedding relevance");

        conn.query_row(
            "SELECT embedding_id, child_id, content_hash, content_preview, embedding_vector,
                    source_type, source_id, relevance_score, access_count, last_accessed_at,
                    created_at, expires_at
             FROM memory_embedding
             WHERE embedding_id = ?1",
            rusqlite::params![id.to_string()],
            row_to_embedding,
        )
        .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))
    }

    /// Bump the access counter and touch `last_accessed_at`. The increment
    /// happens inside SQLite, so concurrent callers never lose updates.
    pub fn record_access(&self, id: EmbeddingId) -> keepsake_core::Result<()> {
        let now = db::fmt_ts(Utc::now());
        let conn = self.db.conn();
        let changed = conn
            .execute(
                "UPDATE memory_embedding
                 SET access_count = access_count + 1, last_accessed_at = ?1
                 WHERE embedding_id = ?2",
                rusqlite::params![now, id.to_string()],
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        if changed == 0 {
            return Err(keepsake_core::KeepsakeError::NotFound(id));
        }
        Ok(())
    }

    /// Delete embeddings whose TTL has passed. Returns the number removed.
    /// Safe to call repeatedly and concurrently.
    pub fn sweep_expired(&self) -> keepsake_core::Result<usize> {
        let now = db::fmt_ts(Utc::now());
        let conn = self.db.conn();
        let removed = conn
            .execute(
                "DELETE FROM memory_embedding WHERE expires_at < ?1",
                rusqlite::params![now],
            )
            .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

        if removed > 0 {
            debug!(removed, "swept expired embeddings");
        }
        Ok(removed)
    }
}

/// Byte length of the first stored vector for a child, in dimensions.
fn child_dims(
    conn: &rusqlite::Connection,
    child_id: ChildId,
) -> keepsake_core::Result<Option<usize>> {
    let bytes: Option<i64> = conn
        .query_row(
            "SELECT length(embedding_vector) FROM memory_embedding WHERE child_id = ?1 LIMIT 1",
            rusqlite::params![child_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))?;

    Ok(bytes.map(|b| b as usize / 4))
}

fn fetch_by_hash(
    conn: &rusqlite::Connection,
    child_id: ChildId,
    content_hash: &str,
) -> keepsake_core::Result<Option<MemoryEmbedding>> {
    conn.query_row(
        "SELECT embedding_id, child_id, content_hash, content_preview, embedding_vector,
                source_type, source_id, relevance_score, access_count, last_accessed_at,
                created_at, expires_at
         FROM memory_embedding
         WHERE child_id = ?1 AND content_hash = ?2",
        rusqlite::params![child_id.to_string(), content_hash],
        row_to_embedding,
    )
    .optional()
    .map_err(|e| keepsake_core::KeepsakeError::Backing(e.to_string()))
}

fn row_to_embedding(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryEmbedding> {
    let source_raw: String = row.get(5)?;
    let source_type = source_raw.parse::<SourceType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let last_accessed_at = match row.get::<_, Option<String>>(9)? {
        Some(raw) => Some(db::parse_ts(9, &raw)?),
        None => None,
    };

    Ok(MemoryEmbedding {
        embedding_id: db::parse_uuid(0, &row.get::<_, String>(0)?)?,
        child_id: db::parse_uuid(1, &row.get::<_, String>(1)?)?,
        content_hash: row.get(2)?,
        content_preview: row.get(3)?,
        embedding_vector: similarity::bytes_to_vector(&row.get::<_, Vec<u8>>(4)?),
        source_type,
        source_id: row.get(6)?,
        relevance_score: row.get(7)?,
        access_count: row.get::<_, i64>(8)? as u64,
        last_accessed_at,
        created_at: db::parse_ts(10, &row.get::<_, String>(10)?)?,
        expires_at: db::parse_ts(11, &row.get::<_, String>(11)?)?,
    })
}
