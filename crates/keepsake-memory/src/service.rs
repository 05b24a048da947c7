use serde::Serialize;
use tracing::{info, warn};

use keepsake_core::{ChildId, EmbeddingId, SessionId};

use crate::embedding::{
    CreateOutcome, DEFAULT_LIST_LIMIT, DEFAULT_SEARCH_LIMIT, EmbeddingStore, MemoryEmbedding,
    NewEmbedding,
};
use crate::fragment::{DEFAULT_CHILD_LIMIT, DEFAULT_SESSION_LIMIT, FragmentStore, MemoryFragment};

/// Counts from one retention sweep across both tiers.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    pub fragments_removed: usize,
    pub embeddings_removed: usize,
}

/// Facade over both memory tiers.
///
/// Holds no state of its own beyond the injected stores; the server and
/// CLI each build one from the stores they configured. Cloning is cheap,
/// every clone talks to the same database handle.
#[derive(Clone)]
pub struct MemoryService {
    fragments: FragmentStore,
    embeddings: EmbeddingStore,
}

impl MemoryService {
    pub fn new(fragments: FragmentStore, embeddings: EmbeddingStore) -> Self {
        Self {
            fragments,
            embeddings,
        }
    }

    // ── Short-term tier ──────────────────────────────────────────────

    pub fn create_fragment(
        &self,
        session_id: SessionId,
        child_id: ChildId,
        content: &str,
        importance: Option<f64>,
    ) -> keepsake_core::Result<MemoryFragment> {
        self.fragments.create(session_id, child_id, content, importance)
    }

    pub fn fragments_by_session(
        &self,
        session_id: SessionId,
        limit: Option<usize>,
    ) -> keepsake_core::Result<Vec<MemoryFragment>> {
        self.fragments
            .list_by_session(session_id, limit.unwrap_or(DEFAULT_SESSION_LIMIT))
    }

    pub fn fragments_by_child(
        &self,
        child_id: ChildId,
        limit: Option<usize>,
    ) -> keepsake_core::Result<Vec<MemoryFragment>> {
        self.fragments
            .list_by_child(child_id, limit.unwrap_or(DEFAULT_CHILD_LIMIT))
    }

    // ── Long-term tier ───────────────────────────────────────────────

    pub fn create_embedding(
        &self,
        new: NewEmbedding,
    ) -> keepsake_core::Result<(MemoryEmbedding, CreateOutcome)> {
        self.embeddings.create(new)
    }

    pub fn embedding(&self, id: EmbeddingId) -> keepsake_core::Result<MemoryEmbedding> {
        self.embeddings.get(id)
    }

    pub fn embeddings_by_child(
        &self,
        child_id: ChildId,
        limit: Option<usize>,
    ) -> keepsake_core::Result<Vec<MemoryEmbedding>> {
        self.embeddings
            .list_by_child(child_id, limit.unwrap_or(DEFAULT_LIST_LIMIT))
    }

    pub fn find_similar(
        &self,
        child_id: ChildId,
        query: &[f32],
        k: Option<usize>,
    ) -> keepsake_core::Result<Vec<MemoryEmbedding>> {
        self.embeddings
            .find_similar(child_id, query, k.unwrap_or(DEFAULT_SEARCH_LIMIT))
    }

    pub fn update_relevance(
        &self,
        id: EmbeddingId,
        score: f64,
    ) -> keepsake_core::Result<MemoryEmbedding> {
        self.embeddings.update_relevance(id, score)
    }

    pub fn record_access(&self, id: EmbeddingId) -> keepsake_core::Result<()> {
        self.embeddings.record_access(id)
    }

    /// Look up a memory by its dedupe key.
    pub fn embedding_by_content_hash(
        &self,
        child_id: ChildId,
        content_hash: &str,
    ) -> keepsake_core::Result<Option<MemoryEmbedding>> {
        self.embeddings.find_by_content_hash(child_id, content_hash)
    }

    /// Whether content with this hash is already remembered for the child.
    /// Lets callers skip embedding inference for known content.
    pub fn embedding_exists(
        &self,
        child_id: ChildId,
        content_hash: &str,
    ) -> keepsake_core::Result<bool> {
        Ok(self
            .embedding_by_content_hash(child_id, content_hash)?
            .is_some())
    }

    // ── Retention ────────────────────────────────────────────────────

    pub fn sweep_expired_fragments(&self) -> keepsake_core::Result<usize> {
        self.fragments.sweep_expired()
    }

    pub fn sweep_expired_embeddings(&self) -> keepsake_core::Result<usize> {
        self.embeddings.sweep_expired()
    }

    /// Sweep both tiers. Each tier is attempted even when the other
    /// fails; the first failure is reported after both have run.
    pub fn sweep_expired(&self) -> keepsake_core::Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut first_err = None;

        match self.fragments.sweep_expired() {
            Ok(removed) => report.fragments_removed = removed,
            Err(e) => {
                warn!(error = %e, "fragment sweep failed");
                first_err = Some(e);
            }
        }

        match self.embeddings.sweep_expired() {
            Ok(removed) => report.embeddings_removed = removed,
            Err(e) => {
                warn!(error = %e, "embedding sweep failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }

        if report.fragments_removed > 0 || report.embeddings_removed > 0 {
            info!(
                fragments = report.fragments_removed,
                embeddings = report.embeddings_removed,
                "retention sweep complete"
            );
        }
        Ok(report)
    }
}
