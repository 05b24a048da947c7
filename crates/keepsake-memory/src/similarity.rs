//! Vector math for the long-term tier.
//!
//! Vectors are stored as little-endian f32 blobs and compared with cosine
//! similarity. Ranking is a straight scan over one child's rows, which is
//! plenty for per-child collections capped by TTL sweeps.

use crate::embedding::MemoryEmbedding;

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when the lengths differ or either vector has zero magnitude,
/// so degenerate inputs rank last instead of poisoning the sort with NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Encode a vector as a little-endian f32 blob.
pub(crate) fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob. Trailing bytes that do not fill a
/// whole f32 are ignored.
pub(crate) fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Ranks candidate embeddings against a query vector.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex;

impl SimilarityIndex {
    pub fn new() -> Self {
        Self
    }

    /// Score candidates against the query and return the top `k`.
    ///
    /// Candidates whose dimension differs from the query are skipped.
    /// Score ties break on relevance, then on most recent access.
    pub fn rank(
        &self,
        query: &[f32],
        candidates: Vec<MemoryEmbedding>,
        k: usize,
    ) -> Vec<MemoryEmbedding> {
        let mut scored: Vec<(f32, MemoryEmbedding)> = candidates
            .into_iter()
            .filter(|c| c.embedding_vector.len() == query.len())
            .map(|c| (cosine_similarity(query, &c.embedding_vector), c))
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| b.1.relevance_score.total_cmp(&a.1.relevance_score))
                .then_with(|| b.1.last_accessed_at.cmp(&a.1.last_accessed_at))
        });

        let mut ranked: Vec<MemoryEmbedding> = scored.into_iter().map(|(_, c)| c).collect();
        ranked.truncate(k);
        ranked
    }
}
