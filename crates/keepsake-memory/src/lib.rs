//! # keepsake-memory
//!
//! Dual-tier conversational memory for the Keepsake companion chat:
//!
//! - **Fragments**: short-term session context (SQLite, swept after ~a day).
//! - **Embeddings**: long-term child-scoped vector memories (SQLite,
//!   deduplicated by content hash, swept after ~a year).
//!
//! Both tiers hang off one shared [`Database`] handle. [`MemoryService`]
//! is the facade the server and CLI talk to.

pub mod db;
pub mod embedding;
pub mod fragment;
pub mod service;
pub mod similarity;

pub use db::Database;
pub use embedding::{CreateOutcome, EmbeddingStore, MemoryEmbedding, NewEmbedding};
pub use fragment::{FragmentStore, MemoryFragment};
pub use service::{MemoryService, SweepReport};
pub use similarity::{SimilarityIndex, cosine_similarity};
