//! Embedding-based retrieval: the embedder seam, the stored embedding index,
//! and KNN search over it.

mod embed;
mod model;
pub mod search;

use scholar_core::error::ErrorCode;

pub use embed::{SyncStats, clear_embeddings, ensure_semantic_index_schema, sync_paper_embeddings};
pub use model::{Embedder, HashEmbedder, is_semantic_available};
pub use search::{SemanticSearchResult, centroid, knn_search, stored_embedding};

/// Reasons the semantic layer cannot answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticError {
    #[error("semantic index is missing or empty")]
    IndexMissing,
    #[error("embedding dimension mismatch: query has {query}, index has {stored}")]
    DimensionMismatch { query: usize, stored: usize },
}

impl SemanticError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::IndexMissing => ErrorCode::SemanticIndexMissing,
            Self::DimensionMismatch { .. } => ErrorCode::EmbeddingDimensionMismatch,
        }
    }
}
