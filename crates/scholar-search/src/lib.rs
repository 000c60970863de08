#![forbid(unsafe_code)]
//! scholar-search library.
//!
//! Lexical (FTS5 BM25) and vector (embedding KNN) retrieval over the paper
//! store, fused into one ranking by [`fusion::HybridRanker`].
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types. Typed failures
//!   ([`fusion::FusionError`], [`semantic::SemanticError`]) travel inside it.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod fusion;
pub mod index;
pub mod recommend;
pub mod semantic;

pub use fusion::{
    FusionConfig, FusionError, FusionStrategy, HybridRanker, RankedResult, SearchMode,
    SearchRequest, search,
};
pub use index::{FtsLexicalIndex, LexicalIndex, StoredVectorIndex, VectorIndex};
pub use recommend::{recommend_for_user, similar_papers, trending};
