//! Retrieval channels feeding the ranker.
//!
//! Both traits return `(paper_id, score)` pairs best-first with "higher is
//! better" scores, which is the shape [`crate::fusion::HybridRanker`]
//! consumes.

use anyhow::Result;
use rusqlite::Connection;
use scholar_core::db::fts;

use crate::semantic::knn_search;

/// Term-matching retrieval. Scores are `>= 0`.
pub trait LexicalIndex {
    /// # Errors
    ///
    /// Returns an error if the index cannot be queried.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<(String, f64)>>;
}

/// Embedding-similarity retrieval. Scores are in `[0, 1]`.
pub trait VectorIndex {
    /// # Errors
    ///
    /// Returns an error if the index is missing or the embedding does not
    /// match its dimension.
    fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<(String, f64)>>;
}

/// BM25 over the `papers_fts` table.
///
/// Queries are sanitized into an OR of quoted terms unless the index was
/// built with [`FtsLexicalIndex::raw`], which passes FTS5 syntax through.
#[derive(Clone, Copy)]
pub struct FtsLexicalIndex<'a> {
    db: &'a Connection,
    raw: bool,
}

impl<'a> FtsLexicalIndex<'a> {
    #[must_use]
    pub const fn new(db: &'a Connection) -> Self {
        Self { db, raw: false }
    }

    #[must_use]
    pub const fn raw(db: &'a Connection) -> Self {
        Self { db, raw: true }
    }
}

impl LexicalIndex for FtsLexicalIndex<'_> {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        let hits = if self.raw {
            fts::search_bm25(self.db, query, limit)?
        } else {
            fts::search_text(self.db, query, limit)?
        };
        Ok(hits
            .into_iter()
            .map(|hit| (hit.paper_id, hit.score))
            .collect())
    }
}

/// Brute-force cosine KNN over `paper_embeddings`.
#[derive(Clone, Copy)]
pub struct StoredVectorIndex<'a> {
    db: &'a Connection,
}

impl<'a> StoredVectorIndex<'a> {
    #[must_use]
    pub const fn new(db: &'a Connection) -> Self {
        Self { db }
    }
}

impl VectorIndex for StoredVectorIndex<'_> {
    fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<(String, f64)>> {
        Ok(knn_search(self.db, embedding, limit)?
            .into_iter()
            .map(|hit| (hit.paper_id, hit.score))
            .collect())
    }
}
