//! Semantic KNN search over stored paper embeddings.
//!
//! Query vectors are compared against `paper_embeddings.embedding_json` by
//! brute-force cosine similarity.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use super::SemanticError;
use super::model::l2_normalize;

/// A single semantic search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticSearchResult {
    pub paper_id: String,
    /// Similarity in `[0, 1]` (higher = more similar).
    pub score: f64,
}

/// Top `limit` papers by cosine similarity to `query_embedding`.
///
/// Rows stored with a different dimension are skipped. If every stored row
/// has a different dimension the call fails with
/// [`SemanticError::DimensionMismatch`].
///
/// # Errors
///
/// Returns an error if the embedding table is missing or cannot be read.
pub fn knn_search(
    db: &Connection,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<SemanticSearchResult>> {
    if limit == 0 || query_embedding.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = db
        .prepare("SELECT paper_id, embedding_json FROM paper_embeddings")
        .map_err(|_| SemanticError::IndexMissing)?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .context("failed to execute semantic KNN query")?;

    let mut scored = Vec::new();
    let mut mismatched = 0_usize;
    let mut stored_dimension = None;
    for row in rows {
        let (paper_id, embedding_json) = row.context("failed to read semantic KNN row")?;
        let embedding: Vec<f32> = match serde_json::from_str(&embedding_json) {
            Ok(value) => value,
            Err(err) => {
                debug!("skipping malformed embedding row for {paper_id}: {err}");
                continue;
            }
        };

        if embedding.len() != query_embedding.len() {
            mismatched += 1;
            stored_dimension = Some(embedding.len());
            continue;
        }

        let Some(cosine) = cosine_similarity(query_embedding, &embedding) else {
            continue;
        };
        // Map cosine [-1, 1] onto [0, 1] so the score reads as a similarity.
        let score = f64::from(((cosine + 1.0) * 0.5).clamp(0.0, 1.0));
        scored.push(SemanticSearchResult { paper_id, score });
    }

    if scored.is_empty()
        && mismatched > 0
        && let Some(stored) = stored_dimension
    {
        return Err(SemanticError::DimensionMismatch {
            query: query_embedding.len(),
            stored,
        }
        .into());
    }
    if mismatched > 0 {
        debug!(mismatched, "skipped embeddings with a different dimension");
    }

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.paper_id.cmp(&b.paper_id))
    });
    scored.truncate(limit);

    Ok(scored)
}

/// The stored embedding of one paper, if it has been embedded.
///
/// # Errors
///
/// Returns an error if the table is missing or the row cannot be decoded.
pub fn stored_embedding(db: &Connection, paper_id: &str) -> Result<Option<Vec<f32>>> {
    let json: Option<String> = db
        .query_row(
            "SELECT embedding_json FROM paper_embeddings WHERE paper_id = ?1",
            [paper_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|_| SemanticError::IndexMissing)?;

    json.map(|raw| {
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to decode embedding for paper {paper_id}"))
    })
    .transpose()
}

/// L2-normalized mean of `vectors`, ignoring any whose length differs from
/// the first. `None` for an empty input.
#[must_use]
pub fn centroid(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dimension = first.len();
    let mut sum = vec![0.0_f32; dimension];
    let mut count = 0_u32;

    for vector in vectors.iter().filter(|v| v.len() == dimension) {
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += value;
        }
        count += 1;
    }

    if count == 0 || dimension == 0 {
        return None;
    }
    let count = count as f32;
    for value in &mut sum {
        *value /= count;
    }
    l2_normalize(&mut sum);
    Some(sum)
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f32> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut left_norm_sq = 0.0_f32;
    let mut right_norm_sq = 0.0_f32;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f32::EPSILON {
        return None;
    }

    Some((dot / denom).clamp(-1.0, 1.0))
}
