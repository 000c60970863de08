//! Search orchestration across the lexical and semantic layers.
//!
//! The orchestrator degrades gracefully in hybrid mode:
//! - lexical search always runs
//! - semantic search runs only when an embedder is supplied, the store has
//!   embeddings, and embedding/search succeeds
//!
//! When the semantic layer drops out the lexical list is still fused (alone)
//! and the outcome is flagged `degraded`.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::ranker::{FusionConfig, FusionStrategy, HybridRanker, RankedCandidate, RankedResult};
use crate::index::{FtsLexicalIndex, LexicalIndex, StoredVectorIndex, VectorIndex};
use crate::semantic::{Embedder, SemanticError, is_semantic_available};
use scholar_core::db::papers::paper_summaries;
use scholar_core::model::PaperSummary;

/// Upper bound on candidates requested from any single index.
pub const MAX_FETCH: usize = 1000;

/// Default oversampling factor applied to `limit` before fusion.
pub const DEFAULT_OVERSAMPLE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Vector,
    #[default]
    Hybrid,
}

impl SearchMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "keyword" | "lexical" | "bm25" => Ok(Self::Keyword),
            "vector" | "semantic" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            other => bail!("unknown search mode '{other}' (expected keyword, vector, or hybrid)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub limit: usize,
    pub fusion: FusionConfig,
    pub oversample: usize,
    /// Pass `query` to FTS5 verbatim instead of sanitizing it.
    pub raw_query: bool,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, mode: SearchMode, limit: usize) -> Self {
        Self {
            query: query.into(),
            mode,
            limit,
            fusion: FusionConfig::default(),
            oversample: DEFAULT_OVERSAMPLE,
            raw_query: false,
        }
    }

    /// Candidates requested from each index: `limit * oversample`, capped at
    /// [`MAX_FETCH`].
    #[must_use]
    pub fn fetch_size(&self) -> usize {
        self.limit
            .saturating_mul(self.oversample.max(1))
            .min(MAX_FETCH)
    }
}

/// The semantic half of a search: where to look and how to embed the query.
#[derive(Clone, Copy)]
pub struct SemanticLayer<'a> {
    pub index: &'a dyn VectorIndex,
    pub embedder: &'a dyn Embedder,
}

/// Ranked IDs before hydration.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedOutcome {
    pub ranked: RankedResult,
    pub degraded: bool,
}

/// One hydrated search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    #[serde(flatten)]
    pub paper: PaperSummary,
    pub combined_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_rank: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub mode: SearchMode,
    pub strategy: FusionStrategy,
    pub degraded: bool,
    pub hits: Vec<SearchHit>,
}

/// Run the requested retrieval channels and fuse them.
///
/// Keyword and vector modes fuse a single list with that channel's weight set
/// to 1. Vector mode without a semantic layer is an error; hybrid mode falls
/// back to lexical-only.
///
/// # Errors
///
/// Returns an error for invalid fusion arguments, a failing lexical index, or
/// a vector-mode search whose semantic layer is missing or failing.
pub fn fuse_search(
    lexical: &dyn LexicalIndex,
    semantic: Option<SemanticLayer<'_>>,
    request: &SearchRequest,
) -> Result<FusedOutcome> {
    let fetch = request.fetch_size();
    let mut degraded = false;

    let (config, lexical_hits, vector_hits) = match request.mode {
        SearchMode::Keyword => (
            single_channel(&request.fusion, 1.0, 0.0),
            lexical
                .search(&request.query, fetch)
                .context("lexical search failed")?,
            Vec::new(),
        ),
        SearchMode::Vector => {
            let Some(layer) = semantic else {
                return Err(SemanticError::IndexMissing.into());
            };
            (
                single_channel(&request.fusion, 0.0, 1.0),
                Vec::new(),
                semantic_hits(layer, &request.query, fetch)?,
            )
        }
        SearchMode::Hybrid => {
            let lexical_hits = lexical
                .search(&request.query, fetch)
                .context("lexical search failed")?;
            let vector_hits = match semantic {
                Some(layer) => match semantic_hits(layer, &request.query, fetch) {
                    Ok(hits) => hits,
                    Err(e) => {
                        warn!(
                            "semantic layer unavailable, falling back to lexical-only fusion: {e:#}"
                        );
                        degraded = true;
                        Vec::new()
                    }
                },
                None => {
                    warn!("no semantic index available, falling back to lexical-only fusion");
                    degraded = true;
                    Vec::new()
                }
            };
            (request.fusion, lexical_hits, vector_hits)
        }
    };

    debug!(
        lexical = lexical_hits.len(),
        vector = vector_hits.len(),
        fetch,
        "fusing candidate lists"
    );

    let ranked = HybridRanker::new(config)?.rank(lexical_hits, vector_hits, request.limit)?;
    Ok(FusedOutcome { ranked, degraded })
}

/// Search the store and hydrate results with paper metadata.
///
/// # Errors
///
/// See [`fuse_search`]; also fails if hydration queries fail.
#[instrument(skip(db, embedder, request), fields(mode = %request.mode, limit = request.limit))]
pub fn search(
    db: &Connection,
    embedder: Option<&dyn Embedder>,
    request: &SearchRequest,
) -> Result<SearchOutcome> {
    let lexical = if request.raw_query {
        FtsLexicalIndex::raw(db)
    } else {
        FtsLexicalIndex::new(db)
    };
    let vector = StoredVectorIndex::new(db);
    let semantic = embedder
        .filter(|_| is_semantic_available(db))
        .map(|embedder| SemanticLayer {
            index: &vector,
            embedder,
        });

    let fused = fuse_search(&lexical, semantic, request)?;
    let strategy = fused.ranked.strategy;
    let hits = hydrate(db, fused.ranked)?
        .into_iter()
        .map(|(ranked, paper)| SearchHit {
            rank: ranked.rank,
            paper,
            combined_score: ranked.combined_score,
            lexical_score: ranked.candidate.lexical_score,
            vector_score: ranked.candidate.vector_score,
            lexical_rank: ranked.candidate.lexical_rank,
            vector_rank: ranked.candidate.vector_rank,
        })
        .collect();

    Ok(SearchOutcome {
        query: request.query.clone(),
        mode: request.mode,
        strategy,
        degraded: fused.degraded,
        hits,
    })
}

/// Pair ranked IDs with their paper summaries. IDs whose paper has vanished
/// are dropped and the survivors are renumbered so ranks stay dense.
pub(crate) fn hydrate(
    db: &Connection,
    ranked: RankedResult,
) -> Result<Vec<(RankedCandidate, PaperSummary)>> {
    let ids: Vec<String> = ranked.ids().cloned().collect();
    let mut summaries = paper_summaries(db, &ids)?;

    Ok(ranked
        .into_iter()
        .filter_map(|candidate| {
            let summary = summaries.remove(candidate.document_id());
            if summary.is_none() {
                debug!(paper_id = %candidate.document_id(), "ranked paper missing from store");
            }
            summary.map(|s| (candidate, s))
        })
        .enumerate()
        .map(|(position, (mut candidate, summary))| {
            candidate.rank = position + 1;
            (candidate, summary)
        })
        .collect())
}

fn semantic_hits(layer: SemanticLayer<'_>, query: &str, fetch: usize) -> Result<Vec<(String, f64)>> {
    let embedding = layer
        .embedder
        .embed(query)
        .context("query embedding failed")?;
    layer.index.search(&embedding, fetch)
}

fn single_channel(base: &FusionConfig, lexical_weight: f64, vector_weight: f64) -> FusionConfig {
    FusionConfig {
        lexical_weight,
        vector_weight,
        ..*base
    }
}
