//! Hybrid ranking: fuse a lexical and a vector result list into one ranking.
//!
//! # Strategies
//!
//! **Weighted score** (default) min-max normalizes each list on its own and
//! takes a weighted sum:
//!
//! ```text
//! combined = w_lex * norm_lex + w_vec * norm_vec
//! ```
//!
//! Weights are divided by their sum. A document missing from a list gets 0
//! for that term, so appearing in only one channel is a penalty.
//!
//! **Reciprocal Rank Fusion** ignores raw scores and uses list positions:
//!
//! ```text
//! combined = sum over lists containing doc of 1 / (k + rank_in_list)
//! ```
//!
//! with 1-based ranks and `k = 60` by default.
//!
//! Both strategies sort by combined score descending, break ties by document
//! ID ascending, truncate to `limit` and assign dense 1-based ranks.
//!
//! # Degenerate input
//!
//! - Both lists empty: empty result.
//! - An ID repeated within one list keeps its first (best) entry.
//! - Entries with a NaN or infinite score are dropped before ranking.
//!
//! # Example
//!
//! ```
//! use scholar_search::fusion::{FusionConfig, HybridRanker};
//!
//! let ranker = HybridRanker::new(FusionConfig::default()).expect("valid config");
//! let lexical = vec![("A".to_string(), 10.0), ("B".to_string(), 5.0)];
//! let vector = vec![("B".to_string(), 0.9), ("C".to_string(), 0.7)];
//! let ranked = ranker.rank(lexical, vector, 10).expect("ranked");
//! assert_eq!(ranked.len(), 3);
//! assert_eq!(ranked.results[0].rank, 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use scholar_core::config::FusionStrategy;
use scholar_core::config::SearchConfig;

use super::normalize::min_max;

/// Caller configuration errors. The ranker has no other failure mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FusionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Fusion configuration: `{fusion, lexical_weight, vector_weight, rrf_k}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(rename = "fusion", default)]
    pub strategy: FusionStrategy,
    pub lexical_weight: f64,
    pub vector_weight: f64,
    pub rrf_k: u32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            strategy: FusionStrategy::WeightedScore,
            lexical_weight: 0.5,
            vector_weight: 0.5,
            rrf_k: 60,
        }
    }
}

impl From<&SearchConfig> for FusionConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            strategy: config.fusion,
            lexical_weight: config.lexical_weight,
            vector_weight: config.vector_weight,
            rrf_k: config.rrf_k,
        }
    }
}

impl FusionConfig {
    /// Reject negative or non-finite weights.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidArgument`] naming the offending weight.
    pub fn validate(&self) -> Result<(), FusionError> {
        for (name, weight) in [
            ("lexical_weight", self.lexical_weight),
            ("vector_weight", self.vector_weight),
        ] {
            if !weight.is_finite() {
                return Err(FusionError::InvalidArgument(format!(
                    "{name} must be finite (got {weight})"
                )));
            }
            if weight < 0.0 {
                return Err(FusionError::InvalidArgument(format!(
                    "{name} must be >= 0 (got {weight})"
                )));
            }
        }
        Ok(())
    }

    /// Weights divided by their sum.
    fn normalized_weights(&self) -> Result<(f64, f64), FusionError> {
        let sum = self.lexical_weight + self.vector_weight;
        if sum.is_finite() && sum > 0.0 {
            Ok((self.lexical_weight / sum, self.vector_weight / sum))
        } else {
            Err(FusionError::InvalidArgument(format!(
                "weighted-score fusion needs weights with a positive sum (got {} + {})",
                self.lexical_weight, self.vector_weight
            )))
        }
    }
}

/// A document seen in at least one input list, with its raw per-channel
/// scores and 1-based positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate<D = String> {
    pub document_id: D,
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
pub struct RankedCandidate<D = String> {
    #[serde(flatten)]
    pub candidate: Candidate<D>,
    pub combined_score: f64,
    /// 1-based position in the final order.
    pub rank: usize,
}

impl<D> RankedCandidate<D> {
    pub const fn document_id(&self) -> &D {
        &self.candidate.document_id
    }
}

/// Final ordering produced by one [`HybridRanker::rank`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult<D = String> {
    pub strategy: FusionStrategy,
    pub results: Vec<RankedCandidate<D>>,
}

impl<D> RankedResult<D> {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedCandidate<D>> {
        self.results.iter()
    }

    /// Document IDs in rank order.
    pub fn ids(&self) -> impl Iterator<Item = &D> {
        self.results.iter().map(RankedCandidate::document_id)
    }
}

impl<D> IntoIterator for RankedResult<D> {
    type Item = RankedCandidate<D>;
    type IntoIter = std::vec::IntoIter<RankedCandidate<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// Stateless fuser of a lexical and a vector result list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridRanker {
    config: FusionConfig,
}

impl Default for HybridRanker {
    fn default() -> Self {
        Self {
            config: FusionConfig::default(),
        }
    }
}

impl HybridRanker {
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidArgument`] for negative or non-finite
    /// weights.
    pub fn new(config: FusionConfig) -> Result<Self, FusionError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Rank with the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidArgument`] when `limit == 0` or the
    /// weights cannot be used with the strategy.
    pub fn rank<D, L, V>(
        &self,
        lexical_results: L,
        vector_results: V,
        limit: usize,
    ) -> Result<RankedResult<D>, FusionError>
    where
        D: Ord + Clone,
        L: IntoIterator<Item = (D, f64)>,
        V: IntoIterator<Item = (D, f64)>,
    {
        self.rank_with(self.config.strategy, lexical_results, vector_results, limit)
    }

    /// Rank with an explicit strategy for this call only.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidArgument`] when `limit == 0`, or when
    /// `strategy` is weighted-score and the weights do not sum to a positive
    /// number.
    pub fn rank_with<D, L, V>(
        &self,
        strategy: FusionStrategy,
        lexical_results: L,
        vector_results: V,
        limit: usize,
    ) -> Result<RankedResult<D>, FusionError>
    where
        D: Ord + Clone,
        L: IntoIterator<Item = (D, f64)>,
        V: IntoIterator<Item = (D, f64)>,
    {
        if limit == 0 {
            return Err(FusionError::InvalidArgument(
                "limit must be a positive integer".to_string(),
            ));
        }
        self.config.validate()?;

        let lexical = clean_list(lexical_results);
        let vector = clean_list(vector_results);

        let scored = match strategy {
            FusionStrategy::WeightedScore => {
                let (w_lex, w_vec) = self.config.normalized_weights()?;
                weighted_score(&lexical, &vector, w_lex, w_vec)
            }
            FusionStrategy::Rrf => reciprocal_rank(&lexical, &vector, self.config.rrf_k),
        };

        Ok(RankedResult {
            strategy,
            results: finalize(scored, limit),
        })
    }
}

/// Per-document merge slot.
struct Slot {
    lexical: Option<(f64, usize)>,
    vector: Option<(f64, usize)>,
    combined: f64,
}

/// Drop non-finite scores and repeated IDs (first occurrence wins).
fn clean_list<D, I>(list: I) -> Vec<(D, f64)>
where
    D: Ord + Clone,
    I: IntoIterator<Item = (D, f64)>,
{
    let mut seen = BTreeSet::new();
    list.into_iter()
        .filter(|(_, score)| score.is_finite())
        .filter(|(id, _)| seen.insert(id.clone()))
        .collect()
}

fn merge<D: Ord + Clone>(lexical: &[(D, f64)], vector: &[(D, f64)]) -> BTreeMap<D, Slot> {
    let mut slots: BTreeMap<D, Slot> = BTreeMap::new();

    for (idx, (id, score)) in lexical.iter().enumerate() {
        slots
            .entry(id.clone())
            .or_insert(Slot {
                lexical: None,
                vector: None,
                combined: 0.0,
            })
            .lexical = Some((*score, idx + 1));
    }

    for (idx, (id, score)) in vector.iter().enumerate() {
        slots
            .entry(id.clone())
            .or_insert(Slot {
                lexical: None,
                vector: None,
                combined: 0.0,
            })
            .vector = Some((*score, idx + 1));
    }

    slots
}

fn weighted_score<D: Ord + Clone>(
    lexical: &[(D, f64)],
    vector: &[(D, f64)],
    w_lex: f64,
    w_vec: f64,
) -> BTreeMap<D, Slot> {
    let lex_norm = normalized_by_id(lexical);
    let vec_norm = normalized_by_id(vector);

    let mut slots = merge(lexical, vector);
    for (id, slot) in &mut slots {
        let n_lex = lex_norm.get(id).copied().unwrap_or(0.0);
        let n_vec = vec_norm.get(id).copied().unwrap_or(0.0);
        slot.combined = w_lex.mul_add(n_lex, w_vec * n_vec);
    }
    slots
}

fn normalized_by_id<D: Ord + Clone>(list: &[(D, f64)]) -> BTreeMap<D, f64> {
    let raw: Vec<f64> = list.iter().map(|(_, score)| *score).collect();
    list.iter()
        .map(|(id, _)| id.clone())
        .zip(min_max(&raw))
        .collect()
}

fn reciprocal_rank<D: Ord + Clone>(
    lexical: &[(D, f64)],
    vector: &[(D, f64)],
    k: u32,
) -> BTreeMap<D, Slot> {
    let k = f64::from(k);
    let mut slots = merge(lexical, vector);
    for slot in slots.values_mut() {
        slot.combined = [slot.lexical, slot.vector]
            .into_iter()
            .flatten()
            .map(|(_, rank)| 1.0 / (k + rank as f64))
            .sum();
    }
    slots
}

fn finalize<D: Ord>(slots: BTreeMap<D, Slot>, limit: usize) -> Vec<RankedCandidate<D>> {
    // BTreeMap iteration is ID-ascending; the explicit tie-break keeps that
    // order for equal scores regardless of sort stability.
    let mut ordered: Vec<(D, Slot)> = slots.into_iter().collect();
    ordered.sort_by(|(a_id, a), (b_id, b)| {
        b.combined
            .total_cmp(&a.combined)
            .then_with(|| a_id.cmp(b_id))
    });
    ordered.truncate(limit);

    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, (document_id, slot))| RankedCandidate {
            candidate: Candidate {
                document_id,
                lexical_score: slot.lexical.map(|(score, _)| score),
                vector_score: slot.vector.map(|(score, _)| score),
                lexical_rank: slot.lexical.map(|(_, rank)| rank),
                vector_rank: slot.vector.map(|(_, rank)| rank),
            },
            combined_score: slot.combined,
            rank: idx + 1,
        })
        .collect()
}
