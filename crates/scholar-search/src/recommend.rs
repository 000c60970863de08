//! Paper recommendations: per-user, trending and "more like this".
//!
//! Per-user recommendations fuse two candidate lists with the same
//! [`HybridRanker`] that powers search:
//!
//! - lexical: BM25 over the user's interest topics
//! - vector: KNN against the centroid of embeddings of papers the user
//!   viewed, saved, or rated highly
//!
//! Papers the user already engaged with never come back. When neither list
//! yields a candidate the user gets trending papers instead.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::fusion::hybrid::{DEFAULT_OVERSAMPLE, MAX_FETCH, hydrate};
use crate::fusion::{FusionConfig, FusionError, HybridRanker};
use crate::semantic::{
    SemanticError, centroid, is_semantic_available, knn_search, stored_embedding,
};
use scholar_core::config::{RecommendConfig, SearchConfig};
use scholar_core::db::fts::search_text;
use scholar_core::db::now_us;
use scholar_core::db::papers::{TrendingPaper, paper_summaries, require_paper, trending_papers};
use scholar_core::db::users::{
    engaged_paper_ids, interests_for_user, positive_paper_ids, require_user,
};
use scholar_core::model::PaperSummary;

const MICROS_PER_DAY: i64 = 86_400_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendReason {
    Personalized,
    Trending,
    Similar,
}

impl fmt::Display for RecommendReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Personalized => "personalized",
            Self::Trending => "trending",
            Self::Similar => "similar",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub paper: PaperSummary,
    /// Fused score, engagement count, or similarity depending on `reason`.
    pub score: f64,
    pub reason: RecommendReason,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendOptions {
    pub fusion: FusionConfig,
    pub min_positive_rating: f64,
    pub trending_window_days: u32,
    pub oversample: usize,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default(), &RecommendConfig::default())
    }
}

impl RecommendOptions {
    #[must_use]
    pub fn from_config(search: &SearchConfig, recommend: &RecommendConfig) -> Self {
        Self {
            fusion: FusionConfig::from(search),
            min_positive_rating: recommend.min_positive_rating,
            trending_window_days: recommend.trending_window_days,
            oversample: if search.oversample == 0 {
                DEFAULT_OVERSAMPLE
            } else {
                search.oversample
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecommendations {
    pub user_id: i64,
    /// True when the user had no usable signals and got trending papers.
    pub fallback: bool,
    pub items: Vec<Recommendation>,
}

/// Papers with the most engagement (`3 * saves + views`) in the last
/// `window_days` days.
///
/// # Errors
///
/// Returns [`FusionError::InvalidArgument`] for `limit == 0`, or an error if
/// the query fails.
pub fn trending(db: &Connection, limit: usize, window_days: u32) -> Result<Vec<TrendingPaper>> {
    require_limit(limit)?;
    trending_papers(db, window_start(window_days), limit)
}

/// Papers closest to `paper_id` in embedding space, excluding itself.
///
/// # Errors
///
/// Returns `PaperNotFound` for an unknown paper and
/// [`SemanticError::IndexMissing`] if the paper has no stored embedding.
#[instrument(skip(db))]
pub fn similar_papers(db: &Connection, paper_id: &str, limit: usize) -> Result<Vec<Recommendation>> {
    require_limit(limit)?;
    let paper = require_paper(db, paper_id)?;
    let Some(embedding) = stored_embedding(db, &paper.paper_id)? else {
        return Err(SemanticError::IndexMissing.into());
    };

    let hits: Vec<_> = knn_search(db, &embedding, limit.saturating_add(1))?
        .into_iter()
        .filter(|hit| hit.paper_id != paper.paper_id)
        .take(limit)
        .collect();

    let ids: Vec<String> = hits.iter().map(|h| h.paper_id.clone()).collect();
    let mut summaries = paper_summaries(db, &ids)?;
    Ok(hits
        .into_iter()
        .filter_map(|hit| {
            summaries.remove(&hit.paper_id).map(|paper| Recommendation {
                paper,
                score: hit.score,
                reason: RecommendReason::Similar,
            })
        })
        .collect())
}

/// Personalized recommendations for `user_id`.
///
/// # Errors
///
/// Returns `UserNotFound` for an unknown user, [`FusionError`] for invalid
/// arguments, or an error if a query fails.
#[instrument(skip(db, options))]
pub fn recommend_for_user(
    db: &Connection,
    user_id: i64,
    limit: usize,
    options: &RecommendOptions,
) -> Result<UserRecommendations> {
    require_limit(limit)?;
    let ranker = HybridRanker::new(options.fusion)?;
    require_user(db, user_id)?;

    let engaged = engaged_paper_ids(db, user_id)?;
    let fetch = limit
        .saturating_add(engaged.len())
        .saturating_mul(options.oversample.max(1))
        .min(MAX_FETCH);

    let lexical = interest_candidates(db, user_id, fetch, &engaged)?;
    let vector = history_candidates(db, user_id, fetch, options.min_positive_rating, &engaged)?;
    debug!(
        lexical = lexical.len(),
        vector = vector.len(),
        engaged = engaged.len(),
        "recommendation candidates"
    );

    if lexical.is_empty() && vector.is_empty() {
        info!(user_id, "no personal signals, falling back to trending papers");
        let items = trending_papers(
            db,
            window_start(options.trending_window_days),
            limit.saturating_add(engaged.len()),
        )?
        .into_iter()
        .filter(|t| !engaged.contains(&t.summary.paper_id))
        .take(limit)
        .map(|t| Recommendation {
            score: t.engagement as f64,
            paper: t.summary,
            reason: RecommendReason::Trending,
        })
        .collect();
        return Ok(UserRecommendations {
            user_id,
            fallback: true,
            items,
        });
    }

    let ranked = ranker.rank(lexical, vector, limit)?;
    let items = hydrate(db, ranked)?
        .into_iter()
        .map(|(ranked, paper)| Recommendation {
            paper,
            score: ranked.combined_score,
            reason: RecommendReason::Personalized,
        })
        .collect();

    Ok(UserRecommendations {
        user_id,
        fallback: false,
        items,
    })
}

fn interest_candidates(
    db: &Connection,
    user_id: i64,
    fetch: usize,
    engaged: &BTreeSet<String>,
) -> Result<Vec<(String, f64)>> {
    let query = interests_for_user(db, user_id)?
        .into_iter()
        .map(|t| t.name)
        .collect::<Vec<_>>()
        .join(" ");
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(search_text(db, &query, fetch)?
        .into_iter()
        .filter(|hit| !engaged.contains(&hit.paper_id))
        .map(|hit| (hit.paper_id, hit.score))
        .collect())
}

fn history_candidates(
    db: &Connection,
    user_id: i64,
    fetch: usize,
    min_rating: f64,
    engaged: &BTreeSet<String>,
) -> Result<Vec<(String, f64)>> {
    if !is_semantic_available(db) {
        debug!("no stored embeddings, skipping history-based candidates");
        return Ok(Vec::new());
    }

    let mut vectors = Vec::new();
    for paper_id in positive_paper_ids(db, user_id, min_rating)? {
        if let Some(embedding) = stored_embedding(db, &paper_id)? {
            vectors.push(embedding);
        }
    }
    let Some(profile) = centroid(&vectors) else {
        return Ok(Vec::new());
    };

    Ok(knn_search(db, &profile, fetch)?
        .into_iter()
        .filter(|hit| !engaged.contains(&hit.paper_id))
        .map(|hit| (hit.paper_id, hit.score))
        .collect())
}

fn require_limit(limit: usize) -> Result<(), FusionError> {
    if limit == 0 {
        return Err(FusionError::InvalidArgument("limit must be > 0".into()));
    }
    Ok(())
}

fn window_start(days: u32) -> i64 {
    now_us().saturating_sub(i64::from(days).saturating_mul(MICROS_PER_DAY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{HashEmbedder, sync_paper_embeddings};
    use scholar_core::db::users::{NewFeedback, create_user, record_feedback, record_view, save_paper};
    use scholar_core::db::{open_in_memory, papers::upsert_paper};
    use scholar_core::error::StoreError;
    use scholar_core::model::{FeedbackKind, NewPaper, NewUser};

    fn paper(id: &str, title: &str, topics: &[&str]) -> NewPaper {
        NewPaper {
            id: Some(id.into()),
            title: title.into(),
            topics: topics.iter().map(|t| (*t).to_string()).collect(),
            ..NewPaper::default()
        }
    }

    fn corpus() -> Connection {
        let db = open_in_memory().expect("store");
        for p in [
            paper("p-gnn", "Graph neural networks for chemistry", &["graph learning"]),
            paper("p-gat", "Graph attention networks", &["graph learning"]),
            paper("p-gcn", "Semi-supervised graph convolution", &["graph learning"]),
            paper("p-fold", "Protein structure prediction", &["biology"]),
            paper("p-seq", "Protein sequence language models", &["biology"]),
        ] {
            upsert_paper(&db, &p).expect("paper");
        }
        sync_paper_embeddings(&db, &HashEmbedder::new(128).expect("embedder")).expect("sync");
        db
    }

    fn user(db: &Connection, name: &str, interests: &[&str]) -> i64 {
        create_user(
            db,
            &NewUser {
                username: name.into(),
                email: format!("{name}@example.org"),
                interests: interests.iter().map(|i| (*i).to_string()).collect(),
                ..NewUser::default()
            },
        )
        .expect("user")
        .user_id
    }

    fn ids(items: &[Recommendation]) -> Vec<&str> {
        items.iter().map(|r| r.paper.paper_id.as_str()).collect()
    }

    #[test]
    fn interests_drive_recommendations() {
        let db = corpus();
        let uid = user(&db, "ada", &["graph"]);

        let recs = recommend_for_user(&db, uid, 3, &RecommendOptions::default()).expect("recs");
        assert!(!recs.fallback);
        assert_eq!(recs.items.len(), 3);
        assert!(recs.items.iter().all(|r| r.paper.paper_id.starts_with("p-g")));
        assert!(recs.items.iter().all(|r| r.reason == RecommendReason::Personalized));
    }

    #[test]
    fn engaged_papers_are_excluded() {
        let db = corpus();
        let uid = user(&db, "ada", &["graph"]);
        record_view(&db, uid, "p-gnn", None).expect("view");
        save_paper(&db, uid, "p-gat", None, None).expect("save");

        let recs = recommend_for_user(&db, uid, 10, &RecommendOptions::default()).expect("recs");
        let got = ids(&recs.items);
        assert!(!got.contains(&"p-gnn"));
        assert!(!got.contains(&"p-gat"));
        assert!(got.contains(&"p-gcn"));
    }

    #[test]
    fn history_alone_produces_personalized_results() {
        let db = corpus();
        let uid = user(&db, "bob", &[]);
        record_feedback(
            &db,
            &NewFeedback {
                user_id: uid,
                paper_id: Some("p-fold".into()),
                search_id: None,
                rating: 5.0,
                kind: FeedbackKind::Quality,
                text: None,
            },
        )
        .expect("feedback");

        let recs = recommend_for_user(&db, uid, 4, &RecommendOptions::default()).expect("recs");
        assert!(!recs.fallback);
        assert!(!ids(&recs.items).contains(&"p-fold"));
        assert_eq!(recs.items.len(), 4);
    }

    #[test]
    fn user_without_signals_gets_trending() {
        let db = corpus();
        let reader = user(&db, "reader", &[]);
        save_paper(&db, reader, "p-seq", None, None).expect("save");
        let newcomer = user(&db, "newcomer", &[]);

        let recs =
            recommend_for_user(&db, newcomer, 2, &RecommendOptions::default()).expect("recs");
        assert!(recs.fallback);
        assert_eq!(recs.items[0].paper.paper_id, "p-seq");
        assert_eq!(recs.items[0].reason, RecommendReason::Trending);
        assert!((recs.items[0].score - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_user_is_reported() {
        let db = corpus();
        let err = recommend_for_user(&db, 999, 5, &RecommendOptions::default())
            .expect_err("unknown user");
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::UserNotFound(_))
        ));
    }

    #[test]
    fn zero_limit_is_invalid() {
        let db = corpus();
        assert!(trending(&db, 0, 7).is_err());
        assert!(similar_papers(&db, "p-gnn", 0).is_err());
    }

    #[test]
    fn trending_counts_saves_triple() {
        let db = corpus();
        let a = user(&db, "a", &[]);
        let b = user(&db, "b", &[]);
        record_view(&db, a, "p-gat", None).expect("view");
        record_view(&db, b, "p-gat", None).expect("view");
        save_paper(&db, a, "p-fold", None, None).expect("save");

        let top = trending(&db, 2, 7).expect("trending");
        assert_eq!(top[0].summary.paper_id, "p-fold");
        assert_eq!(top[0].engagement, 3);
        assert_eq!(top[1].summary.paper_id, "p-gat");
        assert_eq!(top[1].engagement, 2);
    }

    #[test]
    fn similar_papers_excludes_self() {
        let db = corpus();
        let similar = similar_papers(&db, "p-gat", 2).expect("similar");
        assert_eq!(similar.len(), 2);
        assert!(!ids(&similar).contains(&"p-gat"));
        assert!(similar.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn similar_papers_requires_known_embedded_paper() {
        let db = corpus();
        let err = similar_papers(&db, "p-missing", 3).expect_err("unknown");
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::PaperNotFound(_))
        ));

        upsert_paper(&db, &paper("p-new", "Unembedded paper", &[])).expect("paper");
        let err = similar_papers(&db, "p-new", 3).expect_err("no embedding");
        assert_eq!(
            err.downcast_ref::<SemanticError>(),
            Some(&SemanticError::IndexMissing)
        );
    }
}
