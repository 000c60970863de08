//! Retrieval quality on a small labelled paper corpus.

use std::collections::HashSet;

use rusqlite::Connection;
use scholar_core::db::fts::search_text;
use scholar_core::db::open_in_memory;
use scholar_core::db::papers::import_papers;
use scholar_core::model::NewPaper;
use scholar_search::fusion::{FusionConfig, FusionStrategy, SearchMode, SearchRequest, search};
use scholar_search::semantic::{Embedder, HashEmbedder, sync_paper_embeddings};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Corpus {
    papers: Vec<NewPaper>,
    queries: Vec<LabelledQuery>,
}

#[derive(Debug, Deserialize)]
struct LabelledQuery {
    query: String,
    relevant: Vec<String>,
}

fn load_corpus() -> Corpus {
    serde_json::from_str(include_str!("fixtures/corpus.json")).expect("corpus fixture should parse")
}

fn build_store(corpus: &Corpus, embedder: &dyn Embedder) -> Connection {
    let mut conn = open_in_memory().expect("open store");
    import_papers(&mut conn, &corpus.papers).expect("import corpus");
    sync_paper_embeddings(&conn, embedder).expect("embed corpus");
    conn
}

fn hit_at_k(ranked: &[String], relevant: &[String], k: usize) -> bool {
    let relevant: HashSet<&str> = relevant.iter().map(String::as_str).collect();
    ranked.iter().take(k).any(|id| relevant.contains(id.as_str()))
}

fn ranked_ids(conn: &Connection, embedder: &dyn Embedder, request: &SearchRequest) -> Vec<String> {
    search(conn, Some(embedder), request)
        .unwrap_or_else(|e| panic!("search '{}' failed: {e:#}", request.query))
        .hits
        .into_iter()
        .map(|h| h.paper.paper_id)
        .collect()
}

fn hit_rate(hits: usize, total: usize) -> f64 {
    hits as f64 / total as f64
}

#[test]
fn bm25_finds_relevant_papers_for_most_queries() {
    let corpus = load_corpus();
    let conn = build_store(&corpus, &HashEmbedder::default());

    let hits = corpus
        .queries
        .iter()
        .filter(|q| {
            let ids: Vec<String> = search_text(&conn, &q.query, 3)
                .expect("bm25")
                .into_iter()
                .map(|h| h.paper_id)
                .collect();
            hit_at_k(&ids, &q.relevant, 3)
        })
        .count();

    let rate = hit_rate(hits, corpus.queries.len());
    assert!(rate >= 0.75, "expected lexical hit@3 >= 0.75, got {rate:.3}");
}

#[test]
fn hybrid_search_keeps_relevant_papers_on_top() {
    let corpus = load_corpus();
    let embedder = HashEmbedder::default();
    let conn = build_store(&corpus, &embedder);

    for strategy in [FusionStrategy::WeightedScore, FusionStrategy::Rrf] {
        let hits = corpus
            .queries
            .iter()
            .filter(|q| {
                let mut request = SearchRequest::new(q.query.clone(), SearchMode::Hybrid, 5);
                request.fusion = FusionConfig {
                    strategy,
                    ..FusionConfig::default()
                };
                hit_at_k(&ranked_ids(&conn, &embedder, &request), &q.relevant, 3)
            })
            .count();

        let rate = hit_rate(hits, corpus.queries.len());
        assert!(
            rate >= 0.75,
            "expected hybrid hit@3 >= 0.75 with {strategy}, got {rate:.3}"
        );
    }
}

#[test]
fn vector_mode_ranks_the_embedded_text_first() {
    let corpus = load_corpus();
    let embedder = HashEmbedder::default();
    let conn = build_store(&corpus, &embedder);

    for paper in &corpus.papers {
        let text = format!(
            "{} {} {}",
            paper.title,
            paper.abstract_text.as_deref().unwrap_or_default(),
            paper.keywords.join(" ")
        );
        let ids = ranked_ids(&conn, &embedder, &SearchRequest::new(text, SearchMode::Vector, 3));
        assert_eq!(
            ids.first().map(String::as_str),
            paper.id.as_deref(),
            "a paper's own text should retrieve it first"
        );
    }
}

#[test]
fn hybrid_without_embeddings_matches_keyword_order() {
    let corpus = load_corpus();
    let mut conn = open_in_memory().expect("open store");
    import_papers(&mut conn, &corpus.papers).expect("import corpus");

    for q in &corpus.queries {
        let keyword = search(&conn, None, &SearchRequest::new(q.query.clone(), SearchMode::Keyword, 5))
            .expect("keyword search");
        let hybrid = search(&conn, None, &SearchRequest::new(q.query.clone(), SearchMode::Hybrid, 5))
            .expect("degraded hybrid search");

        assert!(hybrid.degraded);
        assert!(!keyword.degraded);
        let keyword_ids: Vec<&str> = keyword.hits.iter().map(|h| h.paper.paper_id.as_str()).collect();
        let hybrid_ids: Vec<&str> = hybrid.hits.iter().map(|h| h.paper.paper_id.as_str()).collect();
        assert_eq!(keyword_ids, hybrid_ids, "query '{}'", q.query);
    }
}

#[test]
fn results_are_densely_ranked_and_sorted() {
    let corpus = load_corpus();
    let embedder = HashEmbedder::default();
    let conn = build_store(&corpus, &embedder);

    let outcome = search(
        &conn,
        Some(&embedder),
        &SearchRequest::new("language model", SearchMode::Hybrid, 8),
    )
    .expect("search");

    assert!(!outcome.hits.is_empty());
    for (i, hit) in outcome.hits.iter().enumerate() {
        assert_eq!(hit.rank, i + 1);
        assert!(hit.lexical_score.is_some() || hit.vector_score.is_some());
    }
    assert!(
        outcome
            .hits
            .windows(2)
            .all(|w| w[0].combined_score >= w[1].combined_score)
    );
}
