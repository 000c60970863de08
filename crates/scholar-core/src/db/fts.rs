//! FTS5 full-text search with BM25 ranking.
//!
//! Search helpers over the `papers_fts` virtual table defined in
//! [`super::schema`]. Triggers on `papers` keep it in sync.
//!
//! # Column Weights (BM25)
//!
//! | Column   | Weight |
//! |----------|--------|
//! | title    | 3.0    |
//! | abstract | 2.0    |
//! | keywords | 1.5    |
//! | authors  | 1.0    |
//! | topics   | 1.0    |
//!
//! # Tokenizer
//!
//! Porter stemmer + `unicode61` with prefix indexes on 2 and 3 characters, so
//! "networks" matches "network" and `transf*` matches "transformer".
//!
//! # Scores
//!
//! SQLite's `bm25()` is lower-is-better and negative. Hits returned here carry
//! `score = -bm25`, clamped at zero, so higher is better.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;

pub const BM25_WEIGHT_TITLE: f64 = 3.0;
pub const BM25_WEIGHT_ABSTRACT: f64 = 2.0;
pub const BM25_WEIGHT_KEYWORDS: f64 = 1.5;
pub const BM25_WEIGHT_AUTHORS: f64 = 1.0;
pub const BM25_WEIGHT_TOPICS: f64 = 1.0;

/// One lexical match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalHit {
    pub paper_id: String,
    pub title: String,
    /// Higher is better, always `>= 0`.
    pub score: f64,
}

/// Turn free text into a safe FTS5 expression.
///
/// Each alphanumeric token becomes a quoted phrase, tokens are OR-ed so that
/// BM25 rewards papers matching more of them. A token written with a trailing
/// `*` keeps its prefix semantics. Returns `None` when nothing searchable is
/// left.
#[must_use]
pub fn build_match_query(raw: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();

    for chunk in raw.split_whitespace() {
        let prefix = chunk.ends_with('*');
        let words: Vec<String> = chunk
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let last = words.len().saturating_sub(1);

        for (idx, word) in words.into_iter().enumerate() {
            let term = if prefix && idx == last {
                format!("\"{word}\"*")
            } else {
                format!("\"{word}\"")
            };
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Search the FTS5 index with BM25 ranking and column weights.
///
/// `match_query` is passed to FTS5 verbatim; use [`build_match_query`] for
/// user-typed text.
///
/// # Errors
///
/// Returns an error if the FTS5 expression is malformed or the store is not
/// initialized.
pub fn search_bm25(conn: &Connection, match_query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
    let sql = "SELECT f.paper_id, p.title, bm25(papers_fts, ?1, ?2, ?3, ?4, ?5) AS rank \
               FROM papers_fts f \
               INNER JOIN papers p ON p.paper_id = f.paper_id \
               WHERE papers_fts MATCH ?6 \
               ORDER BY rank, f.paper_id \
               LIMIT ?7";

    let mut stmt = conn
        .prepare(sql)
        .context("prepare FTS5 BM25 search query")?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt
        .query_map(
            params![
                BM25_WEIGHT_TITLE,
                BM25_WEIGHT_ABSTRACT,
                BM25_WEIGHT_KEYWORDS,
                BM25_WEIGHT_AUTHORS,
                BM25_WEIGHT_TOPICS,
                match_query,
                limit,
            ],
            |row| {
                let rank: f64 = row.get(2)?;
                Ok(LexicalHit {
                    paper_id: row.get(0)?,
                    title: row.get(1)?,
                    score: (-rank).max(0.0),
                })
            },
        )
        .with_context(|| format!("execute FTS5 search for '{match_query}'"))?;

    let mut hits = Vec::new();
    for row in rows {
        hits.push(row.context("read FTS5 search hit")?);
    }
    Ok(hits)
}

/// Sanitize `text` and search; empty when the text has no searchable tokens.
///
/// # Errors
///
/// Returns an error if the underlying query fails.
pub fn search_text(conn: &Connection, text: &str, limit: usize) -> Result<Vec<LexicalHit>> {
    match build_match_query(text) {
        Some(expr) => search_bm25(conn, &expr, limit),
        None => {
            tracing::debug!(query = text, "no searchable tokens in query");
            Ok(Vec::new())
        }
    }
}

/// Rebuild the FTS5 index from the current `papers` table.
///
/// # Errors
///
/// Returns an error if the rebuild SQL fails.
pub fn rebuild_fts_index(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM papers_fts;
         INSERT INTO papers_fts(rowid, title, abstract, keywords, authors, topics, paper_id)
         SELECT rowid, title, COALESCE(abstract, ''), search_keywords, search_authors,
                search_topics, paper_id
         FROM papers;",
    )
    .context("rebuild FTS5 index from papers table")?;
    Ok(())
}

/// Number of rows in the FTS5 index.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fts_row_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM papers_fts", [], |row| row.get(0))
        .context("count FTS5 rows")?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Whether the FTS5 index holds exactly one row per paper.
///
/// # Errors
///
/// Returns an error if either count query fails.
pub fn fts_in_sync(conn: &Connection) -> Result<bool> {
    let papers: i64 = conn
        .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))
        .context("count papers")?;
    let indexed = fts_row_count(conn)?;
    Ok(u64::try_from(papers).unwrap_or(0) == indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, papers::upsert_paper};
    use crate::model::NewPaper;

    fn paper(id: &str, title: &str, abstract_text: &str, keywords: &[&str]) -> NewPaper {
        NewPaper {
            id: Some(id.into()),
            title: title.into(),
            abstract_text: Some(abstract_text.into()),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            ..NewPaper::default()
        }
    }

    fn seeded() -> Connection {
        let conn = open_in_memory().expect("store");
        for p in [
            paper(
                "p-attn",
                "Attention is all you need",
                "The transformer relies entirely on attention.",
                &["transformer"],
            ),
            paper(
                "p-bert",
                "BERT pre-training",
                "Bidirectional transformer encoders for language understanding.",
                &["language model"],
            ),
            paper(
                "p-fold",
                "Protein structure prediction",
                "Deep learning for folding.",
                &["biology"],
            ),
        ] {
            upsert_paper(&conn, &p).expect("insert paper");
        }
        conn
    }

    #[test]
    fn build_match_query_quotes_and_ors_tokens() {
        assert_eq!(
            build_match_query("graph neural-networks").as_deref(),
            Some("\"graph\" OR \"neural\" OR \"networks\"")
        );
    }

    #[test]
    fn build_match_query_keeps_trailing_prefix() {
        assert_eq!(build_match_query("transf*").as_deref(), Some("\"transf\"*"));
    }

    #[test]
    fn build_match_query_neutralizes_fts_syntax() {
        let expr = build_match_query("title:\"x\" AND (y OR").expect("tokens");
        assert_eq!(expr, "\"title\" OR \"x\" OR \"and\" OR \"y\" OR \"or\"");
        assert!(build_match_query("  ()\" - ").is_none());
    }

    #[test]
    fn title_match_outranks_abstract_match() {
        let conn = seeded();
        let hits = search_text(&conn, "attention", 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].paper_id, "p-attn");

        let hits = search_text(&conn, "transformer", 10).expect("search");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].paper_id, "p-attn");
        assert!(hits.iter().all(|h| h.score >= 0.0));
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn prefix_search_matches_stems() {
        let conn = seeded();
        let hits = search_text(&conn, "bidir*", 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].paper_id, "p-bert");
    }

    #[test]
    fn empty_query_returns_no_hits() {
        let conn = seeded();
        assert!(search_text(&conn, "  ", 10).expect("search").is_empty());
    }

    #[test]
    fn rebuild_restores_sync() {
        let conn = seeded();
        conn.execute("DELETE FROM papers_fts", []).expect("wipe fts");
        assert!(!fts_in_sync(&conn).expect("check"));

        rebuild_fts_index(&conn).expect("rebuild");
        assert!(fts_in_sync(&conn).expect("check"));
        assert_eq!(fts_row_count(&conn).expect("count"), 3);
    }
}
