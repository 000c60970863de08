//! Paper repository: upsert/import, lookups, relationship traversal and the
//! trending query.

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::now_us;
use crate::error::StoreError;
use crate::model::{Author, NewPaper, Paper, PaperSummary, Topic};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of a single [`upsert_paper`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub paper_id: String,
    pub created: bool,
}

/// Totals for a batch import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub inserted: usize,
    pub updated: usize,
}

/// A paper with trending counters for the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingPaper {
    #[serde(flatten)]
    pub summary: PaperSummary,
    pub views: i64,
    pub saves: i64,
    /// `3 * saves + views`.
    pub engagement: i64,
}

/// Insert a paper or update the existing row with the same ID.
///
/// Authors, topics and keywords are replaced wholesale. `created_at_us` is
/// kept on update.
///
/// # Errors
///
/// Returns an error if the record is invalid, its DOI belongs to another
/// paper ([`StoreError::DuplicateDoi`]), or any statement fails.
pub fn upsert_paper(conn: &Connection, paper: &NewPaper) -> Result<UpsertOutcome> {
    paper.validate()?;
    let paper_id = paper.resolved_id();
    let doi = paper
        .doi
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    if let Some(doi) = doi {
        let owner: Option<String> = conn
            .query_row(
                "SELECT paper_id FROM papers WHERE doi = ?1 AND paper_id <> ?2",
                params![doi, paper_id],
                |row| row.get(0),
            )
            .optional()
            .context("check DOI ownership")?;
        if let Some(owner) = owner {
            return Err(StoreError::DuplicateDoi {
                doi: doi.to_string(),
                owner,
            }
            .into());
        }
    }

    let created = !paper_exists(conn, &paper_id)?;
    let authors = dedup_names(&paper.authors);
    let topics = dedup_names(&paper.topics);
    let keywords = dedup_names(&paper.keywords);
    let now = now_us();

    conn.execute(
        "INSERT INTO papers (
            paper_id, title, abstract, doi, url, pdf_url, publication_date,
            journal, volume, issue, pages, publisher, citation_count,
            search_keywords, search_authors, search_topics,
            created_at_us, updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)
         ON CONFLICT(paper_id) DO UPDATE SET
            title = excluded.title,
            abstract = excluded.abstract,
            doi = excluded.doi,
            url = excluded.url,
            pdf_url = excluded.pdf_url,
            publication_date = excluded.publication_date,
            journal = excluded.journal,
            volume = excluded.volume,
            issue = excluded.issue,
            pages = excluded.pages,
            publisher = excluded.publisher,
            citation_count = excluded.citation_count,
            search_keywords = excluded.search_keywords,
            search_authors = excluded.search_authors,
            search_topics = excluded.search_topics,
            updated_at_us = excluded.updated_at_us",
        params![
            paper_id,
            paper.title.trim(),
            paper.abstract_text,
            doi,
            paper.url,
            paper.pdf_url,
            paper
                .publication_date
                .map(|d| d.format(DATE_FORMAT).to_string()),
            paper.journal,
            paper.volume,
            paper.issue,
            paper.pages,
            paper.publisher,
            paper.citation_count.unwrap_or(0),
            keywords.join(" "),
            authors.join(" "),
            topics.join(" "),
            now,
        ],
    )
    .with_context(|| format!("upsert paper {paper_id}"))?;

    replace_links(conn, &paper_id, &authors, &topics, &keywords)?;

    debug!(%paper_id, created, "upserted paper");
    Ok(UpsertOutcome { paper_id, created })
}

/// Import a batch of records in one transaction.
///
/// Any invalid record aborts the whole batch with
/// [`StoreError::InvalidImportRecord`] naming its position.
///
/// # Errors
///
/// Returns an error if any record fails to upsert.
#[instrument(skip(conn, papers), fields(count = papers.len()))]
pub fn import_papers(conn: &mut Connection, papers: &[NewPaper]) -> Result<ImportStats> {
    let tx = conn.transaction().context("begin import transaction")?;
    let mut stats = ImportStats::default();

    for (index, paper) in papers.iter().enumerate() {
        if let Err(error) = paper.validate() {
            return Err(StoreError::InvalidImportRecord {
                index,
                reason: error.to_string(),
            }
            .into());
        }
        let outcome = upsert_paper(&tx, paper)?;
        if outcome.created {
            stats.inserted += 1;
        } else {
            stats.updated += 1;
        }
    }

    tx.commit().context("commit import transaction")?;
    info!(
        inserted = stats.inserted,
        updated = stats.updated,
        "imported papers"
    );
    Ok(stats)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn paper_exists(conn: &Connection, paper_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM papers WHERE paper_id = ?1)",
        [paper_id],
        |row| row.get(0),
    )
    .context("check paper existence")
}

/// Load one paper with its keywords.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_paper(conn: &Connection, paper_id: &str) -> Result<Option<Paper>> {
    let row = conn
        .query_row(
            "SELECT paper_id, title, abstract, doi, url, pdf_url, publication_date,
                    journal, volume, issue, pages, publisher, citation_count,
                    created_at_us, updated_at_us
             FROM papers WHERE paper_id = ?1",
            [paper_id],
            |row| {
                Ok(Paper {
                    paper_id: row.get(0)?,
                    title: row.get(1)?,
                    abstract_text: row.get(2)?,
                    doi: row.get(3)?,
                    url: row.get(4)?,
                    pdf_url: row.get(5)?,
                    publication_date: parse_date(row.get::<_, Option<String>>(6)?.as_deref()),
                    journal: row.get(7)?,
                    volume: row.get(8)?,
                    issue: row.get(9)?,
                    pages: row.get(10)?,
                    publisher: row.get(11)?,
                    citation_count: row.get(12)?,
                    keywords: Vec::new(),
                    created_at_us: row.get(13)?,
                    updated_at_us: row.get(14)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("load paper {paper_id}"))?;

    match row {
        Some(mut paper) => {
            paper.keywords = keywords_for_paper(conn, paper_id)?;
            Ok(Some(paper))
        }
        None => Ok(None),
    }
}

/// Like [`get_paper`] but a missing paper is a [`StoreError::PaperNotFound`].
///
/// # Errors
///
/// Returns an error if the paper does not exist or the query fails.
pub fn require_paper(conn: &Connection, paper_id: &str) -> Result<Paper> {
    get_paper(conn, paper_id)?
        .ok_or_else(|| StoreError::PaperNotFound(paper_id.to_string()).into())
}

/// Delete a paper; interactions and links cascade.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_paper(conn: &Connection, paper_id: &str) -> Result<bool> {
    let removed = conn
        .execute("DELETE FROM papers WHERE paper_id = ?1", [paper_id])
        .with_context(|| format!("delete paper {paper_id}"))?;
    Ok(removed > 0)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn count_papers(conn: &Connection) -> Result<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))
        .context("count papers")?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Authors in byline order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn authors_for_paper(conn: &Connection, paper_id: &str) -> Result<Vec<Author>> {
    let mut stmt = conn
        .prepare(
            "SELECT a.author_id, a.name
             FROM paper_authors pa
             INNER JOIN authors a ON a.author_id = pa.author_id
             WHERE pa.paper_id = ?1
             ORDER BY pa.position",
        )
        .context("prepare authors query")?;
    let rows = stmt.query_map([paper_id], |row| {
        Ok(Author {
            author_id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("load authors for {paper_id}"))
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn topics_for_paper(conn: &Connection, paper_id: &str) -> Result<Vec<Topic>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.topic_id, t.name
             FROM paper_topics pt
             INNER JOIN topics t ON t.topic_id = pt.topic_id
             WHERE pt.paper_id = ?1
             ORDER BY t.name",
        )
        .context("prepare topics query")?;
    let rows = stmt.query_map([paper_id], |row| {
        Ok(Topic {
            topic_id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("load topics for {paper_id}"))
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn keywords_for_paper(conn: &Connection, paper_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT keyword FROM paper_keywords WHERE paper_id = ?1 ORDER BY position")
        .context("prepare keywords query")?;
    let rows = stmt.query_map([paper_id], |row| row.get(0))?;
    rows.collect::<rusqlite::Result<Vec<String>>>()
        .with_context(|| format!("load keywords for {paper_id}"))
}

/// Display projections for a set of paper IDs. IDs with no row are absent
/// from the map.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn paper_summaries(
    conn: &Connection,
    paper_ids: &[String],
) -> Result<HashMap<String, PaperSummary>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT paper_id, title, publication_date, journal, citation_count
             FROM papers WHERE paper_id = ?1",
        )
        .context("prepare summary query")?;

    let mut out = HashMap::with_capacity(paper_ids.len());
    for id in paper_ids {
        let summary = stmt
            .query_row([id], summary_from_row)
            .optional()
            .with_context(|| format!("load summary for {id}"))?;
        if let Some(summary) = summary {
            out.insert(id.clone(), summary);
        }
    }
    Ok(out)
}

/// `(paper_id, text)` pairs to embed: title, abstract and keywords joined.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn embedding_texts(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare(
            "SELECT paper_id, title, COALESCE(abstract, ''), search_keywords
             FROM papers ORDER BY paper_id",
        )
        .context("prepare embedding text query")?;
    let rows = stmt.query_map([], |row| {
        let id: String = row.get(0)?;
        let parts: [String; 3] = [row.get(1)?, row.get(2)?, row.get(3)?];
        let text = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Ok((id, text))
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("load embedding texts")
}

/// Papers ranked by recent engagement (`3 * saves + views` since
/// `since_us`), then citation count, then ID.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn trending_papers(conn: &Connection, since_us: i64, limit: usize) -> Result<Vec<TrendingPaper>> {
    let mut stmt = conn
        .prepare(
            "SELECT paper_id, title, publication_date, journal, citation_count, views, saves
             FROM (
                SELECT p.paper_id, p.title, p.publication_date, p.journal, p.citation_count,
                       (SELECT COUNT(*) FROM paper_views v
                         WHERE v.paper_id = p.paper_id AND v.created_at_us >= ?1) AS views,
                       (SELECT COUNT(*) FROM saved_papers s
                         WHERE s.paper_id = p.paper_id AND s.created_at_us >= ?1) AS saves
                FROM papers p
             )
             ORDER BY (3 * saves + views) DESC, citation_count DESC, paper_id ASC
             LIMIT ?2",
        )
        .context("prepare trending query")?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![since_us, limit], |row| {
        let views: i64 = row.get(5)?;
        let saves: i64 = row.get(6)?;
        Ok(TrendingPaper {
            summary: summary_from_row(row)?,
            views,
            saves,
            engagement: 3 * saves + views,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("load trending papers")
}

/// Insert the topic if missing and return its ID. Names match
/// case-insensitively.
pub(crate) fn ensure_topic(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO topics (name) VALUES (?1)", [name])
        .with_context(|| format!("insert topic {name}"))?;
    conn.query_row("SELECT topic_id FROM topics WHERE name = ?1", [name], |row| {
        row.get(0)
    })
    .with_context(|| format!("resolve topic {name}"))
}

fn ensure_author(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO authors (name) VALUES (?1)", [name])
        .with_context(|| format!("insert author {name}"))?;
    conn.query_row(
        "SELECT author_id FROM authors WHERE name = ?1",
        [name],
        |row| row.get(0),
    )
    .with_context(|| format!("resolve author {name}"))
}

fn replace_links(
    conn: &Connection,
    paper_id: &str,
    authors: &[String],
    topics: &[String],
    keywords: &[String],
) -> Result<()> {
    for table in ["paper_authors", "paper_topics", "paper_keywords"] {
        conn.execute(&format!("DELETE FROM {table} WHERE paper_id = ?1"), [paper_id])
            .with_context(|| format!("clear {table} for {paper_id}"))?;
    }

    for (position, name) in (0_i64..).zip(authors) {
        let author_id = ensure_author(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO paper_authors (paper_id, author_id, position)
             VALUES (?1, ?2, ?3)",
            params![paper_id, author_id, position],
        )
        .context("link author")?;
    }

    for name in topics {
        let topic_id = ensure_topic(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO paper_topics (paper_id, topic_id) VALUES (?1, ?2)",
            params![paper_id, topic_id],
        )
        .context("link topic")?;
    }

    for (position, keyword) in (0_i64..).zip(keywords) {
        conn.execute(
            "INSERT OR IGNORE INTO paper_keywords (paper_id, keyword, position)
             VALUES (?1, ?2, ?3)",
            params![paper_id, keyword, position],
        )
        .context("insert keyword")?;
    }

    Ok(())
}

/// Trim, drop blanks and case-insensitive duplicates, keep first spelling.
fn dedup_names(names: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && seen.insert(n.to_lowercase()))
        .map(str::to_string)
        .collect()
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaperSummary> {
    let date: Option<String> = row.get(2)?;
    Ok(PaperSummary {
        paper_id: row.get(0)?,
        title: row.get(1)?,
        year: parse_date(date.as_deref()).map(|d| d.year()),
        journal: row.get(3)?,
        citation_count: row.get(4)?,
    })
}
