use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use super::model::Embedder;
use scholar_core::db::{now_us, papers::embedding_texts};

/// Counts from one [`sync_paper_embeddings`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub embedded: usize,
    pub skipped: usize,
    pub removed: usize,
}

/// Create the embedding table if it does not exist.
///
/// # Errors
///
/// Returns an error if the DDL fails.
pub fn ensure_semantic_index_schema(db: &Connection) -> Result<()> {
    db.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS paper_embeddings (
            paper_id TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL,
            model_id TEXT NOT NULL,
            dimension INTEGER NOT NULL CHECK (dimension > 0),
            embedding_json TEXT NOT NULL,
            updated_at_us INTEGER NOT NULL
        );
        ",
    )
    .context("failed to create semantic index schema")?;
    Ok(())
}

/// Bring `paper_embeddings` in line with `papers`.
///
/// Papers whose content hash (text + model ID) is unchanged are skipped,
/// changed or new papers are embedded in one batch, and rows for papers that
/// no longer exist are removed. All writes happen in one transaction.
///
/// # Errors
///
/// Returns an error if reading papers, embedding, or writing fails.
#[instrument(skip(db, embedder), fields(model = %embedder.model_id()))]
pub fn sync_paper_embeddings(db: &Connection, embedder: &dyn Embedder) -> Result<SyncStats> {
    ensure_semantic_index_schema(db)?;

    let model_id = embedder.model_id();
    let texts = embedding_texts(db)?;
    let live: BTreeSet<&str> = texts.iter().map(|(id, _)| id.as_str()).collect();

    let mut stats = SyncStats::default();
    let mut pending = Vec::new();
    for (paper_id, text) in &texts {
        let hash = content_hash_hex(&model_id, text);
        if has_same_hash(db, paper_id, &hash)? {
            stats.skipped += 1;
            continue;
        }
        pending.push((paper_id.as_str(), hash, text.as_str()));
    }

    let embeddings = if pending.is_empty() {
        Vec::new()
    } else {
        let batch: Vec<&str> = pending.iter().map(|(_, _, text)| *text).collect();
        let out = embedder
            .embed_batch(&batch)
            .context("batch embedding inference failed")?;
        if out.len() != pending.len() {
            bail!(
                "embedding batch length mismatch: expected {}, got {}",
                pending.len(),
                out.len()
            );
        }
        out
    };

    let tx = db
        .unchecked_transaction()
        .context("begin embedding sync transaction")?;

    for ((paper_id, hash, _), embedding) in pending.iter().zip(&embeddings) {
        upsert_embedding(
            &tx,
            paper_id,
            hash,
            &model_id,
            embedder.dimension(),
            embedding,
        )?;
        stats.embedded += 1;
    }

    let stored = stored_ids(&tx)?;
    for orphan in stored.iter().filter(|id| !live.contains(id.as_str())) {
        tx.execute(
            "DELETE FROM paper_embeddings WHERE paper_id = ?1",
            [orphan],
        )
        .with_context(|| format!("failed to remove embedding for {orphan}"))?;
        stats.removed += 1;
    }

    tx.commit().context("commit embedding sync")?;

    info!(
        embedded = stats.embedded,
        skipped = stats.skipped,
        removed = stats.removed,
        "synced paper embeddings"
    );
    Ok(stats)
}

/// Drop every stored embedding. The next sync re-embeds all papers.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn clear_embeddings(db: &Connection) -> Result<usize> {
    ensure_semantic_index_schema(db)?;
    db.execute("DELETE FROM paper_embeddings", [])
        .context("failed to clear paper embeddings")
}

fn stored_ids(db: &Connection) -> Result<Vec<String>> {
    let mut stmt = db
        .prepare("SELECT paper_id FROM paper_embeddings ORDER BY paper_id")
        .context("failed to prepare embedding id query")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to read embedding ids")
}

fn has_same_hash(db: &Connection, paper_id: &str, content_hash: &str) -> Result<bool> {
    let existing = db
        .query_row(
            "SELECT content_hash FROM paper_embeddings WHERE paper_id = ?1",
            params![paper_id],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .with_context(|| format!("failed to query content hash for paper {paper_id}"))?;

    Ok(existing.as_deref() == Some(content_hash))
}

fn upsert_embedding(
    db: &Connection,
    paper_id: &str,
    content_hash: &str,
    model_id: &str,
    dimension: usize,
    embedding: &[f32],
) -> Result<()> {
    if embedding.len() != dimension {
        bail!(
            "invalid embedding dimension for paper {paper_id}: expected {dimension}, got {}",
            embedding.len()
        );
    }

    let encoded = serde_json::to_string(embedding)
        .with_context(|| format!("failed to encode embedding for paper {paper_id}"))?;

    db.execute(
        "INSERT INTO paper_embeddings (
            paper_id, content_hash, model_id, dimension, embedding_json, updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(paper_id) DO UPDATE SET
            content_hash = excluded.content_hash,
            model_id = excluded.model_id,
            dimension = excluded.dimension,
            embedding_json = excluded.embedding_json,
            updated_at_us = excluded.updated_at_us",
        params![
            paper_id,
            content_hash,
            model_id,
            i64::try_from(dimension).unwrap_or(i64::MAX),
            encoded,
            now_us()
        ],
    )
    .with_context(|| format!("failed to upsert embedding for paper {paper_id}"))?;

    debug!(%paper_id, "stored embedding");
    Ok(())
}

fn content_hash_hex(model_id: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
