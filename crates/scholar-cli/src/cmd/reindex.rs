use std::io::Write;

use anyhow::Result;
use clap::Args;
use scholar_core::db::fts::{fts_row_count, rebuild_fts_index};
use scholar_core::db::papers::count_papers;
use scholar_search::semantic::{SyncStats, clear_embeddings, sync_paper_embeddings};
use serde::Serialize;
use tracing::info;

use super::Project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
#[command(
    about = "Rebuild the full-text index and refresh embeddings",
    long_about = "Rebuild the FTS5 index from the papers table, then bring embeddings \
                  up to date. Only papers whose text changed are re-embedded unless \
                  --full is given.",
    after_help = "EXAMPLES:\n    scholar reindex\n\n    # Drop and recompute every embedding\n    scholar reindex --full"
)]
pub struct ReindexArgs {
    /// Drop all stored embeddings before re-embedding.
    #[arg(long)]
    pub full: bool,
}

#[derive(Debug, Serialize)]
struct ReindexOutput {
    papers: u64,
    fts_rows: u64,
    cleared: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    embeddings: Option<SyncStats>,
}

/// Execute `scholar reindex`.
///
/// # Errors
///
/// Returns an error if the store is missing or any rebuild step fails.
pub fn run_reindex(args: &ReindexArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    rebuild_fts_index(&conn)?;

    let cleared = if args.full { clear_embeddings(&conn)? } else { 0 };
    let embeddings = match project.embedder()? {
        Some(embedder) => Some(sync_paper_embeddings(&conn, &embedder)?),
        None => {
            info!("semantic search disabled, embeddings left untouched");
            None
        }
    };

    let out = ReindexOutput {
        papers: count_papers(&conn)?,
        fts_rows: fts_row_count(&conn)?,
        cleared,
        embeddings,
    };

    render_mode(
        output,
        &out,
        |o, w| {
            writeln!(w, "papers\t{}", o.papers)?;
            writeln!(w, "fts_rows\t{}", o.fts_rows)?;
            if let Some(e) = o.embeddings {
                writeln!(w, "embedded\t{}", e.embedded)?;
            }
            Ok(())
        },
        |o, w| {
            pretty_section(w, "Reindex complete")?;
            pretty_kv(w, "Papers", o.papers.to_string())?;
            pretty_kv(w, "FTS rows", o.fts_rows.to_string())?;
            if o.cleared > 0 {
                pretty_kv(w, "Cleared", o.cleared.to_string())?;
            }
            match o.embeddings {
                Some(e) => pretty_kv(
                    w,
                    "Embeddings",
                    format!("{} embedded, {} unchanged, {} removed", e.embedded, e.skipped, e.removed),
                ),
                None => pretty_kv(w, "Embeddings", "disabled"),
            }
        },
    )
}
