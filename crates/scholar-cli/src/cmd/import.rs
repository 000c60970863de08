//! `scholar import`: load papers from a JSON file into the store.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use scholar_core::db::papers::{ImportStats, import_papers};
use scholar_core::model::NewPaper;
use scholar_search::semantic::{SyncStats, sync_paper_embeddings};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Project;
use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
#[command(
    about = "Import papers from a JSON file",
    long_about = "Import papers from a JSON array (or an object with a `papers` array).\n\n\
                  Records with an `id` replace the existing paper with that ID. Records \
                  without one get an ID derived from the DOI or title, so re-importing \
                  the same file updates rather than duplicates.",
    after_help = "EXAMPLES:\n    # Import a corpus\n    scholar import papers.json\n\n\
                  # Skip embedding (lexical search only until `scholar reindex`)\n    \
                  scholar import papers.json --no-embed"
)]
pub struct ImportArgs {
    /// Path to the JSON file.
    pub file: PathBuf,

    /// Do not refresh embeddings after importing.
    #[arg(long)]
    pub no_embed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportFile {
    List(Vec<NewPaper>),
    Wrapped { papers: Vec<NewPaper> },
}

impl ImportFile {
    fn into_papers(self) -> Vec<NewPaper> {
        match self {
            Self::List(papers) | Self::Wrapped { papers } => papers,
        }
    }
}

#[derive(Debug, Serialize)]
struct ImportOutput {
    file: String,
    #[serde(flatten)]
    stats: ImportStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    embeddings: Option<SyncStats>,
}

/// Execute `scholar import <file>`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any record is
/// invalid (nothing is imported in that case), or embedding fails.
pub fn run_import(args: &ImportArgs, output: OutputMode, project: &Project) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let papers = serde_json::from_str::<ImportFile>(&raw)
        .with_context(|| format!("Failed to parse {} as paper records", args.file.display()))?
        .into_papers();

    let mut conn = project.open_store()?;
    let stats = import_papers(&mut conn, &papers)?;

    let embeddings = match project.embedder()? {
        Some(embedder) if !args.no_embed => Some(sync_paper_embeddings(&conn, &embedder)?),
        _ => {
            info!("skipping embedding refresh");
            None
        }
    };

    let out = ImportOutput {
        file: args.file.display().to_string(),
        stats,
        embeddings,
    };

    render_mode(
        output,
        &out,
        |o, w| {
            writeln!(
                w,
                "imported\t{}\t{}\t{}",
                o.stats.inserted,
                o.stats.updated,
                o.embeddings.map_or(0, |e| e.embedded)
            )
        },
        |o, w| {
            writeln!(w, "✓ Imported {}", o.file)?;
            pretty_kv(w, "Inserted", o.stats.inserted.to_string())?;
            pretty_kv(w, "Updated", o.stats.updated.to_string())?;
            match o.embeddings {
                Some(e) => pretty_kv(
                    w,
                    "Embedded",
                    format!("{} ({} unchanged, {} removed)", e.embedded, e.skipped, e.removed),
                ),
                None => pretty_kv(w, "Embedded", "skipped"),
            }
        },
    )
}
