//! `scholar search`: hybrid search over papers.
//!
//! Fuses lexical (FTS5/BM25) and vector (embedding KNN) candidate lists with
//! weighted-score or reciprocal-rank fusion. Falls back to lexical-only when
//! no embeddings exist yet.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use scholar_core::db::users::{record_search, resolve_user};
use scholar_search::fusion::{
    FusionConfig, FusionStrategy, SearchHit, SearchMode, SearchOutcome, SearchRequest, search,
};
use scholar_search::semantic::Embedder;
use serde::Serialize;

use super::Project;
use crate::output::{OutputMode, pretty_rule, render_mode, truncate};

#[derive(Args, Debug)]
#[command(
    about = "Search papers",
    long_about = "Search papers with hybrid ranking (lexical BM25 + vector similarity).\n\n\
                  Query text is split into terms that are OR-ed together; a trailing `*` \
                  makes a prefix match ('transf*'). Pass --raw to use FTS5 syntax directly.",
    after_help = "EXAMPLES:\n    # Hybrid search\n    scholar search \"graph neural networks\"\n\n\
                  # Keyword only, top 5\n    scholar search transformer --mode keyword -n 5\n\n\
                  # Reciprocal rank fusion\n    scholar search \"protein folding\" --fusion rrf\n\n\
                  # Favor semantic matches and log the search for user ada\n    \
                  scholar search \"language models\" --vector-weight 0.8 --lexical-weight 0.2 --user ada\n\n\
                  # Machine-readable output\n    scholar search attention --format json"
)]
pub struct SearchArgs {
    /// Search query.
    pub query: String,

    /// Maximum number of results to return.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,

    /// Retrieval mode: keyword, vector or hybrid.
    #[arg(long, default_value = "hybrid")]
    pub mode: SearchMode,

    /// Fusion strategy (weighted-score or rrf). Defaults to `search.fusion`.
    #[arg(long)]
    pub fusion: Option<FusionStrategy>,

    /// Weight of the lexical list in weighted-score fusion.
    #[arg(long)]
    pub lexical_weight: Option<f64>,

    /// Weight of the vector list in weighted-score fusion.
    #[arg(long)]
    pub vector_weight: Option<f64>,

    /// RRF constant `k`.
    #[arg(long)]
    pub rrf_k: Option<u32>,

    /// Pass the query to FTS5 verbatim (AND/OR/NOT, column filters, phrases).
    #[arg(long)]
    pub raw: bool,

    /// Record this search in the history of a user (ID or username).
    #[arg(long)]
    pub user: Option<String>,
}

impl SearchArgs {
    fn fusion_config(&self, base: FusionConfig) -> FusionConfig {
        FusionConfig {
            strategy: self.fusion.unwrap_or(base.strategy),
            lexical_weight: self.lexical_weight.unwrap_or(base.lexical_weight),
            vector_weight: self.vector_weight.unwrap_or(base.vector_weight),
            rrf_k: self.rrf_k.unwrap_or(base.rrf_k),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchOutput {
    #[serde(flatten)]
    outcome: SearchOutcome,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_id: Option<i64>,
}

/// Execute `scholar search <query>`.
///
/// # Errors
///
/// Returns an error if the store is missing, the fusion arguments are
/// invalid, vector mode is requested without embeddings, or the user passed
/// to `--user` does not exist.
pub fn run_search(args: &SearchArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let embedder = project.embedder()?;

    let search_cfg = &project.config.search;
    let mut request = SearchRequest::new(args.query.clone(), args.mode, args.limit);
    request.fusion = args.fusion_config(FusionConfig::from(search_cfg));
    request.oversample = search_cfg.oversample;
    request.raw_query = args.raw;

    let outcome = search(
        &conn,
        embedder.as_ref().map(|e| e as &dyn Embedder),
        &request,
    )?;

    let search_id = match &args.user {
        Some(key) => {
            let user = resolve_user(&conn, key)?;
            Some(record_search(
                &conn,
                user.user_id,
                &args.query,
                outcome.mode.as_str(),
                outcome.hits.len(),
            )?)
        }
        None => None,
    };

    let out = SearchOutput {
        count: outcome.hits.len(),
        outcome,
        search_id,
    };

    render_mode(output, &out, render_search_text, render_search_pretty)
}

fn render_search_text(out: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for hit in &out.outcome.hits {
        writeln!(
            w,
            "{}\t{}\t{:.4}\t{}",
            hit.rank, hit.paper.paper_id, hit.combined_score, hit.paper.title
        )?;
    }
    Ok(())
}

fn render_search_pretty(out: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let o = &out.outcome;
    writeln!(
        w,
        "Search: \"{}\" ({} mode, {} fusion)",
        o.query, o.mode, o.strategy
    )?;
    if o.degraded {
        writeln!(w, "note: no embeddings available, results are lexical only")?;
    }
    pretty_rule(w)?;

    if o.hits.is_empty() {
        return writeln!(w, "No papers found.");
    }

    writeln!(
        w,
        "{:>3}  {:<16} {:>6}  {:>4}  TITLE",
        "#", "ID", "SCORE", "YEAR"
    )?;
    for hit in &o.hits {
        writeln!(
            w,
            "{:>3}  {:<16} {:>6.3}  {:>4}  {}{}",
            hit.rank,
            truncate(&hit.paper.paper_id, 16),
            hit.combined_score,
            hit.paper.year.map_or_else(|| "-".to_string(), |y| y.to_string()),
            truncate(&hit.paper.title, 60),
            channels(hit)
        )?;
    }

    pretty_rule(w)?;
    write!(w, "{} result(s)", out.count)?;
    if let Some(id) = out.search_id {
        write!(w, ", logged as search #{id}")?;
    }
    writeln!(w)
}

/// Which channels matched, e.g. ` [lex #1, vec #3]`.
fn channels(hit: &SearchHit) -> String {
    let mut parts = Vec::with_capacity(2);
    if let Some(rank) = hit.lexical_rank {
        parts.push(format!("lex #{rank}"));
    }
    if let Some(rank) = hit.vector_rank {
        parts.push(format!("vec #{rank}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" [{}]", parts.join(", "))
    }
}
