use std::io::Write;

use anyhow::Result;
use clap::Args;
use scholar_search::recommend::{Recommendation, similar_papers};
use serde::Serialize;

use super::Project;
use crate::output::{OutputMode, pretty_rule, render_mode, truncate};

#[derive(Args, Debug)]
#[command(
    about = "Find papers similar to a paper",
    long_about = "Rank papers by embedding similarity to one paper. Requires embeddings \
                  (`scholar import` or `scholar reindex` create them).",
    after_help = "EXAMPLES:\n    scholar similar sp-0a1b2c3d4e5f -n 5"
)]
pub struct SimilarArgs {
    /// Paper ID to find neighbours of.
    pub paper_id: String,

    /// Maximum number of results to return.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
struct SimilarOutput {
    paper_id: String,
    results: Vec<Recommendation>,
}

/// Execute `scholar similar <paper_id>`.
///
/// # Errors
///
/// Returns `PaperNotFound` for an unknown paper or `SemanticIndexMissing`
/// when the paper has no embedding.
pub fn run_similar(args: &SimilarArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let paper_id = args.paper_id.trim().to_string();
    let results = similar_papers(&conn, &paper_id, args.limit)?;

    render_mode(
        output,
        &SimilarOutput { paper_id, results },
        |o, w| {
            for r in &o.results {
                writeln!(w, "{}\t{:.4}\t{}", r.paper.paper_id, r.score, r.paper.title)?;
            }
            Ok(())
        },
        |o, w| {
            writeln!(w, "Papers similar to {}", o.paper_id)?;
            pretty_rule(w)?;
            if o.results.is_empty() {
                return writeln!(w, "No similar papers found.");
            }
            for (i, r) in o.results.iter().enumerate() {
                writeln!(
                    w,
                    "{:>3}  {:<16} {:>6.3}  {}",
                    i + 1,
                    truncate(&r.paper.paper_id, 16),
                    r.score,
                    truncate(&r.paper.title, 60)
                )?;
            }
            Ok(())
        },
    )
}
