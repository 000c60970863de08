use std::io::Write;

use anyhow::Result;
use clap::Args;
use scholar_core::db::papers::TrendingPaper;
use scholar_search::recommend::trending;
use serde::Serialize;

use super::Project;
use crate::output::{OutputMode, pretty_rule, render_mode, truncate};

#[derive(Args, Debug)]
#[command(
    about = "Show trending papers",
    long_about = "Rank papers by recent engagement: three points per save plus one per view \
                  within the window, then by citation count.",
    after_help = "EXAMPLES:\n    # Last week (default window from config)\n    scholar trending\n\n\
                  # Last 30 days, top 20\n    scholar trending --days 30 -n 20"
)]
pub struct TrendingArgs {
    /// Maximum number of results to return.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,

    /// Window in days. Defaults to `recommend.trending_window_days`.
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct TrendingOutput {
    window_days: u32,
    papers: Vec<TrendingPaper>,
}

/// Execute `scholar trending`.
///
/// # Errors
///
/// Returns an error if the store is missing or the limit is zero.
pub fn run_trending(args: &TrendingArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let window_days = args
        .days
        .unwrap_or(project.config.recommend.trending_window_days);
    let papers = trending(&conn, args.limit, window_days)?;

    render_mode(
        output,
        &TrendingOutput {
            window_days,
            papers,
        },
        |o, w| {
            for t in &o.papers {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}",
                    t.summary.paper_id, t.engagement, t.views, t.saves, t.summary.title
                )?;
            }
            Ok(())
        },
        |o, w| {
            writeln!(w, "Trending papers (last {} days)", o.window_days)?;
            pretty_rule(w)?;
            writeln!(
                w,
                "{:>3}  {:<16} {:>5} {:>5} {:>5}  TITLE",
                "#", "ID", "SCORE", "VIEWS", "SAVES"
            )?;
            for (i, t) in o.papers.iter().enumerate() {
                writeln!(
                    w,
                    "{:>3}  {:<16} {:>5} {:>5} {:>5}  {}",
                    i + 1,
                    truncate(&t.summary.paper_id, 16),
                    t.engagement,
                    t.views,
                    t.saves,
                    truncate(&t.summary.title, 50)
                )?;
            }
            Ok(())
        },
    )
}
