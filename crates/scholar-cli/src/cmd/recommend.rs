use std::io::Write;

use anyhow::Result;
use clap::Args;
use scholar_core::db::users::resolve_user;
use scholar_search::recommend::{RecommendOptions, UserRecommendations, recommend_for_user};

use super::Project;
use crate::output::{OutputMode, pretty_rule, render_mode, truncate};

#[derive(Args, Debug)]
#[command(
    about = "Recommend papers for a user",
    long_about = "Recommend unseen papers from the user's interest topics and the papers \
                  they viewed, saved or rated highly. Users without any signal get \
                  trending papers.",
    after_help = "EXAMPLES:\n    scholar recommend ada\n    scholar recommend 1 -n 5 --format json"
)]
pub struct RecommendArgs {
    /// User ID or username.
    pub user: String,

    /// Maximum number of results to return.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,
}

/// Execute `scholar recommend <user>`.
///
/// # Errors
///
/// Returns `UserNotFound` for an unknown user, or an error if the store
/// cannot be read.
pub fn run_recommend(args: &RecommendArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let user = resolve_user(&conn, &args.user)?;
    let options = RecommendOptions::from_config(&project.config.search, &project.config.recommend);
    let recs = recommend_for_user(&conn, user.user_id, args.limit, &options)?;

    render_mode(
        output,
        &recs,
        |r, w| {
            for item in &r.items {
                writeln!(
                    w,
                    "{}\t{:.4}\t{}\t{}",
                    item.paper.paper_id, item.score, item.reason, item.paper.title
                )?;
            }
            Ok(())
        },
        |r, w| render_pretty(r, &user.username, w),
    )
}

fn render_pretty(
    recs: &UserRecommendations,
    username: &str,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(w, "Recommendations for {username}")?;
    if recs.fallback {
        writeln!(w, "note: no reading history or interests yet, showing trending papers")?;
    }
    pretty_rule(w)?;
    if recs.items.is_empty() {
        return writeln!(w, "Nothing to recommend yet.");
    }
    for (i, item) in recs.items.iter().enumerate() {
        writeln!(
            w,
            "{:>3}  {:<16} {:>7.3}  {}",
            i + 1,
            truncate(&item.paper.paper_id, 16),
            item.score,
            truncate(&item.paper.title, 56)
        )?;
    }
    Ok(())
}
