//! Interaction tracking: `scholar view`, `scholar save`, `scholar feedback`.

use std::io::Write;

use anyhow::{Result, bail};
use clap::Args;
use scholar_core::db::users::{NewFeedback, record_feedback, record_view, resolve_user, save_paper};
use scholar_core::model::FeedbackKind;

use super::Project;
use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
#[command(
    about = "Record that a user viewed a paper",
    after_help = "EXAMPLES:\n    scholar view ada sp-0a1b2c3d4e5f --duration 120"
)]
pub struct ViewArgs {
    /// User ID or username.
    pub user: String,
    /// Paper ID.
    pub paper_id: String,
    /// Seconds spent on the paper.
    #[arg(long)]
    pub duration: Option<i64>,
}

#[derive(Args, Debug)]
#[command(
    about = "Save a paper to a user's collection",
    after_help = "EXAMPLES:\n    scholar save ada sp-0a1b2c3d4e5f --collection thesis --notes \"related work\""
)]
pub struct SaveArgs {
    /// User ID or username.
    pub user: String,
    /// Paper ID.
    pub paper_id: String,
    /// Collection name.
    #[arg(long)]
    pub collection: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
#[command(
    about = "Rate a paper, a search, or a recommendation",
    after_help = "EXAMPLES:\n    # Rate a paper's relevance\n    scholar feedback ada --paper sp-0a1b2c3d4e5f --rating 5\n\n\
                  # Rate a logged search\n    scholar feedback ada --search-id 3 --rating 2 --kind relevance --text \"off topic\""
)]
pub struct FeedbackArgs {
    /// User ID or username.
    pub user: String,
    /// Paper being rated.
    #[arg(long)]
    pub paper: Option<String>,
    /// Search (from `scholar search --user`) being rated.
    #[arg(long)]
    pub search_id: Option<i64>,
    /// Rating from 1 to 5.
    #[arg(long)]
    pub rating: f64,
    /// relevance, quality or recommendation.
    #[arg(long, default_value = "relevance")]
    pub kind: FeedbackKind,
    /// Free-form comment.
    #[arg(long)]
    pub text: Option<String>,
}

/// # Errors
///
/// Returns an error if the user or paper is unknown or the duration is
/// negative.
pub fn run_view(args: &ViewArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let user = resolve_user(&conn, &args.user)?;
    let view = record_view(&conn, user.user_id, args.paper_id.trim(), args.duration)?;

    render_mode(
        output,
        &view,
        |v, w| writeln!(w, "viewed\t{}\t{}", v.user_id, v.paper_id),
        |v, w| writeln!(w, "✓ {} viewed {}", user.username, v.paper_id),
    )
}

/// # Errors
///
/// Returns an error if the user or paper is unknown.
pub fn run_save(args: &SaveArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let user = resolve_user(&conn, &args.user)?;
    let saved = save_paper(
        &conn,
        user.user_id,
        args.paper_id.trim(),
        args.collection.as_deref(),
        args.notes.as_deref(),
    )?;

    render_mode(
        output,
        &saved,
        |s, w| writeln!(w, "saved\t{}\t{}\t{}", s.user_id, s.paper_id, s.collection_name),
        |s, w| {
            writeln!(
                w,
                "✓ Saved {} to {}'s \"{}\" collection",
                s.paper_id, user.username, s.collection_name
            )
        },
    )
}

/// # Errors
///
/// Returns an error if neither `--paper` nor `--search-id` is given, the
/// rating is out of range, or a referenced record is unknown.
pub fn run_feedback(args: &FeedbackArgs, output: OutputMode, project: &Project) -> Result<()> {
    if args.paper.is_none() && args.search_id.is_none() {
        bail!("feedback needs --paper or --search-id");
    }

    let conn = project.open_store()?;
    let user = resolve_user(&conn, &args.user)?;
    let feedback = record_feedback(
        &conn,
        &NewFeedback {
            user_id: user.user_id,
            paper_id: args.paper.as_deref().map(str::trim).map(str::to_string),
            search_id: args.search_id,
            rating: args.rating,
            kind: args.kind,
            text: args.text.clone(),
        },
    )?;

    render_mode(
        output,
        &feedback,
        |f, w| writeln!(w, "feedback\t{}\t{}\t{}", f.feedback_id, f.feedback_type, f.rating),
        |f, w| {
            writeln!(
                w,
                "✓ Recorded {} feedback #{} ({}/5)",
                f.feedback_type, f.feedback_id, f.rating
            )
        },
    )
}
