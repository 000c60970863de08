use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};
use scholar_core::db::users::{
    create_user, interests_for_user, resolve_user, saved_papers_for_user, search_history_for_user,
};
use scholar_core::model::{NewUser, SavedPaper, SearchHistoryEntry, User};
use serde::Serialize;

use super::Project;
use crate::output::{OutputMode, format_us, or_dash, pretty_kv, pretty_section, render_mode};

/// Searches shown by `scholar user show`.
const RECENT_SEARCHES: usize = 10;

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    #[command(
        about = "Create a user",
        after_help = "EXAMPLES:\n    scholar user add ada --email ada@example.org \
                      --interest \"graph learning\" --interest \"information retrieval\""
    )]
    Add(AddUserArgs),

    #[command(about = "Show a user's profile, saved papers and recent searches")]
    Show(ShowUserArgs),
}

#[derive(Args, Debug)]
pub struct AddUserArgs {
    /// Unique username.
    pub username: String,

    /// Unique email address.
    #[arg(long)]
    pub email: String,

    /// Full name.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub institution: Option<String>,

    /// Interest topic (repeatable).
    #[arg(long = "interest")]
    pub interests: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ShowUserArgs {
    /// User ID or username.
    pub user: String,
}

#[derive(Debug, Serialize)]
struct UserProfile {
    #[serde(flatten)]
    user: User,
    interests: Vec<String>,
    saved: Vec<SavedPaper>,
    recent_searches: Vec<SearchHistoryEntry>,
}

/// Dispatch `scholar user <subcommand>`.
///
/// # Errors
///
/// Returns an error if validation fails, the username or email is taken, or
/// the user is unknown.
pub fn run_user(command: &UserCommand, output: OutputMode, project: &Project) -> Result<()> {
    match command {
        UserCommand::Add(args) => run_add(args, output, project),
        UserCommand::Show(args) => run_show(args, output, project),
    }
}

fn run_add(args: &AddUserArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let user = create_user(
        &conn,
        &NewUser {
            username: args.username.clone(),
            email: args.email.clone(),
            full_name: args.name.clone(),
            institution: args.institution.clone(),
            interests: args.interests.clone(),
        },
    )?;
    let profile = load_profile(&conn, user)?;

    render_mode(
        output,
        &profile,
        |p, w| writeln!(w, "{}\t{}", p.user.user_id, p.user.username),
        |p, w| {
            writeln!(w, "✓ Created user {} (#{})", p.user.username, p.user.user_id)?;
            pretty_kv(w, "Interests", or_dash(Some(p.interests.join(", ").as_str())))
        },
    )
}

fn run_show(args: &ShowUserArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let user = resolve_user(&conn, &args.user)?;
    let profile = load_profile(&conn, user)?;

    render_mode(output, &profile, render_text, render_pretty)
}

fn load_profile(conn: &rusqlite::Connection, user: User) -> Result<UserProfile> {
    let interests = interests_for_user(conn, user.user_id)?
        .into_iter()
        .map(|t| t.name)
        .collect();
    let saved = saved_papers_for_user(conn, user.user_id)?;
    let recent_searches = search_history_for_user(conn, user.user_id, RECENT_SEARCHES)?;
    Ok(UserProfile {
        user,
        interests,
        saved,
        recent_searches,
    })
}

fn render_text(p: &UserProfile, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "id\t{}", p.user.user_id)?;
    writeln!(w, "username\t{}", p.user.username)?;
    writeln!(w, "email\t{}", p.user.email)?;
    writeln!(w, "interests\t{}", p.interests.join("; "))?;
    for s in &p.saved {
        writeln!(w, "saved\t{}\t{}", s.collection_name, s.paper_id)?;
    }
    for h in &p.recent_searches {
        writeln!(w, "search\t{}\t{}\t{}", h.search_id, h.search_type, h.query)?;
    }
    Ok(())
}

fn render_pretty(p: &UserProfile, w: &mut dyn Write) -> std::io::Result<()> {
    let u = &p.user;
    pretty_section(w, &format!("{} (#{})", u.username, u.user_id))?;
    pretty_kv(w, "Name", or_dash(u.full_name.as_deref()))?;
    pretty_kv(w, "Email", &u.email)?;
    pretty_kv(w, "Institution", or_dash(u.institution.as_deref()))?;
    pretty_kv(w, "Interests", or_dash(Some(p.interests.join(", ").as_str())))?;
    pretty_kv(w, "Joined", format_us(u.created_at_us))?;

    writeln!(w)?;
    writeln!(w, "Saved papers ({})", p.saved.len())?;
    for s in &p.saved {
        match s.notes.as_deref() {
            Some(notes) => writeln!(w, "  [{}] {}  {notes}", s.collection_name, s.paper_id)?,
            None => writeln!(w, "  [{}] {}", s.collection_name, s.paper_id)?,
        }
    }

    writeln!(w)?;
    writeln!(w, "Recent searches")?;
    for h in &p.recent_searches {
        writeln!(
            w,
            "  #{:<4} {:<8} {:>3} hits  {}",
            h.search_id, h.search_type, h.result_count, h.query
        )?;
    }
    Ok(())
}
