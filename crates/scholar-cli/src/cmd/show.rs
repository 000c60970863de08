use std::io::Write;

use anyhow::Result;
use clap::Args;
use scholar_core::db::papers::{authors_for_paper, require_paper, topics_for_paper};
use scholar_core::model::Paper;
use serde::Serialize;

use super::Project;
use crate::output::{OutputMode, format_us, or_dash, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Paper ID.
    pub paper_id: String,
}

#[derive(Debug, Serialize)]
struct PaperDetail {
    #[serde(flatten)]
    paper: Paper,
    authors: Vec<String>,
    topics: Vec<String>,
}

/// Execute `scholar show <paper_id>`.
///
/// # Errors
///
/// Returns `PaperNotFound` for an unknown ID, or an error if the store
/// cannot be read.
pub fn run_show(args: &ShowArgs, output: OutputMode, project: &Project) -> Result<()> {
    let conn = project.open_store()?;
    let paper = require_paper(&conn, args.paper_id.trim())?;
    let authors = authors_for_paper(&conn, &paper.paper_id)?
        .into_iter()
        .map(|a| a.name)
        .collect();
    let topics = topics_for_paper(&conn, &paper.paper_id)?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let detail = PaperDetail {
        paper,
        authors,
        topics,
    };

    render_mode(output, &detail, render_text, render_pretty)
}

fn render_text(d: &PaperDetail, w: &mut dyn Write) -> std::io::Result<()> {
    let p = &d.paper;
    writeln!(w, "id\t{}", p.paper_id)?;
    writeln!(w, "title\t{}", p.title)?;
    writeln!(w, "year\t{}", p.year().map_or_else(String::new, |y| y.to_string()))?;
    writeln!(w, "journal\t{}", p.journal.as_deref().unwrap_or_default())?;
    writeln!(w, "doi\t{}", p.doi.as_deref().unwrap_or_default())?;
    writeln!(w, "citations\t{}", p.citation_count)?;
    writeln!(w, "authors\t{}", d.authors.join("; "))?;
    writeln!(w, "topics\t{}", d.topics.join("; "))?;
    writeln!(w, "keywords\t{}", p.keywords.join("; "))
}

fn render_pretty(d: &PaperDetail, w: &mut dyn Write) -> std::io::Result<()> {
    let p = &d.paper;
    pretty_section(w, &p.title)?;
    pretty_kv(w, "ID", &p.paper_id)?;
    pretty_kv(w, "Authors", or_dash(Some(d.authors.join(", ").as_str())))?;
    pretty_kv(
        w,
        "Published",
        p.publication_date
            .map_or_else(|| "-".to_string(), |date| date.to_string()),
    )?;
    pretty_kv(w, "Journal", or_dash(p.journal.as_deref()))?;
    if p.volume.is_some() || p.issue.is_some() || p.pages.is_some() {
        pretty_kv(
            w,
            "Volume",
            format!(
                "{} ({}) {}",
                or_dash(p.volume.as_deref()),
                or_dash(p.issue.as_deref()),
                or_dash(p.pages.as_deref())
            ),
        )?;
    }
    pretty_kv(w, "Publisher", or_dash(p.publisher.as_deref()))?;
    pretty_kv(w, "DOI", or_dash(p.doi.as_deref()))?;
    pretty_kv(w, "URL", or_dash(p.url.as_deref()))?;
    pretty_kv(w, "PDF", or_dash(p.pdf_url.as_deref()))?;
    pretty_kv(w, "Citations", p.citation_count.to_string())?;
    pretty_kv(w, "Topics", or_dash(Some(d.topics.join(", ").as_str())))?;
    pretty_kv(w, "Keywords", or_dash(Some(p.keywords.join(", ").as_str())))?;
    pretty_kv(w, "Updated", format_us(p.updated_at_us))?;

    if let Some(text) = p.abstract_text.as_deref().filter(|t| !t.trim().is_empty()) {
        writeln!(w)?;
        writeln!(w, "{text}")?;
    }
    Ok(())
}
