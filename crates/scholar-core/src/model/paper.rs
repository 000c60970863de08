use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix for paper IDs derived from content rather than supplied on import.
pub const DERIVED_ID_PREFIX: &str = "sp-";

const DERIVED_ID_HEX_LEN: usize = 12;

/// A stored paper row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub paper_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub publisher: Option<String>,
    pub citation_count: i64,
    pub keywords: Vec<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Paper {
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.publication_date.map(|d| d.year())
    }
}

/// Lightweight projection used to hydrate ranked IDs for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperSummary {
    pub paper_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub citation_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub author_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub topic_id: i64,
    pub name: String,
}

/// A paper record as it arrives from an import file.
///
/// `id` is optional; see [`NewPaper::resolved_id`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPaper {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, rename = "abstract", alias = "abstract_text")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub pages: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub citation_count: Option<i64>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl NewPaper {
    /// Check the record before it touches the store.
    ///
    /// # Errors
    ///
    /// Returns an error when the title is blank, the supplied ID is blank, or
    /// the citation count is negative.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("paper title must not be empty");
        }
        if let Some(id) = &self.id
            && id.trim().is_empty()
        {
            bail!("paper id must not be blank when provided");
        }
        if let Some(count) = self.citation_count
            && count < 0
        {
            bail!("citation_count must be >= 0 (got {count})");
        }
        Ok(())
    }

    /// The supplied ID, or one derived from the DOI / title.
    #[must_use]
    pub fn resolved_id(&self) -> String {
        self.id.as_deref().map_or_else(
            || derive_paper_id(self.doi.as_deref(), &self.title),
            |id| id.trim().to_string(),
        )
    }
}

/// Derive a stable paper ID: `sp-` + 12 hex chars of SHA-256 over the
/// normalized DOI when present, otherwise over the normalized title.
#[must_use]
pub fn derive_paper_id(doi: Option<&str>, title: &str) -> String {
    let basis = doi
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map_or_else(|| normalize_title(title), str::to_ascii_lowercase);

    let digest = Sha256::digest(basis.as_bytes());
    let hex = format!("{digest:x}");
    format!("{DERIVED_ID_PREFIX}{}", &hex[..DERIVED_ID_HEX_LEN])
}

fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
