use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub institution: Option<String>,
    pub created_at_us: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    /// Topic names the user is interested in.
    #[serde(default)]
    pub interests: Vec<String>,
}

impl NewUser {
    /// # Errors
    ///
    /// Returns an error when the username is blank or the email has no `@`.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("username must not be empty");
        }
        if !self.email.contains('@') {
            bail!("email '{}' is not a valid address", self.email);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperView {
    pub user_id: i64,
    pub paper_id: String,
    pub view_duration_secs: Option<i64>,
    pub created_at_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedPaper {
    pub user_id: i64,
    pub paper_id: String,
    pub collection_name: String,
    pub notes: Option<String>,
    pub created_at_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHistoryEntry {
    pub search_id: i64,
    pub user_id: i64,
    pub query: String,
    pub search_type: String,
    pub result_count: i64,
    pub created_at_us: i64,
}

/// What a piece of feedback is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Relevance,
    Quality,
    Recommendation,
}

impl FeedbackKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Quality => "quality",
            Self::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(Self::Relevance),
            "quality" => Ok(Self::Quality),
            "recommendation" => Ok(Self::Recommendation),
            other => bail!(
                "unknown feedback kind '{other}' (expected relevance, quality, or recommendation)"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserFeedback {
    pub feedback_id: i64,
    pub user_id: i64,
    pub paper_id: Option<String>,
    pub search_id: Option<i64>,
    /// 1-5 scale.
    pub rating: f64,
    pub feedback_type: FeedbackKind,
    pub feedback_text: Option<String>,
    pub created_at_us: i64,
}
