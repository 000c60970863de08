//! Corpus records.
//!
//! Records carry explicit foreign-key fields; relationships are resolved by
//! query functions in [`crate::db`], never by back-references.

pub mod paper;
pub mod user;

pub use paper::{Author, NewPaper, Paper, PaperSummary, Topic, derive_paper_id};
pub use user::{FeedbackKind, NewUser, PaperView, SavedPaper, SearchHistoryEntry, User, UserFeedback};
