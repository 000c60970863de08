use std::fmt;

/// Machine-readable error codes for scripts and API-style consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    PaperNotFound,
    UserNotFound,
    InvalidArgument,
    DuplicateDoi,
    InvalidImportRecord,
    FtsIndexMissing,
    SemanticIndexMissing,
    EmbeddingDimensionMismatch,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::PaperNotFound => "E2001",
            Self::UserNotFound => "E2002",
            Self::InvalidArgument => "E2003",
            Self::DuplicateDoi => "E2004",
            Self::InvalidImportRecord => "E2005",
            Self::FtsIndexMissing => "E6001",
            Self::SemanticIndexMissing => "E6002",
            Self::EmbeddingDimensionMismatch => "E6003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Scholar store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::PaperNotFound => "Paper not found",
            Self::UserNotFound => "User not found",
            Self::InvalidArgument => "Invalid argument",
            Self::DuplicateDoi => "DOI already belongs to another paper",
            Self::InvalidImportRecord => "Invalid paper import record",
            Self::FtsIndexMissing => "FTS index missing",
            Self::SemanticIndexMissing => "Semantic index missing",
            Self::EmbeddingDimensionMismatch => "Embedding dimension mismatch",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `scholar init` in this directory first."),
            Self::ConfigParseError => Some("Fix syntax in .scholar/config.toml and retry."),
            Self::PaperNotFound => Some("Check the paper ID with `scholar search`."),
            Self::UserNotFound => Some("Create the user with `scholar user add`."),
            Self::InvalidArgument => {
                Some("Use a positive limit and non-negative fusion weights with a positive sum.")
            }
            Self::DuplicateDoi => Some("Import the record under the paper ID that owns this DOI."),
            Self::InvalidImportRecord => Some("Every record needs a non-empty title."),
            Self::FtsIndexMissing | Self::SemanticIndexMissing => {
                Some("Run `scholar reindex` to rebuild the search indexes.")
            }
            Self::EmbeddingDimensionMismatch => Some(
                "Run `scholar reindex` after changing `search.embedding_dim` in the config.",
            ),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Domain failures raised by store queries.
///
/// These travel inside `anyhow::Error`; callers that need the machine code
/// use `err.downcast_ref::<StoreError>()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("paper '{0}' not found")]
    PaperNotFound(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("DOI {doi} already belongs to paper '{owner}'")]
    DuplicateDoi { doi: String, owner: String },
    #[error("invalid import record #{index}: {reason}")]
    InvalidImportRecord { index: usize, reason: String },
    #[error("store not initialized at {0}")]
    NotInitialized(String),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::PaperNotFound(_) => ErrorCode::PaperNotFound,
            Self::UserNotFound(_) => ErrorCode::UserNotFound,
            Self::DuplicateDoi { .. } => ErrorCode::DuplicateDoi,
            Self::InvalidImportRecord { .. } => ErrorCode::InvalidImportRecord,
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, StoreError};
    use std::collections::HashSet;

    const ALL: [ErrorCode; 11] = [
        ErrorCode::NotInitialized,
        ErrorCode::ConfigParseError,
        ErrorCode::PaperNotFound,
        ErrorCode::UserNotFound,
        ErrorCode::InvalidArgument,
        ErrorCode::DuplicateDoi,
        ErrorCode::InvalidImportRecord,
        ErrorCode::FtsIndexMissing,
        ErrorCode::SemanticIndexMissing,
        ErrorCode::EmbeddingDimensionMismatch,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let raw = code.code();
            assert_eq!(raw.len(), 5);
            assert!(raw.starts_with('E'));
            assert!(raw.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn store_errors_map_to_codes() {
        let err = StoreError::DuplicateDoi {
            doi: "10.1/x".into(),
            owner: "p-1".into(),
        };
        assert_eq!(err.code(), ErrorCode::DuplicateDoi);
        assert!(err.to_string().contains("p-1"));
        assert_eq!(
            StoreError::UserNotFound("42".into()).code().code(),
            "E2002"
        );
    }

    #[test]
    fn display_matches_code() {
        assert_eq!(ErrorCode::PaperNotFound.to_string(), "E2001");
    }
}
