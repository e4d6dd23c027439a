use crate::client::WikiError;

/// Failures that abort an analysis of a top-level subject.
///
/// Sub-analyses (a single contributor, a single probed page, a single page of
/// a cross-page run) never surface these; they degrade to partial results.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },
    #[error("data source error: {0}")]
    Source(#[from] WikiError),
    #[error("Insufficient data for analysis: {0}")]
    InsufficientData(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AnalysisError {
    pub fn page_not_found(title: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "page",
            name: title.into(),
        }
    }

    pub fn user_not_found(username: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "user",
            name: username.into(),
        }
    }

    pub fn revision_not_found(revision_id: u64) -> Self {
        Self::NotFound {
            kind: "revision",
            name: revision_id.to_string(),
        }
    }

    /// Converts a source failure on the top-level subject, mapping upstream
    /// not-found answers onto the subject's own kind.
    pub(crate) fn from_subject(kind: &'static str, name: &str, err: WikiError) -> Self {
        match err {
            WikiError::NotFound(_) => Self::NotFound {
                kind,
                name: name.to_string(),
            },
            other => Self::Source(other),
        }
    }
}
