use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::keywords::KeywordTables;
use crate::revert::RevertClassifier;

/// Shared, read-only settings of one analysis run.
///
/// `now` is the reference instant for every relative rule (account age,
/// trailing windows), so replaying captured data gives identical results.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub language: String,
    pub keywords: Arc<KeywordTables>,
    pub now: DateTime<Utc>,
}

impl AnalysisContext {
    pub fn new(language: impl Into<String>, keywords: KeywordTables, now: DateTime<Utc>) -> Self {
        Self {
            language: language.into(),
            keywords: Arc::new(keywords),
            now,
        }
    }

    /// Context with built-in keyword tables.
    pub fn with_defaults(language: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(language, KeywordTables::default(), now)
    }

    pub fn classifier(&self) -> RevertClassifier {
        RevertClassifier::new(&self.keywords, &self.language)
    }
}
