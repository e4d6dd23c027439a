use crate::keywords::KeywordTables;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiOsintConfig {
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub page: PageAnalysisOptions,

    #[serde(default)]
    pub user: UserAnalysisOptions,

    #[serde(default)]
    pub revoked: RevokedAnalysisConfig,

    #[serde(default)]
    pub cross_page: CrossPageOptions,

    #[serde(default)]
    pub contribution: ContributionOptions,

    #[serde(default)]
    pub keywords: KeywordTables,
}

impl Default for WikiOsintConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            http: HttpConfig::default(),
            page: PageAnalysisOptions::default(),
            user: UserAnalysisOptions::default(),
            revoked: RevokedAnalysisConfig::default(),
            cross_page: CrossPageOptions::default(),
            contribution: ContributionOptions::default(),
            keywords: KeywordTables::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_wait_min")]
    pub retry_wait_min_ms: u64,
    #[serde(default = "default_retry_wait_max")]
    pub retry_wait_max_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_wait_min_ms: default_retry_wait_min(),
            retry_wait_max_ms: default_retry_wait_max(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAnalysisOptions {
    #[serde(default = "default_page_revisions")]
    pub max_revisions: usize,
    #[serde(default = "default_page_days")]
    pub history_days: u32,
    #[serde(default = "default_page_contributors")]
    pub max_contributors: usize,
    /// Top contributors that get a full account analysis.
    #[serde(default = "default_detailed_contributors")]
    pub detailed_contributors: usize,
}

impl Default for PageAnalysisOptions {
    fn default() -> Self {
        Self {
            max_revisions: default_page_revisions(),
            history_days: default_page_days(),
            max_contributors: default_page_contributors(),
            detailed_contributors: default_detailed_contributors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAnalysisOptions {
    #[serde(default = "default_user_contributions")]
    pub max_contributions: usize,
}

impl Default for UserAnalysisOptions {
    fn default() -> Self {
        Self {
            max_contributions: default_user_contributions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedAnalysisConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_revoked_pages")]
    pub max_pages_to_analyze: usize,
    #[serde(default = "default_revoked_revisions")]
    pub max_revisions_per_page: usize,
    #[serde(default = "default_revoked_days")]
    pub recent_days_only: u32,
    #[serde(default)]
    pub enable_deep_analysis: bool,
}

impl Default for RevokedAnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_pages_to_analyze: default_revoked_pages(),
            max_revisions_per_page: default_revoked_revisions(),
            recent_days_only: default_revoked_days(),
            enable_deep_analysis: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossPageOptions {
    #[serde(default = "default_cross_revisions")]
    pub max_revisions_per_page: usize,
    #[serde(default = "default_cross_contributors")]
    pub max_contributors_per_page: usize,
    #[serde(default = "default_cross_days")]
    pub history_days: u32,
    #[serde(default = "default_min_common_edits")]
    pub min_common_edits: usize,
    #[serde(default = "default_max_reaction")]
    pub max_reaction_time_minutes: i64,
    #[serde(default = "default_min_support_ratio")]
    pub min_mutual_support_ratio: f64,
    #[serde(default)]
    pub enable_deep_analysis: bool,
    #[serde(default = "default_concurrent_pages")]
    pub max_concurrent_pages: usize,
    /// Later events examined for each triggering event.
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,
}

impl Default for CrossPageOptions {
    fn default() -> Self {
        Self {
            max_revisions_per_page: default_cross_revisions(),
            max_contributors_per_page: default_cross_contributors(),
            history_days: default_cross_days(),
            min_common_edits: default_min_common_edits(),
            max_reaction_time_minutes: default_max_reaction(),
            min_mutual_support_ratio: default_min_support_ratio(),
            enable_deep_analysis: false,
            max_concurrent_pages: default_concurrent_pages(),
            lookahead: default_lookahead(),
        }
    }
}

impl CrossPageOptions {
    /// Page analysis settings used for each page of a cross-page run.
    pub fn page_options(&self) -> PageAnalysisOptions {
        PageAnalysisOptions {
            max_revisions: self.max_revisions_per_page,
            history_days: self.history_days,
            max_contributors: self.max_contributors_per_page,
            detailed_contributors: if self.enable_deep_analysis {
                default_detailed_contributors()
            } else {
                0
            },
        }
    }
}

/// How much of an edit the contribution analyzer looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    /// Author and score only.
    Basic,
    /// Adds content analysis.
    Standard,
    /// Adds page context.
    Deep,
}

impl fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisDepth::Basic => write!(f, "basic"),
            AnalysisDepth::Standard => write!(f, "standard"),
            AnalysisDepth::Deep => write!(f, "deep"),
        }
    }
}

impl std::str::FromStr for AnalysisDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(AnalysisDepth::Basic),
            "standard" => Ok(AnalysisDepth::Standard),
            "deep" => Ok(AnalysisDepth::Deep),
            other => Err(format!("unknown analysis depth: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionOptions {
    #[serde(default = "default_depth")]
    pub depth: AnalysisDepth,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
}

impl Default for ContributionOptions {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            scan_limit: default_scan_limit(),
        }
    }
}

// Defaults
fn default_language() -> String {
    "en".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}
fn default_retries() -> u32 {
    3
}
fn default_retry_wait_min() -> u64 {
    1000
}
fn default_retry_wait_max() -> u64 {
    5000
}
fn default_user_agent() -> String {
    format!("wikiosint/{}", env!("CARGO_PKG_VERSION"))
}
fn default_page_revisions() -> usize {
    100
}
fn default_page_days() -> u32 {
    30
}
fn default_page_contributors() -> usize {
    20
}
fn default_detailed_contributors() -> usize {
    10
}
fn default_user_contributions() -> usize {
    500
}
fn default_revoked_pages() -> usize {
    10
}
fn default_revoked_revisions() -> usize {
    50
}
fn default_revoked_days() -> u32 {
    90
}
fn default_cross_revisions() -> usize {
    200
}
fn default_cross_contributors() -> usize {
    50
}
fn default_cross_days() -> u32 {
    90
}
fn default_min_common_edits() -> usize {
    3
}
fn default_max_reaction() -> i64 {
    60
}
fn default_min_support_ratio() -> f64 {
    0.3
}
fn default_concurrent_pages() -> usize {
    4
}
fn default_lookahead() -> usize {
    10
}
fn default_depth() -> AnalysisDepth {
    AnalysisDepth::Standard
}
fn default_scan_limit() -> usize {
    20
}

impl WikiOsintConfig {
    /// Reads the configuration at `path`, or returns defaults when it does
    /// not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: WikiOsintConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.is_empty() {
            anyhow::bail!("language must not be empty");
        }
        if self.cross_page.max_concurrent_pages == 0 {
            anyhow::bail!("cross_page.max_concurrent_pages must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.cross_page.min_mutual_support_ratio) {
            anyhow::bail!("cross_page.min_mutual_support_ratio must be within 0..=1");
        }
        if self.cross_page.max_reaction_time_minutes < 0 {
            anyhow::bail!("cross_page.max_reaction_time_minutes must not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = WikiOsintConfig::load_or_default(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.language, "en");
        assert_eq!(config.cross_page.min_common_edits, 3);
        assert_eq!(config.cross_page.max_reaction_time_minutes, 60);
        assert_eq!(config.page.max_revisions, 100);
        assert!(!config.revoked.enable_deep_analysis);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"language": "fr", "cross_page": {"max_reaction_time_minutes": 30}}"#,
        )
        .unwrap();

        let config = WikiOsintConfig::load_or_default(&path).unwrap();
        assert_eq!(config.language, "fr");
        assert_eq!(config.cross_page.max_reaction_time_minutes, 30);
        assert_eq!(config.cross_page.lookahead, 10);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.keywords.languages.len(), 4);
    }

    #[test]
    fn test_persist_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = WikiOsintConfig::default();
        config.contribution.depth = AnalysisDepth::Deep;
        config.persist(&path).unwrap();

        let loaded = WikiOsintConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.contribution.depth, AnalysisDepth::Deep);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"cross_page": {"min_mutual_support_ratio": 2.5}}"#).unwrap();
        assert!(WikiOsintConfig::load_or_default(&path).is_err());
    }

    #[test]
    fn test_cross_page_options_drive_page_options() {
        let mut options = CrossPageOptions::default();
        assert_eq!(options.page_options().detailed_contributors, 0);
        options.enable_deep_analysis = true;
        let page = options.page_options();
        assert_eq!(page.max_revisions, 200);
        assert_eq!(page.detailed_contributors, 10);
    }
}
