//! Cross-page coordination analysis.
//!
//! Every page is analyzed on its own tokio task, bounded by a semaphore.
//! Once all pages are in, their contributors are folded into common
//! contributors, their recent events are pooled, and the pooled events feed
//! the mutual-support detector and the pattern detectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::client::SourceHandle;
use crate::config::{CrossPageOptions, WikiOsintConfig};
use crate::context::AnalysisContext;
use crate::contributor::Contributor;
use crate::edit_war::EditWarPeriod;
use crate::error::AnalysisError;
use crate::event::EditEvent;
use crate::page::{PageAnalyzer, PageProfile};
use crate::revoked::RevokedContribution;
use crate::scoring::{cross_page_rules, evaluate, CrossPageSignals, MAX_SCORE};
use crate::support::{MutualSupportDetector, MutualSupportPair, SuspicionLevel};

// =============================================================================
// Constants
// =============================================================================

pub const MUTUAL_SUPPORT_PAIR_POINTS: f64 = 10.0;
pub const TAG_TEAM_POINTS: f64 = 15.0;
pub const COORDINATED_REVERT_POINTS: f64 = 20.0;
pub const SUPPORT_NETWORK_POINTS: f64 = 25.0;

// =============================================================================
// Common contributors
// =============================================================================

/// One actor's activity summed over the pages of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonContributor {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    /// In the order the pages were given.
    pub pages_edited: Vec<String>,
    pub total_edits: usize,
    pub edits_by_page: BTreeMap<String, usize>,
    pub first_edit: DateTime<Utc>,
    pub last_edit: DateTime<Utc>,
    /// Highest page-level score seen for the actor, with its flags.
    pub suspicion_score: i32,
    pub suspicion_flags: Vec<String>,
    pub is_anonymous: bool,
}

impl CommonContributor {
    fn from_page(page: &str, contributor: &Contributor) -> Self {
        Self {
            username: contributor.username.clone(),
            user_id: contributor.user_id,
            pages_edited: vec![page.to_string()],
            total_edits: contributor.edit_count,
            edits_by_page: BTreeMap::from([(page.to_string(), contributor.edit_count)]),
            first_edit: contributor.first_edit,
            last_edit: contributor.last_edit,
            suspicion_score: contributor.suspicion_score,
            suspicion_flags: contributor.suspicion_flags.clone(),
            is_anonymous: contributor.is_anonymous,
        }
    }

    fn absorb(&mut self, page: &str, contributor: &Contributor) {
        if !self.edits_by_page.contains_key(page) {
            self.pages_edited.push(page.to_string());
        }
        *self.edits_by_page.entry(page.to_string()).or_default() += contributor.edit_count;
        self.total_edits += contributor.edit_count;
        self.first_edit = self.first_edit.min(contributor.first_edit);
        self.last_edit = self.last_edit.max(contributor.last_edit);
        if self.user_id.is_none() {
            self.user_id = contributor.user_id;
        }
        if contributor.suspicion_score > self.suspicion_score {
            self.suspicion_score = contributor.suspicion_score;
            self.suspicion_flags = contributor.suspicion_flags.clone();
        }
    }

    pub fn is_multi_page(&self) -> bool {
        self.pages_edited.len() > 1
    }
}

/// Folds per-page contributor lists into [`CommonContributor`]s.
#[derive(Debug, Clone, Default)]
pub struct CommonContributorLedger {
    contributors: HashMap<String, CommonContributor>,
}

impl CommonContributorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb_page(&mut self, page: &str, contributors: &[Contributor]) {
        for contributor in contributors {
            self.contributors
                .entry(contributor.username.clone())
                .and_modify(|common| common.absorb(page, contributor))
                .or_insert_with(|| CommonContributor::from_page(page, contributor));
        }
    }

    /// Distinct actors seen on any page.
    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Actors on more than one page or with at least `min_common_edits`
    /// edits, most active first; ties by name.
    pub fn into_common(self, min_common_edits: usize) -> Vec<CommonContributor> {
        let mut common: Vec<CommonContributor> = self
            .contributors
            .into_values()
            .filter(|c| c.is_multi_page() || c.total_edits >= min_common_edits)
            .collect();
        common.sort_by(|a, b| {
            b.total_edits
                .cmp(&a.total_edits)
                .then_with(|| a.username.cmp(&b.username))
        });
        common
    }
}

// =============================================================================
// Pattern types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTeamPattern {
    pub users: Vec<String>,
    pub pages_affected: Vec<String>,
    pub edit_sequences: Vec<EditEvent>,
    pub rotation_pattern: String,
    /// How well the team stays under revert limits.
    pub avoidance_score: f64,
    pub coordination_time_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatedRevert {
    pub target_user: String,
    pub reverting_users: Vec<String>,
    pub pages_affected: Vec<String>,
    pub revert_events: Vec<EditEvent>,
    pub coordination_time_minutes: i64,
    pub suspicion_level: SuspicionLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportNetwork {
    pub network_id: String,
    pub users: Vec<String>,
    /// `"a->b"` to support score.
    pub support_matrix: BTreeMap<String, f64>,
    pub network_density: f64,
    pub central_users: Vec<String>,
    pub pages_controlled: Vec<String>,
    pub network_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynchronizedEvent {
    pub timestamp: DateTime<Utc>,
    pub users: Vec<String>,
    pub pages_affected: Vec<String>,
    pub time_window_minutes: i64,
    pub synchronization_type: String,
    pub suspicion_level: SuspicionLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditingWave {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub peak_time: DateTime<Utc>,
    pub users: Vec<String>,
    pub pages_affected: Vec<String>,
    pub total_edits: usize,
    pub wave_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeZonePattern {
    pub estimated_timezone: String,
    pub users: Vec<String>,
    pub confidence: f64,
    pub activity_peaks: Vec<u32>,
    pub suspicious_hours: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousTimeWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub activity_type: String,
    pub users: Vec<String>,
    pub pages_affected: Vec<String>,
    pub suspicion_reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalPatterns {
    pub synchronized_editing: Vec<SynchronizedEvent>,
    pub editing_waves: Vec<EditingWave>,
    pub timezone_patterns: Vec<TimeZonePattern>,
    pub temporal_correlation: f64,
    pub suspicious_time_windows: Vec<SuspiciousTimeWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SockpuppetAccount {
    pub username: String,
    pub suspicion_score: i32,
    pub suspicion_reasons: Vec<String>,
    pub pages_edited: Vec<String>,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SockpuppetNetwork {
    pub network_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_account: Option<String>,
    pub suspected_socks: Vec<SockpuppetAccount>,
    pub pages_targeted: Vec<String>,
    pub confidence_score: f64,
    pub detection_reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatedPatterns {
    pub mutual_support_pairs: Vec<MutualSupportPair>,
    pub tag_team_editing: Vec<TagTeamPattern>,
    pub coordinated_reversions: Vec<CoordinatedRevert>,
    pub support_networks: Vec<SupportNetwork>,
    pub coordination_score: f64,
}

impl CoordinatedPatterns {
    /// Weighted pattern counts, capped at 100.
    pub fn compute_coordination_score(&self) -> f64 {
        let score = self.mutual_support_pairs.len() as f64 * MUTUAL_SUPPORT_PAIR_POINTS
            + self.tag_team_editing.len() as f64 * TAG_TEAM_POINTS
            + self.coordinated_reversions.len() as f64 * COORDINATED_REVERT_POINTS
            + self.support_networks.len() as f64 * SUPPORT_NETWORK_POINTS;
        score.min(MAX_SCORE as f64)
    }
}

// =============================================================================
// Pattern detectors
// =============================================================================

/// Pluggable detectors for the coordination patterns beyond mutual support.
///
/// Every method sees the frozen inputs of a run. The defaults find nothing.
pub trait PatternDetector: Send + Sync {
    fn tag_team(&self, _common: &[CommonContributor], _events: &[EditEvent]) -> Vec<TagTeamPattern> {
        Vec::new()
    }

    fn coordinated_reversions(&self, _events: &[EditEvent]) -> Vec<CoordinatedRevert> {
        Vec::new()
    }

    fn support_networks(&self, _pairs: &[MutualSupportPair], _common: &[CommonContributor]) -> Vec<SupportNetwork> {
        Vec::new()
    }

    fn temporal_patterns(&self, _events: &[EditEvent], _common: &[CommonContributor]) -> TemporalPatterns {
        TemporalPatterns::default()
    }

    fn sockpuppet_networks(&self, _common: &[CommonContributor], _events: &[EditEvent]) -> Vec<SockpuppetNetwork> {
        Vec::new()
    }
}

/// Reports none of the extra patterns; their algorithms are not defined yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredPatterns;

impl PatternDetector for DeferredPatterns {}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPage {
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossPageReport {
    /// As requested.
    pub pages: Vec<String>,
    pub language: String,
    /// Pages analyzed successfully.
    pub total_pages: usize,
    pub total_contributors: usize,
    pub common_contributors: Vec<CommonContributor>,
    pub coordinated_patterns: CoordinatedPatterns,
    pub temporal_patterns: TemporalPatterns,
    pub sockpuppet_networks: Vec<SockpuppetNetwork>,
    /// Keyed by page title.
    pub edit_war_periods: BTreeMap<String, Vec<EditWarPeriod>>,
    /// Keyed by username; only contributors given a full account analysis.
    pub revoked_contributions: BTreeMap<String, Vec<RevokedContribution>>,
    pub suspicion_score: i32,
    pub suspicion_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_pages: Vec<FailedPage>,
    /// In input order.
    pub page_profiles: Vec<PageProfile>,
    pub analyzed_at: DateTime<Utc>,
}

impl CrossPageReport {
    pub fn signals(&self) -> CrossPageSignals {
        CrossPageSignals {
            mutual_support_pairs: self.coordinated_patterns.mutual_support_pairs.len(),
            coordination_score: self.coordinated_patterns.coordination_score,
            sockpuppet_networks: self.sockpuppet_networks.len(),
            common_contributors: self.common_contributors.len(),
            multi_page_contributors: self.common_contributors.iter().filter(|c| c.is_multi_page()).count(),
        }
    }

    pub fn profile(&self, title: &str) -> Option<&PageProfile> {
        self.page_profiles.iter().find(|p| p.title == title)
    }
}

// =============================================================================
// Analyzer
// =============================================================================

#[derive(Clone)]
pub struct CrossPageAnalyzer {
    pages: PageAnalyzer,
    ctx: AnalysisContext,
    options: CrossPageOptions,
    detectors: Arc<dyn PatternDetector>,
}

impl CrossPageAnalyzer {
    pub fn new(source: SourceHandle, ctx: AnalysisContext, config: &WikiOsintConfig) -> Self {
        let pages = PageAnalyzer::from_config(source, ctx.clone(), config).with_options(config.cross_page.page_options());
        Self {
            pages,
            ctx,
            options: config.cross_page.clone(),
            detectors: Arc::new(DeferredPatterns),
        }
    }

    pub fn with_options(mut self, options: CrossPageOptions) -> Self {
        self.pages = self.pages.with_options(options.page_options());
        self.options = options;
        self
    }

    pub fn with_detectors(mut self, detectors: Arc<dyn PatternDetector>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn options(&self) -> &CrossPageOptions {
        &self.options
    }

    pub async fn analyze(&self, titles: &[String]) -> Result<CrossPageReport, AnalysisError> {
        if titles.len() < 2 {
            return Err(AnalysisError::InvalidInput(
                "cross-page analysis needs at least two pages".into(),
            ));
        }
        log::info!("Starting cross-page analysis of {} pages", titles.len());

        let (profiles, failed_pages) = self.analyze_pages(titles).await;
        if profiles.is_empty() {
            return Err(AnalysisError::InsufficientData(format!(
                "none of the {} pages could be analyzed",
                titles.len()
            )));
        }

        let mut ledger = CommonContributorLedger::new();
        let mut events: Vec<EditEvent> = Vec::new();
        let mut edit_war_periods = BTreeMap::new();
        let mut revoked_contributions: BTreeMap<String, Vec<RevokedContribution>> = BTreeMap::new();

        for profile in &profiles {
            ledger.absorb_page(&profile.title, &profile.contributors);
            events.extend(profile.recent_revisions.iter().cloned());
            edit_war_periods.insert(profile.title.clone(), profile.conflict_stats.edit_war_periods.clone());
            for contributor in profile.contributors.iter().filter(|c| !c.revoked_contributions.is_empty()) {
                revoked_contributions
                    .entry(contributor.username.clone())
                    .or_insert_with(|| contributor.revoked_contributions.clone());
            }
        }

        let total_contributors = ledger.len();
        let common = ledger.into_common(self.options.min_common_edits);
        log::info!(
            "Found {} unique contributors, {} common",
            total_contributors,
            common.len()
        );

        let named: Vec<&str> = common
            .iter()
            .filter(|c| !c.is_anonymous)
            .map(|c| c.username.as_str())
            .collect();
        let detector = MutualSupportDetector::new(&self.options, self.ctx.classifier());
        let mutual_support_pairs = detector.detect(&named, &events);

        let mut coordinated_patterns = CoordinatedPatterns {
            tag_team_editing: self.detectors.tag_team(&common, &events),
            coordinated_reversions: self.detectors.coordinated_reversions(&events),
            support_networks: self.detectors.support_networks(&mutual_support_pairs, &common),
            mutual_support_pairs,
            coordination_score: 0.0,
        };
        coordinated_patterns.coordination_score = coordinated_patterns.compute_coordination_score();

        let mut report = CrossPageReport {
            pages: titles.to_vec(),
            language: self.ctx.language.clone(),
            total_pages: profiles.len(),
            total_contributors,
            temporal_patterns: self.detectors.temporal_patterns(&events, &common),
            sockpuppet_networks: self.detectors.sockpuppet_networks(&common, &events),
            common_contributors: common,
            coordinated_patterns,
            edit_war_periods,
            revoked_contributions,
            suspicion_score: 0,
            suspicion_flags: Vec::new(),
            failed_pages,
            page_profiles: profiles,
            analyzed_at: self.ctx.now,
        };

        let score = evaluate(&report.signals(), &cross_page_rules());
        report.suspicion_score = score.score;
        report.suspicion_flags = score.flags;

        log::info!(
            "Cross-page analysis completed: {} pairs, score {}",
            report.coordinated_patterns.mutual_support_pairs.len(),
            report.suspicion_score
        );
        Ok(report)
    }

    /// Analyzes every page concurrently and waits for all of them.
    ///
    /// Profiles come back in input order; failures are logged and listed.
    async fn analyze_pages(&self, titles: &[String]) -> (Vec<PageProfile>, Vec<FailedPage>) {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_pages.max(1)));
        let mut tasks = JoinSet::new();

        for (index, title) in titles.iter().enumerate() {
            let permits = permits.clone();
            let pages = self.pages.clone();
            let title = title.clone();
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => pages.analyze(&title).await,
                    Err(e) => Err(AnalysisError::InvalidInput(format!("worker pool closed: {e}"))),
                };
                (index, result)
            });
        }

        let mut outcomes: Vec<Option<Result<PageProfile, AnalysisError>>> = titles.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => outcomes[index] = Some(result),
                Err(e) => log::warn!("Page analysis task aborted: {e}"),
            }
        }

        let mut profiles = Vec::new();
        let mut failed = Vec::new();
        let mut seen = HashSet::new();
        for (title, outcome) in titles.iter().zip(outcomes) {
            match outcome {
                Some(Ok(profile)) if seen.insert(profile.title.clone()) => profiles.push(profile),
                Some(Ok(profile)) => log::warn!("Skipping duplicate page {}", profile.title),
                Some(Err(e)) => {
                    log::warn!("Failed to analyze page {title}: {e}");
                    failed.push(FailedPage {
                        title: title.clone(),
                        error: e.to_string(),
                    });
                }
                None => failed.push(FailedPage {
                    title: title.clone(),
                    error: "analysis task aborted".to_string(),
                }),
            }
        }
        (profiles, failed)
    }
}
