//! Edit-level analysis of single revisions.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::client::{PageInfo, Revision, SourceHandle, WikiError};
use crate::config::{AnalysisDepth, WikiOsintConfig};
use crate::context::AnalysisContext;
use crate::error::AnalysisError;
use crate::event::{is_ip_address, parse_timestamp, EditEvent};
use crate::revert::RevertClassifier;
use crate::revoked::mentions_number;
use crate::scoring::{
    edit_rules, evaluate, policy_rules, vandalism_rules, EditSignals, QualitySignals, MAX_SCORE,
};
use crate::user::{UserAnalyzer, UserProfile};

/// Page revisions fetched to locate a revision and its neighbours.
pub const PAGE_SCAN_REVISIONS: usize = 500;

/// Half-width of the window around an edit that counts as its context.
pub const CONTEXT_WINDOW_HOURS: i64 = 24;

/// Bias words that saturate the bias score.
pub const BIAS_SATURATION: f64 = 10.0;

/// Size changes below this on both sides count as trivial.
pub const TRIVIAL_CHANGE_CHARS: i64 = 50;

/// Nearby reverts above which an edit is contested.
pub const CONTESTED_REVERTS: usize = 2;

/// Share of recent edits on one page above which an author is a specialist.
pub const SPECIALIZED_EDITOR_RATIO: f64 = 0.5;

pub const CONTROVERSIAL_TOPIC: f64 = 0.8;
pub const BASELINE_CONTROVERSIALITY: f64 = 0.2;

const TYPO_HINTS: &[&str] = &["typo", "spelling"];
const SOURCE_HINTS: &[&str] = &["source", "reference", "citation", "cite"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    TypoFix,
    SourceAddition,
    StructuralChange,
    MinorEdit,
    ContentEdit,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::TypoFix => write!(f, "typo_fix"),
            ContentType::SourceAddition => write!(f, "source_addition"),
            ContentType::StructuralChange => write!(f, "structural_change"),
            ContentType::MinorEdit => write!(f, "minor_edit"),
            ContentType::ContentEdit => write!(f, "content_edit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRelation {
    /// The other edit reverts this one by revision id.
    Revert,
    FollowUp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentUserActivity {
    pub edits_last_24h: usize,
    pub edits_last_7d: usize,
    pub edits_last_30d: usize,
    /// Distinct pages edited in the last 30 days.
    pub pages_edited: usize,
    pub last_edit_time: Option<DateTime<Utc>>,
}

impl RecentUserActivity {
    pub fn from_events(events: &[EditEvent], now: DateTime<Utc>) -> Self {
        let mut activity = RecentUserActivity::default();
        let mut pages = BTreeSet::new();

        for event in events.iter().filter(|e| !e.has_unknown_time()) {
            let age = now - event.timestamp;
            if age <= ChronoDuration::hours(24) {
                activity.edits_last_24h += 1;
            }
            if age <= ChronoDuration::days(7) {
                activity.edits_last_7d += 1;
            }
            if age <= ChronoDuration::days(30) {
                activity.edits_last_30d += 1;
                pages.insert(event.page_title.as_str());
            }
            if activity.last_edit_time.map_or(true, |last| event.timestamp > last) {
                activity.last_edit_time = Some(event.timestamp);
            }
        }

        activity.pages_edited = pages.len();
        activity
    }
}

/// Where an author's recent edits land.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFocus {
    pub pages_edited: usize,
    /// Share of the recent edits made on the author's most edited page.
    pub top_page_edit_ratio: f64,
    pub is_specialized_editor: bool,
    /// Recent edits over the days between the oldest and newest dated one.
    pub edits_per_day: f64,
}

impl PageFocus {
    pub fn from_events(events: &[EditEvent]) -> Self {
        if events.is_empty() {
            return Self::default();
        }

        let mut per_page: HashMap<&str, usize> = HashMap::new();
        for event in events {
            *per_page.entry(event.page_title.as_str()).or_insert(0) += 1;
        }
        let top = per_page.values().copied().max().unwrap_or(0);
        let top_page_edit_ratio = top as f64 / events.len() as f64;

        let dated: Vec<DateTime<Utc>> = events
            .iter()
            .filter(|e| !e.has_unknown_time())
            .map(|e| e.timestamp)
            .collect();
        let span = match (dated.iter().min(), dated.iter().max()) {
            (Some(first), Some(last)) => (*last - *first).num_seconds() as f64 / 86_400.0,
            _ => 0.0,
        };
        let edits_per_day = if span > 0.0 { events.len() as f64 / span } else { 0.0 };

        Self {
            pages_edited: per_page.len(),
            top_page_edit_ratio,
            is_specialized_editor: top_page_edit_ratio > SPECIALIZED_EDITOR_RATIO,
            edits_per_day,
        }
    }
}

/// Who made the edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributionAuthor {
    pub username: String,
    pub user_id: u64,
    pub is_anonymous: bool,
    pub is_registered: bool,
    pub is_blocked: bool,
    pub edit_count: u64,
    pub groups: Vec<String>,
    pub registration: Option<DateTime<Utc>>,
    pub recent_activity: RecentUserActivity,
    pub page_focus: PageFocus,
    /// The author's contributor-level score, 0 when unknown.
    pub suspicion_score: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

impl ContributionAuthor {
    fn anonymous(revision: &Revision) -> Self {
        Self {
            username: revision.user.clone(),
            is_anonymous: true,
            ..Default::default()
        }
    }

    fn from_profile(revision: &Revision, profile: &UserProfile, now: DateTime<Utc>) -> Self {
        Self {
            username: profile.username.clone(),
            user_id: profile.user_id,
            is_anonymous: false,
            is_registered: profile.user_id > 0 || revision.user_id > 0,
            is_blocked: profile.is_blocked(),
            edit_count: profile.edit_count,
            groups: profile.groups.clone(),
            registration: profile.registration,
            recent_activity: RecentUserActivity::from_events(&profile.recent_contributions, now),
            page_focus: PageFocus::from_events(&profile.recent_contributions),
            suspicion_score: profile.suspicion_score,
            analysis_error: None,
        }
    }

    fn unavailable(revision: &Revision, error: &AnalysisError) -> Self {
        Self {
            username: revision.user.clone(),
            user_id: revision.user_id,
            is_registered: revision.user_id > 0,
            analysis_error: Some(format!("Analysis failed: {error}")),
            ..Default::default()
        }
    }

    pub fn account_age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.registration.map(|registered| (now - registered).num_days())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextChanges {
    pub chars_added: i64,
    pub chars_removed: i64,
    /// Rough estimate at five characters per word.
    pub words_added: i64,
    pub words_removed: i64,
    pub is_structural: bool,
    pub is_trivial: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageAnalysis {
    pub language: String,
    pub pov_words: Vec<String>,
    /// Bias words found / 10, capped at 1.
    pub bias_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub content_type: ContentType,
    pub text_changes: TextChanges,
    pub language: LanguageAnalysis,
}

impl ContentAnalysis {
    /// Judges an edit from its size change and comment only.
    pub fn from_edit(size_delta: i64, comment: &str, classifier: &RevertClassifier) -> Self {
        let chars_added = size_delta.max(0);
        let chars_removed = (-size_delta).max(0);
        let is_structural = classifier.is_structural(comment);
        let is_trivial = classifier.is_trivial(comment)
            || (chars_added < TRIVIAL_CHANGE_CHARS && chars_removed < TRIVIAL_CHANGE_CHARS);

        let pov_words = classifier.bias_words(comment);
        let bias_score = (pov_words.len() as f64 / BIAS_SATURATION).min(1.0);

        let lowered = comment.to_lowercase();
        let content_type = if TYPO_HINTS.iter().any(|h| lowered.contains(h)) {
            ContentType::TypoFix
        } else if SOURCE_HINTS.iter().any(|h| lowered.contains(h)) {
            ContentType::SourceAddition
        } else if is_structural {
            ContentType::StructuralChange
        } else if is_trivial {
            ContentType::MinorEdit
        } else {
            ContentType::ContentEdit
        };

        Self {
            content_type,
            text_changes: TextChanges {
                chars_added,
                chars_removed,
                words_added: chars_added / 5,
                words_removed: chars_removed / 5,
                is_structural,
                is_trivial,
            },
            language: LanguageAnalysis {
                language: classifier.language().to_string(),
                pov_words,
                bias_score,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEdit {
    pub revision_id: u64,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub relation: EditRelation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextAnalysis {
    pub edit_hour: u32,
    pub is_weekend: bool,
    /// Minutes since the previous revision of the page, when it is known.
    pub minutes_since_previous_edit: Option<i64>,
    /// Same-author edits and reverts of this edit within the context window.
    pub related_edits: Vec<RelatedEdit>,
    pub is_revert: bool,
    /// Reverts by anyone within the context window, this edit excluded.
    pub nearby_reverts: usize,
    pub is_contested: bool,
    pub conflict_severity: f64,
    /// From the page title's topic: disputed topics rate high.
    pub controversiality: f64,
}

impl ContextAnalysis {
    /// Context of `target` among the page's other events.
    pub fn around(target: &EditEvent, page_events: &[EditEvent], classifier: &RevertClassifier) -> Self {
        let window = ChronoDuration::hours(CONTEXT_WINDOW_HOURS);
        let mut context = ContextAnalysis {
            edit_hour: target.timestamp.hour(),
            is_weekend: matches!(target.timestamp.weekday(), Weekday::Sat | Weekday::Sun),
            is_revert: target.is_revert,
            controversiality: if classifier.is_controversial_topic(&target.page_title) {
                CONTROVERSIAL_TOPIC
            } else {
                BASELINE_CONTROVERSIALITY
            },
            ..Default::default()
        };

        context.minutes_since_previous_edit = page_events
            .iter()
            .find(|e| e.revision_id == target.parent_revision_id && target.parent_revision_id != 0)
            .map(|parent| (target.timestamp - parent.timestamp).num_minutes());

        let nearby = page_events.iter().filter(|e| {
            e.revision_id != target.revision_id && (e.timestamp - target.timestamp).abs() <= window
        });
        for event in nearby {
            if event.is_revert {
                context.nearby_reverts += 1;
            }
            let relation = if event.is_revert
                && event.timestamp >= target.timestamp
                && mentions_number(&event.comment, target.revision_id)
            {
                Some(EditRelation::Revert)
            } else if event.actor == target.actor {
                Some(EditRelation::FollowUp)
            } else {
                None
            };
            if let Some(relation) = relation {
                context.related_edits.push(RelatedEdit {
                    revision_id: event.revision_id,
                    author: event.actor.clone(),
                    timestamp: event.timestamp,
                    relation,
                });
            }
        }

        if target.is_revert {
            context.is_contested = true;
            context.conflict_severity = 0.7;
        }
        if context.nearby_reverts > CONTESTED_REVERTS {
            context.is_contested = true;
            context.conflict_severity = (context.nearby_reverts as f64 / 5.0).min(1.0);
        }
        context
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compliance {
    pub policy_compliance: f64,
    pub guideline_compliance: f64,
    pub vandalism_risk: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violated_policies: Vec<String>,
}

/// Quality estimates in 0..=1 from the edit's comment and size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributionQuality {
    pub neutrality: f64,
    pub completeness: f64,
    pub source_reliability: f64,
    pub organization: f64,
    pub compliance: Compliance,
    pub overall_quality: f64,
}

impl ContributionQuality {
    const ACCURACY: f64 = 0.8;
    const FORMATTING: f64 = 0.8;

    pub fn assess(signals: &QualitySignals) -> Self {
        let mut neutrality: f64 = 0.9;
        if signals.bias_score > 0.3 {
            neutrality -= signals.bias_score;
        }
        let completeness = if signals.is_trivial { 0.5 } else { 0.7 };
        let source_reliability = if signals.cites_sources { 0.9 } else { 0.8 };
        let organization = if signals.is_structural { 0.9 } else { 0.8 };

        let policy = evaluate(signals, &policy_rules());
        let vandalism = evaluate(signals, &vandalism_rules());
        let compliance = Compliance {
            policy_compliance: 0.9 - policy.score as f64 / 100.0,
            guideline_compliance: 0.8,
            vandalism_risk: 0.1 + vandalism.score as f64 / 100.0,
            violated_policies: policy.flags,
        };

        let overall_quality = Self::ACCURACY * 0.3
            + source_reliability * 0.25
            + Self::FORMATTING * 0.2
            + compliance.policy_compliance * 0.25;

        Self {
            neutrality: neutrality.max(0.0),
            completeness,
            source_reliability,
            organization,
            compliance,
            overall_quality,
        }
    }
}

fn cites_sources(comment: &str) -> bool {
    let lowered = comment.to_lowercase();
    SOURCE_HINTS.iter().any(|h| lowered.contains(h))
}

/// Full analysis of one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionProfile {
    pub revision_id: u64,
    pub page_title: String,
    pub page_id: u64,
    pub language: String,
    pub timestamp: DateTime<Utc>,
    pub comment: String,
    /// Page length after the edit.
    pub size: i64,
    pub size_delta: i64,
    pub is_minor: bool,
    pub is_revert: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub depth: AnalysisDepth,
    pub author: ContributionAuthor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextAnalysis>,
    pub quality: ContributionQuality,
    pub suspicion_score: i32,
    pub suspicion_flags: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl ContributionProfile {
    pub fn signals(&self) -> EditSignals {
        let (bias_score, chars_added, chars_removed) = self
            .content
            .as_ref()
            .map(|c| {
                (
                    c.language.bias_score,
                    c.text_changes.chars_added,
                    c.text_changes.chars_removed,
                )
            })
            .unwrap_or((0.0, 0, 0));

        EditSignals {
            author_score: self.author.suspicion_score.max(0),
            is_revert: self.is_revert,
            author_edits_last_24h: self.author.recent_activity.edits_last_24h,
            is_anonymous: self.author.is_anonymous,
            account_age_days: self.author.account_age_days(self.analyzed_at),
            bias_score,
            chars_added,
            chars_removed,
            author_blocked: self.author.is_blocked,
        }
    }
}

/// Revisions of one page with their events, fetched once per analysis.
struct PageRevisions {
    info: PageInfo,
    revisions: Vec<Revision>,
    events: Vec<EditEvent>,
}

/// Builds [`ContributionProfile`]s from a data source.
#[derive(Clone)]
pub struct ContributionAnalyzer {
    source: SourceHandle,
    ctx: AnalysisContext,
    depth: AnalysisDepth,
    users: UserAnalyzer,
}

impl ContributionAnalyzer {
    /// `users` scores authors; it is used as given.
    pub fn new(source: SourceHandle, ctx: AnalysisContext, depth: AnalysisDepth, users: UserAnalyzer) -> Self {
        Self {
            source,
            ctx,
            depth,
            users,
        }
    }

    /// Author scores come from a user analysis without revoked probing.
    pub fn from_config(source: SourceHandle, ctx: AnalysisContext, config: &WikiOsintConfig) -> Self {
        let users = UserAnalyzer::from_config(source.clone(), ctx.clone(), config).without_revoked_probe();
        Self::new(source, ctx, config.contribution.depth, users)
    }

    pub fn with_depth(mut self, depth: AnalysisDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn depth(&self) -> AnalysisDepth {
        self.depth
    }

    /// Analyzes revision `revision_id` of `page_title`.
    pub async fn analyze(&self, revision_id: u64, page_title: &str) -> Result<ContributionProfile, AnalysisError> {
        let page = self.load_page(page_title, PAGE_SCAN_REVISIONS).await?;

        let target = match page.revisions.iter().find(|r| r.rev_id == revision_id) {
            Some(rev) => rev.clone(),
            None => self
                .source
                .fetch_revision(&page.info.title, revision_id)
                .await
                .map_err(|e| match e {
                    WikiError::NotFound(_) => AnalysisError::revision_not_found(revision_id),
                    other => AnalysisError::Source(other),
                })?,
        };

        let mut authors = HashMap::new();
        Ok(self.profile(&target, &page, &mut authors).await)
    }

    /// Analyzes the `limit` most recent revisions of a page, newest first.
    pub async fn scan_recent(&self, page_title: &str, limit: usize) -> Result<Vec<ContributionProfile>, AnalysisError> {
        if limit == 0 {
            return Err(AnalysisError::InvalidInput("limit must be positive".into()));
        }
        let page = self.load_page(page_title, limit.max(1)).await?;

        let mut authors = HashMap::new();
        let mut profiles = Vec::with_capacity(page.revisions.len());
        for revision in page.revisions.iter().take(limit) {
            profiles.push(self.profile(revision, &page, &mut authors).await);
        }
        log::info!("Scanned {} recent revisions of {}", profiles.len(), page.info.title);
        Ok(profiles)
    }

    /// Recent revisions scoring at least `threshold`, highest first.
    pub async fn suspicious(
        &self,
        page_title: &str,
        limit: usize,
        threshold: i32,
    ) -> Result<Vec<ContributionProfile>, AnalysisError> {
        if !(0..=MAX_SCORE).contains(&threshold) {
            return Err(AnalysisError::InvalidInput(format!(
                "threshold must be within 0..={MAX_SCORE}, got {threshold}"
            )));
        }
        let mut flagged: Vec<ContributionProfile> = self
            .scan_recent(page_title, limit)
            .await?
            .into_iter()
            .filter(|p| p.suspicion_score >= threshold)
            .collect();
        flagged.sort_by(|a, b| b.suspicion_score.cmp(&a.suspicion_score));
        Ok(flagged)
    }

    async fn load_page(&self, page_title: &str, limit: usize) -> Result<PageRevisions, AnalysisError> {
        let mut info = self
            .source
            .fetch_page_info(page_title)
            .await
            .map_err(|e| AnalysisError::from_subject("page", page_title, e))?;
        if info.title.is_empty() {
            info.title = page_title.to_string();
        }
        let revisions = self
            .source
            .fetch_page_revisions(&info.title, limit)
            .await
            .map_err(|e| AnalysisError::from_subject("page", page_title, e))?;
        let events = EditEvent::from_revisions(&info.title, &revisions, &self.ctx.classifier());
        Ok(PageRevisions {
            info,
            revisions,
            events,
        })
    }

    async fn profile(
        &self,
        target: &Revision,
        page: &PageRevisions,
        authors: &mut HashMap<String, ContributionAuthor>,
    ) -> ContributionProfile {
        let now = self.ctx.now;
        let classifier = self.ctx.classifier();

        let event = page
            .events
            .iter()
            .find(|e| e.revision_id == target.rev_id)
            .cloned()
            .unwrap_or_else(|| EditEvent::from_revision(&page.info.title, target, 0, &classifier));

        let author = match authors.get(&target.user) {
            Some(author) => author.clone(),
            None => {
                let author = self.analyze_author(target).await;
                authors.insert(target.user.clone(), author.clone());
                author
            }
        };

        let content = (self.depth >= AnalysisDepth::Standard)
            .then(|| ContentAnalysis::from_edit(event.size_delta, &event.comment, &classifier));
        let context = (self.depth >= AnalysisDepth::Deep)
            .then(|| ContextAnalysis::around(&event, &page.events, &classifier));
        let quality = ContributionQuality::assess(&QualitySignals {
            bias_score: content.as_ref().map_or(0.0, |c| c.language.bias_score),
            is_revert: event.is_revert,
            mentions_vandalism: classifier.mentions_vandalism(&event.comment),
            is_trivial: content.as_ref().is_some_and(|c| c.text_changes.is_trivial),
            is_structural: content.as_ref().is_some_and(|c| c.text_changes.is_structural),
            cites_sources: cites_sources(&event.comment),
        });

        let mut profile = ContributionProfile {
            revision_id: target.rev_id,
            page_title: page.info.title.clone(),
            page_id: page.info.page_id,
            language: self.ctx.language.clone(),
            timestamp: parse_timestamp(&target.timestamp),
            comment: target.comment.clone(),
            size: target.size,
            size_delta: event.size_delta,
            is_minor: target.minor,
            is_revert: event.is_revert,
            tags: target.tags.clone(),
            depth: self.depth,
            author,
            content,
            context,
            quality,
            suspicion_score: 0,
            suspicion_flags: Vec::new(),
            analyzed_at: now,
        };

        let score = evaluate(&profile.signals(), &edit_rules());
        profile.suspicion_score = score.score;
        profile.suspicion_flags = score.flags;
        profile
    }

    async fn analyze_author(&self, revision: &Revision) -> ContributionAuthor {
        if revision.anonymous || is_ip_address(&revision.user) {
            return ContributionAuthor::anonymous(revision);
        }
        match self.users.analyze(&revision.user).await {
            Ok(profile) => ContributionAuthor::from_profile(revision, &profile, self.ctx.now),
            Err(e) => {
                log::warn!("Author analysis of {} failed: {e}", revision.user);
                ContributionAuthor::unavailable(revision, &e)
            }
        }
    }
}
