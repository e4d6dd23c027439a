//! Page-level analysis: contributors, conflicts, quality and the page score.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::client::{Revision, SourceHandle};
use crate::config::{PageAnalysisOptions, WikiOsintConfig};
use crate::context::AnalysisContext;
use crate::contributor::{contributor_diversity, Contributor, ContributorLedger};
use crate::edit_war::{analyze_conflicts, ConflictStats};
use crate::error::AnalysisError;
use crate::event::{sort_chronologically, EditEvent};
use crate::scoring::{evaluate, page_contributor_rules, page_rules, PageSignals};
use crate::user::UserAnalyzer;

/// Edits in the trailing week above which activity counts as a burst.
pub const RECENT_BURST_EDITS: usize = 10;

/// A contributor whose first edit on the page is this recent is new.
pub const NEW_EDITOR_DAYS: i64 = 30;

/// Hours reported as peak editing hours.
pub const PEAK_HOURS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditFrequency {
    pub edits_last_7_days: usize,
    pub edits_last_30_days: usize,
    pub edits_last_90_days: usize,
    /// Busiest hours of day (UTC), busiest first.
    pub peak_editing_hours: Vec<u32>,
    pub edits_by_day: BTreeMap<NaiveDate, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Mean absolute size change per edit, in bytes.
    pub average_edit_size: f64,
    pub anonymous_edit_ratio: f64,
    /// Share of edits made by contributors new to the page.
    pub new_editor_ratio: f64,
    pub recent_activity_burst: bool,
    pub contributor_diversity: f64,
    pub edit_frequency: EditFrequency,
}

/// Everything known about one page after analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageProfile {
    pub title: String,
    pub page_id: u64,
    pub namespace: i32,
    pub language: String,
    /// Time of the oldest fetched revision.
    pub creation_date: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub total_revisions: usize,
    pub page_size: i64,
    /// Most active contributors first.
    pub contributors: Vec<Contributor>,
    /// Newest first.
    pub recent_revisions: Vec<EditEvent>,
    pub conflict_stats: ConflictStats,
    pub quality_metrics: QualityMetrics,
    pub suspicion_score: i32,
    pub suspicion_flags: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl PageProfile {
    pub fn signals(&self) -> PageSignals {
        let top = self.contributors.first();
        PageSignals {
            controversy_score: self.conflict_stats.controversy_score,
            contributor_count: self.contributors.len(),
            total_revisions: self.total_revisions,
            recent_activity_burst: self.quality_metrics.recent_activity_burst,
            anonymous_edit_ratio: self.quality_metrics.anonymous_edit_ratio,
            top_contributor_tenure_days: top.and_then(|c| c.tenure_days(self.analyzed_at)),
            top_contributor_share: match top {
                Some(c) if self.total_revisions > 0 => {
                    c.edit_count as f64 / self.total_revisions as f64
                }
                _ => 0.0,
            },
            contributor_diversity: self.quality_metrics.contributor_diversity,
            recent_conflicts: self.conflict_stats.recent_conflicts,
        }
    }
}

/// Edit counts over trailing windows and per hour/day. Events with an
/// unknown time are left out.
pub fn edit_frequency(events: &[EditEvent], now: DateTime<Utc>) -> EditFrequency {
    let mut frequency = EditFrequency::default();
    let mut hours = [0usize; 24];

    for event in events.iter().filter(|e| !e.has_unknown_time()) {
        let age = now - event.timestamp;
        if age <= ChronoDuration::days(7) {
            frequency.edits_last_7_days += 1;
        }
        if age <= ChronoDuration::days(30) {
            frequency.edits_last_30_days += 1;
        }
        if age <= ChronoDuration::days(90) {
            frequency.edits_last_90_days += 1;
        }
        hours[event.timestamp.hour() as usize] += 1;
        *frequency
            .edits_by_day
            .entry(event.timestamp.date_naive())
            .or_insert(0) += 1;
    }

    let mut ranked: Vec<(u32, usize)> = hours
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(hour, count)| (hour as u32, *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    frequency.peak_editing_hours = ranked.into_iter().take(PEAK_HOURS).map(|(h, _)| h).collect();

    frequency
}

/// Quality metrics over a page's history events.
///
/// `first_edits` maps every actor in `events` to their first edit on the
/// page; `kept_edit_counts` are the edit counts of the reported contributors.
pub fn analyze_quality(
    events: &[EditEvent],
    first_edits: &HashMap<String, DateTime<Utc>>,
    kept_edit_counts: &[usize],
    now: DateTime<Utc>,
) -> QualityMetrics {
    let mut metrics = QualityMetrics {
        contributor_diversity: contributor_diversity(kept_edit_counts),
        edit_frequency: edit_frequency(events, now),
        ..Default::default()
    };
    metrics.recent_activity_burst = metrics.edit_frequency.edits_last_7_days > RECENT_BURST_EDITS;

    if events.is_empty() {
        return metrics;
    }
    let total = events.len() as f64;

    let absolute_delta: i64 = events.iter().map(|e| e.size_delta.abs()).sum();
    metrics.average_edit_size = absolute_delta as f64 / total;

    metrics.anonymous_edit_ratio = events.iter().filter(|e| e.is_anonymous).count() as f64 / total;

    let new_cutoff = now - ChronoDuration::days(NEW_EDITOR_DAYS);
    let by_new_editors = events
        .iter()
        .filter(|e| {
            first_edits
                .get(&e.actor)
                .is_some_and(|first| *first != DateTime::<Utc>::UNIX_EPOCH && *first >= new_cutoff)
        })
        .count();
    metrics.new_editor_ratio = by_new_editors as f64 / total;

    metrics
}

/// Builds [`PageProfile`]s from a data source.
#[derive(Clone)]
pub struct PageAnalyzer {
    source: SourceHandle,
    ctx: AnalysisContext,
    options: PageAnalysisOptions,
    users: UserAnalyzer,
}

impl PageAnalyzer {
    pub fn new(
        source: SourceHandle,
        ctx: AnalysisContext,
        options: PageAnalysisOptions,
        users: UserAnalyzer,
    ) -> Self {
        Self {
            source,
            ctx,
            options,
            users,
        }
    }

    pub fn from_config(source: SourceHandle, ctx: AnalysisContext, config: &WikiOsintConfig) -> Self {
        let users = UserAnalyzer::from_config(source.clone(), ctx.clone(), config);
        Self::new(source, ctx, config.page.clone(), users)
    }

    pub fn with_options(mut self, options: PageAnalysisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PageAnalysisOptions {
        &self.options
    }

    pub async fn analyze(&self, title: &str) -> Result<PageProfile, AnalysisError> {
        let now = self.ctx.now;
        let classifier = self.ctx.classifier();

        let info = self
            .source
            .fetch_page_info(title)
            .await
            .map_err(|e| AnalysisError::from_subject("page", title, e))?;
        let canonical = if info.title.is_empty() {
            title.to_string()
        } else {
            info.title.clone()
        };

        let revisions = self
            .source
            .fetch_page_revisions(&canonical, self.options.max_revisions)
            .await
            .map_err(|e| AnalysisError::from_subject("page", &canonical, e))?;

        let history = match self
            .source
            .fetch_page_history(&canonical, self.options.history_days)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                log::warn!("History of {canonical} unavailable, using recent revisions: {e}");
                revisions.clone()
            }
        };

        let listed = match self
            .source
            .fetch_page_contributors(&canonical, self.options.max_contributors)
            .await
        {
            Ok(listed) => listed,
            Err(e) => {
                log::warn!("Contributor listing of {canonical} unavailable: {e}");
                Vec::new()
            }
        };

        let recent_revisions = EditEvent::from_revisions(&canonical, &revisions, &classifier);
        let mut history_events = EditEvent::from_revisions(&canonical, &history, &classifier);
        sort_chronologically(&mut history_events);

        let mut ledger: ContributorLedger = history_events.iter().collect();
        for (name, user_id) in known_user_ids(&history, &listed) {
            ledger.set_user_id(&name, user_id);
        }

        let first_edits: HashMap<String, DateTime<Utc>> = history_events
            .iter()
            .filter_map(|e| ledger.get(&e.actor).map(|c| (e.actor.clone(), c.first_edit)))
            .collect();

        let mut contributors = ledger.into_ranked();
        contributors.truncate(self.options.max_contributors);
        self.score_contributors(&mut contributors).await;

        let kept_counts: Vec<usize> = contributors.iter().map(|c| c.edit_count).collect();
        let quality_metrics = analyze_quality(&history_events, &first_edits, &kept_counts, now);
        let conflict_stats = analyze_conflicts(&history_events, now);

        let known_times = || recent_revisions.iter().filter(|e| !e.has_unknown_time()).map(|e| e.timestamp);

        let mut profile = PageProfile {
            title: canonical,
            page_id: info.page_id,
            namespace: info.namespace,
            language: self.ctx.language.clone(),
            creation_date: known_times().min(),
            last_modified: known_times().max(),
            total_revisions: recent_revisions.len(),
            page_size: info.length,
            contributors,
            recent_revisions,
            conflict_stats,
            quality_metrics,
            suspicion_score: 0,
            suspicion_flags: Vec::new(),
            analyzed_at: now,
        };

        let score = evaluate(&profile.signals(), &page_rules());
        profile.suspicion_score = score.score;
        profile.suspicion_flags = score.flags;

        log::debug!(
            "Analyzed page {}: {} revisions, {} contributors, score {}",
            profile.title,
            profile.total_revisions,
            profile.contributors.len(),
            profile.suspicion_score
        );
        Ok(profile)
    }

    /// Full account analysis for the top registered contributors, page rules
    /// for everyone.
    async fn score_contributors(&self, contributors: &mut [Contributor]) {
        let now = self.ctx.now;
        let page_rules = page_contributor_rules();
        let mut detailed = 0;

        for contributor in contributors.iter_mut() {
            let page_score = evaluate(&contributor.page_signals(now), &page_rules);

            if contributor.is_anonymous || detailed >= self.options.detailed_contributors {
                contributor.apply_score(page_score);
                continue;
            }
            detailed += 1;

            match self.users.analyze(&contributor.username).await {
                Ok(profile) => {
                    contributor.apply_score(profile.score().combine(page_score));
                    contributor.revoked_contributions = profile.revoked_contributions;
                }
                Err(e) => {
                    log::warn!("Failed to analyze contributor {}: {e}", contributor.username);
                    contributor.mark_failed(e);
                }
            }
        }
    }
}

fn known_user_ids(history: &[Revision], listed: &[crate::client::ListedContributor]) -> Vec<(String, u64)> {
    history
        .iter()
        .filter(|rev| rev.user_id > 0)
        .map(|rev| (rev.user.clone(), rev.user_id))
        .chain(
            listed
                .iter()
                .filter(|c| c.user_id > 0)
                .map(|c| (c.name.clone(), c.user_id)),
        )
        .collect()
}
