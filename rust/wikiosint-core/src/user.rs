//! Contributor-level (account) analysis.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::client::{Contribution, SourceHandle, UserInfo};
use crate::config::{RevokedAnalysisConfig, UserAnalysisOptions, WikiOsintConfig};
use crate::context::AnalysisContext;
use crate::error::AnalysisError;
use crate::event::{parse_optional_timestamp, parse_timestamp, EditEvent};
use crate::keywords::RevertType;
use crate::revoked::{RevokedContribution, RevokedContributionResolver};
use crate::scoring::{age_days, contributor_rules, evaluate, ContributorSignals, SuspicionScore};

/// Pages listed in a profile's top-pages summary.
pub const TOP_PAGES: usize = 15;

/// Active days kept in the recent-activity series.
pub const RECENT_ACTIVITY_DAYS: usize = 30;

/// Block expiry values that mean the block never ends.
pub const INFINITE_EXPIRY: &[&str] = &["infinity", "indefinite", "infinite", "never"];

/// Main, Wikipedia and Portal.
pub const SENSITIVE_NAMESPACES: &[i32] = &[0, 4, 100];

/// Groups every registered account has.
const IMPLICIT_GROUPS: &[&str] = &["*", "user"];

/// Display name of a namespace number.
pub fn namespace_name(namespace: i32) -> String {
    match namespace {
        0 => "Main".to_string(),
        1 => "Talk".to_string(),
        2 => "User".to_string(),
        3 => "User talk".to_string(),
        4 => "Wikipedia".to_string(),
        6 => "File".to_string(),
        10 => "Template".to_string(),
        14 => "Category".to_string(),
        100 => "Portal".to_string(),
        other => format!("NS_{other}"),
    }
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// End of the block; `None` with `blocked` set means indefinite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl BlockInfo {
    /// Block state at `now`.
    ///
    /// Blocked when an expiry is reported and it is either an infinite marker
    /// or a future instant.
    pub fn from_user_info(info: &UserInfo, now: DateTime<Utc>) -> Self {
        let Some(expiry) = info.block_expiry.as_deref().map(str::trim) else {
            return Self::default();
        };

        let (blocked, expires) = if INFINITE_EXPIRY
            .iter()
            .any(|marker| expiry.eq_ignore_ascii_case(marker))
        {
            (true, None)
        } else {
            match parse_optional_timestamp(Some(expiry)) {
                Some(end) => (end > now, Some(end)),
                None => (false, None),
            }
        };

        if !blocked {
            return Self::default();
        }
        Self {
            blocked,
            blocked_by: info.blocked_by.clone(),
            reason: info.block_reason.clone(),
            expires,
        }
    }
}

/// A user's edits on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEditSummary {
    pub page_title: String,
    pub page_id: u64,
    pub namespace: i32,
    pub edit_count: usize,
    pub first_edit: DateTime<Utc>,
    pub last_edit: DateTime<Utc>,
    pub total_size_diff: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub edit_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub days_since_registration: Option<i64>,
    pub average_edits_per_day: f64,
    pub most_active_hour: Option<u32>,
    pub most_active_day: Option<String>,
    pub namespace_distribution: BTreeMap<String, usize>,
    /// Most recent active days, oldest first.
    pub recent_activity: Vec<DailyActivity>,
}

/// Everything known about one account after analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub user_id: u64,
    pub registration: Option<DateTime<Utc>>,
    pub edit_count: u64,
    pub groups: Vec<String>,
    pub implicit_groups: Vec<String>,
    pub rights: Vec<String>,
    pub block: BlockInfo,
    pub language: String,
    pub analyzed_at: DateTime<Utc>,
    pub recent_contributions: Vec<EditEvent>,
    pub top_pages: Vec<PageEditSummary>,
    pub activity: ActivityStats,
    pub revoked_contributions: Vec<RevokedContribution>,
    pub revoked_count: usize,
    pub revoked_ratio: f64,
    /// Revocations per revoking actor; revocations with an unknown actor are
    /// not counted here.
    pub reverted_by_users: BTreeMap<String, usize>,
    pub suspicion_score: i32,
    pub suspicion_flags: Vec<String>,
}

impl UserProfile {
    pub fn is_blocked(&self) -> bool {
        self.block.blocked
    }

    pub fn account_age_days(&self) -> Option<i64> {
        age_days(self.registration, self.analyzed_at)
    }

    pub fn has_special_groups(&self) -> bool {
        self.groups
            .iter()
            .any(|group| !IMPLICIT_GROUPS.contains(&group.as_str()))
    }

    /// The actor who revoked this account most often, with the count. Ties
    /// go to the alphabetically first name.
    pub fn top_reverter(&self) -> Option<(&str, usize)> {
        self.reverted_by_users
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(name, count)| (name.as_str(), *count))
    }

    pub fn score(&self) -> SuspicionScore {
        SuspicionScore {
            score: self.suspicion_score,
            flags: self.suspicion_flags.clone(),
        }
    }
}

/// Inputs to the contributor rules that the profile itself does not keep.
struct ContributionShape {
    sensitive_namespace_ratio: f64,
    empty_comment_ratio: f64,
}

impl ContributionShape {
    fn of(contributions: &[Contribution]) -> Self {
        if contributions.is_empty() {
            return Self {
                sensitive_namespace_ratio: 0.0,
                empty_comment_ratio: 0.0,
            };
        }
        let total = contributions.len() as f64;
        let sensitive = contributions
            .iter()
            .filter(|c| SENSITIVE_NAMESPACES.contains(&c.namespace))
            .count();
        let empty = contributions
            .iter()
            .filter(|c| c.comment.trim().is_empty())
            .count();
        Self {
            sensitive_namespace_ratio: sensitive as f64 / total,
            empty_comment_ratio: empty as f64 / total,
        }
    }
}

fn contributor_signals(profile: &UserProfile, shape: &ContributionShape) -> ContributorSignals {
    ContributorSignals {
        account_age_days: profile.account_age_days(),
        edit_count: profile.edit_count,
        blocked: profile.is_blocked(),
        top_page_edits: profile.top_pages.first().map(|p| p.edit_count).unwrap_or(0),
        has_special_groups: profile.has_special_groups(),
        sensitive_namespace_ratio: shape.sensitive_namespace_ratio,
        empty_comment_ratio: shape.empty_comment_ratio,
        revoked_ratio: profile.revoked_ratio,
        revoked_count: profile.revoked_count,
        vandalism_reverts: profile
            .revoked_contributions
            .iter()
            .filter(|r| r.revert_type == RevertType::VandalismRevert)
            .count(),
        top_reverter_count: profile.top_reverter().map(|(_, count)| count).unwrap_or(0),
    }
}

/// Share of contributions that were revoked.
///
/// Page probing can find revoked edits missing from the fetched contribution
/// list, so the ratio is capped at 1.
pub fn revoked_ratio(revoked: usize, contributions: usize) -> f64 {
    if contributions == 0 {
        return 0.0;
    }
    (revoked as f64 / contributions as f64).min(1.0)
}

/// Pages by edit count, most edited first; ties by title.
pub fn summarize_top_pages(contributions: &[Contribution]) -> Vec<PageEditSummary> {
    let mut pages: HashMap<(u64, &str), PageEditSummary> = HashMap::new();

    for contribution in contributions {
        let timestamp = parse_timestamp(&contribution.timestamp);
        pages
            .entry((contribution.page_id, contribution.title.as_str()))
            .and_modify(|summary| {
                summary.edit_count += 1;
                summary.total_size_diff += contribution.size_diff;
                summary.first_edit = summary.first_edit.min(timestamp);
                summary.last_edit = summary.last_edit.max(timestamp);
            })
            .or_insert_with(|| PageEditSummary {
                page_title: contribution.title.clone(),
                page_id: contribution.page_id,
                namespace: contribution.namespace,
                edit_count: 1,
                first_edit: timestamp,
                last_edit: timestamp,
                total_size_diff: contribution.size_diff,
            });
    }

    let mut ranked: Vec<PageEditSummary> = pages.into_values().collect();
    ranked.sort_by(|a, b| {
        b.edit_count
            .cmp(&a.edit_count)
            .then_with(|| a.page_title.cmp(&b.page_title))
    });
    ranked.truncate(TOP_PAGES);
    ranked
}

/// Activity patterns over a contribution list. Contributions with an
/// unparseable time count towards namespaces only.
pub fn analyze_activity(
    contributions: &[Contribution],
    registration: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ActivityStats {
    let mut stats = ActivityStats::default();
    if contributions.is_empty() {
        return stats;
    }

    let mut hours = [0usize; 24];
    let mut weekdays = [0usize; 7];
    let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();

    for contribution in contributions {
        *stats
            .namespace_distribution
            .entry(namespace_name(contribution.namespace))
            .or_insert(0) += 1;

        let Some(timestamp) = parse_optional_timestamp(Some(&contribution.timestamp)) else {
            continue;
        };
        hours[timestamp.hour() as usize] += 1;
        weekdays[timestamp.weekday().num_days_from_monday() as usize] += 1;
        *daily.entry(timestamp.date_naive()).or_insert(0) += 1;
    }

    stats.most_active_hour = busiest(&hours).map(|hour| hour as u32);
    stats.most_active_day = busiest(&weekdays).map(|day| weekday_name(WEEKDAYS[day]).to_string());

    if let Some(days) = age_days(registration, now).filter(|days| *days > 0) {
        stats.days_since_registration = Some(days);
        stats.average_edits_per_day = contributions.len() as f64 / days as f64;
    }

    let skip = daily.len().saturating_sub(RECENT_ACTIVITY_DAYS);
    stats.recent_activity = daily
        .into_iter()
        .skip(skip)
        .map(|(date, edit_count)| DailyActivity { date, edit_count })
        .collect();

    stats
}

/// Index of the largest non-zero bucket; the earliest wins ties.
fn busiest(buckets: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, &count) in buckets.iter().enumerate() {
        if count > 0 && best.map_or(true, |(_, top)| count > top) {
            best = Some((index, count));
        }
    }
    best.map(|(index, _)| index)
}

/// Builds [`UserProfile`]s from a data source.
#[derive(Clone)]
pub struct UserAnalyzer {
    source: SourceHandle,
    ctx: AnalysisContext,
    options: UserAnalysisOptions,
    revoked: RevokedAnalysisConfig,
}

impl UserAnalyzer {
    pub fn new(
        source: SourceHandle,
        ctx: AnalysisContext,
        options: UserAnalysisOptions,
        revoked: RevokedAnalysisConfig,
    ) -> Self {
        Self {
            source,
            ctx,
            options,
            revoked,
        }
    }

    pub fn from_config(source: SourceHandle, ctx: AnalysisContext, config: &WikiOsintConfig) -> Self {
        Self::new(source, ctx, config.user.clone(), config.revoked.clone())
    }

    /// Same analyzer without any revoked-contribution detection.
    pub fn without_revoked_probe(mut self) -> Self {
        self.revoked.enabled = false;
        self
    }

    pub async fn analyze(&self, username: &str) -> Result<UserProfile, AnalysisError> {
        let now = self.ctx.now;
        let info = self
            .source
            .fetch_user_info(username)
            .await
            .map_err(|e| AnalysisError::from_subject("user", username, e))?;

        let canonical = if info.name.is_empty() {
            username.to_string()
        } else {
            info.name.clone()
        };

        let mut contributions = match self
            .source
            .fetch_user_contributions(&canonical, self.options.max_contributions)
            .await
        {
            Ok(contributions) => contributions,
            Err(e) => {
                log::warn!("Contributions of {canonical} unavailable, continuing without: {e}");
                Vec::new()
            }
        };
        for contribution in contributions.iter_mut().filter(|c| c.user.is_empty()) {
            contribution.user = canonical.clone();
        }

        let classifier = self.ctx.classifier();
        let events: Vec<EditEvent> = contributions
            .iter()
            .map(|c| EditEvent::from_contribution(c, &classifier))
            .collect();

        let registration = parse_optional_timestamp(info.registration.as_deref());

        let revoked_contributions = if self.revoked.enabled {
            RevokedContributionResolver::new(self.source.clone(), &self.ctx, self.revoked.clone())
                .resolve(&canonical, &events)
                .await
        } else {
            Vec::new()
        };
        let revoked_count = revoked_contributions.len();
        let revoked_ratio = revoked_ratio(revoked_count, contributions.len());
        let mut reverted_by_users = BTreeMap::new();
        for revoker in revoked_contributions.iter().filter_map(|r| r.revoked_by.as_ref()) {
            *reverted_by_users.entry(revoker.clone()).or_insert(0) += 1;
        }

        let mut profile = UserProfile {
            username: canonical,
            user_id: info.user_id,
            registration,
            edit_count: info.edit_count,
            groups: info.groups.clone(),
            implicit_groups: info.implicit_groups.clone(),
            rights: info.rights.clone(),
            block: BlockInfo::from_user_info(&info, now),
            language: self.ctx.language.clone(),
            analyzed_at: now,
            recent_contributions: events,
            top_pages: summarize_top_pages(&contributions),
            activity: analyze_activity(&contributions, registration, now),
            revoked_contributions,
            revoked_count,
            revoked_ratio,
            reverted_by_users,
            suspicion_score: 0,
            suspicion_flags: Vec::new(),
        };

        let signals = contributor_signals(&profile, &ContributionShape::of(&contributions));
        let score = evaluate(&signals, &contributor_rules());
        profile.suspicion_score = score.score;
        profile.suspicion_flags = score.flags;

        log::debug!(
            "Analyzed user {}: {} contributions, {} revoked, score {}",
            profile.username,
            profile.recent_contributions.len(),
            profile.revoked_count,
            profile.suspicion_score
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Revision, Snapshot, SnapshotSource, UserSnapshot};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
    }

    fn create_test_contribution(rev: u64, title: &str, ns: i32, ts: &str, comment: &str) -> Contribution {
        Contribution {
            rev_id: rev,
            page_id: title.len() as u64,
            namespace: ns,
            title: title.into(),
            timestamp: ts.into(),
            comment: comment.into(),
            size_diff: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_block_status() {
        let mut info = UserInfo {
            block_expiry: Some("infinity".into()),
            blocked_by: Some("Admin".into()),
            ..Default::default()
        };
        let block = BlockInfo::from_user_info(&info, now());
        assert!(block.blocked);
        assert_eq!(block.expires, None);
        assert_eq!(block.blocked_by.as_deref(), Some("Admin"));

        info.block_expiry = Some("2024-04-01T00:00:00Z".into());
        assert!(BlockInfo::from_user_info(&info, now()).blocked);

        info.block_expiry = Some("2024-01-01T00:00:00Z".into());
        assert!(!BlockInfo::from_user_info(&info, now()).blocked);

        info.block_expiry = None;
        assert_eq!(BlockInfo::from_user_info(&info, now()), BlockInfo::default());
    }

    #[test]
    fn test_namespace_names() {
        assert_eq!(namespace_name(0), "Main");
        assert_eq!(namespace_name(3), "User talk");
        assert_eq!(namespace_name(118), "NS_118");
    }

    #[test]
    fn test_top_pages_ranking() {
        let contributions = vec![
            create_test_contribution(1, "B", 0, "2024-03-01T10:00:00Z", "x"),
            create_test_contribution(2, "A", 0, "2024-03-01T11:00:00Z", "x"),
            create_test_contribution(3, "B", 0, "2024-03-02T10:00:00Z", "x"),
            create_test_contribution(4, "C", 0, "2024-03-03T10:00:00Z", "x"),
        ];
        let top = summarize_top_pages(&contributions);
        let titles: Vec<&str> = top.iter().map(|p| p.page_title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A", "C"]);
        assert_eq!(top[0].edit_count, 2);
        assert_eq!(top[0].total_size_diff, 20);
        assert!(top[0].first_edit < top[0].last_edit);
    }

    #[test]
    fn test_activity_stats() {
        let contributions = vec![
            // 2024-03-04 is a Monday.
            create_test_contribution(1, "A", 0, "2024-03-04T14:00:00Z", "x"),
            create_test_contribution(2, "A", 0, "2024-03-04T14:30:00Z", "x"),
            create_test_contribution(3, "A", 4, "2024-03-05T09:00:00Z", "x"),
            create_test_contribution(4, "A", 0, "garbage", "x"),
        ];
        let registration = Some(Utc.with_ymd_and_hms(2024, 2, 9, 0, 0, 0).unwrap());
        let stats = analyze_activity(&contributions, registration, now());

        assert_eq!(stats.most_active_hour, Some(14));
        assert_eq!(stats.most_active_day.as_deref(), Some("Monday"));
        assert_eq!(stats.namespace_distribution.get("Main"), Some(&3));
        assert_eq!(stats.namespace_distribution.get("Wikipedia"), Some(&1));
        assert_eq!(stats.days_since_registration, Some(30));
        assert!((stats.average_edits_per_day - 4.0 / 30.0).abs() < 1e-9);
        assert_eq!(stats.recent_activity.len(), 2);
        assert_eq!(stats.recent_activity[0].edit_count, 2);
    }

    #[test]
    fn test_busiest_prefers_earliest() {
        assert_eq!(busiest(&[0, 3, 3, 1]), Some(1));
        assert_eq!(busiest(&[0, 0]), None);
    }

    #[tokio::test]
    async fn test_analyze_scores_tagged_revocations() {
        let mut contributions = Vec::new();
        for i in 0..10u64 {
            let mut c = create_test_contribution(
                100 + i,
                "Target",
                0,
                &format!("2024-03-0{}T12:00:00Z", 1 + i % 9),
                "",
            );
            if i < 6 {
                c.tags = vec!["mw-reverted".into()];
            }
            contributions.push(c);
        }

        let mut snapshot = Snapshot {
            captured_at: Some(now()),
            ..Default::default()
        };
        snapshot.users.insert(
            "Mallory".into(),
            UserSnapshot {
                info: Some(UserInfo {
                    user_id: 7,
                    name: "Mallory".into(),
                    registration: Some("2024-03-01T00:00:00Z".into()),
                    edit_count: 10,
                    groups: vec!["*".into(), "user".into()],
                    ..Default::default()
                }),
                contributions,
            },
        );

        let ctx = AnalysisContext::with_defaults("en", now());
        let analyzer = UserAnalyzer::from_config(
            Arc::new(SnapshotSource::new(snapshot)),
            ctx,
            &WikiOsintConfig::default(),
        );
        let profile = analyzer.analyze("Mallory").await.unwrap();

        assert_eq!(profile.revoked_count, 6);
        assert!((profile.revoked_ratio - 0.6).abs() < 1e-9);
        assert!(profile.reverted_by_users.is_empty());
        assert_eq!(profile.recent_contributions[0].actor, "Mallory");
        assert!(profile.suspicion_flags.contains(&"VERY_HIGH_REVOKED_RATIO".to_string()));
        assert!(profile.suspicion_flags.contains(&"SINGLE_PAGE_FOCUS".to_string()));
        assert!(profile.suspicion_flags.contains(&"FREQUENT_EMPTY_COMMENTS".to_string()));
        assert!(profile.suspicion_flags.contains(&"SENSITIVE_NAMESPACE_FOCUS".to_string()));
        assert!((0..=100).contains(&profile.suspicion_score));
    }

    #[tokio::test]
    async fn test_missing_user_is_fatal() {
        let ctx = AnalysisContext::with_defaults("en", now());
        let analyzer = UserAnalyzer::from_config(
            Arc::new(SnapshotSource::new(Snapshot::default())),
            ctx,
            &WikiOsintConfig::default(),
        );
        let err = analyzer.analyze("Nobody").await.unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound { kind: "user", .. }));
    }

    #[test]
    fn test_revoked_ratio_is_capped() {
        assert_eq!(revoked_ratio(0, 0), 0.0);
        assert!((revoked_ratio(3, 10) - 0.3).abs() < 1e-9);
        assert_eq!(revoked_ratio(4, 2), 1.0);
    }

    #[tokio::test]
    async fn test_history_revocations_beyond_contribution_list() {
        let revision = |rev_id: u64, parent_id: u64, user: &str, ts: &str, size: i64, comment: &str| Revision {
            rev_id,
            parent_id,
            user: user.into(),
            timestamp: ts.into(),
            size,
            comment: comment.into(),
            ..Default::default()
        };

        let mut snapshot = Snapshot {
            captured_at: Some(now()),
            ..Default::default()
        };
        snapshot.pages.insert(
            "Page".into(),
            crate::client::PageSnapshot {
                revisions: vec![
                    revision(14, 13, "Fixer", "2024-03-05T10:20:00Z", 1000, "fix"),
                    revision(13, 12, "Mallory", "2024-03-05T10:15:00Z", 700, "trim"),
                    revision(12, 11, "Fixer", "2024-03-05T10:05:00Z", 1000, "fix"),
                    revision(11, 10, "Mallory", "2024-03-05T10:00:00Z", 600, "trim"),
                    revision(10, 0, "Creator", "2024-03-04T09:00:00Z", 1000, "create"),
                ],
                ..Default::default()
            },
        );
        let mut only = create_test_contribution(13, "Page", 0, "2024-03-05T10:15:00Z", "trim");
        only.size_diff = -300;
        snapshot.users.insert(
            "Mallory".into(),
            UserSnapshot {
                info: Some(UserInfo {
                    user_id: 7,
                    name: "Mallory".into(),
                    registration: Some("2024-03-01T00:00:00Z".into()),
                    edit_count: 2,
                    ..Default::default()
                }),
                contributions: vec![only],
            },
        );

        let analyzer = UserAnalyzer::from_config(
            Arc::new(SnapshotSource::new(snapshot)),
            AnalysisContext::with_defaults("en", now()),
            &WikiOsintConfig::default(),
        );
        let profile = analyzer.analyze("Mallory").await.unwrap();

        assert_eq!(profile.revoked_count, 2);
        assert_eq!(profile.revoked_ratio, 1.0);
        assert_eq!(profile.reverted_by_users.get("Fixer"), Some(&2));
    }
}
