//! Finds which of a contributor's edits were later undone.
//!
//! Three strategies run independently and are merged in priority order:
//! revision tags on the contributions themselves, size cancellation by the
//! next edit on the page, and probing the page history for reverts that point
//! back at the contributor. The first strategy to report a revision wins.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::client::{SourceHandle, WikiError};
use crate::config::RevokedAnalysisConfig;
use crate::context::AnalysisContext;
use crate::event::{sort_chronologically, EditEvent};
use crate::keywords::RevertType;
use crate::revert::{cancels_by_size, RevertClassifier};

/// Revisions inspected per page when deep analysis is off.
pub const LIGHT_PROBE_REVISIONS: usize = 20;

/// Longest gap between an edit and the edit that undoes it.
pub const REVOCATION_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    RevisionTags,
    SizeCorrelation,
    PageHistory,
    PageProbe,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMethod::RevisionTags => write!(f, "revision_tags"),
            DetectionMethod::SizeCorrelation => write!(f, "size_correlation"),
            DetectionMethod::PageHistory => write!(f, "page_history"),
            DetectionMethod::PageProbe => write!(f, "page_probe"),
        }
    }
}

/// An edit together with what undid it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokedContribution {
    pub original: EditEvent,
    /// Actor of the undoing edit, when known.
    pub revoked_by: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revert_comment: String,
    pub revert_type: RevertType,
    pub detection: DetectionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_revision_id: Option<u64>,
}

impl RevokedContribution {
    fn undone_by(
        original: &EditEvent,
        revert: &EditEvent,
        revert_type: RevertType,
        detection: DetectionMethod,
    ) -> Self {
        Self {
            original: original.clone(),
            revoked_by: Some(revert.actor.clone()),
            revoked_at: Some(revert.timestamp),
            revert_comment: revert.comment.clone(),
            revert_type,
            detection,
            revert_revision_id: Some(revert.revision_id),
        }
    }
}

/// Concatenates strategy results in priority order, keeping only the first
/// result per original revision.
pub fn merge_by_priority<I>(batches: I) -> Vec<RevokedContribution>
where
    I: IntoIterator<Item = Vec<RevokedContribution>>,
{
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|revoked| seen.insert(revoked.original.revision_id))
        .collect()
}

// =============================================================================
// Stateless strategies
// =============================================================================

/// Strategy 1: contributions whose own tags say they were undone.
pub fn detect_by_tags(
    contributions: &[EditEvent],
    classifier: &RevertClassifier,
) -> Vec<RevokedContribution> {
    contributions
        .iter()
        .filter(|event| classifier.is_revoked_by_tags(&event.tags))
        .map(|event| RevokedContribution {
            original: event.clone(),
            revoked_by: None,
            revoked_at: None,
            revert_comment: String::new(),
            revert_type: classifier.revert_type_from_tags(&event.tags),
            detection: DetectionMethod::RevisionTags,
            revert_revision_id: None,
        })
        .collect()
}

/// Strategy 2: an edit by `username` directly followed on the same page by
/// another actor whose size change cancels it within the revocation window.
///
/// `page_events` must be in chronological order.
pub fn detect_by_size_correlation(
    username: &str,
    page_events: &[EditEvent],
    classifier: &RevertClassifier,
) -> Vec<RevokedContribution> {
    let window = ChronoDuration::hours(REVOCATION_WINDOW_HOURS);

    page_events
        .windows(2)
        .filter_map(|pair| {
            let (edit, next) = (&pair[0], &pair[1]);
            let qualifies = edit.actor == username
                && next.actor != username
                && next.page_title == edit.page_title
                && next.timestamp - edit.timestamp <= window
                && cancels_by_size(edit.size_delta, next.size_delta);
            qualifies.then(|| {
                let revert_type = classifier
                    .classify(&next.comment, &next.tags)
                    .unwrap_or(RevertType::GenericRevert);
                RevokedContribution::undone_by(edit, next, revert_type, DetectionMethod::SizeCorrelation)
            })
        })
        .collect()
}

/// Strategy 3, deep mode: attributes each revert by another actor on the
/// page to one of `user_edits`.
///
/// Attribution order: a revision id of the user's edit in the revert
/// comment, then the username in the comment (closest earlier edit), then the
/// revert's parent revision, then the closest earlier edit within the
/// revocation window.
pub fn detect_in_page_history(
    username: &str,
    user_edits: &[EditEvent],
    page_events: &[EditEvent],
    classifier: &RevertClassifier,
) -> Vec<RevokedContribution> {
    let window = ChronoDuration::hours(REVOCATION_WINDOW_HOURS);
    let username_lower = username.to_lowercase();

    page_events
        .iter()
        .filter(|event| event.is_revert && event.actor != username)
        .filter_map(|revert| {
            let earlier: Vec<&EditEvent> = user_edits
                .iter()
                .filter(|edit| edit.timestamp <= revert.timestamp && edit.revision_id != revert.revision_id)
                .collect();
            let closest = || earlier.iter().max_by_key(|edit| (edit.timestamp, edit.revision_id)).copied();

            let target = earlier
                .iter()
                .find(|edit| mentions_number(&revert.comment, edit.revision_id))
                .copied()
                .or_else(|| {
                    revert
                        .comment
                        .to_lowercase()
                        .contains(&username_lower)
                        .then(closest)
                        .flatten()
                })
                .or_else(|| {
                    earlier
                        .iter()
                        .find(|edit| edit.revision_id == revert.parent_revision_id)
                        .copied()
                })
                .or_else(|| closest().filter(|edit| revert.timestamp - edit.timestamp <= window))?;

            let revert_type = classifier
                .classify(&revert.comment, &revert.tags)
                .unwrap_or(RevertType::GenericRevert);
            Some(RevokedContribution::undone_by(
                target,
                revert,
                revert_type,
                DetectionMethod::PageHistory,
            ))
        })
        .collect()
}

/// Strategy 3, light mode: if any recent revert by another actor names the
/// user, the user's latest edit on the page is reported as undone by the
/// most recent such revert.
pub fn light_probe(
    username: &str,
    user_edits: &[EditEvent],
    page_events: &[EditEvent],
    classifier: &RevertClassifier,
) -> Option<RevokedContribution> {
    let username_lower = username.to_lowercase();
    let revert = page_events
        .iter()
        .filter(|event| {
            event.is_revert
                && event.actor != username
                && event.comment.to_lowercase().contains(&username_lower)
        })
        .max_by_key(|event| (event.timestamp, event.revision_id))?;

    let latest = user_edits
        .iter()
        .max_by_key(|edit| (edit.timestamp, edit.revision_id))?;

    let revert_type = classifier
        .classify(&revert.comment, &revert.tags)
        .unwrap_or(RevertType::GenericRevert);
    Some(RevokedContribution::undone_by(
        latest,
        revert,
        revert_type,
        DetectionMethod::PageProbe,
    ))
}

/// Whether `text` contains `number` as a whole digit run.
pub(crate) fn mentions_number(text: &str, number: u64) -> bool {
    let needle = number.to_string();
    let bytes = text.as_bytes();
    text.match_indices(&needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_digit();
        let after_ok = end == bytes.len() || !bytes[end].is_ascii_digit();
        before_ok && after_ok
    })
}

// =============================================================================
// Resolver
// =============================================================================

/// Runs all strategies for one contributor against a data source.
pub struct RevokedContributionResolver {
    source: SourceHandle,
    classifier: RevertClassifier,
    config: RevokedAnalysisConfig,
    now: DateTime<Utc>,
}

impl RevokedContributionResolver {
    pub fn new(source: SourceHandle, ctx: &AnalysisContext, config: RevokedAnalysisConfig) -> Self {
        Self {
            source,
            classifier: ctx.classifier(),
            config,
            now: ctx.now,
        }
    }

    /// Distinct pages edited within the recent-days cutoff, in contribution
    /// order, capped at the configured page count.
    pub fn pages_to_probe(&self, contributions: &[EditEvent]) -> Vec<String> {
        let cutoff = self.now - ChronoDuration::days(i64::from(self.config.recent_days_only));
        let mut seen = BTreeSet::new();
        contributions
            .iter()
            .filter(|event| event.timestamp >= cutoff)
            .filter(|event| seen.insert(event.page_title.clone()))
            .map(|event| event.page_title.clone())
            .take(self.config.max_pages_to_analyze)
            .collect()
    }

    /// Resolves the revoked contributions of `username`.
    ///
    /// Never fails as a whole: a page that cannot be probed is logged and
    /// skipped.
    pub async fn resolve(&self, username: &str, contributions: &[EditEvent]) -> Vec<RevokedContribution> {
        let by_tags = detect_by_tags(contributions, &self.classifier);

        let mut by_size = Vec::new();
        let mut by_history = Vec::new();
        let mut by_probe = Vec::new();

        let mut edits_by_page: HashMap<&str, Vec<EditEvent>> = HashMap::new();
        for event in contributions {
            edits_by_page
                .entry(event.page_title.as_str())
                .or_default()
                .push(event.clone());
        }

        for title in self.pages_to_probe(contributions) {
            let page_events = match self.fetch_page_events(&title).await {
                Ok(events) => events,
                Err(e) => {
                    log::warn!("Revocation probe of {title} for {username} failed: {e}");
                    continue;
                }
            };
            let user_edits = merge_user_edits(
                username,
                edits_by_page.get(title.as_str()).map(Vec::as_slice).unwrap_or_default(),
                &page_events,
            );

            by_size.extend(
                detect_by_size_correlation(username, &page_events, &self.classifier)
                    .into_iter()
                    .map(|revoked| prefer_contribution(revoked, &user_edits)),
            );

            if self.config.enable_deep_analysis {
                by_history.extend(detect_in_page_history(
                    username,
                    &user_edits,
                    &page_events,
                    &self.classifier,
                ));
            } else if let Some(revoked) =
                light_probe(username, &user_edits, &page_events, &self.classifier)
            {
                by_probe.push(revoked);
            }
        }

        let merged = merge_by_priority([by_tags, by_size, by_history, by_probe]);
        log::debug!(
            "Resolved {} revoked contributions for {username} out of {}",
            merged.len(),
            contributions.len()
        );
        merged
    }

    async fn fetch_page_events(&self, title: &str) -> Result<Vec<EditEvent>, WikiError> {
        let limit = if self.config.enable_deep_analysis {
            self.config.max_revisions_per_page
        } else {
            LIGHT_PROBE_REVISIONS
        };
        let revisions = self.source.fetch_page_revisions(title, limit).await?;
        let mut events = EditEvent::from_revisions(title, &revisions, &self.classifier);
        sort_chronologically(&mut events);
        Ok(events)
    }
}

/// The user's edits on one page: contributions first, plus any page
/// revisions by the user that the contribution list did not include.
fn merge_user_edits(username: &str, contributions: &[EditEvent], page_events: &[EditEvent]) -> Vec<EditEvent> {
    let known: HashSet<u64> = contributions.iter().map(|e| e.revision_id).collect();
    let mut edits = contributions.to_vec();
    edits.extend(
        page_events
            .iter()
            .filter(|e| e.actor == username && !known.contains(&e.revision_id))
            .cloned(),
    );
    edits
}

/// Swaps in the contribution record for the original edit when available;
/// its size delta comes straight from upstream.
fn prefer_contribution(mut revoked: RevokedContribution, user_edits: &[EditEvent]) -> RevokedContribution {
    if let Some(edit) = user_edits
        .iter()
        .find(|edit| edit.revision_id == revoked.original.revision_id)
    {
        revoked.original = edit.clone();
    }
    revoked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{PageSnapshot, Revision, Snapshot, SnapshotSource};
    use crate::keywords::KeywordTables;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn classifier() -> RevertClassifier {
        RevertClassifier::new(&KeywordTables::default(), "en")
    }

    fn create_test_event(
        actor: &str,
        rev: u64,
        parent: u64,
        minutes: i64,
        delta: i64,
        comment: &str,
    ) -> EditEvent {
        EditEvent {
            timestamp: base_time() + ChronoDuration::minutes(minutes),
            actor: actor.into(),
            is_anonymous: false,
            page_title: "Page".into(),
            revision_id: rev,
            parent_revision_id: parent,
            size_delta: delta,
            comment: comment.into(),
            is_minor: false,
            is_revert: classifier().is_revert(comment, &[]),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_tags_strategy() {
        let mut tagged = create_test_event("Alice", 1, 0, 0, 10, "");
        tagged.tags = vec!["mw-reverted".into()];
        let plain = create_test_event("Alice", 2, 0, 5, 10, "");

        let found = detect_by_tags(&[tagged, plain], &classifier());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].original.revision_id, 1);
        assert_eq!(found[0].revoked_by, None);
        assert_eq!(found[0].detection, DetectionMethod::RevisionTags);
    }

    #[test]
    fn test_size_correlation() {
        let events = vec![
            create_test_event("Alice", 1, 0, 0, 500, "expand"),
            create_test_event("Bob", 2, 1, 30, -480, "trim"),
            create_test_event("Alice", 3, 2, 60, 300, "again"),
            create_test_event("Bob", 4, 3, 60 * 30, -300, "late"),
        ];
        let found = detect_by_size_correlation("Alice", &events, &classifier());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].original.revision_id, 1);
        assert_eq!(found[0].revoked_by.as_deref(), Some("Bob"));
        assert_eq!(found[0].revert_type, RevertType::GenericRevert);
    }

    #[test]
    fn test_history_attribution_order() {
        let user_edits = vec![
            create_test_event("Alice", 100, 99, 0, 50, "add"),
            create_test_event("Alice", 105, 104, 10, 50, "add more"),
        ];
        let page_events = vec![
            user_edits[0].clone(),
            user_edits[1].clone(),
            // Names an older revision explicitly.
            create_test_event("Bob", 110, 105, 20, -50, "Undid revision 100 by Alice"),
            // Mentions the user only: closest earlier edit.
            create_test_event("Carol", 111, 110, 25, -50, "rv alice"),
            // Neither: falls back to the time window.
            create_test_event("Dave", 112, 111, 30, -50, "revert"),
        ];
        let found = detect_in_page_history("Alice", &user_edits, &page_events, &classifier());

        assert_eq!(found.len(), 3);
        assert_eq!(found[0].original.revision_id, 100);
        assert_eq!(found[0].revert_type, RevertType::Undo);
        assert_eq!(found[1].original.revision_id, 105);
        assert_eq!(found[2].original.revision_id, 105);

        let merged = merge_by_priority([found]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].revoked_by.as_deref(), Some("Carol"));
    }

    #[test]
    fn test_history_ignores_stale_reverts() {
        let user_edits = vec![create_test_event("Alice", 100, 99, 0, 50, "add")];
        let page_events = vec![create_test_event("Bob", 200, 150, 60 * 48, -50, "revert")];
        assert!(detect_in_page_history("Alice", &user_edits, &page_events, &classifier()).is_empty());
    }

    #[test]
    fn test_mentions_number_needs_whole_digits() {
        assert!(mentions_number("Undid revision 100 by X", 100));
        assert!(!mentions_number("Undid revision 1001 by X", 100));
        assert!(mentions_number("rv to 100", 100));
    }

    #[test]
    fn test_light_probe() {
        let user_edits = vec![
            create_test_event("Alice", 1, 0, 0, 10, "a"),
            create_test_event("Alice", 3, 2, 20, 10, "b"),
        ];
        let page_events = vec![create_test_event("Bob", 4, 3, 25, -10, "Reverted edits by Alice")];
        let found = light_probe("Alice", &user_edits, &page_events, &classifier()).unwrap();
        assert_eq!(found.original.revision_id, 3);
        assert_eq!(found.detection, DetectionMethod::PageProbe);

        let unrelated = vec![create_test_event("Bob", 4, 3, 25, -10, "Reverted edits by Zed")];
        assert!(light_probe("Alice", &user_edits, &unrelated, &classifier()).is_none());
    }

    #[test]
    fn test_merge_keeps_first_strategy() {
        let edit = create_test_event("Alice", 7, 0, 0, 10, "");
        let revert = create_test_event("Bob", 8, 7, 1, -10, "rv");
        let tags = vec![RevokedContribution {
            original: edit.clone(),
            revoked_by: None,
            revoked_at: None,
            revert_comment: String::new(),
            revert_type: RevertType::GenericRevert,
            detection: DetectionMethod::RevisionTags,
            revert_revision_id: None,
        }];
        let size = vec![RevokedContribution::undone_by(
            &edit,
            &revert,
            RevertType::ManualRevert,
            DetectionMethod::SizeCorrelation,
        )];
        let merged = merge_by_priority([tags, size]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].detection, DetectionMethod::RevisionTags);
    }

    fn revision(rev_id: u64, parent_id: u64, user: &str, ts: &str, size: i64, comment: &str) -> Revision {
        Revision {
            rev_id,
            parent_id,
            user: user.into(),
            timestamp: ts.into(),
            size,
            comment: comment.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolver_survives_missing_pages() {
        let mut snapshot = Snapshot::default();
        snapshot.pages.insert(
            "Page".into(),
            PageSnapshot {
                revisions: vec![
                    revision(12, 11, "Bob", "2024-03-01T12:30:00Z", 1000, "Reverted edits by Alice"),
                    revision(11, 10, "Alice", "2024-03-01T12:10:00Z", 1400, "my version"),
                    revision(10, 9, "Carol", "2024-03-01T11:00:00Z", 1000, "baseline"),
                ],
                ..Default::default()
            },
        );
        let ctx = AnalysisContext::with_defaults("en", base_time() + ChronoDuration::days(1));
        let resolver = RevokedContributionResolver::new(
            Arc::new(SnapshotSource::new(snapshot)),
            &ctx,
            RevokedAnalysisConfig::default(),
        );

        let mut on_page = create_test_event("Alice", 11, 10, 10, 400, "my version");
        on_page.timestamp = base_time() + ChronoDuration::minutes(10);
        let mut elsewhere = create_test_event("Alice", 20, 0, 20, 5, "x");
        elsewhere.page_title = "Missing".into();

        let found = resolver.resolve("Alice", &[elsewhere, on_page]).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].original.revision_id, 11);
        assert_eq!(found[0].revoked_by.as_deref(), Some("Bob"));
        // Size cancellation outranks the light probe.
        assert_eq!(found[0].detection, DetectionMethod::SizeCorrelation);
    }
}
