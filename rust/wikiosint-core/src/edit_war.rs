//! Edit-war windows and page conflict statistics.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::event::{sort_chronologically, EditEvent};

// =============================================================================
// Constants
// =============================================================================

/// Revisions inside one sliding window.
pub const EDIT_WAR_WINDOW: usize = 5;

/// Maximum span of a qualifying window in hours.
pub const EDIT_WAR_MAX_SPAN_HOURS: i64 = 24;

/// Trailing window for "recent" conflicts in days.
pub const RECENT_CONFLICT_DAYS: i64 = 7;

// =============================================================================
// Types
// =============================================================================

/// A dense burst of editing on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditWarPeriod {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Distinct actors inside the window, sorted.
    pub participants: BTreeSet<String>,
    pub revision_count: usize,
}

impl EditWarPeriod {
    pub fn duration(&self) -> ChronoDuration {
        self.end_time - self.start_time
    }
}

/// Conflict statistics of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictStats {
    pub reversions_count: usize,
    /// Actors who made at least one revert, sorted.
    pub conflicting_users: Vec<String>,
    pub edit_war_periods: Vec<EditWarPeriod>,
    /// 1 - controversy.
    pub stability_score: f64,
    /// Reverts / revisions.
    pub controversy_score: f64,
    /// Reverts within the trailing [`RECENT_CONFLICT_DAYS`].
    pub recent_conflicts: usize,
}

// =============================================================================
// Detection
// =============================================================================

/// Slides a [`EDIT_WAR_WINDOW`]-revision window one revision at a time and
/// emits every window whose span is at most [`EDIT_WAR_MAX_SPAN_HOURS`].
///
/// Overlapping qualifying windows are reported separately, so a long burst of
/// N dense revisions yields N - 4 periods. Input order does not matter; the
/// events are ordered by time first. Events with an unknown time are skipped.
pub fn detect_edit_war_periods(events: &[EditEvent]) -> Vec<EditWarPeriod> {
    let mut ordered: Vec<EditEvent> = events
        .iter()
        .filter(|e| !e.has_unknown_time())
        .cloned()
        .collect();
    if ordered.len() < EDIT_WAR_WINDOW {
        return Vec::new();
    }
    sort_chronologically(&mut ordered);

    let max_span = ChronoDuration::hours(EDIT_WAR_MAX_SPAN_HOURS);
    ordered
        .windows(EDIT_WAR_WINDOW)
        .filter_map(|window| {
            let start = window[0].timestamp;
            let end = window[EDIT_WAR_WINDOW - 1].timestamp;
            if end - start > max_span {
                return None;
            }
            Some(EditWarPeriod {
                start_time: start,
                end_time: end,
                participants: window.iter().map(|e| e.actor.clone()).collect(),
                revision_count: window.len(),
            })
        })
        .collect()
}

/// Conflict statistics over a page's revision events at time `now`.
pub fn analyze_conflicts(events: &[EditEvent], now: DateTime<Utc>) -> ConflictStats {
    let recent_cutoff = now - ChronoDuration::days(RECENT_CONFLICT_DAYS);

    let reverts: Vec<&EditEvent> = events.iter().filter(|e| e.is_revert).collect();
    let conflicting_users: BTreeSet<String> = reverts.iter().map(|e| e.actor.clone()).collect();
    let recent_conflicts = reverts
        .iter()
        .filter(|e| !e.has_unknown_time() && e.timestamp >= recent_cutoff)
        .count();

    let controversy_score = if events.is_empty() {
        0.0
    } else {
        reverts.len() as f64 / events.len() as f64
    };

    ConflictStats {
        reversions_count: reverts.len(),
        conflicting_users: conflicting_users.into_iter().collect(),
        edit_war_periods: detect_edit_war_periods(events),
        stability_score: 1.0 - controversy_score,
        controversy_score,
        recent_conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::parse_timestamp;
    use chrono::TimeZone;

    fn create_test_events(actors: &[&str], spacing: ChronoDuration) -> Vec<EditEvent> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        actors
            .iter()
            .enumerate()
            .map(|(i, actor)| EditEvent {
                timestamp: start + spacing * i as i32,
                actor: actor.to_string(),
                is_anonymous: false,
                page_title: "Page".into(),
                revision_id: i as u64 + 1,
                parent_revision_id: i as u64,
                size_delta: 10,
                comment: String::new(),
                is_minor: false,
                is_revert: i % 2 == 1,
                tags: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn test_dense_window_yields_one_period() {
        let events = create_test_events(&["A", "B", "C", "A", "B"], ChronoDuration::minutes(10));
        let periods = detect_edit_war_periods(&events);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].participants.len(), 3);
        assert_eq!(periods[0].revision_count, 5);
        assert_eq!(periods[0].duration(), ChronoDuration::minutes(40));
    }

    #[test]
    fn test_spread_out_revisions_yield_nothing() {
        let events = create_test_events(&["A", "B", "C", "A", "B"], ChronoDuration::days(2));
        assert!(detect_edit_war_periods(&events).is_empty());
    }

    #[test]
    fn test_fewer_than_window_yields_nothing() {
        let events = create_test_events(&["A", "B", "A", "B"], ChronoDuration::minutes(1));
        assert!(detect_edit_war_periods(&events).is_empty());
    }

    #[test]
    fn test_span_boundary_is_inclusive() {
        let events = create_test_events(&["A", "B", "A", "B", "A"], ChronoDuration::hours(6));
        assert_eq!(detect_edit_war_periods(&events).len(), 1);

        let mut events = create_test_events(&["A", "B", "A", "B", "A"], ChronoDuration::hours(6));
        events[4].timestamp += ChronoDuration::seconds(1);
        assert!(detect_edit_war_periods(&events).is_empty());
    }

    #[test]
    fn test_overlapping_windows_are_not_merged() {
        let events = create_test_events(
            &["A", "B", "A", "B", "A", "B", "A"],
            ChronoDuration::minutes(5),
        );
        assert_eq!(detect_edit_war_periods(&events).len(), 3);
    }

    #[test]
    fn test_unordered_input() {
        let mut events = create_test_events(&["A", "B", "C", "A", "B"], ChronoDuration::minutes(10));
        events.reverse();
        let periods = detect_edit_war_periods(&events);
        assert_eq!(periods.len(), 1);
        assert!(periods[0].start_time < periods[0].end_time);
    }

    #[test]
    fn test_conflict_stats() {
        let events = create_test_events(&["A", "B", "C", "A"], ChronoDuration::hours(1));
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let stats = analyze_conflicts(&events, now);

        assert_eq!(stats.reversions_count, 2);
        assert_eq!(stats.conflicting_users, vec!["A", "B"]);
        assert!((stats.controversy_score - 0.5).abs() < 1e-9);
        assert!((stats.stability_score - 0.5).abs() < 1e-9);
        assert_eq!(stats.recent_conflicts, 2);

        let later = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(analyze_conflicts(&events, later).recent_conflicts, 0);
    }

    #[test]
    fn test_unknown_times_are_skipped() {
        let mut events = create_test_events(&["A", "B", "C", "A", "B"], ChronoDuration::minutes(10));
        for event in &mut events {
            event.timestamp = parse_timestamp("not-a-timestamp");
        }
        assert!(detect_edit_war_periods(&events).is_empty());

        let stats = analyze_conflicts(&events, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(stats.reversions_count, 2);
        assert_eq!(stats.recent_conflicts, 0);
        assert!(stats.edit_war_periods.is_empty());

        // Four dated events plus one undated stay below the window size.
        let mut events = create_test_events(&["A", "B", "C", "A", "B"], ChronoDuration::minutes(10));
        events[2].timestamp = parse_timestamp("");
        assert!(detect_edit_war_periods(&events).is_empty());
    }

    #[test]
    fn test_empty_history() {
        let stats = analyze_conflicts(&[], Utc::now());
        assert_eq!(stats.controversy_score, 0.0);
        assert_eq!(stats.stability_score, 1.0);
    }
}
