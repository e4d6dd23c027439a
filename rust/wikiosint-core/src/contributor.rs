//! Per-actor aggregates folded from edit events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::event::EditEvent;
use crate::revoked::RevokedContribution;
use crate::scoring::{PageContributorSignals, SuspicionScore, SCORE_UNAVAILABLE};

/// One actor's activity on a page (or on a set of pages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub username: String,
    pub user_id: Option<u64>,
    pub edit_count: usize,
    pub first_edit: DateTime<Utc>,
    pub last_edit: DateTime<Utc>,
    pub total_size_delta: i64,
    pub is_anonymous: bool,
    pub suspicion_score: i32,
    pub suspicion_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
    /// Filled only for contributors given a full account analysis.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revoked_contributions: Vec<RevokedContribution>,
}

impl Contributor {
    fn from_event(event: &EditEvent) -> Self {
        Self {
            username: event.actor.clone(),
            user_id: None,
            edit_count: 0,
            first_edit: event.timestamp,
            last_edit: event.timestamp,
            total_size_delta: 0,
            is_anonymous: event.is_anonymous,
            suspicion_score: 0,
            suspicion_flags: Vec::new(),
            analysis_error: None,
            revoked_contributions: Vec::new(),
        }
    }

    fn absorb(&mut self, event: &EditEvent) {
        self.edit_count += 1;
        self.total_size_delta += event.size_delta;

        // Events with an unknown time still count, but must not drag the
        // activity span back to the epoch.
        if event.has_unknown_time() {
            return;
        }
        if self.first_edit == DateTime::<Utc>::UNIX_EPOCH || event.timestamp < self.first_edit {
            self.first_edit = event.timestamp;
        }
        if event.timestamp > self.last_edit {
            self.last_edit = event.timestamp;
        }
    }

    /// Days since the first edit, when it is known.
    pub fn tenure_days(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.first_edit == DateTime::<Utc>::UNIX_EPOCH {
            return None;
        }
        Some((now - self.first_edit).num_days())
    }

    pub fn page_signals(&self, now: DateTime<Utc>) -> PageContributorSignals {
        PageContributorSignals {
            is_anonymous: self.is_anonymous,
            page_edits: self.edit_count,
            page_tenure_days: self.tenure_days(now),
            total_size_delta: self.total_size_delta,
        }
    }

    pub fn apply_score(&mut self, score: SuspicionScore) {
        self.suspicion_score = score.score;
        self.suspicion_flags = score.flags;
        self.analysis_error = None;
    }

    /// Marks the contributor as unscored after its own analysis failed.
    pub fn mark_failed(&mut self, error: impl std::fmt::Display) {
        self.suspicion_score = SCORE_UNAVAILABLE;
        self.suspicion_flags = Vec::new();
        self.analysis_error = Some(format!("Analysis failed: {error}"));
    }
}

/// Accumulates [`Contributor`]s from a stream of events.
#[derive(Debug, Clone, Default)]
pub struct ContributorLedger {
    contributors: HashMap<String, Contributor>,
}

impl ContributorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &EditEvent) {
        self.contributors
            .entry(event.actor.clone())
            .or_insert_with(|| Contributor::from_event(event))
            .absorb(event);
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    pub fn get(&self, username: &str) -> Option<&Contributor> {
        self.contributors.get(username)
    }

    /// Attaches a known account id to a contributor already in the ledger.
    pub fn set_user_id(&mut self, username: &str, user_id: u64) {
        if let Some(contributor) = self.contributors.get_mut(username) {
            contributor.user_id = Some(user_id);
        }
    }

    /// Contributors by edit count, most active first; ties by name.
    pub fn into_ranked(self) -> Vec<Contributor> {
        let mut ranked: Vec<Contributor> = self.contributors.into_values().collect();
        ranked.sort_by(|a, b| {
            b.edit_count
                .cmp(&a.edit_count)
                .then_with(|| a.username.cmp(&b.username))
        });
        ranked
    }
}

impl<'a> Extend<&'a EditEvent> for ContributorLedger {
    fn extend<I: IntoIterator<Item = &'a EditEvent>>(&mut self, events: I) {
        for event in events {
            self.record(event);
        }
    }
}

impl<'a> FromIterator<&'a EditEvent> for ContributorLedger {
    fn from_iter<I: IntoIterator<Item = &'a EditEvent>>(events: I) -> Self {
        let mut ledger = ContributorLedger::new();
        ledger.extend(events);
        ledger
    }
}

/// Gini-based evenness of edit counts: 1.0 when every contributor made the
/// same number of edits, approaching 0.0 when one contributor made them all.
///
/// Formula: 1 - sum(|x_i - x_j|) / (2 * n^2 * mean). Zero for one or no
/// contributors.
pub fn contributor_diversity(edit_counts: &[usize]) -> f64 {
    let n = edit_counts.len();
    if n <= 1 {
        return 0.0;
    }
    let total: usize = edit_counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let mean = total as f64 / n as f64;

    let mut abs_diff_sum = 0.0;
    for &a in edit_counts {
        for &b in edit_counts {
            abs_diff_sum += (a as f64 - b as f64).abs();
        }
    }
    let gini = abs_diff_sum / (2.0 * (n * n) as f64 * mean);
    (1.0 - gini).clamp(0.0, 1.0)
}
