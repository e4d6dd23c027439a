//! Mutual-support detection between pairs of contributors.
//!
//! A support event is a pair of nearby edits on one page where the later
//! edit, made by one member of a candidate pair, answers an earlier edit by
//! someone else: the earlier edit was a revert, the later one is a revert,
//! the later one restores removed content, or its comment is defensive.
//! Pairs accumulate these events across every page of a run and are graded
//! into a [`SuspicionLevel`] from four banded metrics.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::config::CrossPageOptions;
use crate::event::{sort_chronologically, EditEvent};
use crate::revert::RevertClassifier;

// =============================================================================
// Constants
// =============================================================================

/// Minimum characters the earlier edit removed for a restoration.
pub const RESTORATION_MIN_REMOVED: i64 = 100;

/// Minimum characters the later edit added for a restoration.
pub const RESTORATION_MIN_ADDED: i64 = 50;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportType {
    /// The earlier edit was a revert and the answer was not.
    RevertDefense,
    CounterRevert,
    ContentRestoration,
    DefensiveEdit,
}

impl fmt::Display for SupportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupportType::RevertDefense => write!(f, "revert_defense"),
            SupportType::CounterRevert => write!(f, "counter_revert"),
            SupportType::ContentRestoration => write!(f, "content_restoration"),
            SupportType::DefensiveEdit => write!(f, "defensive_edit"),
        }
    }
}

/// Coordination grade of a pair, ordered from `None` up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspicionLevel {
    None,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl SuspicionLevel {
    pub fn from_points(points: u32) -> Self {
        match points {
            p if p >= 8 => SuspicionLevel::VeryHigh,
            p if p >= 6 => SuspicionLevel::High,
            p if p >= 4 => SuspicionLevel::Moderate,
            p if p >= 2 => SuspicionLevel::Low,
            _ => SuspicionLevel::None,
        }
    }

    /// Grade from the four pair metrics.
    pub fn from_metrics(
        mutual_support_ratio: f64,
        average_reaction_time: i64,
        reciprocity_score: f64,
        exclusivity_ratio: f64,
    ) -> Self {
        let mut points = 0;

        points += match mutual_support_ratio {
            r if r > 0.7 => 3,
            r if r > 0.5 => 2,
            r if r > 0.3 => 1,
            _ => 0,
        };
        points += match average_reaction_time {
            t if t < 10 => 3,
            t if t < 30 => 2,
            t if t < 60 => 1,
            _ => 0,
        };
        points += match reciprocity_score {
            r if r > 0.8 => 2,
            r if r > 0.6 => 1,
            _ => 0,
        };
        points += match exclusivity_ratio {
            r if r > 0.9 => 2,
            r if r > 0.7 => 1,
            _ => 0,
        };

        Self::from_points(points)
    }
}

impl fmt::Display for SuspicionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspicionLevel::None => write!(f, "NONE"),
            SuspicionLevel::Low => write!(f, "LOW"),
            SuspicionLevel::Moderate => write!(f, "MODERATE"),
            SuspicionLevel::High => write!(f, "HIGH"),
            SuspicionLevel::VeryHigh => write!(f, "VERY_HIGH"),
        }
    }
}

/// One inferred act of a pair member answering an earlier edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutualSupportEvent {
    /// Time of the answering edit.
    pub timestamp: DateTime<Utc>,
    pub page_title: String,
    pub support_type: SupportType,
    pub reaction_time_minutes: i64,
    pub attacker: String,
    pub defender: String,
    /// The other member of the pair.
    pub supported_user: String,
    pub revision_id: u64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutualSupportPair {
    pub user_a: String,
    pub user_b: String,
    pub support_events: Vec<MutualSupportEvent>,
    pub mutual_support_ratio: f64,
    /// Mean reaction time in whole minutes.
    pub average_reaction_time: i64,
    pub reciprocity_score: f64,
    pub exclusivity_ratio: f64,
    pub pages_involved: Vec<String>,
    pub median_reaction_time: f64,
    /// Share of both members' support activity, across all partners, that
    /// falls inside this pair.
    pub partner_concentration: f64,
    pub suspicion_level: SuspicionLevel,
}

impl MutualSupportPair {
    pub fn involves(&self, user: &str) -> bool {
        self.user_a == user || self.user_b == user
    }
}

/// Support events of one candidate pair with their directional counts.
#[derive(Debug, Clone, Default)]
struct PairTally {
    events: Vec<MutualSupportEvent>,
    a_defends_b: usize,
    b_defends_a: usize,
}

impl PairTally {
    fn new(user_a: &str, user_b: &str, events: Vec<MutualSupportEvent>) -> Self {
        let count = |defender: &str, supported: &str| {
            events
                .iter()
                .filter(|e| e.defender == defender && e.supported_user == supported)
                .count()
        };
        let a_defends_b = count(user_a, user_b);
        let b_defends_a = count(user_b, user_a);
        Self {
            events,
            a_defends_b,
            b_defends_a,
        }
    }

    fn mutual(&self) -> usize {
        self.a_defends_b + self.b_defends_a
    }

    fn mutual_support_ratio(&self) -> f64 {
        if self.events.is_empty() {
            return 0.0;
        }
        self.mutual() as f64 / self.events.len() as f64
    }

    fn reciprocity_score(&self) -> f64 {
        let high = self.a_defends_b.max(self.b_defends_a);
        if high == 0 {
            return 0.0;
        }
        self.a_defends_b.min(self.b_defends_a) as f64 / high as f64
    }

    fn exclusivity_ratio(&self) -> f64 {
        // Same numerator as the support ratio; kept for report compatibility.
        self.mutual_support_ratio()
    }

    fn average_reaction_time(&self) -> i64 {
        if self.events.is_empty() {
            return 0;
        }
        let total: i64 = self.events.iter().map(|e| e.reaction_time_minutes).sum();
        total / self.events.len() as i64
    }

    fn median_reaction_time(&self) -> f64 {
        if self.events.is_empty() {
            return 0.0;
        }
        let mut data = Data::new(
            self.events
                .iter()
                .map(|e| e.reaction_time_minutes as f64)
                .collect::<Vec<_>>(),
        );
        data.percentile(50)
    }
}

// =============================================================================
// Detector
// =============================================================================

/// Finds coordinated defence between contributor pairs.
#[derive(Debug, Clone)]
pub struct MutualSupportDetector {
    lookahead: usize,
    max_reaction: ChronoDuration,
    min_support_ratio: f64,
    classifier: RevertClassifier,
}

impl MutualSupportDetector {
    pub fn new(options: &CrossPageOptions, classifier: RevertClassifier) -> Self {
        Self {
            lookahead: options.lookahead,
            max_reaction: ChronoDuration::minutes(options.max_reaction_time_minutes),
            min_support_ratio: options.min_mutual_support_ratio,
            classifier,
        }
    }

    /// Events with unknown times are left out; the rest are sorted once.
    pub fn prepare(events: &[EditEvent]) -> Vec<EditEvent> {
        let mut sorted: Vec<EditEvent> = events.iter().filter(|e| !e.has_unknown_time()).cloned().collect();
        sort_chronologically(&mut sorted);
        sorted
    }

    /// Support events for `(user_a, user_b)` in `sorted`, which must be in
    /// chronological order.
    pub fn find_support_events(&self, user_a: &str, user_b: &str, sorted: &[EditEvent]) -> Vec<MutualSupportEvent> {
        let mut found = Vec::new();

        for (i, earlier) in sorted.iter().enumerate() {
            for later in sorted[i + 1..].iter().take(self.lookahead) {
                if later.page_title != earlier.page_title || later.actor == earlier.actor {
                    continue;
                }
                let supported = if later.actor == user_a {
                    user_b
                } else if later.actor == user_b {
                    user_a
                } else {
                    continue;
                };
                let Some(support_type) = self.support_type(earlier, later) else {
                    continue;
                };

                let gap = later.timestamp - earlier.timestamp;
                if gap > self.max_reaction {
                    continue;
                }

                found.push(MutualSupportEvent {
                    timestamp: later.timestamp,
                    page_title: later.page_title.clone(),
                    support_type,
                    reaction_time_minutes: gap.num_minutes(),
                    attacker: earlier.actor.clone(),
                    defender: later.actor.clone(),
                    supported_user: supported.to_string(),
                    revision_id: later.revision_id,
                    comment: later.comment.clone(),
                });
            }
        }

        found
    }

    /// How `later` answers `earlier`, if it does.
    pub fn support_type(&self, earlier: &EditEvent, later: &EditEvent) -> Option<SupportType> {
        if earlier.is_revert && !later.is_revert {
            Some(SupportType::RevertDefense)
        } else if later.is_revert {
            Some(SupportType::CounterRevert)
        } else if is_content_restoration(earlier, later) {
            Some(SupportType::ContentRestoration)
        } else if self.classifier.is_defensive(&later.comment) {
            Some(SupportType::DefensiveEdit)
        } else {
            None
        }
    }

    /// Graded pairs among `users`, most suspicious first.
    ///
    /// Pairs are formed in the order of `users`; callers leave anonymous
    /// actors out. Pairs graded `None` or below the minimum support ratio
    /// are dropped.
    pub fn detect(&self, users: &[&str], events: &[EditEvent]) -> Vec<MutualSupportPair> {
        let sorted = Self::prepare(events);
        let candidates = candidate_pairs(users);

        let tallies: Vec<(&str, &str, PairTally)> = candidates
            .par_iter()
            .filter_map(|&(a, b)| {
                let events = self.find_support_events(a, b, &sorted);
                (!events.is_empty()).then(|| (a, b, PairTally::new(a, b, events)))
            })
            .collect();

        let mut defends_by_user: HashMap<&str, usize> = HashMap::new();
        for (a, b, tally) in &tallies {
            *defends_by_user.entry(*a).or_default() += tally.a_defends_b;
            *defends_by_user.entry(*b).or_default() += tally.b_defends_a;
        }

        let mut pairs: Vec<MutualSupportPair> = tallies
            .into_iter()
            .map(|(a, b, tally)| {
                let activity = defends_by_user.get(a).copied().unwrap_or(0) + defends_by_user.get(b).copied().unwrap_or(0);
                build_pair(a, b, tally, activity)
            })
            .filter(|pair| {
                pair.suspicion_level != SuspicionLevel::None && pair.mutual_support_ratio >= self.min_support_ratio
            })
            .collect();

        pairs.sort_by(|x, y| {
            y.suspicion_level
                .cmp(&x.suspicion_level)
                .then_with(|| y.mutual_support_ratio.total_cmp(&x.mutual_support_ratio))
        });

        log::debug!("Mutual support: {} candidate pairs, {} kept", candidates.len(), pairs.len());
        pairs
    }
}

/// Unordered pairs of `users`, in generation order.
pub fn candidate_pairs<'a>(users: &[&'a str]) -> Vec<(&'a str, &'a str)> {
    let mut pairs = Vec::new();
    for (i, a) in users.iter().enumerate() {
        for b in &users[i + 1..] {
            pairs.push((*a, *b));
        }
    }
    pairs
}

fn is_content_restoration(earlier: &EditEvent, later: &EditEvent) -> bool {
    earlier.size_delta <= -RESTORATION_MIN_REMOVED && later.size_delta >= RESTORATION_MIN_ADDED
}

fn build_pair(user_a: &str, user_b: &str, tally: PairTally, partner_activity: usize) -> MutualSupportPair {
    let mutual_support_ratio = tally.mutual_support_ratio();
    let average_reaction_time = tally.average_reaction_time();
    let reciprocity_score = tally.reciprocity_score();
    let exclusivity_ratio = tally.exclusivity_ratio();
    let partner_concentration = if partner_activity == 0 {
        0.0
    } else {
        tally.mutual() as f64 / partner_activity as f64
    };

    let pages_involved: Vec<String> = tally
        .events
        .iter()
        .map(|e| e.page_title.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    MutualSupportPair {
        user_a: user_a.to_string(),
        user_b: user_b.to_string(),
        median_reaction_time: tally.median_reaction_time(),
        support_events: tally.events,
        mutual_support_ratio,
        average_reaction_time,
        reciprocity_score,
        exclusivity_ratio,
        pages_involved,
        partner_concentration,
        suspicion_level: SuspicionLevel::from_metrics(
            mutual_support_ratio,
            average_reaction_time,
            reciprocity_score,
            exclusivity_ratio,
        ),
    }
}
