//! Weighted-rule suspicion scoring.
//!
//! A rule table is an ordered list of `(flag, weight, predicate)`. Evaluation
//! sums the weights of the rules that fire, clamps the total to
//! [`MIN_SCORE`]..=[`MAX_SCORE`] and keeps the fired flags in table order.
//! Rules are independent; escalating bands are expressed by predicates that
//! exclude each other.

mod contributor;
mod cross_page;
mod edit;
mod page;
mod quality;

pub use contributor::{
    contributor_rules, page_contributor_rules, ContributorSignals, PageContributorSignals,
};
pub use cross_page::{cross_page_rules, CrossPageSignals};
pub use edit::{edit_rules, EditSignals};
pub use page::{page_rules, PageSignals};
pub use quality::{policy_rules, vandalism_rules, QualitySignals, NPOV_BIAS_THRESHOLD};

use serde::{Deserialize, Serialize};

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

/// Score reported for an entity whose own analysis failed.
pub const SCORE_UNAVAILABLE: i32 = -1;

/// How much a fired rule adds.
pub enum Weight<E> {
    Fixed(i32),
    /// Weight computed from the entity, e.g. a share of another score.
    Derived(fn(&E) -> i32),
}

pub struct Rule<E> {
    pub flag: &'static str,
    pub weight: Weight<E>,
    pub predicate: fn(&E) -> bool,
}

impl<E> Rule<E> {
    pub fn fixed(flag: &'static str, weight: i32, predicate: fn(&E) -> bool) -> Self {
        Self {
            flag,
            weight: Weight::Fixed(weight),
            predicate,
        }
    }

    pub fn derived(flag: &'static str, weight: fn(&E) -> i32, predicate: fn(&E) -> bool) -> Self {
        Self {
            flag,
            weight: Weight::Derived(weight),
            predicate,
        }
    }

    fn weight_for(&self, entity: &E) -> i32 {
        match self.weight {
            Weight::Fixed(w) => w,
            Weight::Derived(f) => f(entity),
        }
    }
}

/// A bounded score plus the flags that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspicionScore {
    pub score: i32,
    pub flags: Vec<String>,
}

impl SuspicionScore {
    /// Adds another evaluation on top of this one, clamping again.
    pub fn combine(mut self, other: SuspicionScore) -> SuspicionScore {
        self.score = (self.score + other.score).clamp(MIN_SCORE, MAX_SCORE);
        self.flags.extend(other.flags);
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Evaluates `rules` against `entity`.
pub fn evaluate<E>(entity: &E, rules: &[Rule<E>]) -> SuspicionScore {
    let mut total = 0;
    let mut flags = Vec::new();

    for rule in rules {
        if (rule.predicate)(entity) {
            total += rule.weight_for(entity);
            flags.push(rule.flag.to_string());
        }
    }

    SuspicionScore {
        score: total.clamp(MIN_SCORE, MAX_SCORE),
        flags,
    }
}

/// Account age in whole days at `now`, if the registration date is known.
pub(crate) fn age_days(
    since: Option<chrono::DateTime<chrono::Utc>>,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<i64> {
    since.map(|ts| (now - ts).num_days())
}
