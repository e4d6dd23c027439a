//! Uniform edit events.
//!
//! Revisions and contributions arrive in two different shapes from the data
//! source. Both are normalised into [`EditEvent`], the only edit type the
//! detectors and scoring tables look at.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::client::{Contribution, Revision};
use crate::revert::RevertClassifier;

/// Wire format of every upstream timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parses an upstream timestamp.
///
/// Malformed values yield the Unix epoch so the record still counts towards
/// count-based metrics; only its time-based metrics are lost.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    match NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        Ok(naive) => naive.and_utc(),
        Err(_) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(|_| {
                if !raw.is_empty() {
                    log::debug!("Unparseable timestamp {raw:?}, using epoch");
                }
                DateTime::<Utc>::UNIX_EPOCH
            }),
    }
}

/// Parses an optional timestamp, treating absent and malformed values alike.
pub fn parse_optional_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(parse_timestamp)
        .filter(|ts| *ts != DateTime::<Utc>::UNIX_EPOCH)
}

/// Whether a name looks like an IP address, which is how anonymous edits are
/// attributed upstream.
pub fn is_ip_address(name: &str) -> bool {
    name.parse::<std::net::IpAddr>().is_ok()
}

/// One edit, regardless of whether it came from a page history or a user's
/// contribution list. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEvent {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub is_anonymous: bool,
    pub page_title: String,
    pub revision_id: u64,
    pub parent_revision_id: u64,
    /// Signed byte change relative to the parent revision.
    pub size_delta: i64,
    pub comment: String,
    pub is_minor: bool,
    pub is_revert: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl EditEvent {
    /// Normalises a batch of revisions of one page.
    ///
    /// The size delta is taken against the parent revision when the parent is
    /// part of the batch, and is 0 otherwise. Input order is preserved.
    pub fn from_revisions(
        page_title: &str,
        revisions: &[Revision],
        classifier: &RevertClassifier,
    ) -> Vec<EditEvent> {
        let sizes: HashMap<u64, i64> = revisions.iter().map(|r| (r.rev_id, r.size)).collect();

        revisions
            .iter()
            .map(|rev| {
                let size_delta = sizes
                    .get(&rev.parent_id)
                    .filter(|_| rev.parent_id != 0)
                    .map(|parent_size| rev.size - parent_size)
                    .unwrap_or(0);
                Self::from_revision(page_title, rev, size_delta, classifier)
            })
            .collect()
    }

    pub fn from_revision(
        page_title: &str,
        rev: &Revision,
        size_delta: i64,
        classifier: &RevertClassifier,
    ) -> EditEvent {
        EditEvent {
            timestamp: parse_timestamp(&rev.timestamp),
            actor: rev.user.clone(),
            is_anonymous: rev.anonymous || is_ip_address(&rev.user),
            page_title: page_title.to_string(),
            revision_id: rev.rev_id,
            parent_revision_id: rev.parent_id,
            size_delta,
            comment: rev.comment.clone(),
            is_minor: rev.minor,
            is_revert: classifier.is_revert(&rev.comment, &rev.tags),
            tags: rev.tags.clone(),
        }
    }

    pub fn from_contribution(contribution: &Contribution, classifier: &RevertClassifier) -> EditEvent {
        EditEvent {
            timestamp: parse_timestamp(&contribution.timestamp),
            actor: contribution.user.clone(),
            is_anonymous: is_ip_address(&contribution.user),
            page_title: contribution.title.clone(),
            revision_id: contribution.rev_id,
            parent_revision_id: contribution.parent_id,
            size_delta: contribution.size_diff,
            comment: contribution.comment.clone(),
            is_minor: contribution.minor,
            is_revert: classifier.is_revert(&contribution.comment, &contribution.tags),
            tags: contribution.tags.clone(),
        }
    }

    /// Whether the timestamp was unparseable and replaced by the epoch.
    pub fn has_unknown_time(&self) -> bool {
        self.timestamp == DateTime::<Utc>::UNIX_EPOCH
    }
}

/// Sorts events ascending by time. Ties are broken by page and revision id so
/// the result does not depend on input order.
pub fn sort_chronologically(events: &mut [EditEvent]) {
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.page_title.cmp(&b.page_title))
            .then_with(|| a.revision_id.cmp(&b.revision_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::KeywordTables;
    use chrono::TimeZone;

    fn classifier() -> RevertClassifier {
        RevertClassifier::new(&KeywordTables::default(), "en")
    }

    fn revision(rev_id: u64, parent_id: u64, size: i64, ts: &str) -> Revision {
        Revision {
            rev_id,
            parent_id,
            user: "Alice".into(),
            timestamp: ts.into(),
            size,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T10:30:00Z"), expected);
        assert_eq!(parse_timestamp("2024-03-01T11:30:00+01:00"), expected);
    }

    #[test]
    fn test_malformed_timestamp_defaults_to_epoch() {
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(parse_optional_timestamp(Some("garbage")), None);
        assert_eq!(parse_optional_timestamp(None), None);
    }

    #[test]
    fn test_size_delta_uses_parent_in_batch() {
        // Newest first, as the revisions endpoint returns them.
        let revisions = vec![
            revision(3, 2, 1500, "2024-03-01T12:00:00Z"),
            revision(2, 1, 1000, "2024-03-01T11:00:00Z"),
            revision(1, 0, 1200, "2024-03-01T10:00:00Z"),
        ];
        let events = EditEvent::from_revisions("Rust", &revisions, &classifier());

        assert_eq!(events[0].size_delta, 500);
        assert_eq!(events[1].size_delta, -200);
        assert_eq!(events[2].size_delta, 0);
    }

    #[test]
    fn test_malformed_revision_is_kept() {
        let revisions = vec![revision(1, 0, 10, "not a date")];
        let events = EditEvent::from_revisions("Rust", &revisions, &classifier());
        assert_eq!(events.len(), 1);
        assert!(events[0].has_unknown_time());
    }

    #[test]
    fn test_ip_actors_are_anonymous() {
        let mut rev = revision(1, 0, 10, "2024-03-01T10:00:00Z");
        rev.user = "2001:db8::1".into();
        let event = EditEvent::from_revision("Rust", &rev, 0, &classifier());
        assert!(event.is_anonymous);
    }

    #[test]
    fn test_sort_is_order_independent() {
        let mut a = EditEvent::from_revisions(
            "P",
            &[
                revision(5, 0, 1, "2024-03-01T10:00:00Z"),
                revision(4, 0, 1, "2024-03-01T10:00:00Z"),
            ],
            &classifier(),
        );
        let mut b = a.clone();
        b.reverse();
        sort_chronologically(&mut a);
        sort_chronologically(&mut b);
        assert_eq!(a, b);
        assert_eq!(a[0].revision_id, 4);
    }
}
