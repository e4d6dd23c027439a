use super::Rule;

pub const RECENT_ACCOUNT_DAYS: i64 = 30;
pub const HIGH_ACTIVITY_EDITS: u64 = 100;
pub const UNPRIVILEGED_EDITS: u64 = 50;
pub const SENSITIVE_NAMESPACE_RATIO: f64 = 0.9;
pub const EMPTY_COMMENT_RATIO: f64 = 0.7;

/// Attributes of one account that the contributor-level rules read.
#[derive(Debug, Clone, Default)]
pub struct ContributorSignals {
    pub account_age_days: Option<i64>,
    /// Lifetime edit count reported upstream.
    pub edit_count: u64,
    pub blocked: bool,
    /// Edits on the account's most edited page.
    pub top_page_edits: usize,
    pub has_special_groups: bool,
    pub sensitive_namespace_ratio: f64,
    pub empty_comment_ratio: f64,
    pub revoked_ratio: f64,
    pub revoked_count: usize,
    pub vandalism_reverts: usize,
    /// Reverts by the actor who revoked this account most often.
    pub top_reverter_count: usize,
}

impl ContributorSignals {
    fn is_recent(&self) -> bool {
        self.account_age_days
            .is_some_and(|days| days < RECENT_ACCOUNT_DAYS)
    }

    fn top_reverter_share(&self) -> f64 {
        if self.revoked_count == 0 {
            return 0.0;
        }
        self.top_reverter_count as f64 / self.revoked_count as f64
    }
}

pub fn contributor_rules() -> Vec<Rule<ContributorSignals>> {
    vec![
        Rule::fixed("RECENT_ACCOUNT_HIGH_ACTIVITY", 20, |s: &ContributorSignals| {
            s.is_recent() && s.edit_count > HIGH_ACTIVITY_EDITS
        }),
        Rule::fixed("USER_BLOCKED", 30, |s: &ContributorSignals| s.blocked),
        Rule::fixed("SINGLE_PAGE_FOCUS", 15, |s: &ContributorSignals| {
            s.edit_count > 0 && s.top_page_edits as f64 > s.edit_count as f64 / 2.0
        }),
        Rule::fixed("NO_SPECIAL_GROUPS", 10, |s: &ContributorSignals| {
            !s.has_special_groups && s.edit_count > UNPRIVILEGED_EDITS
        }),
        Rule::fixed("SENSITIVE_NAMESPACE_FOCUS", 15, |s: &ContributorSignals| {
            s.sensitive_namespace_ratio > SENSITIVE_NAMESPACE_RATIO
        }),
        Rule::fixed("FREQUENT_EMPTY_COMMENTS", 10, |s: &ContributorSignals| {
            s.empty_comment_ratio > EMPTY_COMMENT_RATIO
        }),
        Rule::fixed("VERY_HIGH_REVOKED_RATIO", 30, |s: &ContributorSignals| {
            s.revoked_ratio > 0.5
        }),
        Rule::fixed("HIGH_REVOKED_RATIO", 20, |s: &ContributorSignals| {
            s.revoked_ratio > 0.3 && s.revoked_ratio <= 0.5
        }),
        Rule::fixed("MODERATE_REVOKED_RATIO", 10, |s: &ContributorSignals| {
            s.revoked_ratio > 0.2 && s.revoked_ratio <= 0.3
        }),
        Rule::fixed("MANY_REVOKED_CONTRIBUTIONS", 15, |s: &ContributorSignals| {
            s.revoked_count > 50
        }),
        Rule::fixed("SOME_REVOKED_CONTRIBUTIONS", 10, |s: &ContributorSignals| {
            s.revoked_count > 20 && s.revoked_count <= 50
        }),
        Rule::fixed("VANDALISM_PATTERN", 25, |s: &ContributorSignals| {
            s.vandalism_reverts > 10
        }),
        Rule::fixed("SOME_VANDALISM_REVERTS", 15, |s: &ContributorSignals| {
            s.vandalism_reverts > 5 && s.vandalism_reverts <= 10
        }),
        Rule::fixed("CONFLICT_WITH_SPECIFIC_USER", 15, |s: &ContributorSignals| {
            s.top_reverter_count > 5 && s.top_reverter_share() > 0.5
        }),
        Rule::fixed("NEW_ACCOUNT_MANY_REVERTS", 20, |s: &ContributorSignals| {
            s.is_recent() && s.revoked_count > 10
        }),
    ]
}

/// Attributes of one contributor as seen from a single page.
#[derive(Debug, Clone, Default)]
pub struct PageContributorSignals {
    pub is_anonymous: bool,
    pub page_edits: usize,
    /// Days since the contributor's first edit on the page.
    pub page_tenure_days: Option<i64>,
    pub total_size_delta: i64,
}

impl PageContributorSignals {
    fn tenure_below(&self, days: i64) -> bool {
        self.page_tenure_days.is_some_and(|tenure| tenure < days)
    }
}

/// Page-scoped rules, applied to every listed contributor of a page.
pub fn page_contributor_rules() -> Vec<Rule<PageContributorSignals>> {
    vec![
        Rule::fixed("ANONYMOUS_USER", 5, |s: &PageContributorSignals| s.is_anonymous),
        Rule::fixed("RECENT_ACCOUNT_HIGH_PAGE_ACTIVITY", 15, |s: &PageContributorSignals| {
            s.tenure_below(30) && s.page_edits > 20
        }),
        Rule::fixed("VERY_HIGH_PAGE_ACTIVITY", 10, |s: &PageContributorSignals| {
            s.page_edits > 100
        }),
        Rule::fixed("LARGE_CONTENT_CHANGES", 10, |s: &PageContributorSignals| {
            s.total_size_delta > 15_000 || s.total_size_delta < -10_000
        }),
        Rule::fixed("NEW_ACCOUNT_HIGH_PAGE_ACTIVITY", 20, |s: &PageContributorSignals| {
            s.tenure_below(7) && s.page_edits > 5
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::evaluate;

    fn with_revoked(revoked: usize, total: usize) -> ContributorSignals {
        ContributorSignals {
            revoked_count: revoked,
            revoked_ratio: revoked as f64 / total as f64,
            has_special_groups: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_revoked_ratio_bands_are_exclusive() {
        let out = evaluate(&with_revoked(31, 100), &contributor_rules());
        assert!(out.has_flag("HIGH_REVOKED_RATIO"));
        assert!(!out.has_flag("VERY_HIGH_REVOKED_RATIO"));
        assert!(!out.has_flag("MODERATE_REVOKED_RATIO"));
        assert!(out.has_flag("SOME_REVOKED_CONTRIBUTIONS"));
        assert_eq!(out.score, 20 + 10);

        let out = evaluate(&with_revoked(51, 100), &contributor_rules());
        assert_eq!(out.flags, vec!["VERY_HIGH_REVOKED_RATIO", "MANY_REVOKED_CONTRIBUTIONS"]);

        let out = evaluate(&with_revoked(21, 100), &contributor_rules());
        assert_eq!(out.flags, vec!["MODERATE_REVOKED_RATIO", "SOME_REVOKED_CONTRIBUTIONS"]);
    }

    #[test]
    fn test_conflict_with_specific_user() {
        let mut signals = with_revoked(10, 100);
        signals.top_reverter_count = 6;
        assert!(evaluate(&signals, &contributor_rules()).has_flag("CONFLICT_WITH_SPECIFIC_USER"));

        signals.top_reverter_count = 5;
        assert!(!evaluate(&signals, &contributor_rules()).has_flag("CONFLICT_WITH_SPECIFIC_USER"));

        let mut signals = with_revoked(20, 100);
        signals.top_reverter_count = 8;
        assert!(!evaluate(&signals, &contributor_rules()).has_flag("CONFLICT_WITH_SPECIFIC_USER"));
    }

    #[test]
    fn test_new_account_rules() {
        let signals = ContributorSignals {
            account_age_days: Some(3),
            edit_count: 150,
            top_page_edits: 80,
            revoked_count: 11,
            revoked_ratio: 11.0 / 150.0,
            ..Default::default()
        };
        let out = evaluate(&signals, &contributor_rules());
        assert_eq!(
            out.flags,
            vec![
                "RECENT_ACCOUNT_HIGH_ACTIVITY",
                "SINGLE_PAGE_FOCUS",
                "NO_SPECIAL_GROUPS",
                "NEW_ACCOUNT_MANY_REVERTS"
            ]
        );
        assert_eq!(out.score, 20 + 15 + 10 + 20);
    }

    #[test]
    fn test_unknown_registration_is_not_recent() {
        let signals = ContributorSignals {
            account_age_days: None,
            edit_count: 500,
            has_special_groups: true,
            revoked_count: 11,
            ..Default::default()
        };
        assert_eq!(evaluate(&signals, &contributor_rules()).score, 0);
    }

    #[test]
    fn test_page_contributor_rules() {
        let anon = PageContributorSignals {
            is_anonymous: true,
            page_edits: 1,
            page_tenure_days: Some(100),
            total_size_delta: 10,
        };
        assert_eq!(evaluate(&anon, &page_contributor_rules()).flags, vec!["ANONYMOUS_USER"]);

        let newcomer = PageContributorSignals {
            is_anonymous: false,
            page_edits: 25,
            page_tenure_days: Some(2),
            total_size_delta: -12_000,
        };
        let out = evaluate(&newcomer, &page_contributor_rules());
        assert_eq!(
            out.flags,
            vec![
                "RECENT_ACCOUNT_HIGH_PAGE_ACTIVITY",
                "LARGE_CONTENT_CHANGES",
                "NEW_ACCOUNT_HIGH_PAGE_ACTIVITY"
            ]
        );
        assert_eq!(out.score, 45);
    }
}
