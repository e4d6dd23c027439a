use super::Rule;

pub const HIGH_CONTROVERSY: f64 = 0.3;
pub const LOW_DIVERSITY: f64 = 0.3;

/// Page-level attributes read by the page rules.
#[derive(Debug, Clone, Default)]
pub struct PageSignals {
    pub controversy_score: f64,
    pub contributor_count: usize,
    pub total_revisions: usize,
    pub recent_activity_burst: bool,
    pub anonymous_edit_ratio: f64,
    /// Days since the top contributor's first edit on the page.
    pub top_contributor_tenure_days: Option<i64>,
    /// Share of the analysed revisions made by the top contributor.
    pub top_contributor_share: f64,
    pub contributor_diversity: f64,
    pub recent_conflicts: usize,
}

pub fn page_rules() -> Vec<Rule<PageSignals>> {
    vec![
        Rule::fixed("PAGE_HIGH_CONFLICT", 25, |s: &PageSignals| {
            s.controversy_score > HIGH_CONTROVERSY
        }),
        Rule::fixed("PAGE_FEW_CONTRIBUTORS", 20, |s: &PageSignals| {
            s.contributor_count < 5 && s.total_revisions > 100
        }),
        Rule::fixed("PAGE_RECENT_INTENSIVE_ACTIVITY", 15, |s: &PageSignals| {
            s.recent_activity_burst
        }),
        Rule::fixed("PAGE_ANONYMOUS_HEAVY_EDITING", 15, |s: &PageSignals| {
            s.anonymous_edit_ratio > 0.5
        }),
        Rule::fixed("PAGE_NEW_EDITOR_DOMINANCE", 20, |s: &PageSignals| {
            s.top_contributor_tenure_days.is_some_and(|days| days < 30)
                && s.top_contributor_share > 0.5
        }),
        Rule::fixed("PAGE_LOW_DIVERSITY", 10, |s: &PageSignals| {
            s.contributor_diversity < LOW_DIVERSITY
        }),
        Rule::fixed("PAGE_RECENT_CONFLICTS", 15, |s: &PageSignals| s.recent_conflicts > 5),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::evaluate;

    fn healthy_page() -> PageSignals {
        PageSignals {
            controversy_score: 0.05,
            contributor_count: 40,
            total_revisions: 300,
            recent_activity_burst: false,
            anonymous_edit_ratio: 0.1,
            top_contributor_tenure_days: Some(900),
            top_contributor_share: 0.1,
            contributor_diversity: 0.7,
            recent_conflicts: 0,
        }
    }

    #[test]
    fn test_healthy_page_scores_zero() {
        let out = evaluate(&healthy_page(), &page_rules());
        assert_eq!(out.score, 0);
        assert!(out.flags.is_empty());
    }

    #[test]
    fn test_captured_page() {
        let signals = PageSignals {
            controversy_score: 0.4,
            contributor_count: 3,
            total_revisions: 150,
            recent_activity_burst: true,
            top_contributor_tenure_days: Some(10),
            top_contributor_share: 0.8,
            contributor_diversity: 0.1,
            recent_conflicts: 6,
            ..healthy_page()
        };
        let out = evaluate(&signals, &page_rules());
        assert_eq!(out.score, 100);
        assert_eq!(
            out.flags,
            vec![
                "PAGE_HIGH_CONFLICT",
                "PAGE_FEW_CONTRIBUTORS",
                "PAGE_RECENT_INTENSIVE_ACTIVITY",
                "PAGE_NEW_EDITOR_DOMINANCE",
                "PAGE_LOW_DIVERSITY",
                "PAGE_RECENT_CONFLICTS"
            ]
        );
    }
}
