use super::Rule;

pub const HIGH_COORDINATION_SCORE: f64 = 50.0;

/// Aggregates of a multi-page run read by the cross-page rules.
#[derive(Debug, Clone, Default)]
pub struct CrossPageSignals {
    pub mutual_support_pairs: usize,
    pub coordination_score: f64,
    pub sockpuppet_networks: usize,
    pub common_contributors: usize,
    /// Common contributors who edited more than one of the pages.
    pub multi_page_contributors: usize,
}

pub fn cross_page_rules() -> Vec<Rule<CrossPageSignals>> {
    vec![
        Rule::fixed("MUTUAL_SUPPORT_DETECTED", 25, |s: &CrossPageSignals| {
            s.mutual_support_pairs > 0
        }),
        Rule::fixed("HIGH_COORDINATION_SCORE", 20, |s: &CrossPageSignals| {
            s.coordination_score > HIGH_COORDINATION_SCORE
        }),
        Rule::fixed("SOCKPUPPET_NETWORK_DETECTED", 30, |s: &CrossPageSignals| {
            s.sockpuppet_networks > 0
        }),
        Rule::fixed("HIGH_CONTRIBUTOR_OVERLAP", 15, |s: &CrossPageSignals| {
            s.multi_page_contributors > s.common_contributors / 2
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::evaluate;

    #[test]
    fn test_empty_run_is_clean() {
        assert_eq!(evaluate(&CrossPageSignals::default(), &cross_page_rules()).score, 0);
    }

    #[test]
    fn test_overlap_uses_integer_half() {
        let signals = CrossPageSignals {
            common_contributors: 5,
            multi_page_contributors: 3,
            ..Default::default()
        };
        assert_eq!(
            evaluate(&signals, &cross_page_rules()).flags,
            vec!["HIGH_CONTRIBUTOR_OVERLAP"]
        );

        let signals = CrossPageSignals {
            common_contributors: 6,
            multi_page_contributors: 3,
            ..Default::default()
        };
        assert!(evaluate(&signals, &cross_page_rules()).flags.is_empty());
    }

    #[test]
    fn test_mutual_support_and_coordination() {
        let signals = CrossPageSignals {
            mutual_support_pairs: 6,
            coordination_score: 60.0,
            ..Default::default()
        };
        let out = evaluate(&signals, &cross_page_rules());
        assert_eq!(out.flags, vec!["MUTUAL_SUPPORT_DETECTED", "HIGH_COORDINATION_SCORE"]);
        assert_eq!(out.score, 45);
    }
}
