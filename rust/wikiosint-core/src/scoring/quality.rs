use super::Rule;

/// Bias score above which an edit counts against the neutral point of view.
pub const NPOV_BIAS_THRESHOLD: f64 = 0.5;

/// Attributes of one edit that the compliance rules read.
///
/// Weights of these tables are in hundredths: a policy rule firing with
/// weight 20 lowers policy compliance by 0.2.
#[derive(Debug, Clone, Default)]
pub struct QualitySignals {
    pub bias_score: f64,
    pub is_revert: bool,
    pub mentions_vandalism: bool,
    pub is_trivial: bool,
    pub is_structural: bool,
    pub cites_sources: bool,
}

/// Policies an edit appears to violate. Flags name the policy.
pub fn policy_rules() -> Vec<Rule<QualitySignals>> {
    vec![Rule::fixed("NPOV", 20, |s: &QualitySignals| {
        s.bias_score > NPOV_BIAS_THRESHOLD
    })]
}

pub fn vandalism_rules() -> Vec<Rule<QualitySignals>> {
    vec![Rule::fixed("VANDALISM_INDICATOR", 30, |s: &QualitySignals| {
        s.is_revert || s.mentions_vandalism
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::evaluate;

    #[test]
    fn test_npov_threshold_is_strict() {
        let at = QualitySignals {
            bias_score: 0.5,
            ..Default::default()
        };
        assert!(evaluate(&at, &policy_rules()).flags.is_empty());

        let over = QualitySignals {
            bias_score: 0.6,
            ..Default::default()
        };
        let out = evaluate(&over, &policy_rules());
        assert_eq!(out.score, 20);
        assert_eq!(out.flags, vec!["NPOV"]);
    }

    #[test]
    fn test_vandalism_indicator_fires_once() {
        let signals = QualitySignals {
            is_revert: true,
            mentions_vandalism: true,
            ..Default::default()
        };
        let out = evaluate(&signals, &vandalism_rules());
        assert_eq!(out.score, 30);
        assert_eq!(out.flags.len(), 1);
        assert_eq!(evaluate(&QualitySignals::default(), &vandalism_rules()).score, 0);
    }
}
