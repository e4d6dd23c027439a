use super::Rule;

/// Edits by one actor within 24 hours above which editing counts as rapid.
pub const RAPID_EDITING_THRESHOLD: usize = 50;
pub const NEW_ACCOUNT_DAYS: i64 = 7;
pub const BIAS_THRESHOLD: f64 = 0.3;
pub const LARGE_ADDITION_CHARS: i64 = 5000;
pub const LARGE_REMOVAL_CHARS: i64 = 2000;

/// Attributes of one edit that the edit-level rules read.
#[derive(Debug, Clone, Default)]
pub struct EditSignals {
    /// The author's own contributor-level score.
    pub author_score: i32,
    pub is_revert: bool,
    pub author_edits_last_24h: usize,
    pub is_anonymous: bool,
    pub account_age_days: Option<i64>,
    pub bias_score: f64,
    pub chars_added: i64,
    pub chars_removed: i64,
    pub author_blocked: bool,
}

pub fn edit_rules() -> Vec<Rule<EditSignals>> {
    vec![
        Rule::derived(
            "AUTHOR_SUSPICION",
            |s: &EditSignals| s.author_score / 2,
            |s: &EditSignals| s.author_score / 2 > 0,
        ),
        Rule::fixed("REVERT_EDIT", 15, |s: &EditSignals| s.is_revert),
        Rule::fixed("RAPID_EDITING", 20, |s: &EditSignals| {
            s.author_edits_last_24h > RAPID_EDITING_THRESHOLD
        }),
        Rule::fixed("ANONYMOUS_EDIT", 5, |s: &EditSignals| s.is_anonymous),
        Rule::fixed("NEW_ACCOUNT", 15, |s: &EditSignals| {
            s.account_age_days.is_some_and(|days| days < NEW_ACCOUNT_DAYS)
        }),
        Rule::fixed("POTENTIAL_BIAS", 10, |s: &EditSignals| s.bias_score > BIAS_THRESHOLD),
        Rule::fixed("LARGE_ADDITION", 10, |s: &EditSignals| {
            s.chars_added > LARGE_ADDITION_CHARS
        }),
        Rule::fixed("LARGE_REMOVAL", 15, |s: &EditSignals| {
            s.chars_removed > LARGE_REMOVAL_CHARS
        }),
        Rule::fixed("BLOCKED_USER", 25, |s: &EditSignals| s.author_blocked),
    ]
}
