//! Revert classification from tags and edit comments.

use crate::keywords::{KeywordTables, LanguageKeywords, RevertType};

/// Maximum absolute sum of two size deltas for the second edit to count as
/// cancelling the first.
pub const SIZE_CANCEL_TOLERANCE: i64 = 100;

/// Classifies edits of one language as reverts.
///
/// Pure: the same comment and tags always give the same answer.
#[derive(Debug, Clone)]
pub struct RevertClassifier {
    language: String,
    keywords: LanguageKeywords,
}

impl RevertClassifier {
    pub fn new(tables: &KeywordTables, language: &str) -> Self {
        Self {
            language: language.to_string(),
            keywords: tables.for_language(language),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn keywords(&self) -> &LanguageKeywords {
        &self.keywords
    }

    /// Tag match is authoritative; comment keywords are only the fallback.
    pub fn is_revert(&self, comment: &str, tags: &[String]) -> bool {
        self.matches_tags(tags) || self.matches_comment(comment)
    }

    pub fn matches_tags(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| {
            let tag = tag.to_lowercase();
            self.keywords.revert_tags.iter().any(|needle| tag.contains(needle.as_str()))
        })
    }

    /// Whether tags mark the edit itself as later undone.
    pub fn is_revoked_by_tags(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| {
            let tag = tag.to_lowercase();
            self.keywords.revoked_tags.iter().any(|needle| tag.contains(needle.as_str()))
        })
    }

    pub fn matches_comment(&self, comment: &str) -> bool {
        contains_any(comment, &self.keywords.revert_keywords)
    }

    /// Type of a revoking edit, from its tags when they decide it and its
    /// comment otherwise. `None` if the edit is not a revert at all.
    pub fn classify(&self, comment: &str, tags: &[String]) -> Option<RevertType> {
        if self.matches_tags(tags) {
            Some(self.revert_type_from_tags(tags))
        } else if self.matches_comment(comment) {
            Some(self.revert_type(comment))
        } else {
            None
        }
    }

    /// Type from the comment; the first matching row of the type table wins.
    pub fn revert_type(&self, comment: &str) -> RevertType {
        let comment = comment.to_lowercase();
        self.keywords
            .revert_types
            .iter()
            .find(|row| comment.contains(row.keyword.as_str()))
            .map(|row| row.revert_type)
            .unwrap_or(RevertType::GenericRevert)
    }

    pub fn revert_type_from_tags(&self, tags: &[String]) -> RevertType {
        let joined = tags.join(" ").to_lowercase();
        if joined.contains("vandal") {
            RevertType::VandalismRevert
        } else if joined.contains("rollback") {
            RevertType::Rollback
        } else if joined.contains("undo") {
            RevertType::Undo
        } else {
            RevertType::GenericRevert
        }
    }

    /// Bias words present in `text`, in table order.
    pub fn bias_words(&self, text: &str) -> Vec<String> {
        let text = text.to_lowercase();
        self.keywords
            .bias_words
            .iter()
            .filter(|word| text.contains(word.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_defensive(&self, comment: &str) -> bool {
        contains_any(comment, &self.keywords.defensive_words)
    }

    pub fn is_structural(&self, comment: &str) -> bool {
        contains_any(comment, &self.keywords.structural_keywords)
    }

    pub fn is_trivial(&self, comment: &str) -> bool {
        contains_any(comment, &self.keywords.trivial_keywords)
    }

    /// Whether a comment names vandalism, by the vandalism rows of the
    /// revert-type table.
    pub fn mentions_vandalism(&self, comment: &str) -> bool {
        let comment = comment.to_lowercase();
        self.keywords
            .revert_types
            .iter()
            .filter(|row| row.revert_type == RevertType::VandalismRevert)
            .any(|row| comment.contains(row.keyword.as_str()))
    }

    pub fn is_controversial_topic(&self, title: &str) -> bool {
        contains_any(title, &self.keywords.controversial_topics)
    }
}

fn contains_any(text: &str, needles: &[String]) -> bool {
    if text.is_empty() {
        return false;
    }
    let text = text.to_lowercase();
    needles.iter().any(|needle| text.contains(needle.as_str()))
}

/// Whether `later` cancels `earlier` by size: opposite signs and a near-zero
/// sum.
pub fn cancels_by_size(earlier: i64, later: i64) -> bool {
    let opposite = (earlier > 0 && later < 0) || (earlier < 0 && later > 0);
    opposite && (earlier + later).abs() < SIZE_CANCEL_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en() -> RevertClassifier {
        RevertClassifier::new(&KeywordTables::default(), "en")
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_comment_keywords() {
        let c = en();
        assert!(c.is_revert("Reverted edits by X", &[]));
        assert!(c.is_revert("RV vandalism", &[]));
        assert!(!c.is_revert("Added citation", &[]));
        assert!(!c.is_revert("", &[]));
    }

    #[test]
    fn test_tag_takes_precedence() {
        let c = en();
        assert_eq!(
            c.classify("rv vandalism", &tags(&["mw-rollback"])),
            Some(RevertType::Rollback)
        );
        assert_eq!(c.classify("rv vandalism", &[]), Some(RevertType::VandalismRevert));
        assert_eq!(c.classify("copyedit", &tags(&["visualeditor"])), None);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = en();
        let first = c.classify("Undid revision 123 by Foo", &[]);
        for _ in 0..10 {
            assert_eq!(c.classify("Undid revision 123 by Foo", &[]), first);
        }
        assert_eq!(first, Some(RevertType::Undo));
    }

    #[test]
    fn test_first_type_row_wins() {
        // Both "vandal" and "rollback" match; vandalism rows come first.
        assert_eq!(en().revert_type("rollback of vandal edit"), RevertType::VandalismRevert);
        assert_eq!(en().revert_type("reverting"), RevertType::GenericRevert);
    }

    #[test]
    fn test_language_tables() {
        let tables = KeywordTables::default();
        let fr = RevertClassifier::new(&tables, "fr");
        assert!(fr.is_revert("Annulation de la modification", &[]));
        assert_eq!(fr.revert_type("annulation"), RevertType::Undo);

        let de = RevertClassifier::new(&tables, "de");
        assert_eq!(de.revert_type("Änderung rückgängig gemacht"), RevertType::Undo);

        let es = RevertClassifier::new(&tables, "es");
        assert!(es.is_revert("Deshacer edición", &[]));

        let fallback = RevertClassifier::new(&tables, "pt");
        assert!(fallback.is_revert("revert", &[]));
    }

    #[test]
    fn test_revoked_tags_differ_from_revert_tags() {
        let c = en();
        assert!(c.is_revoked_by_tags(&tags(&["mw-reverted"])));
        assert!(!c.is_revoked_by_tags(&tags(&["mw-rollback"])));
        assert!(c.matches_tags(&tags(&["mw-rollback"])));
    }

    #[test]
    fn test_cancels_by_size() {
        assert!(cancels_by_size(500, -480));
        assert!(!cancels_by_size(500, -300));
        assert!(!cancels_by_size(500, 500));
        assert!(!cancels_by_size(0, 0));
    }

    #[test]
    fn test_bias_words_in_table_order() {
        let found = en().bias_words("Clearly the BEST and obviously perfect");
        assert_eq!(found, vec!["obviously", "clearly", "best", "perfect"]);
    }

    #[test]
    fn test_vandalism_mentions_and_topics() {
        let c = en();
        assert!(c.mentions_vandalism("Reverted VANDALISM by 1.2.3.4"));
        assert!(!c.mentions_vandalism("rollback"));
        assert!(c.is_controversial_topic("Religion in France"));
        assert!(!c.is_controversial_topic("Botany"));

        let fr = RevertClassifier::new(&KeywordTables::default(), "fr");
        assert!(fr.mentions_vandalism("vandalisme"));
        assert!(fr.is_controversial_topic("Guerre de Cent Ans"));
    }
}
