//! Per-language keyword tables.
//!
//! All comment and tag matching reads from a [`KeywordTables`] value that is
//! injected through configuration. Matching is case-insensitive substring
//! matching; entries are stored lowercase.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed taxonomy of revocation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertType {
    VandalismRevert,
    Rollback,
    Undo,
    Restore,
    ManualRevert,
    GenericRevert,
}

impl fmt::Display for RevertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertType::VandalismRevert => write!(f, "vandalism_revert"),
            RevertType::Rollback => write!(f, "rollback"),
            RevertType::Undo => write!(f, "undo"),
            RevertType::Restore => write!(f, "restore"),
            RevertType::ManualRevert => write!(f, "manual_revert"),
            RevertType::GenericRevert => write!(f, "generic_revert"),
        }
    }
}

/// One row of the ordered revert-type table: the first row whose keyword
/// occurs in a comment decides the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevertTypeKeyword {
    pub keyword: String,
    pub revert_type: RevertType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageKeywords {
    /// Substrings of system-assigned tags that mark a revert.
    pub revert_tags: Vec<String>,
    /// Substrings of tags that mark an edit as having been undone later.
    pub revoked_tags: Vec<String>,
    /// Comment substrings that mark a revert.
    pub revert_keywords: Vec<String>,
    pub revert_types: Vec<RevertTypeKeyword>,
    /// Point-of-view words counted for bias density.
    pub bias_words: Vec<String>,
    /// Comment substrings of edits that defend earlier content.
    pub defensive_words: Vec<String>,
    pub structural_keywords: Vec<String>,
    pub trivial_keywords: Vec<String>,
    /// Title substrings of topics that attract disputes.
    pub controversial_topics: Vec<String>,
}

impl LanguageKeywords {
    fn lowercased(mut self) -> Self {
        for list in [
            &mut self.revert_tags,
            &mut self.revoked_tags,
            &mut self.revert_keywords,
            &mut self.bias_words,
            &mut self.defensive_words,
            &mut self.structural_keywords,
            &mut self.trivial_keywords,
            &mut self.controversial_topics,
        ] {
            for word in list.iter_mut() {
                *word = word.to_lowercase();
            }
        }
        for row in &mut self.revert_types {
            row.keyword = row.keyword.to_lowercase();
        }
        self
    }
}

/// Keyword tables keyed by language code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTables {
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Configured entries are layered over the built-in tables: a language
    /// given here replaces that language's built-in table, and the others
    /// stay available.
    #[serde(default = "builtin_languages", deserialize_with = "over_builtin_languages")]
    pub languages: BTreeMap<String, LanguageKeywords>,
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            languages: builtin_languages(),
        }
    }
}

impl KeywordTables {
    /// Table for `language`, falling back to the default language and then
    /// to an empty table.
    pub fn for_language(&self, language: &str) -> LanguageKeywords {
        self.languages
            .get(language)
            .or_else(|| self.languages.get(&self.default_language))
            .cloned()
            .map(LanguageKeywords::lowercased)
            .unwrap_or_default()
    }

    /// Adds or replaces the table for one language.
    pub fn insert(&mut self, language: impl Into<String>, keywords: LanguageKeywords) {
        self.languages.insert(language.into(), keywords);
    }
}

fn over_builtin_languages<'de, D>(deserializer: D) -> Result<BTreeMap<String, LanguageKeywords>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let configured = BTreeMap::<String, LanguageKeywords>::deserialize(deserializer)?;
    let mut languages = builtin_languages();
    languages.extend(configured);
    Ok(languages)
}

fn default_language() -> String {
    "en".to_string()
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn types(list: &[(&str, RevertType)]) -> Vec<RevertTypeKeyword> {
    list.iter()
        .map(|(keyword, revert_type)| RevertTypeKeyword {
            keyword: keyword.to_string(),
            revert_type: *revert_type,
        })
        .collect()
}

const BASE_REVERT_TAGS: &[&str] = &[
    "mw-reverted",
    "mw-rollback",
    "mw-undo",
    "mw-manual-revert",
    "reverted",
];

const BASE_REVOKED_TAGS: &[&str] = &["mw-reverted", "reverted"];

const BIAS_WORDS: &[&str] = &[
    "obviously", "clearly", "undoubtedly", "best", "worst", "always", "never", "perfect",
    "terrible", "amazing",
];

const STRUCTURAL_KEYWORDS: &[&str] = &[
    "section", "heading", "template", "infobox", "category", "reorganiz", "restructur", "format",
    "layout",
];

const TRIVIAL_KEYWORDS: &[&str] = &[
    "typo", "spelling", "grammar", "punctuation", "format", "minor", "fix", "correct",
];

fn with_base_tags(extra: &[&str]) -> Vec<String> {
    BASE_REVERT_TAGS.iter().chain(extra.iter()).map(|t| t.to_string()).collect()
}

fn with_base_revoked(extra: &[&str]) -> Vec<String> {
    BASE_REVOKED_TAGS.iter().chain(extra.iter()).map(|t| t.to_string()).collect()
}

fn builtin_languages() -> BTreeMap<String, LanguageKeywords> {
    use RevertType::*;

    let mut languages = BTreeMap::new();

    languages.insert(
        "en".to_string(),
        LanguageKeywords {
            revert_tags: with_base_tags(&[]),
            revoked_tags: with_base_revoked(&[]),
            revert_keywords: words(&[
                "revert", "undo", "undid", "rv", "reverted", "restore", "restored", "rollback",
                "rolled back", "vandalism", "vandal",
            ]),
            revert_types: types(&[
                ("vandalism", VandalismRevert),
                ("vandal", VandalismRevert),
                ("rollback", Rollback),
                ("rolled back", Rollback),
                ("undo", Undo),
                ("undid", Undo),
                ("restore", Restore),
                ("rv", ManualRevert),
            ]),
            bias_words: words(BIAS_WORDS),
            defensive_words: words(&["restore", "fix", "correct", "undo", "revert vandalism", "rv"]),
            structural_keywords: words(STRUCTURAL_KEYWORDS),
            trivial_keywords: words(TRIVIAL_KEYWORDS),
            controversial_topics: words(&["politics", "religion", "war", "conflict", "controversy"]),
        },
    );

    languages.insert(
        "fr".to_string(),
        LanguageKeywords {
            revert_tags: with_base_tags(&["révoqué", "annulé"]),
            revoked_tags: with_base_revoked(&["révoqué", "annulé"]),
            revert_keywords: words(&[
                "révoqué", "révocation", "annulé", "annulation", "rv", "rvt", "restauré",
                "restoration", "rollback", "revert", "undo", "vandalisé", "vandalisme", "défait",
                "défaire",
            ]),
            revert_types: types(&[
                ("vandalisme", VandalismRevert),
                ("vandalisé", VandalismRevert),
                ("rollback", Rollback),
                ("annulation", Undo),
                ("annulé", Undo),
                ("restauré", Restore),
                ("restoration", Restore),
                ("rvt", ManualRevert),
                ("rv", ManualRevert),
            ]),
            bias_words: words(&[
                "évidemment", "clairement", "incontestablement", "meilleur", "pire", "toujours",
                "jamais", "parfait", "terrible", "incroyable",
            ]),
            defensive_words: words(&["restaur", "corrig", "annul", "révoqu", "rv", "fix"]),
            structural_keywords: words(&["section", "modèle", "catégorie", "infobox", "fusion", "renommage"]),
            trivial_keywords: words(&["typo", "orthographe", "grammaire", "ponctuation", "mise en forme", "coquille"]),
            controversial_topics: words(&["politique", "religion", "guerre", "conflit", "controverse"]),
        },
    );

    languages.insert(
        "de".to_string(),
        LanguageKeywords {
            revert_tags: with_base_tags(&["rückgängig"]),
            revoked_tags: with_base_revoked(&["rückgängig"]),
            revert_keywords: words(&[
                "rückgängig", "revert", "undo", "rv", "zurückgesetzt", "vandalismus", "restore",
                "rollback",
            ]),
            revert_types: types(&[
                ("vandalismus", VandalismRevert),
                ("rollback", Rollback),
                ("rückgängig", Undo),
                ("zurückgesetzt", ManualRevert),
            ]),
            bias_words: words(&[
                "offensichtlich", "eindeutig", "zweifellos", "beste", "schlechteste", "immer",
                "niemals", "perfekt", "schrecklich", "großartig",
            ]),
            defensive_words: words(&["wiederhergestellt", "korrigiert", "rückgängig", "rv", "fix"]),
            structural_keywords: words(&["abschnitt", "vorlage", "kategorie", "infobox", "verschoben"]),
            trivial_keywords: words(&["tippfehler", "rechtschreibung", "grammatik", "formatierung", "typo"]),
            controversial_topics: words(&["politik", "religion", "krieg", "konflikt", "kontroverse"]),
        },
    );

    languages.insert(
        "es".to_string(),
        LanguageKeywords {
            revert_tags: with_base_tags(&["revertido"]),
            revoked_tags: with_base_revoked(&["revertido"]),
            revert_keywords: words(&[
                "revertir", "deshacer", "rv", "vandalismo", "restaurar", "revert", "undo",
                "rollback",
            ]),
            revert_types: types(&[
                ("vandalismo", VandalismRevert),
                ("rollback", Rollback),
                ("deshacer", Undo),
                ("restaurar", Restore),
                ("rv", ManualRevert),
            ]),
            bias_words: words(&[
                "obviamente", "claramente", "indudablemente", "mejor", "peor", "siempre", "nunca",
                "perfecto", "terrible", "increíble",
            ]),
            defensive_words: words(&["restaur", "correg", "deshac", "rv", "fix"]),
            structural_keywords: words(&["sección", "plantilla", "categoría", "ficha", "fusión"]),
            trivial_keywords: words(&["errata", "ortografía", "gramática", "formato", "typo"]),
            controversial_topics: words(&["política", "religión", "guerra", "conflicto", "controversia"]),
        },
    );

    languages
}
