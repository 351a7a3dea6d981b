//! Heuristic labels for documents and passages
//!
//! Language, tradition and symbol hints are rough guesses. They are stored in
//! passage metadata for filtering and display; nothing relies on them being
//! right. Keywords match case-insensitively at the start of a word, so
//! "psalms" matches `psalm` but "summary" does not match `mary`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::index::Passage;

/// Language label when detection fails or is not confident
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Leading characters sampled for language detection
pub const LANGUAGE_SAMPLE_CHARS: usize = 2000;

pub const UNKNOWN_TRADITION: &str = "Unknown / mixed domain (heuristic)";

/// Words suggesting a passage describes a figure, seal or other symbol
pub const SYMBOL_KEYWORDS: &[&str] = &[
    "figure",
    "seal",
    "sigil",
    "pentacle",
    "diagram",
    "plate",
    "illustration",
    "engraving",
    "talisman",
    "amulet",
];

/// Checked in order; the first label with a matching keyword wins
const TRADITIONS: &[(&str, &[&str])] = &[
    (
        "Jewish mysticism / Kabbalah (heuristic)",
        &["kabbalah", "sefirot", "sephiroth", "tiferet", "binah", "yesod"],
    ),
    (
        "Christian / folk Catholic devotional / liturgical material (heuristic)",
        &["psalm", "jesus", "mary", "saint", "angel"],
    ),
    (
        "African American hoodoo / conjure (heuristic)",
        &["hoodoo", "conjure", "rootwork", "mojo", "jack ball"],
    ),
    (
        "Solomonic / ceremonial esoteric text (heuristic)",
        &["pentacle", "pentagram", "solomon", "goetia", "seal of"],
    ),
    (
        "Thelemic / modern ceremonial (heuristic)",
        &["thelema", "crowley", "a'a", "ordo templi orientis"],
    ),
    (
        "Hermetic Order of the Golden Dawn (heuristic)",
        &["golden dawn", "lbrp", "rose cross", "shemesh", "mizrah"],
    ),
    (
        "Spiritism / Espiritismo (heuristic)",
        &["spiritism", "espiritismo", "mesa blanca"],
    ),
];

static TRADITION_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    TRADITIONS
        .iter()
        .map(|(label, keywords)| (*label, keyword_regex(keywords)))
        .collect()
});

static SYMBOL_PATTERN: LazyLock<Regex> = LazyLock::new(|| keyword_regex(SYMBOL_KEYWORDS));

fn keyword_regex(keywords: &[&str]) -> Regex {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})", alternation)).expect("static regex")
}

/// ISO 639-3 code of the text's language, or [`UNKNOWN_LANGUAGE`]
pub fn detect_language(text: &str) -> String {
    let sample: String = text.chars().take(LANGUAGE_SAMPLE_CHARS).collect();
    whatlang::detect(&sample)
        .filter(|info| info.is_reliable())
        .map(|info| info.lang().code().to_string())
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

pub fn guess_tradition(text: &str) -> &'static str {
    TRADITION_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(label, _)| *label)
        .unwrap_or(UNKNOWN_TRADITION)
}

pub fn has_symbol_hint(text: &str) -> bool {
    SYMBOL_PATTERN.is_match(text)
}

/// Whole-document labels, refined per passage by [`DocumentProfile::stamp`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProfile {
    pub language: String,
    pub tradition: String,
    pub symbol_hint: bool,
}

impl Default for DocumentProfile {
    fn default() -> Self {
        Self {
            language: UNKNOWN_LANGUAGE.to_string(),
            tradition: UNKNOWN_TRADITION.to_string(),
            symbol_hint: false,
        }
    }
}

impl DocumentProfile {
    pub fn of(text: &str) -> Self {
        Self {
            language: detect_language(text),
            tradition: guess_tradition(text).to_string(),
            symbol_hint: has_symbol_hint(text),
        }
    }

    /// Write `language`, `tradition` and `symbol_hint` into the passage
    /// metadata. A passage keeps its own language when one is detected and
    /// gets a symbol hint when either it or the document mentions a symbol.
    pub fn stamp(&self, passage: &mut Passage) {
        let language = match detect_language(&passage.text) {
            detected if detected != UNKNOWN_LANGUAGE => detected,
            _ => self.language.clone(),
        };
        let symbol_hint = self.symbol_hint || has_symbol_hint(&passage.text);

        let metadata = &mut passage.metadata;
        metadata.insert("language".to_string(), serde_json::json!(language));
        metadata.insert("tradition".to_string(), serde_json::json!(self.tradition));
        metadata.insert("symbol_hint".to_string(), serde_json::json!(symbol_hint));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGLISH: &str = "The old book describes how the village healers gathered herbs \
        before sunrise, dried them in the shade of the barn and wrapped them in linen. \
        Every spring they walked the same path along the river, and the children followed \
        them to learn which plants could be trusted and which were better left alone.";

    #[test]
    fn test_detects_english() {
        assert_eq!(detect_language(ENGLISH), "eng");
    }

    #[test]
    fn test_undetectable_language_is_unknown() {
        assert_eq!(detect_language(""), UNKNOWN_LANGUAGE);
        assert_eq!(detect_language("12 34 56"), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn test_tradition_first_match_wins() {
        assert_eq!(guess_tradition("On the Sefirot and the Psalms"), TRADITIONS[0].0);
        assert_eq!(guess_tradition("A PSALM for the evening"), TRADITIONS[1].0);
        assert_eq!(guess_tradition("The Seal of Solomon"), TRADITIONS[3].0);
        assert_eq!(guess_tradition("Notes on the Golden Dawn"), TRADITIONS[5].0);
        assert_eq!(guess_tradition("A recipe for bread"), UNKNOWN_TRADITION);
    }

    #[test]
    fn test_keywords_match_word_starts_only() {
        assert_eq!(guess_tradition("A summary of evangelists"), UNKNOWN_TRADITION);
        assert!(has_symbol_hint("Two Sigils drawn in red"));
        assert!(!has_symbol_hint("The researcher was unsealed by doubt"));
    }

    #[test]
    fn test_stamp_prefers_passage_labels() {
        let profile = DocumentProfile {
            language: "spa".to_string(),
            tradition: UNKNOWN_TRADITION.to_string(),
            symbol_hint: false,
        };

        let mut english = Passage {
            id: "doc::chunk-0".to_string(),
            document_id: "doc".to_string(),
            seq: 0,
            start: 0,
            end: ENGLISH.chars().count(),
            text: ENGLISH.to_string(),
            metadata: Default::default(),
        };
        profile.stamp(&mut english);
        assert_eq!(english.metadata.get("language"), Some(&serde_json::json!("eng")));
        assert_eq!(english.metadata.get("symbol_hint"), Some(&serde_json::json!(false)));

        // No letters: the document language is kept
        let mut numbers = Passage {
            text: "1837, 1838.".to_string(),
            end: 11,
            ..english.clone()
        };
        profile.stamp(&mut numbers);
        assert_eq!(numbers.metadata.get("language"), Some(&serde_json::json!("spa")));
        assert_eq!(numbers.metadata.get("tradition"), Some(&serde_json::json!(UNKNOWN_TRADITION)));

        let mut plate = Passage {
            text: "See the plate.".to_string(),
            end: 14,
            ..english.clone()
        };
        profile.stamp(&mut plate);
        assert_eq!(plate.metadata.get("symbol_hint"), Some(&serde_json::json!(true)));
    }
}
