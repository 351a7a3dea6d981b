//! Candidate term extraction for the concordance term index

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Shortest token kept as a concordance term
pub const MIN_TERM_CHARS: usize = 4;

/// Leading/trailing punctuation; inner apostrophes and hyphens survive
static EDGE_PUNCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\w']+|[^\w']+$").expect("static regex")
});

/// Small English stopword list so common words don't flood the index
const STOPWORDS: &[&str] = &[
    "the", "and", "or", "of", "to", "in", "on", "for", "with", "by", "at",
    "is", "it", "this", "that", "a", "an", "as", "from", "be", "are", "was",
    "were", "but", "not", "into", "about", "over", "under", "between",
    "within", "without", "through", "what", "which", "who", "how", "does",
    "do", "did", "there", "their", "they", "have", "has", "had",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// The stopword list is English; it applies when the language is English
/// or not known
fn uses_english_stopwords(language: Option<&str>) -> bool {
    matches!(language, None | Some("unknown" | "eng" | "en"))
}

/// Lowercase a raw token and strip surrounding punctuation
pub fn normalize_token(token: &str) -> String {
    EDGE_PUNCT.replace_all(token.trim(), "").to_lowercase()
}

/// Unique, sorted candidate terms of a passage in `language`
pub fn extract_candidate_terms(text: &str, language: Option<&str>) -> Vec<String> {
    let skip_stopwords = uses_english_stopwords(language);
    let terms: BTreeSet<String> = text
        .split_whitespace()
        .map(normalize_token)
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .filter(|t| !(skip_stopwords && is_stopword(t)))
        .collect();

    terms.into_iter().collect()
}

/// Content words of a query, in order of first appearance
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    query
        .split_whitespace()
        .map(normalize_token)
        .filter(|t| t.chars().count() >= 2 && !is_stopword(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
