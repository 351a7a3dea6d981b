//! Concordance - every occurrence of a term with bounded context
//!
//! Matching is case-insensitive and word-bounded: a term only matches as a
//! whole word, unless its own edge is not a word character.

mod postings;
mod terms;

pub use postings::{TermIndex, TermOccurrence, TermStats};
pub use terms::{extract_candidate_terms, normalize_token, query_terms, MIN_TERM_CHARS};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::chunker::LengthUnit;
use crate::error::{Error, Result};
use crate::index::Passage;

/// One occurrence of a term inside a passage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcordanceHit {
    pub passage_id: String,
    pub document_id: String,
    /// Character offset of the match within the passage
    pub offset: usize,
    /// Character offset of the match within the document
    pub document_offset: usize,
    /// Matched text as it appears in the passage
    pub matched: String,
    pub left: String,
    pub right: String,
}

/// Compiled case-insensitive, word-bounded matcher for one term
#[derive(Debug, Clone)]
pub struct TermMatcher {
    term: String,
    regex: Option<Regex>,
}

impl TermMatcher {
    pub fn new(term: &str) -> Result<Self> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Self {
                term: String::new(),
                regex: None,
            });
        }

        let mut pattern = String::new();
        if term.chars().next().is_some_and(is_word_char) {
            pattern.push_str(r"\b");
        }
        pattern.push_str(&regex::escape(term));
        if term.chars().last().is_some_and(is_word_char) {
            pattern.push_str(r"\b");
        }

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::InvalidConfiguration(format!("unusable term {:?}: {}", term, e)))?;

        Ok(Self {
            term: term.to_string(),
            regex: Some(regex),
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// Number of matches in `text`
    pub fn count(&self, text: &str) -> usize {
        self.regex.as_ref().map_or(0, |re| re.find_iter(text).count())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Scans passages for term occurrences
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcordanceEngine {
    unit: LengthUnit,
}

impl ConcordanceEngine {
    /// Create an engine measuring context in `unit`
    pub fn new(unit: LengthUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> LengthUnit {
        self.unit
    }

    /// Every occurrence of `term` in `passage`, left to right
    pub fn scan(&self, passage: &Passage, term: &str, context_size: usize) -> Result<Vec<ConcordanceHit>> {
        let matcher = TermMatcher::new(term)?;
        Ok(self.scan_with(&matcher, passage, context_size))
    }

    /// Like [`ConcordanceEngine::scan`] with a pre-compiled matcher
    pub fn scan_with(&self, matcher: &TermMatcher, passage: &Passage, context_size: usize) -> Vec<ConcordanceHit> {
        let Some(regex) = &matcher.regex else {
            return Vec::new();
        };

        let text = passage.text.as_str();
        let mut hits = Vec::new();
        // Running (byte, char) position so offsets are computed in one pass
        let mut byte_pos = 0;
        let mut char_pos = 0;

        for m in regex.find_iter(text) {
            char_pos += text[byte_pos..m.start()].chars().count();
            byte_pos = m.start();

            hits.push(ConcordanceHit {
                passage_id: passage.id.clone(),
                document_id: passage.document_id.clone(),
                offset: char_pos,
                document_offset: passage.start + char_pos,
                matched: m.as_str().to_string(),
                left: left_context(&text[..m.start()], context_size, self.unit).to_string(),
                right: right_context(&text[m.end()..], context_size, self.unit).to_string(),
            });
        }

        hits
    }
}

/// The last `size` units of `before`
fn left_context(before: &str, size: usize, unit: LengthUnit) -> &str {
    if size == 0 {
        return "";
    }

    match unit {
        LengthUnit::Chars => match before.char_indices().rev().nth(size - 1) {
            Some((b, _)) => &before[b..],
            None => before,
        },
        LengthUnit::Tokens => {
            let mut words = 0;
            let mut in_word = false;
            for (b, c) in before.char_indices().rev() {
                if c.is_whitespace() {
                    if in_word {
                        words += 1;
                        in_word = false;
                        if words == size {
                            return &before[b + c.len_utf8()..];
                        }
                    }
                } else {
                    in_word = true;
                }
            }
            before
        }
    }
}

/// The first `size` units of `after`
fn right_context(after: &str, size: usize, unit: LengthUnit) -> &str {
    if size == 0 {
        return "";
    }

    match unit {
        LengthUnit::Chars => match after.char_indices().nth(size) {
            Some((b, _)) => &after[..b],
            None => after,
        },
        LengthUnit::Tokens => {
            let mut words = 0;
            let mut in_word = false;
            for (b, c) in after.char_indices() {
                if c.is_whitespace() {
                    if in_word {
                        words += 1;
                        in_word = false;
                        if words == size {
                            return &after[..b];
                        }
                    }
                } else {
                    in_word = true;
                }
            }
            after
        }
    }
}
