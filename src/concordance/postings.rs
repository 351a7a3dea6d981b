//! Term index - candidate term -> passages containing it

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::terms::{extract_candidate_terms, normalize_token};
use crate::error::{Error, Result};
use crate::index::Passage;

/// A passage containing a term
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermOccurrence {
    pub document_id: String,
    pub passage_id: String,
    pub seq: usize,
}

/// Frequency summary for one term
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermStats {
    pub term: String,
    pub documents: usize,
    pub passages: usize,
}

/// Inverted index from candidate terms to the passages mentioning them
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TermIndex {
    postings: BTreeMap<String, Vec<TermOccurrence>>,
}

impl TermIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the candidate terms of a passage
    pub fn add_passage(&mut self, passage: &Passage) {
        let language = passage.metadata.get("language").and_then(|v| v.as_str());
        for term in extract_candidate_terms(&passage.text, language) {
            let occurrences = self.postings.entry(term).or_default();
            let occurrence = TermOccurrence {
                document_id: passage.document_id.clone(),
                passage_id: passage.id.clone(),
                seq: passage.seq,
            };
            if let Err(pos) = occurrences.binary_search(&occurrence) {
                occurrences.insert(pos, occurrence);
            }
        }
    }

    /// Forget every occurrence belonging to a document
    pub fn remove_document(&mut self, document_id: &str) {
        self.postings.retain(|_, occurrences| {
            occurrences.retain(|o| o.document_id != document_id);
            !occurrences.is_empty()
        });
    }

    /// Passages whose candidate terms include `term`
    pub fn lookup(&self, term: &str) -> &[TermOccurrence] {
        self.postings
            .get(&normalize_token(term))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn stats_for(term: &str, occurrences: &[TermOccurrence]) -> TermStats {
        let documents: BTreeSet<&str> = occurrences.iter().map(|o| o.document_id.as_str()).collect();
        TermStats {
            term: term.to_string(),
            documents: documents.len(),
            passages: occurrences.len(),
        }
    }

    /// Frequency summary for a single term
    pub fn stats(&self, term: &str) -> Option<TermStats> {
        let key = normalize_token(term);
        self.postings.get(&key).map(|o| Self::stats_for(&key, o))
    }

    /// Terms ordered by document frequency, then passage frequency, then term
    pub fn top_terms(&self, limit: usize) -> Vec<TermStats> {
        let mut stats: Vec<TermStats> = self
            .postings
            .iter()
            .map(|(term, occurrences)| Self::stats_for(term, occurrences))
            .collect();

        stats.sort_by(|a, b| {
            b.documents
                .cmp(&a.documents)
                .then_with(|| b.passages.cmp(&a.passages))
                .then_with(|| a.term.cmp(&b.term))
        });
        stats.truncate(limit);
        stats
    }

    /// Number of distinct terms
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::CorruptIndex(format!("term index: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Metadata;

    fn passage(document_id: &str, seq: usize, text: &str) -> Passage {
        Passage {
            id: Passage::make_id(document_id, seq),
            document_id: document_id.to_string(),
            seq,
            start: 0,
            end: text.chars().count(),
            text: text.to_string(),
            metadata: Metadata::new(),
        }
    }

    fn sample() -> TermIndex {
        let mut index = TermIndex::new();
        index.add_passage(&passage("a.txt", 0, "The seal of the temple."));
        index.add_passage(&passage("a.txt", 1, "Another seal, another temple gate."));
        index.add_passage(&passage("b.txt", 0, "A seal drawn in chalk."));
        index
    }

    #[test]
    fn test_lookup_normalizes_term() {
        let index = sample();
        let hits = index.lookup("Seal!");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].passage_id, "a.txt::chunk-0");
        assert!(index.lookup("missing").is_empty());
    }

    #[test]
    fn test_top_terms() {
        let top = sample().top_terms(2);
        assert_eq!(top[0], TermStats { term: "seal".into(), documents: 2, passages: 3 });
        assert_eq!(top[1].term, "temple");
    }

    #[test]
    fn test_remove_document() {
        let mut index = sample();
        index.remove_document("a.txt");
        assert_eq!(index.lookup("seal").len(), 1);
        assert!(index.lookup("temple").is_empty());
        assert!(index.stats("gate").is_none());
    }

    #[test]
    fn test_adding_twice_is_idempotent() {
        let mut index = sample();
        index.add_passage(&passage("b.txt", 0, "A seal drawn in chalk."));
        assert_eq!(index.lookup("chalk").len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terms.json");
        let index = sample();
        index.save(&path).unwrap();

        let loaded = TermIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.lookup("gate"), index.lookup("gate"));
    }
}
