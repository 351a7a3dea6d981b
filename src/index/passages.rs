//! Passage storage - in-memory map persisted as JSONL

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Open attribute map carried by passages and index entries
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A contiguous span of a document's text, the unit of indexing and retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable id derived from the document id and `seq`
    pub id: String,
    /// Owning document (back-reference only)
    pub document_id: String,
    /// 0-based position in the document's passage sequence
    pub seq: usize,
    /// Character offset of the first character in the document text
    pub start: usize,
    /// Character offset one past the last character
    pub end: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Passage {
    /// Build the stable passage id for a document and sequence index
    pub fn make_id(document_id: &str, seq: usize) -> String {
        format!("{}::chunk-{}", document_id, seq)
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    /// Page number, if the upstream extractor recorded one
    pub fn page(&self) -> Option<u64> {
        self.metadata.get("page").and_then(|v| v.as_u64())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    passages: BTreeMap<String, Passage>,
    /// document id -> passage ids in sequence order
    documents: BTreeMap<String, Vec<String>>,
}

impl StoreState {
    fn remove_document(&mut self, document_id: &str) -> Vec<String> {
        let ids = self.documents.remove(document_id).unwrap_or_default();
        for id in &ids {
            self.passages.remove(id);
        }
        ids
    }
}

/// Passage store shared between ingestion and retrieval
#[derive(Debug, Default)]
pub struct PassageStore {
    state: RwLock<StoreState>,
}

impl PassageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document's passages, replacing any previous passages of that
    /// document. Returns the ids that were dropped.
    pub fn insert_document(&self, document_id: &str, passages: Vec<Passage>) -> Vec<String> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let removed = state.remove_document(document_id);

        let ids: Vec<String> = passages.iter().map(|p| p.id.clone()).collect();
        for passage in passages {
            state.passages.insert(passage.id.clone(), passage);
        }
        state.documents.insert(document_id.to_string(), ids);

        removed
    }

    /// Drop a document and its passages, returning the removed passage ids
    pub fn remove_document(&self, document_id: &str) -> Vec<String> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.remove_document(document_id)
    }

    /// Get a passage by id
    pub fn get(&self, id: &str) -> Option<Passage> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.passages.get(id).cloned()
    }

    /// Document id owning a passage
    pub fn document_of(&self, id: &str) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.passages.get(id).map(|p| p.document_id.clone())
    }

    /// Passages of the given documents (all documents when `None`), ordered
    /// by document id then sequence
    pub fn passages_for(&self, documents: Option<&[String]>) -> Vec<Passage> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();

        for (document_id, ids) in &state.documents {
            if let Some(wanted) = documents {
                if !wanted.iter().any(|d| d == document_id) {
                    continue;
                }
            }
            out.extend(ids.iter().filter_map(|id| state.passages.get(id).cloned()));
        }

        out
    }

    /// Ids of all stored documents, ascending
    pub fn document_ids(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.documents.keys().cloned().collect()
    }

    /// Get passage count
    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).passages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn document_count(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).documents.len()
    }

    /// Write all passages as JSON lines, ordered by document then sequence
    pub fn save(&self, path: &Path) -> Result<()> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let tmp_path = path.with_extension("jsonl.tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for ids in state.documents.values() {
            for passage in ids.iter().filter_map(|id| state.passages.get(id)) {
                serde_json::to_writer(&mut writer, passage)?;
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()?;
        drop(writer);

        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a JSONL passage file written by [`PassageStore::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut state = StoreState::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let passage: Passage = serde_json::from_str(&line).map_err(|e| {
                Error::CorruptIndex(format!("passages line {}: {}", line_no + 1, e))
            })?;

            state
                .documents
                .entry(passage.document_id.clone())
                .or_default()
                .push(passage.id.clone());
            if state.passages.insert(passage.id.clone(), passage).is_some() {
                return Err(Error::CorruptIndex(format!(
                    "passages line {}: duplicate passage id",
                    line_no + 1
                )));
            }
        }

        for ids in state.documents.values_mut() {
            ids.sort_by_key(|id| state.passages.get(id).map(|p| p.seq).unwrap_or(usize::MAX));
        }

        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(document_id: &str, seq: usize, start: usize, text: &str) -> Passage {
        Passage {
            id: Passage::make_id(document_id, seq),
            document_id: document_id.to_string(),
            seq,
            start,
            end: start + text.chars().count(),
            text: text.to_string(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_make_id() {
        assert_eq!(Passage::make_id("book.txt", 3), "book.txt::chunk-3");
    }

    #[test]
    fn test_insert_replaces_document() {
        let store = PassageStore::new();
        store.insert_document("a", vec![passage("a", 0, 0, "one"), passage("a", 1, 3, "two")]);
        assert_eq!(store.len(), 2);

        let removed = store.insert_document("a", vec![passage("a", 0, 0, "fresh")]);
        assert_eq!(removed, vec!["a::chunk-0".to_string(), "a::chunk-1".to_string()]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a::chunk-0").unwrap().text, "fresh");
        assert!(store.get("a::chunk-1").is_none());
    }

    #[test]
    fn test_passages_for_orders_by_document_and_seq() {
        let store = PassageStore::new();
        store.insert_document("b", vec![passage("b", 0, 0, "b0")]);
        store.insert_document("a", vec![passage("a", 0, 0, "a0"), passage("a", 1, 2, "a1")]);

        let all: Vec<String> = store.passages_for(None).into_iter().map(|p| p.id).collect();
        assert_eq!(all, vec!["a::chunk-0", "a::chunk-1", "b::chunk-0"]);

        let only_b = store.passages_for(Some(&["b".to_string()]));
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].document_id, "b");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passages.jsonl");

        let store = PassageStore::new();
        let mut p = passage("doc", 0, 0, "hello world");
        p.metadata.insert("page".into(), serde_json::json!(7));
        store.insert_document("doc", vec![p.clone(), passage("doc", 1, 6, "world again")]);
        store.save(&path).unwrap();

        let loaded = PassageStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.document_count(), 1);
        assert_eq!(loaded.get(&p.id).unwrap(), p);
        assert_eq!(loaded.get(&p.id).unwrap().page(), Some(7));
    }

    #[test]
    fn test_load_rejects_garbage_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passages.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        assert!(matches!(PassageStore::load(&path), Err(Error::CorruptIndex(_))));
    }
}
