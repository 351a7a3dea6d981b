//! Vector index - exact cosine k-NN over passage embeddings
//!
//! Entries live behind a single `RwLock`: inserts and removes take the write
//! lock, searches and saves take the read lock. An entry's vector and
//! metadata therefore become visible together, and a save always serializes
//! a consistent snapshot.
//!
//! The index file is JSON:
//!
//! ```json
//! { "format_version": 1, "dimensions": 3,
//!   "entries": [ { "passage_id": "a::chunk-0", "vector": [0.1, 0.2, 0.3], "metadata": {} } ] }
//! ```

use std::cmp::Ordering;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::passages::Metadata;
use crate::error::{Error, Result};

/// Format version written by [`VectorIndex::save`]
pub const FORMAT_VERSION: u32 = 1;

/// A stored (passage id, vector, metadata) triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub passage_id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(skip)]
    norm: f64,
}

impl IndexEntry {
    fn new(passage_id: String, vector: Vec<f32>, metadata: Metadata) -> Self {
        let norm = l2_norm(&vector);
        Self {
            passage_id,
            vector,
            metadata,
            norm,
        }
    }
}

/// A search hit: passage id and cosine similarity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPassage {
    pub passage_id: String,
    pub score: f32,
}

#[derive(Debug, Default)]
struct IndexState {
    /// Fixed by the first insertion; kept even after every entry is removed
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
    /// passage id -> position in `entries`
    positions: FxHashMap<String, usize>,
}

impl IndexState {
    fn remove(&mut self, passage_id: &str) -> bool {
        let Some(pos) = self.positions.remove(passage_id) else {
            return false;
        };

        self.entries.swap_remove(pos);
        if let Some(moved) = self.entries.get(pos) {
            self.positions.insert(moved.passage_id.clone(), pos);
        }
        true
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        match self.dimensions {
            Some(expected) if expected != query.len() => Err(Error::DimensionMismatch {
                expected,
                actual: query.len(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    dimensions: Option<usize>,
    entries: Vec<&'a IndexEntry>,
}

#[derive(Deserialize)]
struct IndexFileHeader {
    format_version: u32,
}

#[derive(Deserialize)]
struct IndexFile {
    dimensions: Option<usize>,
    #[serde(default)]
    entries: Vec<IndexEntry>,
}

/// Thread-safe exact nearest-neighbour index
#[derive(Debug, Default)]
pub struct VectorIndex {
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create an empty index; the dimension is fixed by the first insert
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index with a known dimension
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            state: RwLock::new(IndexState {
                dimensions: Some(dimensions),
                ..Default::default()
            }),
        }
    }

    /// Insert or replace the entry for `passage_id`
    pub fn insert(&self, passage_id: &str, vector: Vec<f32>, metadata: Metadata) -> Result<()> {
        validate_vector(&vector)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let fixed = state.dimensions;
        match fixed {
            Some(expected) if expected != vector.len() => {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => {
                debug!("Vector index dimension fixed at {}", vector.len());
                state.dimensions = Some(vector.len());
            }
        }

        state.remove(passage_id);
        let pos = state.entries.len();
        state
            .entries
            .push(IndexEntry::new(passage_id.to_string(), vector, metadata));
        state.positions.insert(passage_id.to_string(), pos);

        Ok(())
    }

    /// Insert or replace several entries under one write lock.
    ///
    /// Every vector is checked first; on error nothing is inserted.
    pub fn insert_batch(&self, batch: Vec<(String, Vec<f32>, Metadata)>) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let mut dimensions = state.dimensions;
        for (_, vector, _) in &batch {
            validate_vector(vector)?;
            match dimensions {
                Some(expected) if expected != vector.len() => {
                    return Err(Error::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => dimensions = Some(vector.len()),
            }
        }

        if state.dimensions.is_none() && dimensions.is_some() {
            debug!("Vector index dimension fixed at {:?}", dimensions);
        }
        state.dimensions = dimensions;
        for (passage_id, vector, metadata) in batch {
            state.remove(&passage_id);
            let pos = state.entries.len();
            state.positions.insert(passage_id.clone(), pos);
            state.entries.push(IndexEntry::new(passage_id, vector, metadata));
        }

        Ok(())
    }

    /// Remove an entry; absent ids are ignored
    pub fn remove(&self, passage_id: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.remove(passage_id);
    }

    /// The k entries most similar to `query`, best first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        self.search_where(query, k, |_| true)
    }

    /// Like [`VectorIndex::search`], restricted to ids accepted by `predicate`
    pub fn search_where<F>(&self, query: &[f32], k: usize, predicate: F) -> Result<Vec<ScoredPassage>>
    where
        F: Fn(&str) -> bool,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.check_query(query)?;

        if k == 0 || state.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(&str, f32)> = state
            .entries
            .iter()
            .filter(|entry| predicate(&entry.passage_id))
            .map(|entry| {
                let score = cosine(query, query_norm, &entry.vector, entry.norm);
                (entry.passage_id.as_str(), score)
            })
            .collect();

        if scored.len() > k {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);

        Ok(scored
            .into_iter()
            .map(|(id, score)| ScoredPassage {
                passage_id: id.to_string(),
                score,
            })
            .collect())
    }

    /// Whether an entry exists for `passage_id`
    pub fn contains(&self, passage_id: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.positions.contains_key(passage_id)
    }

    /// Copy of the stored vector for `passage_id`
    pub fn vector(&self, passage_id: &str) -> Option<Vec<f32>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let pos = *state.positions.get(passage_id)?;
        Some(state.entries[pos].vector.clone())
    }

    /// Fixed vector dimension, if any vector was ever inserted
    pub fn dimensions(&self) -> Option<usize> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).dimensions
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist every entry plus the fixed dimension
    pub fn save(&self, path: &Path) -> Result<()> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let mut entries: Vec<&IndexEntry> = state.entries.iter().collect();
        entries.sort_by(|a, b| a.passage_id.cmp(&b.passage_id));

        let file = IndexFileRef {
            format_version: FORMAT_VERSION,
            dimensions: state.dimensions,
            entries,
        };

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec(&file)?)?;
        std::fs::rename(&tmp_path, path)?;

        info!("Saved vector index ({} entries) to {:?}", state.entries.len(), path);
        Ok(())
    }

    /// Restore an index written by [`VectorIndex::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;

        let header: IndexFileHeader = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CorruptIndex(format!("unreadable header: {}", e)))?;
        if header.format_version != FORMAT_VERSION {
            return Err(Error::UnsupportedFormatVersion {
                found: header.format_version,
                supported: FORMAT_VERSION,
            });
        }

        let file: IndexFile = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CorruptIndex(format!("unreadable entries: {}", e)))?;

        if file.dimensions == Some(0) {
            return Err(Error::CorruptIndex("zero vector dimension recorded".to_string()));
        }

        let mut state = IndexState {
            dimensions: file.dimensions,
            ..Default::default()
        };

        for entry in file.entries {
            let Some(dimensions) = file.dimensions else {
                return Err(Error::CorruptIndex(
                    "entries present but no dimension recorded".to_string(),
                ));
            };
            if entry.vector.len() != dimensions {
                return Err(Error::CorruptIndex(format!(
                    "entry {} has {} components, header says {}",
                    entry.passage_id,
                    entry.vector.len(),
                    dimensions
                )));
            }
            if let Err(e) = validate_vector(&entry.vector) {
                return Err(Error::CorruptIndex(format!("entry {}: {}", entry.passage_id, e)));
            }
            if state.positions.contains_key(&entry.passage_id) {
                return Err(Error::CorruptIndex(format!(
                    "duplicate entry {}",
                    entry.passage_id
                )));
            }

            let pos = state.entries.len();
            state.positions.insert(entry.passage_id.clone(), pos);
            state
                .entries
                .push(IndexEntry::new(entry.passage_id, entry.vector, entry.metadata));
        }

        info!("Loaded vector index ({} entries) from {:?}", state.entries.len(), path);

        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

/// Descending score, then ascending passage id
fn rank_order(a: &(&str, f32), b: &(&str, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

fn validate_vector(vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::InvalidVector("vector has no components".to_string()));
    }
    if let Some(pos) = vector.iter().position(|x| !x.is_finite()) {
        return Err(Error::InvalidVector(format!(
            "component {} is not finite",
            pos
        )));
    }
    Ok(())
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt()
}

/// Cosine similarity clamped to [-1, 1]; zero or non-finite inputs score 0
pub fn cosine(a: &[f32], a_norm: f64, b: &[f32], b_norm: f64) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let similarity = dot / (a_norm * b_norm);
    if !similarity.is_finite() {
        return 0.0;
    }
    similarity.clamp(-1.0, 1.0) as f32
}
