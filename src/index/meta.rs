//! Corpus metadata handling

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunker::ChunkerConfig;
use crate::error::{Error, Result};

/// Current metadata format version
pub const META_VERSION: &str = "1.0";

/// Corpus metadata stored alongside the index files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Metadata format version
    pub version: String,

    /// Embedding mode (ollama, openai, hash)
    pub embedding_mode: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Embedding dimensions, unknown until the first vector is stored
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// Total number of passages
    #[serde(default)]
    pub passage_count: usize,

    /// Total number of documents
    #[serde(default)]
    pub document_count: usize,

    /// Chunking parameters the passages were produced with
    #[serde(default)]
    pub chunking: ChunkerConfig,
}

impl IndexMeta {
    pub fn new(embedding_mode: &str, embedding_model: &str, chunking: ChunkerConfig) -> Self {
        Self {
            version: META_VERSION.to_string(),
            embedding_mode: embedding_mode.to_string(),
            embedding_model: embedding_model.to_string(),
            dimensions: None,
            passage_count: 0,
            document_count: 0,
            chunking,
        }
    }

    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::CorruptIndex(format!("meta.json: {}", e)))
    }

    /// Save metadata to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether a provider configuration produces vectors compatible with this corpus
    pub fn same_provider(&self, embedding_mode: &str, embedding_model: &str) -> bool {
        self.embedding_mode == embedding_mode && self.embedding_model == embedding_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");

        let mut meta = IndexMeta::new("ollama", "nomic-embed-text", ChunkerConfig::new(800, 100));
        meta.dimensions = Some(768);
        meta.passage_count = 12;
        meta.save(&path).unwrap();

        assert_eq!(IndexMeta::load(&path).unwrap(), meta);
    }

    #[test]
    fn test_meta_defaults_for_missing_fields() {
        let json = r#"{"version": "1.0", "embedding_mode": "hash", "embedding_model": "fx"}"#;
        let meta: IndexMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.dimensions, None);
        assert_eq!(meta.chunking, ChunkerConfig::default());
        assert!(meta.same_provider("hash", "fx"));
        assert!(!meta.same_provider("hash", "other"));
    }

    #[test]
    fn test_meta_ignores_unknown_fields() {
        let json = r#"{"version": "1.0", "embedding_mode": "hash", "embedding_model": "fx",
                       "embedding_options": {"host": "x"}}"#;
        let meta: IndexMeta = serde_json::from_str(json).unwrap();
        let written = serde_json::to_value(&meta).unwrap();
        assert!(written.get("embedding_options").is_none());
    }

    #[test]
    fn test_meta_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(IndexMeta::load(&path), Err(Error::CorruptIndex(_))));
    }
}
