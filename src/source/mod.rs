//! Document sources - loading and normalizing plain-text documents

mod manifest;
mod metadata;

pub use manifest::{file_fingerprint, FileFingerprint, Manifest};
pub use metadata::{
    detect_language, guess_tradition, has_symbol_hint, DocumentProfile, SYMBOL_KEYWORDS, UNKNOWN_LANGUAGE,
};

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ignore::WalkBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunker::{Chunker, BoundaryChunker};
use crate::index::Passage;

/// Extensions picked up when walking a directory
pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "md"];

static HORIZONTAL_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Canonical text form: LF line endings, single spaces, at most one blank line
pub fn normalize_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_RUNS.replace_all(&text, " ");
    BLANK_RUNS.replace_all(&text, "\n\n").into_owned()
}

/// A source document after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Path or name the text came from
    pub source: String,
    pub title: String,
    /// Normalized text
    pub text: String,
    /// Ids of the passages produced from `text`, in order
    #[serde(default)]
    pub passage_ids: Vec<String>,
    /// Language, tradition and symbol labels guessed from `text`
    #[serde(default)]
    pub profile: DocumentProfile,
}

impl Document {
    /// Build a document from raw text, normalizing it
    pub fn new(id: &str, source: &str, title: &str, raw_text: &str) -> Self {
        let text = normalize_text(raw_text);
        Self {
            id: id.to_string(),
            source: source.to_string(),
            title: title.to_string(),
            profile: DocumentProfile::of(&text),
            text,
            passage_ids: Vec::new(),
        }
    }

    /// Read a file; the id is the file name and the title its stem
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let id = document_id(path);
        let title = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone());

        Ok(Self::new(&id, &path.to_string_lossy(), &title, &raw))
    }

    /// Chunk the text, stamp source, title and profile labels on each
    /// passage and record the ids
    pub fn split(&mut self, chunker: &BoundaryChunker) -> Vec<Passage> {
        let mut passages = chunker.chunk(&self.id, &self.text);
        for passage in &mut passages {
            passage
                .metadata
                .insert("source".to_string(), serde_json::json!(self.source));
            passage
                .metadata
                .insert("title".to_string(), serde_json::json!(self.title));
            self.profile.stamp(passage);
        }
        self.passage_ids = passages.iter().map(|p| p.id.clone()).collect();
        passages
    }
}

/// Document id derived from a file path: its file name
pub fn document_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Collect document files under `paths`, sorted and de-duplicated
pub fn discover_files(paths: &[PathBuf], extensions: &[&str], include_hidden: bool) -> Vec<PathBuf> {
    let wanted = |p: &Path| {
        p.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|e| extensions.iter().any(|x| *x == e))
    };

    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            if wanted(path) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            let walker = WalkBuilder::new(path)
                .hidden(!include_hidden)
                .git_ignore(true)
                .git_global(true)
                .build();

            for entry in walker.flatten() {
                let entry_path = entry.path();
                if entry_path.is_file() && wanted(entry_path) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            warn!("Skipping {}: not a file or directory", path.display());
        }
    }

    files.sort();
    files.dedup();
    debug!("Discovered {} document files", files.len());
    files
}

/// Documents read from disk, plus the files that could not be read
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<(PathBuf, Document)>,
    /// (document id, error message)
    pub failed: Vec<(String, String)>,
}

/// Load every document file under `paths`
///
/// Files that cannot be read (including invalid UTF-8) are reported in
/// `failed` under their document id. When two files share a file name the
/// first one (in path order) wins.
pub fn load_documents(paths: &[PathBuf], include_hidden: bool) -> LoadedDocuments {
    let mut seen = std::collections::BTreeSet::new();
    let mut loaded = LoadedDocuments::default();

    for path in discover_files(paths, DEFAULT_EXTENSIONS, include_hidden) {
        let id = document_id(&path);
        if !seen.insert(id.clone()) {
            warn!("Skipping {}: duplicate document id {}", path.display(), id);
            continue;
        }
        match Document::from_path(&path) {
            Ok(doc) => loaded.documents.push((path, doc)),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                loaded.failed.push((id, e.to_string()));
            }
        }
    }

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkerConfig;

    #[test]
    fn test_normalize_line_endings_and_spaces() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(normalize_text("one  \t two"), "one two");
        assert_eq!(normalize_text("p1\n\n\n\n\np2"), "p1\n\np2");
        assert_eq!(normalize_text("p1\r\n\r\n\r\np2"), "p1\n\np2");
    }

    #[test]
    fn test_split_stamps_metadata() {
        let chunker = BoundaryChunker::new(ChunkerConfig::new(20, 5).with_tolerance(0)).unwrap();
        let mut doc = Document::new("grimoire.txt", "books/grimoire.txt", "grimoire", &"word ".repeat(12));
        let passages = doc.split(&chunker);

        assert_eq!(doc.passage_ids.len(), passages.len());
        assert_eq!(doc.passage_ids[0], "grimoire.txt::chunk-0");
        assert_eq!(passages[1].metadata.get("title"), Some(&serde_json::json!("grimoire")));
        assert_eq!(passages[1].metadata.get("chunk_index"), Some(&serde_json::json!(1)));
        assert_eq!(
            passages[0].metadata.get("source"),
            Some(&serde_json::json!("books/grimoire.txt"))
        );
        for key in ["language", "tradition", "symbol_hint"] {
            assert!(passages[0].metadata.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_document_profile_from_text() {
        let doc = Document::new("key.txt", "key.txt", "key", "The Seal of Solomon, drawn as a figure.");
        assert!(doc.profile.symbol_hint);
        assert_eq!(doc.profile.tradition, guess_tradition("solomon"));
    }

    #[test]
    fn test_load_documents_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "# Beta\n\nText.").unwrap();
        std::fs::write(dir.path().join("a.txt"), "Alpha   text.").unwrap();
        std::fs::write(dir.path().join("skip.pdf"), "binary").unwrap();

        let loaded = load_documents(&[dir.path().to_path_buf()], false);
        let ids: Vec<&str> = loaded.documents.iter().map(|(_, d)| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.md"]);
        assert_eq!(loaded.documents[0].1.text, "Alpha text.");
        assert_eq!(loaded.documents[0].1.title, "a");
        assert!(loaded.failed.is_empty());
    }

    #[test]
    fn test_load_documents_reports_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "Plain text.").unwrap();
        std::fs::write(dir.path().join("latin1.txt"), b"Caf\xe9 seals").unwrap();

        let loaded = load_documents(&[dir.path().to_path_buf()], false);
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.failed.len(), 1);
        assert_eq!(loaded.failed[0].0, "latin1.txt");
    }
}
