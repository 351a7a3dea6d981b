//! Ingestion pipeline - chunk and embed documents, then store them
//!
//! Documents are independent: each one is chunked and embedded in its own
//! task, at most `workers` at a time. Results are applied to the corpus
//! afterwards in document-id order, so the stored corpus does not depend on
//! which task finished first.

use std::path::PathBuf;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunker::BoundaryChunker;
use crate::embedding::{with_deadline, EmbeddingProviderTrait};
use crate::error::{Error, Result};
use crate::index::{CorpusIndex, Passage};
use crate::source::{file_fingerprint, load_documents, Document, FileFingerprint};

/// Knobs for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Documents chunked and embedded concurrently
    pub workers: usize,
    /// Limit for each provider call
    pub timeout: Option<Duration>,
    /// Re-ingest files whose fingerprint is unchanged
    pub force: bool,
    pub include_hidden: bool,
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout: None,
            force: false,
            include_hidden: false,
            show_progress: false,
        }
    }
}

/// What an ingestion run changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
    /// (document id, error message)
    pub failed: Vec<(String, String)>,
    pub passages_written: usize,
}

impl IngestReport {
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

struct Pending {
    document: Document,
    fingerprint: Option<FileFingerprint>,
}

/// Ingest in-memory documents, replacing earlier versions with the same id
pub async fn ingest_documents(
    corpus: &mut CorpusIndex,
    documents: Vec<Document>,
    provider: &dyn EmbeddingProviderTrait,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let pending = documents
        .into_iter()
        .map(|document| Pending {
            document,
            fingerprint: None,
        })
        .collect();

    let mut report = IngestReport::default();
    process(corpus, pending, provider, options, &mut report).await?;
    Ok(report)
}

/// Ingest `.txt`/`.md` files under `paths`.
///
/// Unchanged files (same size and content hash as recorded in the manifest)
/// are skipped, and documents whose file disappeared are removed. Files that
/// cannot be read are reported as failed and their stored passages kept.
pub async fn ingest_paths(
    corpus: &mut CorpusIndex,
    paths: &[PathBuf],
    provider: &dyn EmbeddingProviderTrait,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let loaded = load_documents(paths, options.include_hidden);
    info!("Found {} documents", loaded.documents.len() + loaded.failed.len());
    let mut report = IngestReport {
        failed: loaded.failed,
        ..Default::default()
    };

    let mut pending = Vec::new();
    for (path, document) in loaded.documents {
        let fingerprint = match file_fingerprint(&path) {
            Ok(fp) => fp,
            Err(e) => {
                warn!("Failed to fingerprint {}: {}", path.display(), e);
                report.failed.push((document.id.clone(), e.to_string()));
                continue;
            }
        };

        if !options.force && corpus.manifest().is_unchanged(&document.id, &fingerprint) {
            debug!("Unchanged: {}", document.id);
            report.unchanged.push(document.id);
            continue;
        }

        pending.push(Pending {
            document,
            fingerprint: Some(fingerprint),
        });
    }

    // Documents recorded earlier whose file is gone; unreadable files keep
    // their stored passages
    let seen: Vec<&str> = pending
        .iter()
        .map(|p| p.document.id.as_str())
        .chain(report.unchanged.iter().map(|s| s.as_str()))
        .chain(report.failed.iter().map(|(id, _)| id.as_str()))
        .collect();
    let vanished: Vec<String> = corpus
        .manifest()
        .document_ids()
        .filter(|id| !seen.contains(id))
        .map(|id| id.to_string())
        .collect();
    for id in vanished {
        let n = corpus.remove_document(&id);
        info!("Removed {} ({} passages): source file no longer present", id, n);
        report.removed.push(id);
    }

    process(corpus, pending, provider, options, &mut report).await?;
    Ok(report)
}

async fn process(
    corpus: &mut CorpusIndex,
    pending: Vec<Pending>,
    provider: &dyn EmbeddingProviderTrait,
    options: &IngestOptions,
    report: &mut IngestReport,
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }

    if let Some(expected) = corpus.vectors().dimensions() {
        let actual = provider.dimensions();
        if actual != expected {
            return Err(Error::DimensionMismatch { expected, actual });
        }
    }

    let chunker = BoundaryChunker::new(corpus.meta().chunking.clone())?;
    let progress = progress_bar(pending.len(), options.show_progress);

    let chunker = &chunker;
    let progress_ref = &progress;
    let mut results: Vec<(Pending, Vec<Passage>, Result<Vec<Vec<f32>>>)> = stream::iter(pending)
        .map(|mut item| async move {
            let passages = item.document.split(chunker);
            let vectors = if passages.is_empty() {
                Ok(Vec::new())
            } else {
                let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
                with_deadline(options.timeout, provider.embed_documents(&texts)).await
            };
            progress_ref.inc(1);
            (item, passages, vectors)
        })
        .buffer_unordered(options.workers.max(1))
        .collect()
        .await;

    progress.finish_with_message("Embeddings computed");
    results.sort_by(|a, b| a.0.document.id.cmp(&b.0.document.id));

    for (item, passages, vectors) in results {
        let id = item.document.id.clone();
        let stored_before =
            corpus.manifest().get(&id).is_some() || corpus.passages().document_ids().contains(&id);
        let n = passages.len();

        let outcome = vectors.and_then(|v| corpus.add_document(&item.document, passages, v));
        match outcome {
            Ok(()) => {
                if let Some(fp) = item.fingerprint {
                    corpus.manifest_mut().record(&id, fp);
                }
                report.passages_written += n;
                debug!("Ingested {} ({} passages)", id, n);
                if stored_before {
                    report.updated.push(id);
                } else {
                    report.added.push(id);
                }
            }
            Err(e) => {
                warn!("Failed to ingest {}: {}", id, e);
                report.failed.push((id, e.to_string()));
            }
        }
    }

    info!(
        "Ingestion finished: {} added, {} updated, {} failed",
        report.added.len(),
        report.updated.len(),
        report.failed.len()
    );
    Ok(())
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} documents ({eta})")
    {
        progress.set_style(style.progress_chars("#>-"));
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkerConfig;
    use crate::embedding::HashEmbedder;
    use crate::index::IndexMeta;

    fn corpus(dir: &std::path::Path) -> CorpusIndex {
        CorpusIndex::create(dir, IndexMeta::new("hash", "fx", ChunkerConfig::new(60, 10)))
    }

    #[tokio::test]
    async fn test_ingest_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = corpus(dir.path());
        let embedder = HashEmbedder::new(32).unwrap();

        let docs = vec![
            Document::new("b.txt", "b.txt", "b", "Second document about a psalm."),
            Document::new("a.txt", "a.txt", "a", &"First document with a seal. ".repeat(5)),
        ];
        let report = ingest_documents(&mut corpus, docs, &embedder, &IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(report.added, vec!["a.txt", "b.txt"]);
        assert!(report.failed.is_empty());
        assert_eq!(report.passages_written, corpus.passages().len());
        assert_eq!(corpus.vectors().len(), corpus.passages().len());
        assert_eq!(corpus.vectors().dimensions(), Some(32));
    }

    #[tokio::test]
    async fn test_incremental_paths() {
        let src = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), "Alpha text about seals.").unwrap();
        std::fs::write(src.path().join("b.md"), "Beta text about psalms.").unwrap();

        let mut corpus = corpus(dir.path());
        let embedder = HashEmbedder::new(16).unwrap();
        let paths = vec![src.path().to_path_buf()];
        let options = IngestOptions::default();

        let first = ingest_paths(&mut corpus, &paths, &embedder, &options).await.unwrap();
        assert_eq!(first.added.len(), 2);

        let second = ingest_paths(&mut corpus, &paths, &embedder, &options).await.unwrap();
        assert_eq!(second.unchanged.len(), 2);
        assert!(!second.changed());

        std::fs::write(src.path().join("a.txt"), "Alpha text rewritten.").unwrap();
        std::fs::remove_file(src.path().join("b.md")).unwrap();
        let third = ingest_paths(&mut corpus, &paths, &embedder, &options).await.unwrap();
        assert_eq!(third.updated, vec!["a.txt"]);
        assert_eq!(third.removed, vec!["b.md"]);
        assert_eq!(corpus.passages().document_ids(), vec!["a.txt"]);
        assert!(corpus.manifest().get("b.md").is_none());
    }

    #[tokio::test]
    async fn test_provider_dimension_must_match_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = corpus(dir.path());
        let docs = vec![Document::new("a.txt", "a.txt", "a", "Some text.")];
        ingest_documents(&mut corpus, docs.clone(), &HashEmbedder::new(768).unwrap(), &IngestOptions::default())
            .await
            .unwrap();

        let err = ingest_documents(&mut corpus, docs, &HashEmbedder::new(384).unwrap(), &IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 768, actual: 384 }));
        assert_eq!(corpus.vectors().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = corpus(dir.path());
        let docs = vec![Document::new("empty.txt", "empty.txt", "empty", "")];
        let report = ingest_documents(&mut corpus, docs, &HashEmbedder::default(), &IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(report.passages_written, 0);
        assert!(corpus.vectors().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_failed_not_removed() {
        let src = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), "Alpha text about seals.").unwrap();

        let mut corpus = corpus(dir.path());
        let embedder = HashEmbedder::new(16).unwrap();
        let paths = vec![src.path().to_path_buf()];
        let options = IngestOptions::default();
        ingest_paths(&mut corpus, &paths, &embedder, &options).await.unwrap();

        // Latin-1 bytes are not valid UTF-8
        std::fs::write(src.path().join("a.txt"), b"Caf\xe9 seals").unwrap();
        let report = ingest_paths(&mut corpus, &paths, &embedder, &options).await.unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a.txt");
        assert!(report.removed.is_empty());
        assert!(!report.changed());
        assert_eq!(corpus.passages().document_ids(), vec!["a.txt"]);
        assert!(corpus.manifest().get("a.txt").is_some());
    }

    #[tokio::test]
    async fn test_empty_file_is_unchanged_after_reopen() {
        let src = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("empty.txt"), "").unwrap();
        std::fs::write(src.path().join("a.txt"), "Alpha text.").unwrap();

        let embedder = HashEmbedder::new(16).unwrap();
        let paths = vec![src.path().to_path_buf()];
        let options = IngestOptions::default();

        let mut corpus = corpus(dir.path());
        let first = ingest_paths(&mut corpus, &paths, &embedder, &options).await.unwrap();
        assert_eq!(first.added, vec!["a.txt", "empty.txt"]);
        corpus.save().unwrap();

        let mut reopened = CorpusIndex::open(dir.path()).unwrap();
        let second = ingest_paths(&mut reopened, &paths, &embedder, &options).await.unwrap();
        assert_eq!(second.unchanged, vec!["a.txt", "empty.txt"]);
        assert!(!second.changed());
    }
}
