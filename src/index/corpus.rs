//! Corpus directory - vector index, passages, term index, document graph,
//! metadata and ingestion manifest kept together on disk

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::graph::{SemanticGraph, GRAPH_NEIGHBORS};
use super::meta::IndexMeta;
use super::passages::{Metadata, Passage, PassageStore};
use super::vector::VectorIndex;
use crate::concordance::TermIndex;
use crate::error::{Error, Result};
use crate::retriever::Retriever;
use crate::source::{Document, Manifest};

pub const VECTORS_FILE: &str = "vectors.json";
pub const PASSAGES_FILE: &str = "passages.jsonl";
pub const TERMS_FILE: &str = "terms.json";
pub const META_FILE: &str = "meta.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const CENTROIDS_FILE: &str = "centroids.json";
pub const GRAPH_FILE: &str = "graph.json";

/// A persisted corpus
pub struct CorpusIndex {
    dir: PathBuf,
    meta: IndexMeta,
    vectors: Arc<VectorIndex>,
    passages: Arc<PassageStore>,
    terms: TermIndex,
    manifest: Manifest,
    /// document id -> mean of its passage vectors
    centroids: VectorIndex,
    graph: SemanticGraph,
}

impl CorpusIndex {
    /// Start an empty corpus in `dir`; nothing is written until [`CorpusIndex::save`]
    pub fn create(dir: &Path, meta: IndexMeta) -> Self {
        let new_index = || match meta.dimensions {
            Some(d) => VectorIndex::with_dimensions(d),
            None => VectorIndex::new(),
        };
        let vectors = new_index();
        let centroids = new_index();

        Self {
            dir: dir.to_path_buf(),
            meta,
            vectors: Arc::new(vectors),
            passages: Arc::new(PassageStore::new()),
            terms: TermIndex::new(),
            manifest: Manifest::new(),
            centroids,
            graph: SemanticGraph::new(),
        }
    }

    /// Whether `dir` holds a saved corpus
    pub fn exists(dir: &Path) -> bool {
        dir.join(META_FILE).is_file()
    }

    /// Load a corpus saved by [`CorpusIndex::save`]
    pub fn open(dir: &Path) -> Result<Self> {
        let meta = IndexMeta::load(&dir.join(META_FILE))?;

        let vectors_path = dir.join(VECTORS_FILE);
        let vectors = if vectors_path.exists() {
            VectorIndex::load(&vectors_path)?
        } else {
            VectorIndex::new()
        };

        let passages_path = dir.join(PASSAGES_FILE);
        let passages = if passages_path.exists() {
            PassageStore::load(&passages_path)?
        } else {
            PassageStore::new()
        };

        if let (Some(recorded), Some(actual)) = (meta.dimensions, vectors.dimensions()) {
            if recorded != actual {
                return Err(Error::CorruptIndex(format!(
                    "meta.json records {} dimensions, vectors.json holds {}",
                    recorded, actual
                )));
            }
        }
        if vectors.len() != passages.len() {
            return Err(Error::CorruptIndex(format!(
                "{} vectors for {} passages",
                vectors.len(),
                passages.len()
            )));
        }

        let terms_path = dir.join(TERMS_FILE);
        let terms = if terms_path.exists() {
            TermIndex::load(&terms_path)?
        } else {
            warn!("{} missing, rebuilding term index from passages", TERMS_FILE);
            let mut terms = TermIndex::new();
            for passage in passages.passages_for(None) {
                terms.add_passage(&passage);
            }
            terms
        };

        let manifest = Manifest::load(&dir.join(MANIFEST_FILE))?;

        let centroids_path = dir.join(CENTROIDS_FILE);
        let centroids = if centroids_path.exists() {
            Some(VectorIndex::load(&centroids_path)?)
        } else {
            None
        };
        let centroids = match centroids {
            Some(c) if c.len() == documents_with_passages(&passages) && c.dimensions() == vectors.dimensions() => c,
            _ => {
                warn!("{} missing or stale, rebuilding document centroids", CENTROIDS_FILE);
                rebuild_centroids(&vectors, &passages)?
            }
        };

        let graph_path = dir.join(GRAPH_FILE);
        let graph = if graph_path.exists() {
            SemanticGraph::load(&graph_path)?
        } else {
            warn!("{} missing, rebuilding document graph", GRAPH_FILE);
            rebuild_graph(&passages, &centroids)?
        };

        info!(
            "Opened corpus at {:?} ({} documents, {} passages)",
            dir,
            passages.document_count(),
            passages.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            meta,
            vectors: Arc::new(vectors),
            passages: Arc::new(passages),
            terms,
            manifest,
            centroids,
            graph,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn vectors(&self) -> &Arc<VectorIndex> {
        &self.vectors
    }

    pub fn passages(&self) -> &Arc<PassageStore> {
        &self.passages
    }

    pub fn terms(&self) -> &TermIndex {
        &self.terms
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    pub fn graph(&self) -> &SemanticGraph {
        &self.graph
    }

    /// Mean passage vector of each document
    pub fn centroids(&self) -> &VectorIndex {
        &self.centroids
    }

    /// Store a document's passages and vectors, replacing any earlier
    /// version of the document. On error the corpus is left unchanged.
    pub fn add_document(&mut self, document: &Document, passages: Vec<Passage>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if passages.len() != vectors.len() {
            return Err(Error::InvalidVector(format!(
                "{} vectors for {} passages of {}",
                vectors.len(),
                passages.len(),
                document.id
            )));
        }

        // Search before any mutation so a dimension error leaves the corpus as is
        let centroid = mean_vector(&vectors);
        let similar: Vec<(String, f32)> = match &centroid {
            Some(c) => self
                .centroids
                .search_where(c, GRAPH_NEIGHBORS, |id| id != document.id)?
                .into_iter()
                .map(|hit| (hit.passage_id, hit.score))
                .collect(),
            None => Vec::new(),
        };

        let batch: Vec<(String, Vec<f32>, Metadata)> = passages
            .iter()
            .zip(vectors)
            .map(|(p, v)| {
                let mut metadata = p.metadata.clone();
                metadata.insert("document_id".to_string(), serde_json::json!(p.document_id));
                (p.id.clone(), v, metadata)
            })
            .collect();
        self.vectors.insert_batch(batch)?;

        // Ids of the previous version that the new one does not reuse
        let new_ids: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
        let stale: Vec<String> = self
            .passages
            .insert_document(&document.id, passages.clone())
            .into_iter()
            .filter(|id| !new_ids.contains(&id.as_str()))
            .collect();
        for id in &stale {
            self.vectors.remove(id);
        }

        self.terms.remove_document(&document.id);
        for passage in &passages {
            self.terms.add_passage(passage);
        }

        self.graph.remove_document(&document.id);
        self.graph
            .upsert_document(&document.id, &document.title, Some(document.profile.language.as_str()));
        match centroid {
            Some(c) => {
                self.centroids.insert(&document.id, c, Metadata::new())?;
                self.graph.add_edges(&document.id, &similar);
            }
            None => self.centroids.remove(&document.id),
        }

        debug!(
            "Stored {} passages for {} ({} stale removed)",
            passages.len(),
            document.id,
            stale.len()
        );
        Ok(())
    }

    /// Drop a document everywhere; returns how many passages were removed
    pub fn remove_document(&mut self, document_id: &str) -> usize {
        let removed = self.passages.remove_document(document_id);
        for id in &removed {
            self.vectors.remove(id);
        }
        self.terms.remove_document(document_id);
        self.manifest.forget(document_id);
        self.centroids.remove(document_id);
        self.graph.remove_document(document_id);
        removed.len()
    }

    /// Retriever reading this corpus
    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.vectors.clone(), self.passages.clone())
    }

    /// Write every component, refreshing the counts in the metadata
    pub fn save(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        self.meta.dimensions = self.vectors.dimensions().or(self.meta.dimensions);
        self.meta.passage_count = self.passages.len();
        self.meta.document_count = self.passages.document_count();

        self.vectors.save(&self.dir.join(VECTORS_FILE))?;
        self.passages.save(&self.dir.join(PASSAGES_FILE))?;
        self.terms.save(&self.dir.join(TERMS_FILE))?;
        self.manifest.save(&self.dir.join(MANIFEST_FILE))?;
        self.centroids.save(&self.dir.join(CENTROIDS_FILE))?;
        self.graph.save(&self.dir.join(GRAPH_FILE))?;
        self.meta.save(&self.dir.join(META_FILE))?;

        info!(
            "Saved corpus at {:?} ({} documents, {} passages)",
            self.dir, self.meta.document_count, self.meta.passage_count
        );
        Ok(())
    }
}

/// Component-wise mean of a document's passage vectors
fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut sum = vec![0f64; first.len()];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += *x as f64;
        }
    }
    let n = vectors.len() as f64;
    Some(sum.into_iter().map(|x| (x / n) as f32).collect())
}

fn documents_with_passages(passages: &PassageStore) -> usize {
    passages
        .document_ids()
        .iter()
        .filter(|id| !passages.passages_for(Some(std::slice::from_ref(*id))).is_empty())
        .count()
}

fn rebuild_centroids(vectors: &VectorIndex, passages: &PassageStore) -> Result<VectorIndex> {
    let centroids = match vectors.dimensions() {
        Some(d) => VectorIndex::with_dimensions(d),
        None => VectorIndex::new(),
    };

    for document_id in passages.document_ids() {
        let document_vectors: Vec<Vec<f32>> = passages
            .passages_for(Some(std::slice::from_ref(&document_id)))
            .iter()
            .filter_map(|p| vectors.vector(&p.id))
            .collect();
        if let Some(c) = mean_vector(&document_vectors) {
            centroids.insert(&document_id, c, Metadata::new())?;
        }
    }
    Ok(centroids)
}

/// Graph from stored passages, linking every document to its nearest others
fn rebuild_graph(passages: &PassageStore, centroids: &VectorIndex) -> Result<SemanticGraph> {
    let mut graph = SemanticGraph::new();

    for document_id in passages.document_ids() {
        let first = passages
            .passages_for(Some(std::slice::from_ref(&document_id)))
            .into_iter()
            .next();
        let label = |key: &str| {
            first
                .as_ref()
                .and_then(|p| p.metadata.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let title = label("title").unwrap_or_else(|| document_id.clone());
        graph.upsert_document(&document_id, &title, label("language").as_deref());

        if let Some(c) = centroids.vector(&document_id) {
            let similar: Vec<(String, f32)> = centroids
                .search_where(&c, GRAPH_NEIGHBORS, |id| id != document_id)?
                .into_iter()
                .map(|hit| (hit.passage_id, hit.score))
                .collect();
            graph.add_edges(&document_id, &similar);
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{BoundaryChunker, ChunkerConfig};
    use crate::embedding::HashEmbedder;

    fn embed_all(passages: &[Passage]) -> Vec<Vec<f32>> {
        let embedder = HashEmbedder::new(16).unwrap();
        passages.iter().map(|p| embedder.embed_text(&p.text)).collect()
    }

    fn ingest(corpus: &mut CorpusIndex, id: &str, text: &str) {
        let chunker = BoundaryChunker::new(ChunkerConfig::new(40, 10).with_tolerance(5)).unwrap();
        let mut doc = Document::new(id, id, id, text);
        let passages = doc.split(&chunker);
        let vectors = embed_all(&passages);
        corpus.add_document(&doc, passages, vectors).unwrap();
    }

    fn new_corpus(dir: &Path) -> CorpusIndex {
        CorpusIndex::create(dir, IndexMeta::new("hash", "fx", ChunkerConfig::new(40, 10)))
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books");
        let mut corpus = new_corpus(&path);
        ingest(&mut corpus, "a.txt", &"The seal of the temple. ".repeat(6));
        ingest(&mut corpus, "b.txt", "A short psalm.");
        corpus.save().unwrap();

        assert!(CorpusIndex::exists(&path));
        let opened = CorpusIndex::open(&path).unwrap();
        assert_eq!(opened.meta().document_count, 2);
        assert_eq!(opened.meta().dimensions, Some(16));
        assert_eq!(opened.passages().len(), corpus.passages().len());
        assert_eq!(opened.vectors().len(), opened.passages().len());
        assert_eq!(opened.terms().lookup("psalm").len(), 1);
    }

    #[test]
    fn test_reingest_drops_stale_passages() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = new_corpus(dir.path());
        ingest(&mut corpus, "a.txt", &"Long original text about candles. ".repeat(8));
        let before = corpus.passages().len();
        assert!(before > 1);

        ingest(&mut corpus, "a.txt", "Now only a seal.");
        assert_eq!(corpus.passages().len(), 1);
        assert_eq!(corpus.vectors().len(), 1);
        assert!(corpus.terms().lookup("candles").is_empty());
        assert_eq!(corpus.terms().lookup("seal").len(), 1);
    }

    #[test]
    fn test_failed_add_leaves_corpus_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = new_corpus(dir.path());
        ingest(&mut corpus, "a.txt", "First version.");

        let mut doc = Document::new("a.txt", "a.txt", "a", "Second version.");
        let chunker = BoundaryChunker::new(ChunkerConfig::new(40, 10)).unwrap();
        let passages = doc.split(&chunker);
        let err = corpus.add_document(&doc, passages, vec![vec![1.0; 3]]).unwrap_err();

        assert!(matches!(err, Error::DimensionMismatch { expected: 16, actual: 3 }));
        let kept = corpus.passages().get("a.txt::chunk-0").unwrap();
        assert_eq!(kept.text, "First version.");
    }

    #[test]
    fn test_remove_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = new_corpus(dir.path());
        ingest(&mut corpus, "a.txt", "Alpha text.");
        ingest(&mut corpus, "b.txt", "Beta text.");

        assert_eq!(corpus.remove_document("a.txt"), 1);
        assert_eq!(corpus.passages().document_ids(), vec!["b.txt"]);
        assert_eq!(corpus.vectors().len(), 1);
        assert_eq!(corpus.remove_document("missing"), 0);
    }

    #[test]
    fn test_open_detects_vector_passage_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = new_corpus(dir.path());
        ingest(&mut corpus, "a.txt", "Alpha text.");
        corpus.save().unwrap();

        std::fs::write(dir.path().join(PASSAGES_FILE), "").unwrap();
        assert!(matches!(CorpusIndex::open(dir.path()), Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn test_missing_terms_file_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = new_corpus(dir.path());
        ingest(&mut corpus, "a.txt", "Pentacle drawing.");
        corpus.save().unwrap();

        std::fs::remove_file(dir.path().join(TERMS_FILE)).unwrap();
        let opened = CorpusIndex::open(dir.path()).unwrap();
        assert_eq!(opened.terms().lookup("pentacle").len(), 1);
    }

    #[test]
    fn test_retriever_sees_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = new_corpus(dir.path());
        ingest(&mut corpus, "a.txt", "The seal is red.");

        let result = corpus
            .retriever()
            .retrieve(&crate::retriever::Query::lexical("seal"))
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_mean_vector() {
        assert_eq!(mean_vector(&[vec![1.0, 2.0], vec![3.0, 4.0]]), Some(vec![2.0, 3.0]));
        assert_eq!(mean_vector(&[]), None);
    }

    #[test]
    fn test_documents_linked_in_graph() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = new_corpus(dir.path());
        ingest(&mut corpus, "a.txt", "The seal of the temple.");
        ingest(&mut corpus, "b.txt", "The seal of the temple, again.");
        ingest(&mut corpus, "c.txt", "");

        let graph = corpus.graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.node("a.txt").unwrap().title, "a.txt");
        assert_eq!(graph.edge_count(), 1);
        let neighbors = graph.neighbors("b.txt");
        assert_eq!(neighbors[0].0, "a.txt");
        assert!((0.0..=1.0).contains(&neighbors[0].1));
        assert!(graph.neighbors("c.txt").is_empty());
        assert_eq!(corpus.centroids().len(), 2);

        // Re-ingesting relinks instead of duplicating
        ingest(&mut corpus, "a.txt", "A different seal entirely.");
        assert_eq!(corpus.graph().edge_count(), 1);

        corpus.remove_document("a.txt");
        assert!(corpus.graph().node("a.txt").is_none());
        assert_eq!(corpus.graph().edge_count(), 0);
        assert_eq!(corpus.centroids().len(), 1);
    }

    #[test]
    fn test_graph_saved_and_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = new_corpus(dir.path());
        ingest(&mut corpus, "a.txt", "Candles and a psalm.");
        ingest(&mut corpus, "b.txt", "A psalm by candle light.");
        corpus.save().unwrap();

        let opened = CorpusIndex::open(dir.path()).unwrap();
        assert_eq!(opened.graph(), corpus.graph());
        assert_eq!(opened.centroids().len(), 2);

        std::fs::remove_file(dir.path().join(GRAPH_FILE)).unwrap();
        std::fs::remove_file(dir.path().join(CENTROIDS_FILE)).unwrap();
        let rebuilt = CorpusIndex::open(dir.path()).unwrap();
        assert_eq!(rebuilt.centroids().len(), 2);
        assert_eq!(rebuilt.graph().node_count(), 2);
        assert_eq!(rebuilt.graph().neighbors("a.txt")[0].0, "b.txt");
        assert_eq!(
            rebuilt.centroids().vector("a.txt"),
            corpus.centroids().vector("a.txt")
        );
    }
}
