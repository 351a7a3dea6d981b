//! Retriever - lexical, semantic and hybrid queries over one corpus
//!
//! The retriever holds explicit handles to the vector index and passage
//! store it reads; nothing is global. An embedder is only needed for
//! semantic and hybrid queries that arrive without a precomputed vector.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunker::LengthUnit;
use crate::concordance::{query_terms, ConcordanceEngine, ConcordanceHit, TermMatcher};
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::{Passage, PassageStore, VectorIndex};

/// Candidates fetched per requested result in hybrid mode
const HYBRID_OVERFETCH: usize = 5;

/// How a query is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Every occurrence of the query text, in corpus order
    Lexical,
    /// Nearest passages by embedding similarity
    #[default]
    Semantic,
    /// Semantic ranking, lexical hit count as secondary key
    Hybrid,
}

impl std::str::FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexical" | "concordance" => Ok(Self::Lexical),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("Unknown query mode: {}", s)),
        }
    }
}

/// A retrieval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub mode: QueryMode,
    /// Maximum number of items returned
    pub k: usize,
    /// Context window on each side of a hit
    pub context_size: usize,
    pub context_unit: LengthUnit,
    /// Restrict to these document ids; `None` means the whole corpus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<String>>,
}

impl Query {
    pub fn new(text: &str, mode: QueryMode) -> Self {
        Self {
            text: text.to_string(),
            mode,
            k: 5,
            context_size: 60,
            context_unit: LengthUnit::Chars,
            documents: None,
        }
    }

    pub fn lexical(text: &str) -> Self {
        Self::new(text, QueryMode::Lexical)
    }

    pub fn semantic(text: &str) -> Self {
        Self::new(text, QueryMode::Semantic)
    }

    pub fn hybrid(text: &str) -> Self {
        Self::new(text, QueryMode::Hybrid)
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_context(mut self, size: usize, unit: LengthUnit) -> Self {
        self.context_size = size;
        self.context_unit = unit;
        self
    }

    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.documents = Some(documents);
        self
    }
}

/// Rank key of a retrieved passage
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Score {
    /// Cosine similarity in [-1, 1]
    Similarity { value: f32 },
    /// Document offset of a lexical hit
    Position { document_offset: usize },
}

impl Score {
    pub fn similarity(&self) -> Option<f32> {
        match self {
            Score::Similarity { value } => Some(*value),
            Score::Position { .. } => None,
        }
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub passage: Passage,
    pub score: Score,
    /// A hit with its surrounding text, when one was found
    pub context: Option<ConcordanceHit>,
    /// Occurrences of the query (lexical) or its terms (semantic/hybrid) in the passage
    pub lexical_hits: usize,
}

/// Ordered results of one query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub items: Vec<RetrievedPassage>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetrievedPassage> {
        self.items.iter()
    }
}

impl IntoIterator for RetrievalResult {
    type Item = RetrievedPassage;
    type IntoIter = std::vec::IntoIter<RetrievedPassage>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Query façade over a vector index and passage store
#[derive(Clone)]
pub struct Retriever {
    vectors: Arc<VectorIndex>,
    passages: Arc<PassageStore>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Retriever {
    pub fn new(vectors: Arc<VectorIndex>, passages: Arc<PassageStore>) -> Self {
        Self {
            vectors,
            passages,
            embedder: None,
        }
    }

    /// Attach the embedder used for semantic and hybrid queries
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Answer a query, embedding its text when the mode needs a vector
    pub fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        if query.k == 0 || query.text.trim().is_empty() {
            return Ok(RetrievalResult::default());
        }

        match query.mode {
            QueryMode::Lexical => self.lexical(query),
            QueryMode::Semantic | QueryMode::Hybrid => {
                let embedder = self.embedder.as_ref().ok_or_else(|| {
                    Error::ProviderUnavailable("no embedder attached to the retriever".to_string())
                })?;
                let vector = embedder.embed(&query.text)?;
                self.retrieve_with_embedding(query, &vector)
            }
        }
    }

    /// Answer a query whose vector was computed by the caller.
    /// Lexical queries ignore the vector.
    pub fn retrieve_with_embedding(&self, query: &Query, embedding: &[f32]) -> Result<RetrievalResult> {
        if query.k == 0 || query.text.trim().is_empty() {
            return Ok(RetrievalResult::default());
        }

        match query.mode {
            QueryMode::Lexical => self.lexical(query),
            QueryMode::Semantic => self.semantic(query, embedding, query.k),
            QueryMode::Hybrid => self.hybrid(query, embedding),
        }
    }

    fn lexical(&self, query: &Query) -> Result<RetrievalResult> {
        let matcher = TermMatcher::new(&query.text)?;
        let engine = ConcordanceEngine::new(query.context_unit);

        // (document id, document offset) already reported by an earlier passage
        let mut seen: FxHashSet<(String, usize)> = FxHashSet::default();
        let mut items = Vec::new();

        'passages: for passage in self.passages.passages_for(query.documents.as_deref()) {
            let hits = engine.scan_with(&matcher, &passage, query.context_size);
            let count = hits.len();

            for hit in hits {
                if !seen.insert((hit.document_id.clone(), hit.document_offset)) {
                    continue;
                }
                items.push(RetrievedPassage {
                    passage: passage.clone(),
                    score: Score::Position {
                        document_offset: hit.document_offset,
                    },
                    context: Some(hit),
                    lexical_hits: count,
                });
                if items.len() == query.k {
                    break 'passages;
                }
            }
        }

        debug!("Lexical query {:?} -> {} hits", query.text, items.len());
        Ok(RetrievalResult { items })
    }

    fn semantic(&self, query: &Query, embedding: &[f32], limit: usize) -> Result<RetrievalResult> {
        let wanted: Option<FxHashSet<&str>> = query
            .documents
            .as_ref()
            .map(|docs| docs.iter().map(|d| d.as_str()).collect());

        let scored = self.vectors.search_where(embedding, limit, |id| match &wanted {
            None => true,
            Some(docs) => self
                .passages
                .document_of(id)
                .is_some_and(|d| docs.contains(d.as_str())),
        })?;

        let enricher = Enricher::new(query);
        let mut items = Vec::with_capacity(scored.len());
        for hit in scored {
            let passage = self
                .passages
                .get(&hit.passage_id)
                .ok_or_else(|| Error::PassageNotFound(hit.passage_id.clone()))?;
            let (context, lexical_hits) = enricher.enrich(&passage);
            items.push(RetrievedPassage {
                passage,
                score: Score::Similarity { value: hit.score },
                context,
                lexical_hits,
            });
        }

        debug!("Semantic query {:?} -> {} results", query.text, items.len());
        Ok(RetrievalResult { items })
    }

    fn hybrid(&self, query: &Query, embedding: &[f32]) -> Result<RetrievalResult> {
        let candidates = query.k.saturating_mul(HYBRID_OVERFETCH);
        let mut result = self.semantic(query, embedding, candidates)?;

        result.items.sort_by(|a, b| {
            let similarity = |item: &RetrievedPassage| item.score.similarity().unwrap_or(f32::MIN);
            similarity(b)
                .total_cmp(&similarity(a))
                .then_with(|| b.lexical_hits.cmp(&a.lexical_hits))
                .then_with(|| a.passage.id.cmp(&b.passage.id))
        });
        result.items.truncate(query.k);
        Ok(result)
    }
}

/// Best-effort context for semantic results from the query's own terms
struct Enricher {
    engine: ConcordanceEngine,
    context_size: usize,
    matchers: Vec<TermMatcher>,
}

impl Enricher {
    fn new(query: &Query) -> Self {
        let matchers = query_terms(&query.text)
            .iter()
            .filter_map(|t| TermMatcher::new(t).ok())
            .collect();

        Self {
            engine: ConcordanceEngine::new(query.context_unit),
            context_size: query.context_size,
            matchers,
        }
    }

    /// First hit of the most frequent query term, plus the total term hit count
    fn enrich(&self, passage: &Passage) -> (Option<ConcordanceHit>, usize) {
        let counts: Vec<usize> = self.matchers.iter().map(|m| m.count(&passage.text)).collect();
        let total = counts.iter().sum();

        // max_by_key keeps the last maximum, so scan in reverse to prefer earlier terms
        let best = counts
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, count)| **count)
            .filter(|(_, count)| **count > 0)
            .map(|(i, _)| &self.matchers[i]);

        let context = best.and_then(|m| {
            self.engine
                .scan_with(m, passage, self.context_size)
                .into_iter()
                .next()
        });
        (context, total)
    }
}
