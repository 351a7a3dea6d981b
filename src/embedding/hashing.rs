//! Feature-hashing embedder - deterministic, offline

use std::hash::Hasher;

use async_trait::async_trait;
use rustc_hash::FxHasher;

use super::traits::{Embedder, EmbeddingProviderTrait};
use crate::concordance::normalize_token;
use crate::error::{Error, Result};

/// Default vector length for the hash embedder
pub const DEFAULT_HASH_DIMENSIONS: usize = 256;

/// Maps each normalized word to a signed bucket and L2-normalizes the counts.
///
/// Texts sharing words get positive cosine similarity. The same text always
/// produces the same vector, across processes and machines.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::InvalidConfiguration(
                "hash embedder needs at least one dimension".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    /// Embed without going through either trait
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text.split_whitespace().map(normalize_token) {
            if token.is_empty() {
                continue;
            }
            let mut hasher = FxHasher::default();
            hasher.write(token.as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_HASH_DIMENSIONS,
        }
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

#[async_trait]
impl EmbeddingProviderTrait for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cosine;

    fn sim(e: &HashEmbedder, a: &str, b: &str) -> f32 {
        let (va, vb) = (e.embed_text(a), e.embed_text(b));
        let norm = |v: &[f32]| v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        cosine(&va, norm(&va), &vb, norm(&vb))
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let e = HashEmbedder::new(64).unwrap();
        let a = e.embed_text("The seal of Solomon");
        assert_eq!(a, e.embed_text("the SEAL of solomon!"));
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let e = HashEmbedder::default();
        let near = sim(&e, "seal of solomon", "the solomon seal drawing");
        assert!(near > 0.3);
        assert!((sim(&e, "identical text here", "identical text here") - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashEmbedder::new(8).unwrap();
        assert_eq!(Embedder::embed(&e, "  ").unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(HashEmbedder::new(0).is_err());
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let e = HashEmbedder::new(32).unwrap();
        let batch = EmbeddingProviderTrait::embed(&e, &["alpha", "beta"]).await.unwrap();
        assert_eq!(batch[1], e.embed_text("beta"));
        assert_eq!(EmbeddingProviderTrait::dimensions(&e), 32);
    }
}
