//! Embedding provider traits

use async_trait::async_trait;

use crate::error::Result;

/// Single-text embedding capability consumed by the retriever
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimensions(&self) -> usize;

    /// Embed one text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Trait for batch embedding providers used during ingestion
#[async_trait]
pub trait EmbeddingProviderTrait: Send + Sync {
    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Compute embeddings for texts, one vector per input in order
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed passages for storage; providers may add a model-specific prefix
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts).await
    }
}
