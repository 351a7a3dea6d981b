//! Embedding module - compute embeddings from text

mod hashing;
mod models;
mod ollama;
mod openai;
mod traits;

pub use hashing::{HashEmbedder, DEFAULT_HASH_DIMENSIONS};
pub use models::{known_dimensions, model_profile, ModelProfile};
pub use traits::{Embedder, EmbeddingProviderTrait};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::{Error, Result};

/// Embedding mode configuration
#[derive(Debug, Clone)]
pub enum EmbeddingMode {
    OpenAI {
        api_key: Option<String>,
        base_url: Option<String>,
    },
    Ollama {
        host: Option<String>,
    },
    /// Offline feature hashing; the model name is ignored
    Hash { dimensions: usize },
}

impl EmbeddingMode {
    /// Name recorded in corpus metadata
    pub fn name(&self) -> &'static str {
        match self {
            EmbeddingMode::OpenAI { .. } => "openai",
            EmbeddingMode::Ollama { .. } => "ollama",
            EmbeddingMode::Hash { .. } => "hash",
        }
    }
}

/// Request shaping shared by the HTTP providers
#[derive(Debug, Clone, Copy)]
pub struct ProviderOptions {
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Unified embedding provider
pub struct EmbeddingProvider {
    model_name: String,
    mode_name: &'static str,
    dimensions: usize,
    profile: Option<ModelProfile>,
    inner: EmbeddingProviderInner,
}

enum EmbeddingProviderInner {
    OpenAI(openai::OpenAIEmbedding),
    Ollama(ollama::OllamaEmbedding),
    Hash(HashEmbedder),
}

impl EmbeddingProvider {
    /// Create a new embedding provider, probing the server when the
    /// model's vector length is not known in advance
    pub async fn new(model_name: String, mode: EmbeddingMode, options: ProviderOptions) -> Result<Self> {
        let mode_name = mode.name();
        let (inner, dimensions) = match mode {
            EmbeddingMode::OpenAI { api_key, base_url } => {
                let mut provider = openai::OpenAIEmbedding::new(
                    model_name.clone(),
                    api_key,
                    base_url,
                    options.batch_size,
                    options.timeout,
                )?;
                if provider.dimensions() == 0 {
                    let dims = probe_dimensions(provider.embed(&["test"]).await?)?;
                    info!("Auto-detected embedding dimensions: {}", dims);
                    provider.set_dimensions(dims);
                }
                let dims = provider.dimensions();
                (EmbeddingProviderInner::OpenAI(provider), dims)
            }
            EmbeddingMode::Ollama { host } => {
                let mut provider = ollama::OllamaEmbedding::new(
                    model_name.clone(),
                    host,
                    options.batch_size,
                    options.timeout,
                )?;
                if known_dimensions(&model_name).is_none() {
                    let dims = probe_dimensions(provider.embed(&["test"]).await?)?;
                    info!("Auto-detected embedding dimensions: {}", dims);
                    provider.set_dimensions(dims);
                }
                let dims = provider.dimensions();
                (EmbeddingProviderInner::Ollama(provider), dims)
            }
            EmbeddingMode::Hash { dimensions } => {
                let provider = HashEmbedder::new(dimensions)?;
                (EmbeddingProviderInner::Hash(provider), dimensions)
            }
        };

        info!(
            "Initialized embedding provider: {} ({} dims)",
            model_name, dimensions
        );

        let profile = match mode_name {
            "hash" => None,
            _ => model_profile(&model_name),
        };

        Ok(Self {
            model_name,
            mode_name,
            dimensions,
            profile,
            inner,
        })
    }

    /// Get model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Provider kind (openai, ollama, hash)
    pub fn mode_name(&self) -> &'static str {
        self.mode_name
    }

    /// Embed a search query, applying the model's query prefix
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let prefix = self.profile.map_or("", |p| p.query_prefix);
        let mut vectors = self.embed_with_prefix(&[text], prefix).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::ProviderUnavailable("provider returned no embedding".to_string()))
    }

    async fn embed_with_prefix(&self, texts: &[&str], prefix: &str) -> Result<Vec<Vec<f32>>> {
        if prefix.is_empty() {
            return self.embed(texts).await;
        }

        let prefixed: Vec<String> = texts.iter().map(|t| format!("{}{}", prefix, t)).collect();
        let refs: Vec<&str> = prefixed.iter().map(|s| s.as_str()).collect();
        self.embed(&refs).await
    }
}

#[async_trait]
impl EmbeddingProviderTrait for EmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match &self.inner {
            EmbeddingProviderInner::OpenAI(p) => p.embed(texts).await,
            EmbeddingProviderInner::Ollama(p) => p.embed(texts).await,
            EmbeddingProviderInner::Hash(p) => EmbeddingProviderTrait::embed(p, texts).await,
        }
    }

    /// Applies the model's document prefix
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let prefix = self.profile.map_or("", |p| p.document_prefix);
        self.embed_with_prefix(texts, prefix).await
    }
}

/// Await a provider call, reporting expiry as [`Error::ProviderUnavailable`]
pub async fn with_deadline<F, T>(timeout: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        None => call.await,
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            Error::ProviderUnavailable(format!("no answer within {}s", limit.as_secs_f32()))
        })?,
    }
}

fn probe_dimensions(vectors: Vec<Vec<f32>>) -> Result<usize> {
    match vectors.first() {
        Some(v) if !v.is_empty() => Ok(v.len()),
        _ => Err(Error::ProviderUnavailable(
            "provider returned an empty probe embedding".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_provider() {
        let provider = EmbeddingProvider::new(
            "fx".to_string(),
            EmbeddingMode::Hash { dimensions: 16 },
            ProviderOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(provider.dimensions(), 16);
        assert_eq!(provider.mode_name(), "hash");

        let docs = provider.embed_documents(&["one", "two"]).await.unwrap();
        assert_eq!(docs.len(), 2);
        let query = provider.embed_query("one").await.unwrap();
        assert_eq!(query, docs[0]);
    }

    #[test]
    fn test_mode_names() {
        let mode = EmbeddingMode::OpenAI {
            api_key: None,
            base_url: None,
        };
        assert_eq!(mode.name(), "openai");
        assert_eq!(EmbeddingMode::Ollama { host: None }.name(), "ollama");
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1)
        };
        let err = with_deadline(Some(Duration::from_millis(10)), slow).await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));

        let fast = async { Ok::<_, Error>(2) };
        assert_eq!(with_deadline(None, fast).await.unwrap(), 2);
    }

    #[test]
    fn test_probe_dimensions() {
        assert_eq!(probe_dimensions(vec![vec![0.1; 12]]).unwrap(), 12);
        assert!(probe_dimensions(Vec::new()).is_err());
    }
}
