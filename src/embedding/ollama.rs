//! Ollama embedding provider

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::known_dimensions;
use crate::error::{Error, Result};
use crate::http::{check_response, create_client, request_error};

/// Ollama embedding provider
pub struct OllamaEmbedding {
    client: Client,
    host: String,
    model_name: String,
    dimensions: usize,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding provider
    pub fn new(model_name: String, host: Option<String>, batch_size: usize, timeout: Duration) -> Result<Self> {
        let host = host
            .or_else(|| env::var("CORPUSFLOWER_OLLAMA_HOST").ok())
            .or_else(|| env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let host = host.trim_end_matches('/').to_string();

        let client = create_client(timeout)?;
        let dimensions = known_dimensions(&model_name).unwrap_or(768);

        info!(
            "Ollama embedding provider: {} @ {} ({} dims)",
            model_name, host, dimensions
        );

        Ok(Self {
            client,
            host,
            model_name,
            dimensions,
            batch_size: batch_size.max(1),
        })
    }

    /// Get dimensions
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub(crate) fn set_dimensions(&mut self, dimensions: usize) {
        self.dimensions = dimensions;
    }

    /// Compute embeddings
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = EmbedRequest {
                model: &self.model_name,
                input: batch,
            };

            let response = self
                .client
                .post(format!("{}/api/embed", self.host))
                .json(&request)
                .send()
                .await
                .map_err(|e| request_error("Ollama", e))?;
            let response = check_response(response, "Ollama").await?;

            let embed_response: EmbedResponse = response
                .json()
                .await
                .map_err(|e| request_error("Ollama", e))?;
            if embed_response.embeddings.len() != batch.len() {
                return Err(Error::ProviderUnavailable(format!(
                    "Ollama returned {} embeddings for {} inputs",
                    embed_response.embeddings.len(),
                    batch.len()
                )));
            }
            debug!("Ollama embedded batch of {}", batch.len());
            all_embeddings.extend(embed_response.embeddings);
        }

        Ok(all_embeddings)
    }
}
