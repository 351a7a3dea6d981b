//! OpenAI-compatible embedding provider

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::known_dimensions;
use crate::error::{Error, Result};
use crate::http::{check_response, create_client, request_error};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI embedding provider, also usable against compatible servers
pub struct OpenAIEmbedding {
    client: Client,
    base_url: String,
    api_key: String,
    model_name: String,
    dimensions: usize,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbedding {
    /// Create a new OpenAI embedding provider
    pub fn new(
        model_name: String,
        api_key: Option<String>,
        base_url: Option<String>,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| Error::InvalidConfiguration("OPENAI_API_KEY not set".to_string()))?;

        let base_url = base_url
            .or_else(|| env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = create_client(timeout)?;

        // Unknown models are detected on first use
        let dimensions = known_dimensions(&model_name).unwrap_or(0);

        let shown_dims = if dimensions == 0 {
            "auto".to_string()
        } else {
            dimensions.to_string()
        };
        info!(
            "OpenAI embedding provider: {} @ {} ({} dims)",
            model_name, base_url, shown_dims
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            model_name,
            dimensions,
            batch_size: batch_size.max(1),
        })
    }

    /// Get dimensions (0 until detected for unknown models)
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
            let request = EmbeddingRequest {
                model: &self.model_name,
                input: batch,
            };

            let response = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| request_error("OpenAI", e))?;
            let response = check_response(response, "OpenAI").await?;

            let mut body: EmbeddingResponse = response
                .json()
                .await
                .map_err(|e| request_error("OpenAI", e))?;
            if body.data.len() != batch.len() {
                return Err(Error::ProviderUnavailable(format!(
                    "OpenAI returned {} embeddings for {} inputs",
                    body.data.len(),
                    batch.len()
                )));
            }

            body.data.sort_by_key(|d| d.index);
            debug!("OpenAI embedded batch of {}", batch.len());
            all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
        }

        Ok(all_embeddings)
    }
}
