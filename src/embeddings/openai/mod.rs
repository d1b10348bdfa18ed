
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::http::HttpClient;
use super::{Embedder, validate_embedding};
use crate::config::OpenAiConfig;
use crate::{PleaseError, Result};

pub const PROVIDER_NAME: &str = "openai";

/// Output sizes of the hosted embedding models
#[inline]
pub fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    endpoint: Url,
    api_key: String,
    model: String,
    dimensions: usize,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedder {
    /// Build an embedder for `config.model`.
    ///
    /// Unknown models need `embedding_dimension` set in the configuration.
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(PleaseError::Config("OpenAI API key is empty".to_string()));
        }

        let dimensions = config
            .embedding_dimension
            .map(|d| d as usize)
            .or_else(|| known_dimensions(&config.model))
            .ok_or_else(|| {
                PleaseError::Config(format!(
                    "unknown dimensions for OpenAI model '{}'; set openai.embedding_dimension",
                    config.model
                ))
            })?;

        let base_url = config.api_url()?;
        let endpoint = Url::parse(&format!(
            "{}/v1/embeddings",
            base_url.as_str().trim_end_matches('/')
        ))
        .context("Failed to build OpenAI embeddings URL")?;

        Ok(Self {
            endpoint,
            api_key,
            model: config.model.clone(),
            dimensions,
            http: HttpClient::default(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Blocking single embedding request
    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.request(EmbeddingInput::Single(text), 1)?;
        embeddings
            .pop()
            .ok_or_else(|| PleaseError::Provider("no embedding returned".to_string()))
    }

    /// Blocking batch request; one round trip for every input
    #[inline]
    pub fn embed_batch_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(EmbeddingInput::Batch(texts), texts.len())
    }

    fn request(&self, input: EmbeddingInput<'_>, expected: usize) -> Result<Vec<Vec<f32>>> {
        debug!("Requesting {} OpenAI embedding(s) from {}", expected, self.model);

        let request_json = serde_json::to_string(&EmbeddingsRequest {
            model: &self.model,
            input,
        })
        .context("Failed to serialize embedding request")?;

        let response_text = self
            .http
            .post_json(&self.endpoint, &request_json, Some(&self.api_key))
            .map_err(|e| PleaseError::Provider(format!("openai request failed: {:#}", e)))?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text).map_err(|e| {
            PleaseError::Provider(format!("invalid openai embedding response: {}", e))
        })?;

        self.collect_ordered(response.data, expected)
    }

    /// Place each returned vector at its `index`, rejecting gaps and strays
    fn collect_ordered(&self, data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(PleaseError::Provider(format!(
                "expected {} embeddings, got {}",
                expected,
                data.len()
            )));
        }

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
        for item in data {
            validate_embedding(&item.embedding, self.dimensions)?;
            let slot = slots.get_mut(item.index).ok_or_else(|| {
                PleaseError::Provider(format!("embedding index {} out of range", item.index))
            })?;
            *slot = Some(item.embedding);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| PleaseError::Provider(format!("missing embedding for input {}", i)))
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.embed_blocking(&text))
            .await
            .map_err(|e| PleaseError::Provider(format!("embedding task failed: {}", e)))?
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || client.embed_batch_blocking(&texts))
            .await
            .map_err(|e| PleaseError::Provider(format!("embedding task failed: {}", e)))?
    }

    #[inline]
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[inline]
    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }
}
