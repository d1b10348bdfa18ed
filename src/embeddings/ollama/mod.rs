
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::http::HttpClient;
use super::{Embedder, validate_embedding};
use crate::config::OllamaConfig;
use crate::{PleaseError, Result};

pub const PROVIDER_NAME: &str = "ollama";

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    dimensions: usize,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config.ollama_url()?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            dimensions: config.embedding_dimension as usize,
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
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check the server is reachable and the configured model is pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;
        if !models.iter().any(|m| model_matches(&m.name, &self.model)) {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            return Err(PleaseError::Provider(format!(
                "model '{}' is not available on {} (available: {})",
                self.model,
                self.base_url,
                available_models.join(", ")
            )));
        }

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Whether the server answers at all; a single attempt, no backoff
    #[inline]
    pub fn ping(&self) -> Result<bool> {
        let url = self.endpoint("/api/tags")?;
        debug!("Pinging Ollama server at {}", url);
        let http = self.http.clone().with_retry_attempts(1);
        Ok(http.get(&url).is_ok())
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self
            .http
            .get(&url)
            .context("Failed to fetch models from Ollama")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Blocking single embedding request
    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.endpoint("/api/embeddings")?;
        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            prompt: text,
        })
        .context("Failed to serialize embedding request")?;

        let response_text = self
            .http
            .post_json(&url, &request_json, None)
            .map_err(|e| PleaseError::Provider(format!("ollama request failed: {:#}", e)))?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            PleaseError::Provider(format!("invalid ollama embedding response: {}", e))
        })?;

        validate_embedding(&response.embedding, self.dimensions)?;
        Ok(response.embedding)
    }

    fn endpoint(&self, route: &str) -> Result<Url> {
        self.base_url
            .join(route)
            .with_context(|| format!("Failed to build Ollama URL for {}", route))
            .map_err(PleaseError::from)
    }
}

/// `nomic-embed-text` matches the `nomic-embed-text:latest` tag Ollama reports
fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted || (!wanted.contains(':') && available == format!("{}:latest", wanted))
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.embed_blocking(&text))
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
