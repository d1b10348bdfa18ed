// Embeddings module
// Provider abstraction over the HTTP embedding backends


pub mod http;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, EmbeddingProvider};
use crate::{PleaseError, Result};

pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

/// Turns text into fixed-length vectors.
///
/// Every vector returned by one instance has length [`Embedder::dimensions`].
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize;

    /// Provider identifier, e.g. `ollama`
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    fn name(&self) -> String {
        format!("{}/{}", self.provider(), self.model())
    }

    fn provenance(&self) -> EmbeddingProvenance {
        EmbeddingProvenance {
            provider: self.provider().to_string(),
            model: self.model().to_string(),
            dimensions: self.dimensions(),
        }
    }
}

/// The (provider, model, dimensions) triple a cached vector set was built with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingProvenance {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl fmt::Display for EmbeddingProvenance {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}d)", self.provider, self.model, self.dimensions)
    }
}

/// Reject vectors that are empty or of the wrong length
pub(crate) fn validate_embedding(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.is_empty() {
        return Err(PleaseError::Provider(
            "provider returned an empty embedding".to_string(),
        ));
    }
    if embedding.len() != expected {
        return Err(PleaseError::Provider(format!(
            "embedding dimension mismatch: expected {}, got {}",
            expected,
            embedding.len()
        )));
    }
    Ok(())
}

/// Build the embedder selected in the configuration; `None` when retrieval
/// runs keyword-only
#[inline]
pub fn create_embedder(config: &Config) -> Result<Option<Arc<dyn Embedder>>> {
    if !config.retrieval.enabled {
        return Ok(None);
    }

    let embedder: Arc<dyn Embedder> = match config.retrieval.provider {
        EmbeddingProvider::None => return Ok(None),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(&config.ollama)?),
        EmbeddingProvider::OpenAi => {
            let api_key = config.openai.resolve_api_key().ok_or_else(|| {
                PleaseError::Config(
                    "OpenAI provider selected but no API key found; set OPENAI_API_KEY or openai.api_key"
                        .to_string(),
                )
            })?;
            Arc::new(OpenAiEmbedder::new(&config.openai, api_key)?)
        }
    };

    info!("Using embedding provider {}", embedder.provenance());
    Ok(Some(embedder))
}
