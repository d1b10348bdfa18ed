// Vector storage for command embeddings
// In-memory store for one-off sessions, SQLite store for the persistent cache


pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::documents::Document;
use crate::embeddings::EmbeddingProvenance;
use crate::{PleaseError, Result};

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Typed metadata stored with every vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub command: String,
    pub filename: String,
    /// Source modification time in Unix seconds
    pub file_mtime: i64,
    /// Forward-compatible extra fields
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<&Document> for RecordMetadata {
    #[inline]
    fn from(doc: &Document) -> Self {
        Self {
            command: doc.command.clone(),
            filename: doc.filename.clone(),
            file_mtime: doc.mtime_unix(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Why a cached index can no longer be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The store keeps nothing across processes
    NotPersisted,
    MetadataMissing,
    FormatChanged { cached: String, current: String },
    ProviderChanged { cached: String, current: String },
    ModelChanged { cached: String, current: String },
    DimensionsChanged { cached: usize, current: usize },
    FileModified(String),
    FileDeleted(String),
    FileAdded(String),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPersisted => write!(f, "store is not persistent"),
            Self::MetadataMissing => write!(f, "no cached index metadata"),
            Self::FormatChanged { cached, current } => {
                write!(f, "cache format changed: {} → {}", cached, current)
            }
            Self::ProviderChanged { cached, current } => {
                write!(f, "provider changed: {} → {}", cached, current)
            }
            Self::ModelChanged { cached, current } => {
                write!(f, "model changed: {} → {}", cached, current)
            }
            Self::DimensionsChanged { cached, current } => {
                write!(f, "dimensions changed: {} → {}", cached, current)
            }
            Self::FileModified(file) => write!(f, "file modified: {}", file),
            Self::FileDeleted(file) => write!(f, "file deleted: {}", file),
            Self::FileAdded(file) => write!(f, "new file added: {}", file),
        }
    }
}

/// Result of checking a cached index against the current documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Valid,
    Stale(StaleReason),
}

impl CacheStatus {
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Human-readable reason; empty when valid
    #[inline]
    pub fn reason(&self) -> String {
        match self {
            Self::Valid => String::new(),
            Self::Stale(reason) => reason.to_string(),
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite the vector stored under `id`
    async fn add(&self, id: &str, vector: Vec<f32>, metadata: RecordMetadata) -> Result<()>;

    /// Up to `top_k` records by descending cosine similarity
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    async fn count(&self) -> Result<usize>;

    /// Swap the entire contents for `records` built by `provenance`
    async fn replace_all(
        &self,
        records: Vec<VectorRecord>,
        _provenance: &EmbeddingProvenance,
    ) -> Result<()> {
        self.clear().await?;
        for record in records {
            self.add(&record.id, record.vector, record.metadata).await?;
        }
        Ok(())
    }

    /// Whether the stored vectors can be reused for `documents`
    async fn cache_status(
        &self,
        _documents: &[Document],
        _provenance: &EmbeddingProvenance,
    ) -> Result<CacheStatus> {
        Ok(CacheStatus::Stale(StaleReason::NotPersisted))
    }

    /// Short label for logs and status output
    fn kind(&self) -> &'static str;
}

/// Cosine similarity; zero when either norm is zero or the lengths differ
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f64, 0.0f64, 0.0f64), |(dot, na, nb), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

pub(crate) fn ensure_non_empty(vector: &[f32], what: &str) -> Result<()> {
    if vector.is_empty() {
        return Err(PleaseError::Store(format!("{} vector is empty", what)));
    }
    Ok(())
}

/// Rank scored records, keeping the best `limit`
pub(crate) fn top_k(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}
