#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    RecordMetadata, SearchResult, VectorRecord, VectorStore, cosine_similarity, ensure_non_empty,
    top_k,
};
use crate::Result;
use crate::embeddings::EmbeddingProvenance;

/// Process-lifetime vector store
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, (Vec<f32>, RecordMetadata)>>,
}

impl MemoryVectorStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, id: &str, vector: Vec<f32>, metadata: RecordMetadata) -> Result<()> {
        ensure_non_empty(&vector, "stored")?;
        self.records
            .write()
            .await
            .insert(id.to_string(), (vector, metadata));
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        ensure_non_empty(query, "query")?;

        let records = self.records.read().await;
        debug!("Searching {} in-memory vectors", records.len());

        let scored = records
            .iter()
            .map(|(id, (vector, metadata))| SearchResult {
                id: id.clone(),
                score: cosine_similarity(query, vector),
                metadata: metadata.clone(),
            })
            .collect();

        Ok(top_k(scored, k))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }

    async fn replace_all(
        &self,
        records: Vec<VectorRecord>,
        _provenance: &EmbeddingProvenance,
    ) -> Result<()> {
        for record in &records {
            ensure_non_empty(&record.vector, "stored")?;
        }

        let replacement = records
            .into_iter()
            .map(|r| (r.id, (r.vector, r.metadata)))
            .collect();
        *self.records.write().await = replacement;
        Ok(())
    }

    #[inline]
    fn kind(&self) -> &'static str {
        "memory"
    }
}
