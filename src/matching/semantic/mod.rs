
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::ScoredDocument;
use crate::documents::Document;
use crate::embeddings::Embedder;
use crate::vector_store::{CacheStatus, RecordMetadata, VectorRecord, VectorStore};
use crate::{PleaseError, Result};

/// Embedding search over a document set
pub struct SemanticMatcher {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    docs: Vec<Document>,
    by_id: HashMap<String, usize>,
    indexed: bool,
}

impl std::fmt::Debug for SemanticMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticMatcher")
            .field("embedder", &self.embedder.name())
            .field("store", &self.store.kind())
            .field("docs", &self.docs.len())
            .field("indexed", &self.indexed)
            .finish()
    }
}

impl SemanticMatcher {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            docs: Vec::new(),
            by_id: HashMap::new(),
            indexed: false,
        }
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    #[inline]
    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Whether the store's vectors are reusable for `docs` with this embedder
    #[inline]
    pub async fn cache_status(&self, docs: &[Document]) -> Result<CacheStatus> {
        self.store
            .cache_status(docs, &self.embedder.provenance())
            .await
    }

    /// Embed every document and replace the store contents.
    ///
    /// All embeddings are computed before the store is touched, so a failure
    /// leaves the previous contents in place. The matcher is unindexed until
    /// the call succeeds.
    #[inline]
    pub async fn index(&mut self, docs: Vec<Document>) -> Result<()> {
        self.indexed = false;
        info!(
            "Indexing {} docs with {}",
            docs.len(),
            self.embedder.name()
        );

        let mut records = Vec::with_capacity(docs.len());
        for doc in &docs {
            let vector = self
                .embedder
                .embed(&doc.search_text())
                .await
                .map_err(|e| {
                    let cause = match e {
                        PleaseError::Provider(message) => message,
                        other => other.to_string(),
                    };
                    PleaseError::Provider(format!(
                        "failed to embed '{}' ({}): {}",
                        doc.command, doc.filename, cause
                    ))
                })?;
            debug!("Embedded {} ({} dims)", doc.command, vector.len());

            records.push(VectorRecord {
                id: doc.vector_id(),
                vector,
                metadata: RecordMetadata::from(doc),
            });
        }

        self.store
            .replace_all(records, &self.embedder.provenance())
            .await?;

        self.attach(docs);
        info!("Semantic index ready ({} docs)", self.docs.len());
        Ok(())
    }

    /// Adopt `docs` as already indexed, for a store whose cache is valid
    #[inline]
    pub fn attach(&mut self, docs: Vec<Document>) {
        self.by_id = docs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.vector_id(), i))
            .collect();
        self.docs = docs;
        self.indexed = true;
    }

    /// Forget the adopted documents; the matcher is unindexed until the next
    /// `index` or `attach`
    #[inline]
    pub fn reset(&mut self) {
        self.docs.clear();
        self.by_id.clear();
        self.indexed = false;
    }

    /// Documents most similar to `query`, best first
    #[inline]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument<'_, f32>>> {
        if !self.indexed {
            return Err(PleaseError::NotIndexed);
        }

        let query_vector = self.embedder.embed(query).await?;
        let results = self.store.search(&query_vector, top_k).await?;

        let scored: Vec<ScoredDocument<'_, f32>> = results
            .into_iter()
            .filter_map(|result| {
                let doc = self.by_id.get(&result.id).and_then(|&i| self.docs.get(i));
                if doc.is_none() {
                    debug!("Ignoring vector {} with no loaded document", result.id);
                }
                doc.map(|document| ScoredDocument {
                    document,
                    score: result.score,
                })
            })
            .collect();

        debug!("Semantic search returned {} docs", scored.len());
        Ok(scored)
    }
}
