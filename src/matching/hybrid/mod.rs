#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use super::{KeywordMatcher, SemanticMatcher};
use crate::documents::Document;
use crate::{PleaseError, Result};

/// How relevant documents are selected for a query
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Keyword,
    Semantic,
    /// Keyword first; embeddings only when nothing matched lexically
    #[default]
    Hybrid,
}

impl fmt::Display for Strategy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword => write!(f, "keyword"),
            Self::Semantic => write!(f, "semantic"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Keyword matcher plus an optional semantic matcher behind one strategy
#[derive(Debug, Default)]
pub struct HybridMatcher {
    keyword: KeywordMatcher,
    semantic: Option<SemanticMatcher>,
    strategy: Strategy,
}

impl HybridMatcher {
    #[inline]
    pub fn new(strategy: Strategy, semantic: Option<SemanticMatcher>) -> Self {
        Self {
            keyword: KeywordMatcher::default(),
            semantic,
            strategy,
        }
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[inline]
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    /// Replace the document set.
    ///
    /// Any semantic index belongs to the previous set, so it is dropped and
    /// semantic matching stays unavailable until `index_semantic` runs again.
    #[inline]
    pub fn set_docs(&mut self, docs: Vec<Document>) {
        self.keyword.set_docs(docs);
        if let Some(semantic) = self.semantic.as_mut() {
            semantic.reset();
        }
    }

    #[inline]
    pub fn docs(&self) -> &[Document] {
        self.keyword.docs()
    }

    #[inline]
    pub fn keyword(&self) -> &KeywordMatcher {
        &self.keyword
    }

    #[inline]
    pub fn semantic(&self) -> Option<&SemanticMatcher> {
        self.semantic.as_ref()
    }

    #[inline]
    pub fn semantic_mut(&mut self) -> Option<&mut SemanticMatcher> {
        self.semantic.as_mut()
    }

    #[inline]
    pub fn is_semantic_indexed(&self) -> bool {
        self.semantic.as_ref().is_some_and(SemanticMatcher::is_indexed)
    }

    /// Embed the current document set; a no-op without a semantic matcher
    #[inline]
    pub async fn index_semantic(&mut self) -> Result<()> {
        let docs = self.keyword.docs().to_vec();
        match self.semantic.as_mut() {
            Some(semantic) => semantic.index(docs).await,
            None => Ok(()),
        }
    }

    /// Up to `max_docs` documents for `query` under the active strategy.
    ///
    /// Only the semantic strategy can fail; hybrid swallows semantic errors
    /// and returns the (empty) keyword result instead.
    #[inline]
    pub async fn find_relevant_docs(&self, query: &str, max_docs: usize) -> Result<Vec<&Document>> {
        match self.strategy {
            Strategy::Keyword => Ok(self.keyword.find_relevant_docs(query, max_docs)),
            Strategy::Semantic => self.semantic_docs(query, max_docs).await,
            Strategy::Hybrid => Ok(self.hybrid_docs(query, max_docs).await),
        }
    }

    async fn semantic_docs(&self, query: &str, max_docs: usize) -> Result<Vec<&Document>> {
        let semantic = self.semantic.as_ref().ok_or(PleaseError::NotIndexed)?;
        Ok(semantic
            .search(query, max_docs)
            .await?
            .into_iter()
            .map(|s| s.document)
            .collect())
    }

    async fn hybrid_docs(&self, query: &str, max_docs: usize) -> Vec<&Document> {
        let keyword_docs = self.keyword.find_relevant_docs(query, max_docs);
        if !keyword_docs.is_empty() {
            debug!("Keyword fast path matched {} docs", keyword_docs.len());
            return keyword_docs;
        }

        if !self.is_semantic_indexed() {
            return keyword_docs;
        }

        debug!("No keyword matches, falling back to semantic search");
        match self.semantic_docs(query, max_docs).await {
            Ok(docs) if !docs.is_empty() => docs,
            Ok(_) => keyword_docs,
            Err(e) => {
                warn!("Semantic fallback failed: {}", e);
                keyword_docs
            }
        }
    }
}
