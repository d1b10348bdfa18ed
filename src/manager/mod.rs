// Retrieval manager
// Owns the loaded docs and matchers behind a reader-writer lock


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{PleaseError, Result};
use crate::config::Config;
use crate::documents::{self, Document, ParseFailures, PromptDoc};
use crate::embeddings;
use crate::matching::{HybridMatcher, SemanticMatcher, Strategy};
use crate::vector_store::{CacheStatus, MemoryVectorStore, SqliteVectorStore, VectorStore};

/// Anything that can hand relevant docs to prompt construction.
///
/// Never fails: missing context degrades to an empty list.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn relevant_prompt_docs(&self, query: &str, max_docs: usize) -> Vec<PromptDoc>;
}

#[derive(Debug)]
pub struct LoadReport {
    pub loaded: usize,
    pub failures: ParseFailures,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// No embedding provider configured
    KeywordOnly,
    /// Cached vectors matched the current docs
    Reused,
    /// Everything was re-embedded; carries the stale-cache reason unless forced
    Rebuilt { reason: Option<String> },
}

#[derive(Debug)]
pub struct IndexReport {
    pub load: LoadReport,
    pub outcome: IndexOutcome,
}

#[derive(Debug, Default)]
struct State {
    matcher: HybridMatcher,
    loaded_files: Vec<PathBuf>,
    loaded_at: Option<DateTime<Utc>>,
    indexed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct Manager {
    commands_dir: PathBuf,
    enabled: bool,
    state: RwLock<State>,
}

impl Manager {
    #[inline]
    pub fn new<P: AsRef<Path>>(
        commands_dir: P,
        strategy: Strategy,
        semantic: Option<SemanticMatcher>,
    ) -> Self {
        Self {
            commands_dir: commands_dir.as_ref().to_path_buf(),
            enabled: true,
            state: RwLock::new(State {
                matcher: HybridMatcher::new(strategy, semantic),
                ..State::default()
            }),
        }
    }

    /// Build from configuration.
    ///
    /// Uses the SQLite cache when an embedding provider is configured, falling
    /// back to an in-memory store if the cache cannot be opened.
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let semantic = match embeddings::create_embedder(config)? {
            Some(embedder) => Some(SemanticMatcher::new(
                embedder,
                open_store(&config.embeddings_db_path()).await,
            )),
            None => None,
        };

        let mut manager = Self::new(
            config.commands_dir(),
            config.retrieval.strategy,
            semantic,
        );
        manager.enabled = config.retrieval.enabled;
        Ok(manager)
    }

    /// Build from configuration and prepare for answering queries.
    ///
    /// `strategy` overrides the configured one. An unusable embedding provider
    /// only fails the semantic strategy; the others fall back to keyword
    /// matching over the loaded docs.
    #[inline]
    pub async fn for_queries(config: &Config, strategy: Option<Strategy>) -> Result<Self> {
        let strategy = strategy.unwrap_or(config.retrieval.strategy);

        let mut manager = match Self::from_config(config).await {
            Ok(manager) => manager,
            Err(e) if strategy != Strategy::Semantic => {
                warn!("Embedding provider unavailable, using keyword matching: {}", e);
                Self::new(config.commands_dir(), strategy, None)
            }
            Err(e) => return Err(e),
        };
        manager.enabled = config.retrieval.enabled;
        manager.set_strategy(strategy).await;

        manager.prepare().await?;
        Ok(manager)
    }

    #[inline]
    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub async fn strategy(&self) -> Strategy {
        self.state.read().await.matcher.strategy()
    }

    #[inline]
    pub async fn set_strategy(&self, strategy: Strategy) {
        self.state.write().await.matcher.set_strategy(strategy);
    }

    /// (Re)load every command doc from the commands directory
    #[inline]
    pub async fn load(&self) -> Result<LoadReport> {
        let mut state = self.state.write().await;
        self.load_into(&mut state)
    }

    fn load_into(&self, state: &mut State) -> Result<LoadReport> {
        let loaded_files = documents::command_files(&self.commands_dir)?;
        let outcome = documents::load_dir(&self.commands_dir)?;

        if let Some(failures) = outcome.warning() {
            warn!("{}", failures);
        }

        let loaded = outcome.documents.len();
        state.matcher.set_docs(outcome.documents);
        state.loaded_files = loaded_files;
        state.loaded_at = Some(Utc::now());

        Ok(LoadReport {
            loaded,
            failures: outcome.failures,
        })
    }

    /// Load docs, then build or reuse the semantic index.
    ///
    /// Without `force`, a valid persistent cache is reused as-is. The write
    /// lock is held for the whole operation.
    #[inline]
    pub async fn index(&self, force: bool) -> Result<IndexReport> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let load = self.load_into(state)?;

        if !self.enabled {
            return Ok(IndexReport {
                load,
                outcome: IndexOutcome::KeywordOnly,
            });
        }

        let docs = state.matcher.docs().to_vec();
        let Some(semantic) = state.matcher.semantic_mut() else {
            debug!("No embedding provider configured, keyword matching only");
            return Ok(IndexReport {
                load,
                outcome: IndexOutcome::KeywordOnly,
            });
        };

        let mut reason = None;
        if !force {
            match semantic.cache_status(&docs).await {
                Ok(CacheStatus::Valid) => {
                    info!("Embeddings cache is valid, reusing {} vectors", docs.len());
                    semantic.attach(docs);
                    state.indexed_at = Some(Utc::now());
                    return Ok(IndexReport {
                        load,
                        outcome: IndexOutcome::Reused,
                    });
                }
                Ok(CacheStatus::Stale(stale)) => {
                    info!("Rebuilding embeddings: {}", stale);
                    reason = Some(stale.to_string());
                }
                Err(e) => {
                    warn!("Could not validate embeddings cache, rebuilding: {}", e);
                    reason = Some(e.to_string());
                }
            }
        }

        semantic.index(docs).await?;
        state.indexed_at = Some(Utc::now());

        Ok(IndexReport {
            load,
            outcome: IndexOutcome::Rebuilt { reason },
        })
    }

    /// Index for querying, reusing a valid cache.
    ///
    /// Provider and cache failures are logged and leave the docs loaded for
    /// keyword matching, except under the semantic strategy where they are
    /// returned.
    #[inline]
    pub async fn prepare(&self) -> Result<()> {
        let strategy = self.strategy().await;
        match self.index(false).await {
            Ok(_) => Ok(()),
            Err(e @ (PleaseError::Provider(_) | PleaseError::Store(_)))
                if strategy != Strategy::Semantic =>
            {
                warn!("Semantic index unavailable, using keyword matching: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Relevant docs for `query` under the active strategy
    #[inline]
    pub async fn relevant_docs(&self, query: &str, max_docs: usize) -> Result<Vec<Document>> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let docs = state.matcher.find_relevant_docs(query, max_docs).await?;
        Ok(docs.into_iter().cloned().collect())
    }

    /// Prompt projections of the relevant docs; failures yield an empty list
    #[inline]
    pub async fn relevant_prompt_docs(&self, query: &str, max_docs: usize) -> Vec<PromptDoc> {
        match self.relevant_docs(query, max_docs).await {
            Ok(docs) => docs.iter().map(PromptDoc::from).collect(),
            Err(e) => {
                warn!("Retrieval failed, continuing without command docs: {}", e);
                Vec::new()
            }
        }
    }

    #[inline]
    pub async fn is_indexed(&self) -> bool {
        self.state.read().await.matcher.is_semantic_indexed()
    }

    /// When the semantic index was last built or reused
    #[inline]
    pub async fn index_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.indexed_at
    }

    /// Whether the commands directory changed since the last load.
    ///
    /// True before the first load, when the set of loadable files differs,
    /// or when any file was modified after loading.
    #[inline]
    pub async fn needs_reindex(&self) -> Result<bool> {
        let state = self.state.read().await;
        let Some(loaded_at) = state.loaded_at else {
            return Ok(true);
        };

        let files = documents::command_files(&self.commands_dir)?;
        if files != state.loaded_files {
            return Ok(true);
        }

        for file in &files {
            let modified: DateTime<Utc> = std::fs::metadata(file)?.modified()?.into();
            if modified > loaded_at {
                debug!("{} changed since last load", file.display());
                return Ok(true);
            }
        }

        Ok(false)
    }

    #[inline]
    pub async fn count(&self) -> usize {
        self.state.read().await.matcher.docs().len()
    }

    /// Copy of the loaded docs
    #[inline]
    pub async fn docs(&self) -> Vec<Document> {
        self.state.read().await.matcher.docs().to_vec()
    }

    /// Cache validity for the loaded docs; `None` without a provider
    #[inline]
    pub async fn cache_status(&self) -> Result<Option<CacheStatus>> {
        let state = self.state.read().await;
        match state.matcher.semantic() {
            Some(semantic) => Ok(Some(semantic.cache_status(state.matcher.docs()).await?)),
            None => Ok(None),
        }
    }

    /// `provider/model` of the embedder plus the store kind, if any
    #[inline]
    pub async fn semantic_backend(&self) -> Option<(String, &'static str)> {
        let state = self.state.read().await;
        state
            .matcher
            .semantic()
            .map(|s| (s.embedder().name(), s.store().kind()))
    }
}

#[async_trait]
impl DocumentSource for Manager {
    async fn relevant_prompt_docs(&self, query: &str, max_docs: usize) -> Vec<PromptDoc> {
        Manager::relevant_prompt_docs(self, query, max_docs).await
    }
}

async fn open_store(path: &Path) -> Arc<dyn VectorStore> {
    match SqliteVectorStore::open(path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                "Embeddings cache at {} unavailable, using in-memory store: {}",
                path.display(),
                e
            );
            Arc::new(MemoryVectorStore::new())
        }
    }
}
