
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{
    CacheStatus, RecordMetadata, SearchResult, StaleReason, VectorRecord, VectorStore,
    cosine_similarity, ensure_non_empty, top_k,
};
use crate::documents::Document;
use crate::embeddings::EmbeddingProvenance;
use crate::{PleaseError, Result};

/// Layout version of the cached rows and blobs
pub const CACHE_FORMAT_VERSION: &str = "1";

const KEY_VERSION: &str = "version";
const KEY_PROVIDER: &str = "provider";
const KEY_MODEL: &str = "model";
const KEY_DIMENSIONS: &str = "dimensions";
const KEY_INDEXED_AT: &str = "indexed_at";

pub type DbPool = Pool<Sqlite>;

type EmbeddingRow = (String, String, String, i64, Vec<u8>, Option<String>);

/// Persistent embeddings cache in a single SQLite file
#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: DbPool,
    path: PathBuf,
}

/// Encode a vector as consecutive little-endian f32 values
#[inline]
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`]
#[inline]
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(PleaseError::Store(format!(
            "corrupt vector blob: {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

impl SqliteVectorStore {
    /// Open (creating if needed) the cache at `path` and apply migrations
    #[inline]
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to open embeddings cache")?;

        let store = Self { pool, path };
        store.run_migrations().await?;

        sqlx::query("INSERT OR IGNORE INTO metadata (key, value) VALUES (?, ?)")
            .bind(KEY_VERSION)
            .bind(CACHE_FORMAT_VERSION)
            .execute(&store.pool)
            .await?;

        debug!("Opened embeddings cache at {}", store.path.display());
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        debug!("Running embeddings cache migrations");
        sqlx::migrate!("src/vector_store/sqlite/migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn metadata_value(&self, key: &str) -> Result<Option<String>> {
        let value: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.map(|(v,)| v))
    }

    /// Embedder triple the cached vectors were built with
    #[inline]
    pub async fn provenance(&self) -> Result<Option<EmbeddingProvenance>> {
        let provider = self.metadata_value(KEY_PROVIDER).await?;
        let model = self.metadata_value(KEY_MODEL).await?;
        let dimensions = self
            .metadata_value(KEY_DIMENSIONS)
            .await?
            .and_then(|d| d.parse::<usize>().ok());

        Ok(match (provider, model, dimensions) {
            (Some(provider), Some(model), Some(dimensions)) => Some(EmbeddingProvenance {
                provider,
                model,
                dimensions,
            }),
            _ => None,
        })
    }

    /// When the cache was last rebuilt
    #[inline]
    pub async fn indexed_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .metadata_value(KEY_INDEXED_AT)
            .await?
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    async fn cached_files(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT filename, file_mtime FROM embeddings ORDER BY filename")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

fn metadata_json(metadata: &RecordMetadata) -> Result<String> {
    serde_json::to_string(metadata)
        .context("Failed to serialize record metadata")
        .map_err(PleaseError::from)
}

fn row_to_result(row: EmbeddingRow, query: &[f32]) -> Result<SearchResult> {
    let (id, command, filename, file_mtime, blob, json) = row;
    let vector = decode_vector(&blob)?;

    let extra = json
        .and_then(|j| serde_json::from_str::<RecordMetadata>(&j).ok())
        .map(|m| m.extra)
        .unwrap_or_default();

    Ok(SearchResult {
        id,
        score: cosine_similarity(query, &vector),
        metadata: RecordMetadata {
            command,
            filename,
            file_mtime,
            extra,
        },
    })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add(&self, id: &str, vector: Vec<f32>, metadata: RecordMetadata) -> Result<()> {
        ensure_non_empty(&vector, "stored")?;

        sqlx::query(
            "INSERT OR REPLACE INTO embeddings (id, command, filename, file_mtime, vector, metadata_json)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&metadata.command)
        .bind(&metadata.filename)
        .bind(metadata.file_mtime)
        .bind(encode_vector(&vector))
        .bind(metadata_json(&metadata)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        ensure_non_empty(query, "query")?;

        let rows: Vec<EmbeddingRow> = sqlx::query_as(
            "SELECT id, command, filename, file_mtime, vector, metadata_json FROM embeddings",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Searching {} cached vectors", rows.len());

        let scored = rows
            .into_iter()
            .map(|row| row_to_result(row, query))
            .collect::<Result<Vec<_>>>()?;

        Ok(top_k(scored, k))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM embeddings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM embeddings")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn replace_all(
        &self,
        records: Vec<VectorRecord>,
        provenance: &EmbeddingProvenance,
    ) -> Result<()> {
        for record in &records {
            ensure_non_empty(&record.vector, "stored")?;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM embeddings")
            .execute(&mut *tx)
            .await?;

        for record in &records {
            sqlx::query(
                "INSERT INTO embeddings (id, command, filename, file_mtime, vector, metadata_json)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&record.metadata.command)
            .bind(&record.metadata.filename)
            .bind(record.metadata.file_mtime)
            .bind(encode_vector(&record.vector))
            .bind(metadata_json(&record.metadata)?)
            .execute(&mut *tx)
            .await?;
        }

        let entries = [
            (KEY_VERSION, CACHE_FORMAT_VERSION.to_string()),
            (KEY_PROVIDER, provenance.provider.clone()),
            (KEY_MODEL, provenance.model.clone()),
            (KEY_DIMENSIONS, provenance.dimensions.to_string()),
            (KEY_INDEXED_AT, Utc::now().to_rfc3339()),
        ];
        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO metadata (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Cached {} embeddings built with {}",
            records.len(),
            provenance
        );
        Ok(())
    }

    async fn cache_status(
        &self,
        documents: &[Document],
        provenance: &EmbeddingProvenance,
    ) -> Result<CacheStatus> {
        let version = self.metadata_value(KEY_VERSION).await?;
        if version.as_deref() != Some(CACHE_FORMAT_VERSION) {
            return Ok(CacheStatus::Stale(StaleReason::FormatChanged {
                cached: version.unwrap_or_else(|| "none".to_string()),
                current: CACHE_FORMAT_VERSION.to_string(),
            }));
        }

        let Some(cached) = self.provenance().await? else {
            return Ok(CacheStatus::Stale(StaleReason::MetadataMissing));
        };

        if cached.provider != provenance.provider {
            return Ok(CacheStatus::Stale(StaleReason::ProviderChanged {
                cached: cached.provider,
                current: provenance.provider.clone(),
            }));
        }
        if cached.model != provenance.model {
            return Ok(CacheStatus::Stale(StaleReason::ModelChanged {
                cached: cached.model,
                current: provenance.model.clone(),
            }));
        }
        if cached.dimensions != provenance.dimensions {
            return Ok(CacheStatus::Stale(StaleReason::DimensionsChanged {
                cached: cached.dimensions,
                current: provenance.dimensions,
            }));
        }

        let current: HashMap<&str, i64> = documents
            .iter()
            .map(|d| (d.filename.as_str(), d.mtime_unix()))
            .collect();

        let cached_files = self.cached_files().await?;
        for (filename, mtime) in &cached_files {
            match current.get(filename.as_str()) {
                None => return Ok(CacheStatus::Stale(StaleReason::FileDeleted(filename.clone()))),
                Some(current_mtime) if current_mtime != mtime => {
                    return Ok(CacheStatus::Stale(StaleReason::FileModified(
                        filename.clone(),
                    )));
                }
                Some(_) => {}
            }
        }

        let cached_names: HashSet<&str> = cached_files.iter().map(|(f, _)| f.as_str()).collect();
        if let Some(added) = documents
            .iter()
            .find(|d| !cached_names.contains(d.filename.as_str()))
        {
            return Ok(CacheStatus::Stale(StaleReason::FileAdded(
                added.filename.clone(),
            )));
        }

        Ok(CacheStatus::Valid)
    }

    #[inline]
    fn kind(&self) -> &'static str {
        "sqlite"
    }
}
