use thiserror::Error;

pub type Result<T> = std::result::Result<T, PleaseError>;

#[derive(Error, Debug)]
pub enum PleaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(#[from] documents::ParseError),

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Semantic index has not been built; run `please index` first")]
    NotIndexed,

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for PleaseError {
    #[inline]
    fn from(error: sqlx::Error) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for PleaseError {
    #[inline]
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::Store(format!("migration failed: {}", error))
    }
}

pub mod commands;
pub mod config;
pub mod documents;
pub mod embeddings;
pub mod manager;
pub mod matching;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod test_utils;
