//! Error types for the document ingestion and retrieval pipeline.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised when caller-supplied parameters are out of range.
///
/// These are always reported before any I/O takes place.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("chunk size {value} out of range (must be between {min} and {max})")]
    ChunkSize { value: usize, min: usize, max: usize },

    #[error("chunk overlap {value} too small (minimum {min})")]
    ChunkOverlapTooSmall { value: usize, min: usize },

    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    ChunkOverlapTooLarge { overlap: usize, chunk_size: usize },

    #[error("number of documents {value} out of range (must be between {min} and {max})")]
    DocumentCount { value: usize, min: usize, max: usize },

    #[error("invalid query: {0}")]
    Query(String),
}

/// Errors related to document splitting.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no usable chunks produced from '{filename}'")]
    EmptyResult { filename: String },
}

/// Errors related to embedding operations.
///
/// None of these reach callers of [`crate::services::EmbeddingService`]; they
/// drive the retry-then-fallback policy.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding service unavailable (status 503): {0}")]
    Unavailable(String),

    #[error("embedding server error (status {status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        // Only an explicit 503 means "warming up / overloaded". Everything else
        // is treated as permanent for the current call.
        matches!(self, EmbeddingError::Unavailable(_))
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to open vector store: {0}")]
    StorageInit(String),

    #[error("no chunks to add")]
    EmptyBatch,

    #[error("vector store is not open")]
    NotOpen,

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("insert error: {0}")]
    InsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Errors related to the ingestion entry point.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("splitting failed: {0}")]
    Split(#[from] SplitError),

    #[error("storage failed: {0}")]
    Store(#[from] VectorStoreError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}
