//! Error taxonomy for the memory engine.
//!
//! A `thiserror`-derived enum per boundary, with only schema/migration
//! failures allowed to escape store construction.

use thiserror::Error;

/// Errors raised by the lexical or vector stores.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),
    /// IO error (data directory creation, index persistence, …).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Store initialization or migration failure. These are the only
    /// errors allowed to propagate out of `Storage::new`.
    #[error("initialization error: {0}")]
    Init(String),
    /// Malformed input that the caller must fix before retrying.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The embedding provider or vector backend failed; recoverable —
    /// callers downgrade to lexical-only behavior.
    #[error("transient backend error: {0}")]
    Transient(String),
}

/// Result alias used throughout the storage layer.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by an [`crate::embedding::EmbeddingProvider`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The underlying model failed to initialize.
    #[error("embedding model init failed: {0}")]
    ModelInit(String),
    /// Inference failed for a specific input.
    #[error("embedding inference failed: {0}")]
    Inference(String),
}
