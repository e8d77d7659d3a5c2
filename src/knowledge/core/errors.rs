//! Error types for the knowledge subsystem.

use thiserror::Error;

/// Knowledge subsystem error type.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// The requested document does not exist in the content source.
    #[error("document not found: {slug}")]
    NotFound {
        /// Slug that was requested.
        slug: String,
    },
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An external provider failed or returned unusable output.
    #[error("provider error: {0}")]
    Provider(String),
    /// Embedding error from Rig.
    #[error("embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    /// Completion error from Rig.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// A vector did not have the configured dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimensionality.
        expected: usize,
        /// Dimensionality returned by the provider.
        actual: usize,
    },
    /// Both retrieval channels failed.
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    /// A stored row could not be decoded.
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Required `SQLite` extension not available.
    #[error("sqlite-vec extension is not available; load it before initializing the index store")]
    SqliteVecUnavailable,
}

impl KnowledgeError {
    /// Whether the error originates from an embedding or completion provider.
    #[must_use]
    pub const fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::Embedding(_)
                | Self::Completion(_)
                | Self::HttpClient(_)
                | Self::DimensionMismatch { .. }
        )
    }
}

/// Convenience result alias for knowledge operations.
pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
