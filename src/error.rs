//! Error taxonomy for the passage index
//!
//! Library code returns [`Result`]; the binary converts to `anyhow::Error`
//! at the boundary. Provider errors are the only retryable class.

/// Errors raised by chunking, indexing, persistence and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Chunking or retrieval parameters rejected before any work started.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Vector length disagrees with the index dimension.
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector is empty or holds non-finite components.
    #[error("invalid vector: {0}")]
    InvalidVector(String),

    /// Persisted index is internally inconsistent or unreadable.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Persisted index was written by an unknown format version.
    #[error("unsupported index format version {found} (supported: {supported})")]
    UnsupportedFormatVersion { found: u32, supported: u32 },

    /// Embedding provider could not be reached or did not answer in time.
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Embedding provider refused the call because of rate limiting.
    #[error("embedding provider rate limited: {0}")]
    RateLimited(String),

    /// No corpus directory matches the requested index name.
    #[error("index '{0}' not found")]
    IndexNotFound(String),

    /// A passage id returned by the index has no stored passage.
    #[error("passage not found: {0}")]
    PassageNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ProviderUnavailable(_) | Error::RateLimited(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
