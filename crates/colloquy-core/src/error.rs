use thiserror::Error;

/// Top-level error type for the Colloquy system.
///
/// Each variant maps to one class of failure in the analysis and query
/// pipelines. Subsystem crates return `ColloquyError` directly so that the
/// `?` operator works across crate boundaries. Only `InvalidInput` and
/// `NotFound` are ever surfaced to a caller as a rejected request; every
/// other variant is handled at its origin by a degradation path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ColloquyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limit exceeded by provider: {0}")]
    RateLimited(String),

    #[error("Analysis partially failed for conversation {conversation_id}: {failed_fields:?}")]
    AnalysisPartialFailure {
        conversation_id: uuid::Uuid,
        failed_fields: Vec<String>,
    },

    #[error("Conversation {0} is already ended")]
    ConcurrentEndAttempt(uuid::Uuid),

    #[error("Conversation {0} not found")]
    NotFound(uuid::Uuid),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ColloquyError {
    /// Whether this error triggers a degradation path instead of propagating.
    ///
    /// Callers handle recoverable errors by falling back to a lower-fidelity
    /// result; unrecoverable errors are returned to the requester.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ColloquyError::ProviderUnavailable(_) | ColloquyError::RateLimited(_)
        )
    }
}

impl From<toml::de::Error> for ColloquyError {
    fn from(err: toml::de::Error) -> Self {
        ColloquyError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ColloquyError {
    fn from(err: toml::ser::Error) -> Self {
        ColloquyError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ColloquyError {
    fn from(err: serde_json::Error) -> Self {
        ColloquyError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Colloquy operations.
pub type Result<T> = std::result::Result<T, ColloquyError>;
