/// Errors from the Vector Embedding Store & Semantic Context Manager
/// (spec §4.6).
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("context not found: {id}")]
    NotFound { id: String },

    #[error("embedding provider call failed: {0}")]
    ProviderCall(String),

    #[error("integrity check failed for context {id}: {reason}")]
    IntegrityViolation { id: String, reason: String },

    #[error("unknown embedding model: {model_id}")]
    UnknownModel { model_id: String },

    #[error("unsupported embedding dimensions: {dimensions}")]
    UnsupportedDimensions { dimensions: i64 },

    #[error("embedding not found: {id}")]
    EmbeddingNotFound { id: String },

    #[error("chunk_sequence must be strictly increasing: got {got}, last was {last}")]
    NonMonotonicSequence { got: i64, last: i64 },

    #[error("storage error: {0}")]
    Storage(#[from] crate::errors::StorageError),
}
