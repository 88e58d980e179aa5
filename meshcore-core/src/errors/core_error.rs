use super::{
    BreakerError, ChunkingError, ContextError, CredentialError, CryptoError, HealingError,
    ModelError, SessionError, StorageError, StreamsError,
};

/// Top-level error type for the control plane. All subsystem errors convert
/// into this via `From` impls, matching spec §7's error-kind enumeration.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("circuit breaker error: {0}")]
    Breaker(#[from] BreakerError),

    #[error("streams error: {0}")]
    Streams(#[from] StreamsError),

    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("context error: {0}")]
    Context(#[from] ContextError),

    #[error("healing error: {0}")]
    Healing(#[from] HealingError),

    #[error("validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Convenience type alias.
pub type CoreResult<T> = Result<T, CoreError>;
