/// Errors from the Credential Store & Manager (spec §4.4).
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential not found: {id}")]
    NotFound { id: String },

    #[error("credential expired: {id}")]
    Expired { id: String },

    #[error("credential inactive: {id}")]
    Inactive { id: String },

    #[error("credential already exists for tenant/name: {tenant_id}/{name}")]
    AlreadyExists { tenant_id: String, name: String },

    #[error("validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("encryption error: {0}")]
    Encryption(#[from] crate::errors::CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::errors::StorageError),
}
