/// Errors from the Tenant-Model Catalog & Selector (spec §4.3).
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no model available for tenant {tenant_id}")]
    NoModelAvailable { tenant_id: String },

    #[error("model not found: {model_id}")]
    NotFound { model_id: String },

    #[error("usage limit exceeded for tenant {tenant_id}/{model_id}: {kind}")]
    UsageLimitExceeded {
        tenant_id: String,
        model_id: String,
        kind: String,
    },

    #[error("unsupported embedding dimensions: {dimensions}")]
    UnsupportedDimensions { dimensions: i64 },

    #[error("set-default-model transaction affected zero rows for {tenant_id}/{model_id}")]
    SetDefaultFailed { tenant_id: String, model_id: String },

    #[error("storage error: {0}")]
    Storage(#[from] crate::errors::StorageError),
}
