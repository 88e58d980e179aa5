/// Driver-level storage errors, wrapped with enough context to diagnose
/// without downcasting (spec §7: "storage errors propagate wrapped with context").
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },

    #[error("constraint violation on unique key ({tenant_id}, {name})")]
    AlreadyExists { tenant_id: String, name: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("connection pool exhausted or unavailable: {0}")]
    Pool(String),
}
