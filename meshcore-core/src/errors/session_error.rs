/// Errors from the Session Store & Tool-Execution Ledger (spec §4.1).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {session_id}")]
    NotFound { session_id: String },

    #[error("session expired: {session_id}")]
    Expired { session_id: String },

    #[error("session id already in use: {session_id}")]
    AlreadyExists { session_id: String },

    #[error("only active/idle sessions may be terminated (current: {status})")]
    InvalidTerminationState { status: String },

    #[error("storage error: {0}")]
    Storage(#[from] crate::errors::StorageError),
}
