use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shared audit-entry shape used by the credential store and context manager
/// (spec §3 Audit record, §4.6 `AuditContextAccess`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub operation: String,
    pub success: bool,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn success(actor: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            operation: operation.into(),
            success: true,
            error: None,
            metadata: serde_json::json!({}),
            occurred_at: Utc::now(),
        }
    }

    pub fn failure(
        actor: impl Into<String>,
        operation: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            operation: operation.into(),
            success: false,
            error: Some(error.into()),
            metadata: serde_json::json!({}),
            occurred_at: Utc::now(),
        }
    }
}
