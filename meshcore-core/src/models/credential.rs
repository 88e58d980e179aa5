use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    ApiKey,
    Basic,
    OAuth2,
}

/// spec §3 `Credential`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub tool_id: Option<String>,
    pub name: String,
    pub credential_type: CredentialType,
    pub encrypted_value: Vec<u8>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret_encrypted: Option<Vec<u8>>,
    pub oauth_refresh_token_encrypted: Option<Vec<u8>>,
    pub oauth_token_expiry: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub allowed_edge_ids: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// spec §3 Audit record attached to every credential state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialAudit {
    pub id: Uuid,
    pub credential_id: Uuid,
    pub operation: String,
    pub success: bool,
    pub error: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}
