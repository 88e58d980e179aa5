use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Idle,
    Terminated,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Idle => "idle",
            SessionStatus::Terminated => "terminated",
            SessionStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "idle" => Some(SessionStatus::Idle),
            "terminated" => Some(SessionStatus::Terminated),
            "expired" => Some(SessionStatus::Expired),
            _ => None,
        }
    }
}

/// spec §3 `EdgeSession`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSession {
    pub id: Uuid,
    pub session_id: String,
    pub tenant_id: Uuid,
    pub user_id: Option<String>,
    pub edge_mcp_id: String,
    pub client_name: String,
    pub client_type: String,
    pub client_version: String,
    pub status: SessionStatus,
    pub initialized: bool,
    pub core_session_id: Option<String>,
    pub encrypted_passthrough_auth: Option<Vec<u8>>,
    pub connection_metadata: serde_json::Value,
    pub context_id: Option<Uuid>,
    pub last_activity_at: DateTime<Utc>,
    pub tool_execution_count: i64,
    pub total_tokens_used: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub termination_reason: Option<String>,
}

impl EdgeSession {
    /// "live" iff status=active AND expires_at > now (spec §3 invariant).
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && self.expires_at > now
    }
}

/// spec §3 `ToolExecution` (append-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub id: Uuid,
    pub session_id: Uuid,
    pub tool_name: String,
    pub tool_id: Option<String>,
    pub arguments: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub tokens_used: Option<i64>,
    pub executed_at: DateTime<Utc>,
}

/// Dynamic filter for `ListSessions` (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub edge_mcp_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub client_type: Option<String>,
    pub active_only: bool,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub order_by: Option<String>,
    pub order_desc: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GetSessionMetrics` result shape (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionMetrics {
    pub active_count: i64,
    pub total_count: i64,
    pub total_tool_executions: i64,
    pub total_tokens: i64,
    pub average_duration_minutes: f64,
}
