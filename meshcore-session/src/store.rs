//! Session Store & Tool-Execution Ledger (spec §4.1).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use meshcore_core::config::SessionConfig;
use meshcore_core::errors::SessionError;
use meshcore_core::models::{
    EdgeSession, SessionFilter, SessionMetrics, SessionStatus, ToolExecution,
};
use meshcore_storage::StorageEngine;

fn storage_err(e: rusqlite::Error) -> meshcore_core::errors::StorageError {
    meshcore_core::errors::StorageError::Sqlite {
        message: e.to_string(),
    }
}

fn row_to_session(row: &Row) -> rusqlite::Result<EdgeSession> {
    let id: String = row.get("id")?;
    let tenant_id: String = row.get("tenant_id")?;
    let status: String = row.get("status")?;
    let context_id: Option<String> = row.get("context_id")?;
    let connection_metadata: String = row.get("connection_metadata")?;
    let last_activity_at: String = row.get("last_activity_at")?;
    let created_at: String = row.get("created_at")?;
    let expires_at: String = row.get("expires_at")?;
    let terminated_at: Option<String> = row.get("terminated_at")?;
    Ok(EdgeSession {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        session_id: row.get("session_id")?,
        tenant_id: Uuid::parse_str(&tenant_id).unwrap_or_default(),
        user_id: row.get("user_id")?,
        edge_mcp_id: row.get("edge_mcp_id")?,
        client_name: row.get("client_name")?,
        client_type: row.get("client_type")?,
        client_version: row.get("client_version")?,
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Expired),
        initialized: row.get::<_, i64>("initialized")? != 0,
        core_session_id: row.get("core_session_id")?,
        encrypted_passthrough_auth: row.get("encrypted_passthrough_auth")?,
        connection_metadata: serde_json::from_str(&connection_metadata)
            .unwrap_or(serde_json::json!({})),
        context_id: context_id.and_then(|s| Uuid::parse_str(&s).ok()),
        last_activity_at: DateTime::parse_from_rfc3339(&last_activity_at)
            .unwrap()
            .with_timezone(&Utc),
        tool_execution_count: row.get("tool_execution_count")?,
        total_tokens_used: row.get("total_tokens_used")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
        expires_at: DateTime::parse_from_rfc3339(&expires_at)
            .unwrap()
            .with_timezone(&Utc),
        terminated_at: terminated_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        }),
        termination_reason: row.get("termination_reason")?,
    })
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub tenant_id: Uuid,
    pub user_id: Option<String>,
    pub edge_mcp_id: String,
    pub client_name: String,
    pub client_type: String,
    pub client_version: String,
    pub context_id: Option<Uuid>,
    pub connection_metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewToolExecution {
    pub session_id: Uuid,
    pub tool_name: String,
    pub tool_id: Option<String>,
    pub arguments: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub tokens_used: Option<i64>,
}

pub struct SessionStore {
    storage: Arc<StorageEngine>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(storage: Arc<StorageEngine>, config: SessionConfig) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    #[instrument(skip(self, new))]
    pub fn create_session(&self, new: NewSession) -> Result<EdgeSession, SessionError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.default_session_ttl_secs);

        let existing: bool = self
            .storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT 1 FROM edge_mcp_sessions WHERE session_id = ?1",
                    params![new.session_id],
                    |_| Ok(true),
                )
                .optional()
                .map(|r| r.is_some())
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)?;
        if existing {
            return Err(SessionError::AlreadyExists {
                session_id: new.session_id,
            });
        }

        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO edge_mcp_sessions
                        (id, session_id, tenant_id, user_id, edge_mcp_id, client_name,
                         client_type, client_version, status, initialized, core_session_id,
                         encrypted_passthrough_auth, connection_metadata, context_id,
                         last_activity_at, tool_execution_count, total_tokens_used,
                         created_at, expires_at, terminated_at, termination_reason)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', 0, NULL, NULL, ?9, ?10,
                             ?11, 0, 0, ?11, ?12, NULL, NULL)",
                    params![
                        id.to_string(),
                        new.session_id,
                        new.tenant_id.to_string(),
                        new.user_id,
                        new.edge_mcp_id,
                        new.client_name,
                        new.client_type,
                        new.client_version,
                        new.connection_metadata.to_string(),
                        new.context_id.map(|c| c.to_string()),
                        now.to_rfc3339(),
                        expires_at.to_rfc3339(),
                    ],
                )
                .map_err(|e| {
                    if e.to_string().contains("UNIQUE") {
                        meshcore_core::errors::StorageError::AlreadyExists {
                            tenant_id: new.tenant_id.to_string(),
                            name: new.session_id.clone(),
                        }
                    } else {
                        storage_err(e)
                    }
                })
            })
            .map_err(|e| match e {
                meshcore_core::errors::StorageError::AlreadyExists { name, .. } => {
                    SessionError::AlreadyExists { session_id: name }
                }
                other => SessionError::Storage(other),
            })?;

        self.get_session_row(id)
    }

    fn get_session_row(&self, id: Uuid) -> Result<EdgeSession, SessionError> {
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM edge_mcp_sessions WHERE id = ?1",
                    params![id.to_string()],
                    row_to_session,
                )
                .optional()
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)?
            .ok_or(SessionError::NotFound {
                session_id: id.to_string(),
            })
    }

    /// If the row is `active` but past `expires_at`, best-effort transitions
    /// it to `expired` (a failed update is logged, not propagated) and
    /// returns `SessionExpired` (spec §4.1 `GetSession`).
    #[instrument(skip(self))]
    pub fn get_session(&self, session_id: &str) -> Result<EdgeSession, SessionError> {
        let now = Utc::now();
        let session = self
            .storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM edge_mcp_sessions WHERE session_id = ?1",
                    params![session_id],
                    row_to_session,
                )
                .optional()
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)?
            .ok_or(SessionError::NotFound {
                session_id: session_id.to_string(),
            })?;

        if session.status == SessionStatus::Active && session.expires_at <= now {
            let update = self.storage.with_conn(|conn| {
                conn.execute(
                    "UPDATE edge_mcp_sessions SET status = 'expired' WHERE id = ?1",
                    params![session.id.to_string()],
                )
                .map_err(storage_err)
            });
            if let Err(e) = update {
                warn!(session_id, error = %e, "failed to mark session expired");
            }
            return Err(SessionError::Expired {
                session_id: session_id.to_string(),
            });
        }

        Ok(session)
    }

    /// Bumps `last_activity_at` only if `status='active'`; disambiguates a
    /// zero-row update with an existence probe (spec §4.1).
    pub fn update_session_activity(&self, session_id: &str) -> Result<(), SessionError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE edge_mcp_sessions SET last_activity_at = ?1
                     WHERE session_id = ?2 AND status = 'active'",
                    params![now, session_id],
                )
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)?;

        if affected > 0 {
            return Ok(());
        }

        let exists: bool = self
            .storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT 1 FROM edge_mcp_sessions WHERE session_id = ?1",
                    params![session_id],
                    |_| Ok(true),
                )
                .optional()
                .map(|r| r.is_some())
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)?;

        if exists {
            Err(SessionError::Expired {
                session_id: session_id.to_string(),
            })
        } else {
            Err(SessionError::NotFound {
                session_id: session_id.to_string(),
            })
        }
    }

    /// Atomic `{active, idle}` → `terminated`; else `SessionNotFound`
    /// (spec §4.1 — the spec names `SessionNotFound` for the non-terminable
    /// case too, since from the caller's view there's nothing left to act on).
    pub fn terminate_session(&self, session_id: &str, reason: &str) -> Result<(), SessionError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE edge_mcp_sessions
                     SET status = 'terminated', terminated_at = ?1, termination_reason = ?2
                     WHERE session_id = ?3 AND status IN ('active', 'idle')",
                    params![now, reason, session_id],
                )
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)?;

        if affected == 0 {
            return Err(SessionError::NotFound {
                session_id: session_id.to_string(),
            });
        }
        Ok(())
    }

    /// Dynamic predicate over any subset of filter fields; every value is
    /// bound, never interpolated (spec §4.1 `ListSessions`).
    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<EdgeSession>, SessionError> {
        let mut sql = "SELECT * FROM edge_mcp_sessions WHERE 1 = 1".to_string();
        let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(tenant_id) = filter.tenant_id {
            sql.push_str(" AND tenant_id = ?");
            binds.push(Box::new(tenant_id.to_string()));
        }
        if let Some(user_id) = &filter.user_id {
            sql.push_str(" AND user_id = ?");
            binds.push(Box::new(user_id.clone()));
        }
        if let Some(edge_mcp_id) = &filter.edge_mcp_id {
            sql.push_str(" AND edge_mcp_id = ?");
            binds.push(Box::new(edge_mcp_id.clone()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(Box::new(status.as_str().to_string()));
        }
        if let Some(client_type) = &filter.client_type {
            sql.push_str(" AND client_type = ?");
            binds.push(Box::new(client_type.clone()));
        }
        if filter.active_only {
            sql.push_str(" AND status = 'active'");
        }
        if let Some(since) = filter.since {
            sql.push_str(" AND created_at >= ?");
            binds.push(Box::new(since.to_rfc3339()));
        }
        if let Some(until) = filter.until {
            sql.push_str(" AND created_at <= ?");
            binds.push(Box::new(until.to_rfc3339()));
        }

        let order_col = match filter.order_by.as_deref() {
            Some("last_activity_at") => "last_activity_at",
            Some("expires_at") => "expires_at",
            _ => "created_at",
        };
        sql.push_str(" ORDER BY ");
        sql.push_str(order_col);
        sql.push_str(if filter.order_desc { " DESC" } else { " ASC" });

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {}", offset.max(0)));
        }

        self.storage
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
                let refs: Vec<&dyn rusqlite::ToSql> =
                    binds.iter().map(|b| b.as_ref()).collect();
                let rows = stmt.query_map(refs.as_slice(), row_to_session).map_err(storage_err)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
            })
            .map_err(SessionError::Storage)
    }

    /// Bulk `active` → `expired` transition for past-due rows; idempotent
    /// (spec §4.1 `CleanupExpiredSessions`).
    pub fn cleanup_expired_sessions(&self) -> Result<usize, SessionError> {
        let now = Utc::now().to_rfc3339();
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE edge_mcp_sessions SET status = 'expired'
                     WHERE status = 'active' AND expires_at <= ?1",
                    params![now],
                )
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)
    }

    /// Single transaction: ledger insert + counter increments + activity
    /// bump; rolls back entirely on any failure (spec §4.1).
    #[instrument(skip(self, exec))]
    pub fn record_tool_execution(
        &self,
        exec: NewToolExecution,
    ) -> Result<ToolExecution, SessionError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.storage
            .transaction(|tx| {
                tx.execute(
                    "INSERT INTO session_tool_executions
                        (id, session_id, tool_name, tool_id, arguments, result, error,
                         duration_ms, tokens_used, executed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        id.to_string(),
                        exec.session_id.to_string(),
                        exec.tool_name,
                        exec.tool_id,
                        exec.arguments.to_string(),
                        exec.result.as_ref().map(|v| v.to_string()),
                        exec.error,
                        exec.duration_ms,
                        exec.tokens_used,
                        now.to_rfc3339(),
                    ],
                )
                .map_err(storage_err)?;

                let affected = tx
                    .execute(
                        "UPDATE edge_mcp_sessions
                         SET tool_execution_count = tool_execution_count + 1,
                             total_tokens_used = total_tokens_used + ?1,
                             last_activity_at = ?2
                         WHERE id = ?3",
                        params![
                            exec.tokens_used.unwrap_or(0),
                            now.to_rfc3339(),
                            exec.session_id.to_string(),
                        ],
                    )
                    .map_err(storage_err)?;

                if affected == 0 {
                    return Err(meshcore_core::errors::StorageError::Sqlite {
                        message: format!("session not found: {}", exec.session_id),
                    });
                }
                Ok(())
            })
            .map_err(|e| match &e {
                meshcore_core::errors::StorageError::Sqlite { message }
                    if message.starts_with("session not found: ") =>
                {
                    SessionError::NotFound {
                        session_id: exec.session_id.to_string(),
                    }
                }
                _ => SessionError::Storage(e),
            })?;

        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM session_tool_executions WHERE id = ?1",
                    params![id.to_string()],
                    |row| {
                        let sid: String = row.get("session_id")?;
                        let arguments: String = row.get("arguments")?;
                        let result: Option<String> = row.get("result")?;
                        let executed_at: String = row.get("executed_at")?;
                        Ok(ToolExecution {
                            id,
                            session_id: Uuid::parse_str(&sid).unwrap_or_default(),
                            tool_name: row.get("tool_name")?,
                            tool_id: row.get("tool_id")?,
                            arguments: serde_json::from_str(&arguments).unwrap_or(serde_json::json!({})),
                            result: result.and_then(|s| serde_json::from_str(&s).ok()),
                            error: row.get("error")?,
                            duration_ms: row.get("duration_ms")?,
                            tokens_used: row.get("tokens_used")?,
                            executed_at: DateTime::parse_from_rfc3339(&executed_at)
                                .unwrap()
                                .with_timezone(&Utc),
                        })
                    },
                )
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)
    }

    /// Aggregate metrics for `tenant_id` since `since` (spec §4.1
    /// `GetSessionMetrics`): active count, total count, total tool
    /// executions, total tokens, and average duration in minutes using
    /// `coalesce(terminated_at, now) - created_at`.
    pub fn get_session_metrics(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<SessionMetrics, SessionError> {
        let now = Utc::now().to_rfc3339();
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT
                        SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END),
                        COUNT(*),
                        COALESCE(SUM(tool_execution_count), 0),
                        COALESCE(SUM(total_tokens_used), 0),
                        AVG(
                            (julianday(COALESCE(terminated_at, ?1)) - julianday(created_at)) * 24 * 60
                        )
                     FROM edge_mcp_sessions
                     WHERE tenant_id = ?2 AND created_at >= ?3",
                    params![now, tenant_id.to_string(), since.to_rfc3339()],
                    |row| {
                        Ok(SessionMetrics {
                            active_count: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                            total_count: row.get(1)?,
                            total_tool_executions: row.get(2)?,
                            total_tokens: row.get(3)?,
                            average_duration_minutes: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                        })
                    },
                )
                .map_err(storage_err)
            })
            .map_err(SessionError::Storage)
    }
}
