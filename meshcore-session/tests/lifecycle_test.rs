use std::sync::Arc;

use chrono::{Duration, Utc};
use meshcore_core::config::SessionConfig;
use meshcore_core::models::{SessionFilter, SessionStatus};
use meshcore_session::{NewSession, NewToolExecution, SessionStore};
use meshcore_storage::StorageEngine;
use uuid::Uuid;

fn store() -> SessionStore {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    SessionStore::new(storage, SessionConfig::default())
}

fn new_session(session_id: &str, tenant: Uuid) -> NewSession {
    NewSession {
        session_id: session_id.into(),
        tenant_id: tenant,
        user_id: Some("user-1".into()),
        edge_mcp_id: "edge-1".into(),
        client_name: "claude-desktop".into(),
        client_type: "desktop".into(),
        client_version: "1.0.0".into(),
        context_id: None,
        connection_metadata: serde_json::json!({}),
    }
}

#[test]
fn create_then_get_round_trips() {
    let store = store();
    let tenant = Uuid::new_v4();
    let created = store.create_session(new_session("sess-1", tenant)).unwrap();
    let fetched = store.get_session("sess-1").unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.status, SessionStatus::Active);
}

#[test]
fn duplicate_session_id_rejected() {
    let store = store();
    let tenant = Uuid::new_v4();
    store.create_session(new_session("sess-dup", tenant)).unwrap();
    let err = store.create_session(new_session("sess-dup", tenant)).unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::SessionError::AlreadyExists { .. }
    ));
}

#[test]
fn get_session_transitions_past_due_row_to_expired() {
    let store = store();
    let tenant = Uuid::new_v4();
    store.create_session(new_session("sess-exp", tenant)).unwrap();

    // Force expiry by back-dating expires_at directly.
    store
        .storage()
        .with_conn(|conn| {
            conn.execute(
                "UPDATE edge_mcp_sessions SET expires_at = ?1 WHERE session_id = 'sess-exp'",
                rusqlite::params![(Utc::now() - Duration::seconds(1)).to_rfc3339()],
            )
            .map_err(|e| meshcore_core::errors::StorageError::Sqlite { message: e.to_string() })
        })
        .unwrap();

    let err = store.get_session("sess-exp").unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::SessionError::Expired { .. }
    ));
}

#[test]
fn update_activity_on_unknown_session_is_not_found() {
    let store = store();
    let err = store.update_session_activity("does-not-exist").unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::SessionError::NotFound { .. }
    ));
}

#[test]
fn terminate_session_sets_reason_and_blocks_double_terminate() {
    let store = store();
    let tenant = Uuid::new_v4();
    store.create_session(new_session("sess-term", tenant)).unwrap();
    store.terminate_session("sess-term", "client_disconnect").unwrap();

    let err = store.terminate_session("sess-term", "again").unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::SessionError::NotFound { .. }
    ));
}

#[test]
fn list_sessions_filters_by_tenant_and_status() {
    let store = store();
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    store.create_session(new_session("a-1", tenant_a)).unwrap();
    store.create_session(new_session("a-2", tenant_a)).unwrap();
    store.create_session(new_session("b-1", tenant_b)).unwrap();

    let filter = SessionFilter {
        tenant_id: Some(tenant_a),
        ..Default::default()
    };
    let results = store.list_sessions(&filter).unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn record_tool_execution_updates_counters_atomically() {
    let store = store();
    let tenant = Uuid::new_v4();
    let session = store.create_session(new_session("sess-tool", tenant)).unwrap();

    store
        .record_tool_execution(NewToolExecution {
            session_id: session.id,
            tool_name: "search_code".into(),
            tool_id: Some("github".into()),
            arguments: serde_json::json!({"query": "foo"}),
            result: Some(serde_json::json!({"matches": 3})),
            error: None,
            duration_ms: 120,
            tokens_used: Some(42),
        })
        .unwrap();

    let updated = store.get_session("sess-tool").unwrap();
    assert_eq!(updated.tool_execution_count, 1);
    assert_eq!(updated.total_tokens_used, 42);
}

#[test]
fn record_tool_execution_unknown_session_rolls_back() {
    let store = store();
    let err = store
        .record_tool_execution(NewToolExecution {
            session_id: Uuid::new_v4(),
            tool_name: "noop".into(),
            tool_id: None,
            arguments: serde_json::json!({}),
            result: None,
            error: None,
            duration_ms: 1,
            tokens_used: None,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::SessionError::NotFound { .. }
    ));
}

#[test]
fn cleanup_expired_sessions_transitions_past_due_rows() {
    let store = store();
    let tenant = Uuid::new_v4();
    store.create_session(new_session("sess-cleanup", tenant)).unwrap();
    store
        .storage()
        .with_conn(|conn| {
            conn.execute(
                "UPDATE edge_mcp_sessions SET expires_at = ?1",
                rusqlite::params![(Utc::now() - Duration::seconds(1)).to_rfc3339()],
            )
            .map_err(|e| meshcore_core::errors::StorageError::Sqlite { message: e.to_string() })
        })
        .unwrap();

    let affected = store.cleanup_expired_sessions().unwrap();
    assert_eq!(affected, 1);
}

#[test]
fn session_metrics_aggregate_tenant_totals() {
    let store = store();
    let tenant = Uuid::new_v4();
    let session = store.create_session(new_session("sess-metrics", tenant)).unwrap();
    store
        .record_tool_execution(NewToolExecution {
            session_id: session.id,
            tool_name: "noop".into(),
            tool_id: None,
            arguments: serde_json::json!({}),
            result: None,
            error: None,
            duration_ms: 5,
            tokens_used: Some(10),
        })
        .unwrap();

    let metrics = store
        .get_session_metrics(tenant, Utc::now() - Duration::days(1))
        .unwrap();
    assert_eq!(metrics.total_count, 1);
    assert_eq!(metrics.total_tokens, 10);
    assert_eq!(metrics.active_count, 1);
}
