//! Schema creation — a single idempotent DDL block, not a migration engine
//! (spec.md §1 lists "No SQL schema migration engine" as a Non-goal; this
//! just gets the schema to exist on an empty database).

use rusqlite::Connection;
use tracing::debug;

use meshcore_core::errors::StorageError;

fn err(e: rusqlite::Error) -> StorageError {
    StorageError::Sqlite {
        message: e.to_string(),
    }
}

/// Creates every table and index this crate depends on, if not already
/// present. Safe to call on every `StorageEngine::open`.
pub fn ensure_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        -- edge_mcp_sessions + session_tool_executions (spec §3, §6)
        CREATE TABLE IF NOT EXISTS edge_mcp_sessions (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE,
            tenant_id TEXT NOT NULL,
            user_id TEXT,
            edge_mcp_id TEXT NOT NULL,
            client_name TEXT NOT NULL,
            client_type TEXT NOT NULL,
            client_version TEXT NOT NULL,
            status TEXT NOT NULL,
            initialized INTEGER NOT NULL DEFAULT 0,
            core_session_id TEXT,
            encrypted_passthrough_auth BLOB,
            connection_metadata TEXT NOT NULL DEFAULT '{}',
            context_id TEXT,
            last_activity_at TEXT NOT NULL,
            tool_execution_count INTEGER NOT NULL DEFAULT 0,
            total_tokens_used INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            terminated_at TEXT,
            termination_reason TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_edge_mcp_sessions_tenant_status
            ON edge_mcp_sessions (tenant_id, status);
        CREATE INDEX IF NOT EXISTS idx_edge_mcp_sessions_expires_at
            ON edge_mcp_sessions (expires_at);

        CREATE TABLE IF NOT EXISTS session_tool_executions (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES edge_mcp_sessions(id),
            tool_name TEXT NOT NULL,
            tool_id TEXT,
            arguments TEXT NOT NULL DEFAULT '{}',
            result TEXT,
            error TEXT,
            duration_ms INTEGER NOT NULL,
            tokens_used INTEGER,
            executed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_session_tool_executions_session
            ON session_tool_executions (session_id);

        -- tenant_tool_credentials + user_credentials_audit (spec §3, §4.4, §6)
        CREATE TABLE IF NOT EXISTS tenant_tool_credentials (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            tool_id TEXT,
            name TEXT NOT NULL,
            credential_type TEXT NOT NULL,
            encrypted_value BLOB NOT NULL,
            oauth_client_id TEXT,
            oauth_client_secret_encrypted BLOB,
            oauth_refresh_token_encrypted BLOB,
            oauth_token_expiry TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            is_active INTEGER NOT NULL DEFAULT 1,
            last_used_at TEXT,
            expires_at TEXT,
            allowed_edge_ids TEXT NOT NULL DEFAULT '[]',
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        -- uniqueness is scoped to active rows only: a soft-deleted
        -- credential must not block re-creating one under the same name.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tenant_tool_credentials_active_name
            ON tenant_tool_credentials (tenant_id, name)
            WHERE is_active = 1;
        CREATE INDEX IF NOT EXISTS idx_tenant_tool_credentials_expiry
            ON tenant_tool_credentials (expires_at);

        CREATE TABLE IF NOT EXISTS user_credentials_audit (
            id TEXT PRIMARY KEY,
            credential_id TEXT NOT NULL,
            operation TEXT NOT NULL,
            success INTEGER NOT NULL,
            error TEXT,
            ip TEXT,
            user_agent TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            occurred_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_user_credentials_audit_credential
            ON user_credentials_audit (credential_id);

        -- embedding_model_catalog + tenant_embedding_models (spec §3, §4.3, §6)
        CREATE TABLE IF NOT EXISTS embedding_model_catalog (
            id TEXT PRIMARY KEY,
            model_id TEXT NOT NULL UNIQUE,
            provider TEXT NOT NULL,
            model_name TEXT NOT NULL,
            dimensions INTEGER NOT NULL,
            max_tokens INTEGER NOT NULL,
            cost_per_million_tokens REAL NOT NULL,
            cost_per_million_chars REAL NOT NULL,
            supports_binary INTEGER NOT NULL DEFAULT 0,
            supports_dimensionality_reduction INTEGER NOT NULL DEFAULT 0,
            min_dimensions INTEGER NOT NULL,
            model_type TEXT NOT NULL,
            is_available INTEGER NOT NULL DEFAULT 1,
            is_deprecated INTEGER NOT NULL DEFAULT 0,
            deprecation_date TEXT,
            minimum_tier TEXT NOT NULL DEFAULT 'free',
            requires_api_key INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            UNIQUE (provider, model_name)
        );

        CREATE TABLE IF NOT EXISTS tenant_embedding_models (
            tenant_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            is_enabled INTEGER NOT NULL DEFAULT 1,
            is_default INTEGER NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL DEFAULT 0,
            fallback_model_id TEXT,
            monthly_token_limit INTEGER,
            daily_token_limit INTEGER,
            monthly_request_limit INTEGER,
            agent_preferences TEXT NOT NULL DEFAULT '{}',
            cost_per_million_tokens_override REAL,
            cost_per_million_chars_override REAL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, model_id),
            FOREIGN KEY (model_id) REFERENCES embedding_model_catalog(id)
        );
        CREATE INDEX IF NOT EXISTS idx_tenant_embedding_models_tenant
            ON tenant_embedding_models (tenant_id, priority DESC, is_default DESC);

        CREATE TABLE IF NOT EXISTS embedding_usage_tracking (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            tokens_used INTEGER NOT NULL,
            request_count INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_embedding_usage_tracking_tenant_model_time
            ON embedding_usage_tracking (tenant_id, model_id, created_at);

        -- contexts, context_items, embeddings, context_embeddings (spec §3,
        -- §4.6, §6). Vector columns are BLOB (little-endian f32 buffers)
        -- since SQLite has no native vector type; see DESIGN.md.
        CREATE TABLE IF NOT EXISTS contexts (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            agent_id TEXT,
            session_id TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            properties TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_contexts_tenant ON contexts (tenant_id);

        CREATE TABLE IF NOT EXISTS context_items (
            id TEXT PRIMARY KEY,
            context_id TEXT NOT NULL REFERENCES contexts(id),
            content TEXT NOT NULL,
            item_type TEXT NOT NULL,
            score REAL NOT NULL DEFAULT 0,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_context_items_context ON context_items (context_id);

        CREATE TABLE IF NOT EXISTS embeddings (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            context_id TEXT,
            content_index INTEGER NOT NULL DEFAULT 0,
            chunk_index INTEGER NOT NULL DEFAULT 0,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            model_uuid TEXT NOT NULL,
            provider TEXT NOT NULL,
            model_name TEXT NOT NULL,
            model_dimensions INTEGER NOT NULL,
            embedding_1024 BLOB,
            vector BLOB,
            embedding BLOB,
            created_at TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_embeddings_context ON embeddings (context_id);
        CREATE INDEX IF NOT EXISTS idx_embeddings_tenant_model ON embeddings (tenant_id, model_uuid);
        CREATE INDEX IF NOT EXISTS idx_embeddings_content_hash ON embeddings (content_hash);

        CREATE TABLE IF NOT EXISTS context_embeddings (
            context_id TEXT NOT NULL REFERENCES contexts(id),
            embedding_id TEXT NOT NULL REFERENCES embeddings(id),
            chunk_sequence INTEGER NOT NULL,
            importance_score REAL NOT NULL DEFAULT 0,
            is_summary INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (context_id, chunk_sequence)
        );
        CREATE INDEX IF NOT EXISTS idx_context_embeddings_embedding ON context_embeddings (embedding_id);

        -- context_audit_log (spec §4.6 AuditContextAccess)
        CREATE TABLE IF NOT EXISTS context_audit_log (
            id TEXT PRIMARY KEY,
            context_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            operation TEXT NOT NULL,
            success INTEGER NOT NULL,
            error TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            occurred_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_context_audit_log_context ON context_audit_log (context_id, occurred_at);
        ",
    )
    .map_err(err)?;

    debug!("schema present");
    Ok(())
}
