//! Credential CRUD, lifecycle queries, and audit trail (spec §4.4).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use meshcore_core::config::CredentialsConfig;
use meshcore_core::errors::CredentialError;
use meshcore_core::models::{Credential, CredentialAudit, CredentialType};
use meshcore_crypto::EncryptionService;
use meshcore_storage::StorageEngine;

use crate::validation;

pub struct CredentialStore {
    storage: Arc<StorageEngine>,
    encryption: EncryptionService,
    config: CredentialsConfig,
}

fn credential_type_str(t: CredentialType) -> &'static str {
    match t {
        CredentialType::ApiKey => "api_key",
        CredentialType::Basic => "basic",
        CredentialType::OAuth2 => "oauth2",
    }
}

fn parse_credential_type(s: &str) -> CredentialType {
    match s {
        "basic" => CredentialType::Basic,
        "oauth2" => CredentialType::OAuth2,
        _ => CredentialType::ApiKey,
    }
}

fn row_to_credential(row: &Row) -> rusqlite::Result<Credential> {
    let id: String = row.get("id")?;
    let tenant_id: String = row.get("tenant_id")?;
    let credential_type: String = row.get("credential_type")?;
    let tags: String = row.get("tags")?;
    let allowed_edge_ids: String = row.get("allowed_edge_ids")?;
    let metadata: String = row.get("metadata")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let expires_at: Option<String> = row.get("expires_at")?;
    let last_used_at: Option<String> = row.get("last_used_at")?;
    let oauth_token_expiry: Option<String> = row.get("oauth_token_expiry")?;

    Ok(Credential {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        tenant_id: Uuid::parse_str(&tenant_id).unwrap_or_default(),
        tool_id: row.get("tool_id")?,
        name: row.get("name")?,
        credential_type: parse_credential_type(&credential_type),
        encrypted_value: row.get("encrypted_value")?,
        oauth_client_id: row.get("oauth_client_id")?,
        oauth_client_secret_encrypted: row.get("oauth_client_secret_encrypted")?,
        oauth_refresh_token_encrypted: row.get("oauth_refresh_token_encrypted")?,
        oauth_token_expiry: oauth_token_expiry.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        is_active: row.get::<_, i64>("is_active")? != 0,
        last_used_at: last_used_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))),
        expires_at: expires_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))),
        allowed_edge_ids: serde_json::from_str(&allowed_edge_ids).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at).unwrap().with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at).unwrap().with_timezone(&Utc),
    })
}

#[derive(Debug, Clone)]
pub struct NewCredential {
    pub tenant_id: Uuid,
    pub tool_id: Option<String>,
    pub name: String,
    pub credential_type: CredentialType,
    pub value: String,
    pub oauth_client_id: Option<String>,
    pub oauth_refresh_token: Option<String>,
    pub oauth_token_expiry: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub allowed_edge_ids: Vec<String>,
    pub metadata: serde_json::Value,
}

impl CredentialStore {
    pub fn new(
        storage: Arc<StorageEngine>,
        encryption: EncryptionService,
        config: CredentialsConfig,
    ) -> Self {
        Self {
            storage,
            encryption,
            config,
        }
    }

    fn write_audit(
        &self,
        conn: &Connection,
        credential_id: Uuid,
        operation: &str,
        success: bool,
        error: Option<&str>,
    ) {
        // Audit failures are logged and swallowed; they never mask the
        // underlying operation's result (spec §4.4, §7).
        let result = conn.execute(
            "INSERT INTO user_credentials_audit
                (id, credential_id, operation, success, error, ip, user_agent, metadata, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, '{}', ?6)",
            params![
                Uuid::new_v4().to_string(),
                credential_id.to_string(),
                operation,
                success as i64,
                error,
                Utc::now().to_rfc3339(),
            ],
        );
        if let Err(e) = result {
            warn!(credential_id = %credential_id, operation, error = %e, "audit write failed");
        }
    }

    #[instrument(skip(self, new), fields(tenant_id = %new.tenant_id, name = %new.name))]
    pub fn create_credential(&self, new: NewCredential) -> Result<Credential, CredentialError> {
        validation::validate(
            new.credential_type,
            &new.value,
            self.config.require_strong_passwords,
            self.config.min_password_length,
            new.oauth_client_id.as_deref(),
            new.oauth_refresh_token.as_deref(),
        )?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let tenant_str = new.tenant_id.to_string();
        let encrypted_value = self
            .encryption
            .encrypt(new.value.as_bytes(), &tenant_str)
            .map_err(CredentialError::Encryption)?;
        let oauth_refresh_encrypted = new
            .oauth_refresh_token
            .as_ref()
            .map(|t| self.encryption.encrypt(t.as_bytes(), &tenant_str))
            .transpose()
            .map_err(CredentialError::Encryption)?;

        let expires_at = new
            .expires_at
            .unwrap_or_else(|| now + Duration::days(self.config.default_expiry_days));

        let result = self.storage.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tenant_tool_credentials
                    (id, tenant_id, tool_id, name, credential_type, encrypted_value,
                     oauth_client_id, oauth_client_secret_encrypted, oauth_refresh_token_encrypted,
                     oauth_token_expiry, tags, is_active, last_used_at, expires_at,
                     allowed_edge_ids, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?10, 1, NULL, ?11, ?12, ?13, ?14, ?14)",
                params![
                    id.to_string(),
                    tenant_str,
                    new.tool_id,
                    new.name,
                    credential_type_str(new.credential_type),
                    encrypted_value,
                    new.oauth_client_id,
                    oauth_refresh_encrypted,
                    new.oauth_token_expiry.map(|d| d.to_rfc3339()),
                    serde_json::to_string(&new.tags).unwrap(),
                    expires_at.to_rfc3339(),
                    serde_json::to_string(&new.allowed_edge_ids).unwrap(),
                    serde_json::to_string(&new.metadata).unwrap(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if e.to_string().contains("UNIQUE") {
                    meshcore_core::errors::StorageError::AlreadyExists {
                        tenant_id: tenant_str.clone(),
                        name: new.name.clone(),
                    }
                } else {
                    meshcore_core::errors::StorageError::Sqlite {
                        message: e.to_string(),
                    }
                }
            })?;
            self.write_audit(conn, id, "create", true, None);
            Ok(())
        });

        match result {
            Ok(()) => self.get_credential_row(id),
            Err(meshcore_core::errors::StorageError::AlreadyExists { tenant_id, name }) => {
                Err(CredentialError::AlreadyExists { tenant_id, name })
            }
            Err(e) => Err(CredentialError::Storage(e)),
        }
    }

    fn get_credential_row(&self, id: Uuid) -> Result<Credential, CredentialError> {
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM tenant_tool_credentials WHERE id = ?1",
                    params![id.to_string()],
                    row_to_credential,
                )
                .optional()
                .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                    message: e.to_string(),
                })
            })
            .map_err(CredentialError::Storage)?
            .ok_or_else(|| CredentialError::NotFound { id: id.to_string() })
    }

    /// `GetCredential(id)` read path (spec §4.4): checks active/expiry,
    /// decrypts, bumps `last_used_at` best-effort, audits.
    #[instrument(skip(self))]
    pub fn get_credential(&self, id: Uuid) -> Result<(Credential, String), CredentialError> {
        let cred = self.get_credential_row(id)?;

        if !cred.is_active {
            self.storage
                .with_conn(|conn| {
                    self.write_audit(conn, id, "read", false, Some("inactive"));
                    Ok(())
                })
                .ok();
            return Err(CredentialError::Inactive { id: id.to_string() });
        }
        if let Some(expires_at) = cred.expires_at {
            if expires_at <= Utc::now() {
                self.storage
                    .with_conn(|conn| {
                        self.write_audit(conn, id, "read", false, Some("expired"));
                        Ok(())
                    })
                    .ok();
                return Err(CredentialError::Expired { id: id.to_string() });
            }
        }

        let tenant_str = cred.tenant_id.to_string();
        let plaintext = self
            .encryption
            .decrypt(&cred.encrypted_value, &tenant_str)
            .map_err(CredentialError::Encryption)?;
        let plaintext = String::from_utf8_lossy(&plaintext).to_string();

        let update_result = self.storage.with_conn(|conn| {
            conn.execute(
                "UPDATE tenant_tool_credentials SET last_used_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
            .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                message: e.to_string(),
            })?;
            self.write_audit(conn, id, "read", true, None);
            Ok(())
        });
        if let Err(e) = update_result {
            warn!(credential_id = %id, error = %e, "failed to bump last_used_at; read still succeeds");
        }

        Ok((cred, plaintext))
    }

    /// Re-encrypts under a fresh salt, preserving `id` (spec §4.4 "Rotation").
    #[instrument(skip(self, new_value))]
    pub fn rotate_credential(
        &self,
        id: Uuid,
        new_value: &str,
        new_expiry: Option<DateTime<Utc>>,
    ) -> Result<Credential, CredentialError> {
        let cred = self.get_credential_row(id)?;
        let tenant_str = cred.tenant_id.to_string();
        let encrypted = self
            .encryption
            .encrypt(new_value.as_bytes(), &tenant_str)
            .map_err(CredentialError::Encryption)?;

        let expires_at = new_expiry.or(cred.expires_at);
        let result = self.storage.with_conn(|conn| {
            conn.execute(
                "UPDATE tenant_tool_credentials
                 SET encrypted_value = ?1, expires_at = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![
                    encrypted,
                    expires_at.map(|d| d.to_rfc3339()),
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                ],
            )
            .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                message: e.to_string(),
            })?;
            // Never logs the plaintext, only that rotation succeeded.
            self.write_audit(conn, id, "rotate", true, None);
            Ok(())
        });
        result.map_err(CredentialError::Storage)?;
        self.get_credential_row(id)
    }

    /// Soft delete: `is_active = false`.
    pub fn deactivate(&self, id: Uuid) -> Result<(), CredentialError> {
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE tenant_tool_credentials SET is_active = 0, updated_at = ?1 WHERE id = ?2",
                    params![Utc::now().to_rfc3339(), id.to_string()],
                )
                .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                    message: e.to_string(),
                })?;
                self.write_audit(conn, id, "deactivate", true, None);
                Ok(())
            })
            .map_err(CredentialError::Storage)
    }

    /// Hard delete: the only compliance-grade removal (spec §3).
    pub fn hard_delete(&self, id: Uuid) -> Result<(), CredentialError> {
        self.storage
            .with_conn(|conn| {
                self.write_audit(conn, id, "hard_delete", true, None);
                conn.execute(
                    "DELETE FROM tenant_tool_credentials WHERE id = ?1",
                    params![id.to_string()],
                )
                .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                    message: e.to_string(),
                })?;
                Ok(())
            })
            .map_err(CredentialError::Storage)
    }

    /// Active rows with `expires_at` in `(now, now+within]`.
    pub fn check_expiring(&self, within: Duration) -> Result<Vec<Credential>, CredentialError> {
        let now = Utc::now();
        let horizon = now + within;
        self.storage
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT * FROM tenant_tool_credentials
                         WHERE is_active = 1 AND expires_at IS NOT NULL
                           AND expires_at > ?1 AND expires_at <= ?2",
                    )
                    .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                        message: e.to_string(),
                    })?;
                let rows = stmt
                    .query_map(params![now.to_rfc3339(), horizon.to_rfc3339()], row_to_credential)
                    .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                        message: e.to_string(),
                    })?;
                rows.collect::<Result<Vec<_>, _>>().map_err(|e| {
                    meshcore_core::errors::StorageError::Sqlite {
                        message: e.to_string(),
                    }
                })
            })
            .map_err(CredentialError::Storage)
    }

    /// Deactivates active rows with `expires_at <= now`; returns count.
    pub fn enforce_expiry(&self) -> Result<u64, CredentialError> {
        let now = Utc::now().to_rfc3339();
        self.storage
            .with_conn(|conn| {
                let affected = conn
                    .execute(
                        "UPDATE tenant_tool_credentials
                         SET is_active = 0, updated_at = ?1
                         WHERE is_active = 1 AND expires_at IS NOT NULL AND expires_at <= ?1",
                        params![now],
                    )
                    .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                        message: e.to_string(),
                    })?;
                Ok(affected as u64)
            })
            .map_err(CredentialError::Storage)
    }

    /// Active rows never used, or not used since `now - threshold`.
    pub fn check_inactive(&self, threshold: Duration) -> Result<Vec<Credential>, CredentialError> {
        let cutoff = (Utc::now() - threshold).to_rfc3339();
        self.storage
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT * FROM tenant_tool_credentials
                         WHERE is_active = 1 AND (last_used_at IS NULL OR last_used_at < ?1)",
                    )
                    .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                        message: e.to_string(),
                    })?;
                let rows = stmt
                    .query_map(params![cutoff], row_to_credential)
                    .map_err(|e| meshcore_core::errors::StorageError::Sqlite {
                        message: e.to_string(),
                    })?;
                rows.collect::<Result<Vec<_>, _>>().map_err(|e| {
                    meshcore_core::errors::StorageError::Sqlite {
                        message: e.to_string(),
                    }
                })
            })
            .map_err(CredentialError::Storage)
    }

    pub fn list_audit(&self, credential_id: Uuid) -> Result<Vec<CredentialAudit>, CredentialError> {
        self.storage
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, credential_id, operation, success, error, ip, user_agent, metadata, occurred_at
                         FROM user_credentials_audit WHERE credential_id = ?1 ORDER BY occurred_at ASC",
                    )
                    .map_err(|e| meshcore_core::errors::StorageError::Sqlite { message: e.to_string() })?;
                let rows = stmt
                    .query_map(params![credential_id.to_string()], |row| {
                        let metadata: String = row.get("metadata")?;
                        Ok(CredentialAudit {
                            id: Uuid::parse_str(&row.get::<_, String>("id")?).unwrap_or_default(),
                            credential_id: Uuid::parse_str(&row.get::<_, String>("credential_id")?)
                                .unwrap_or_default(),
                            operation: row.get("operation")?,
                            success: row.get::<_, i64>("success")? != 0,
                            error: row.get("error")?,
                            ip: row.get("ip")?,
                            user_agent: row.get("user_agent")?,
                            metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                            occurred_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("occurred_at")?)
                                .unwrap()
                                .with_timezone(&Utc),
                        })
                    })
                    .map_err(|e| meshcore_core::errors::StorageError::Sqlite { message: e.to_string() })?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(|e| meshcore_core::errors::StorageError::Sqlite { message: e.to_string() })
            })
            .map_err(CredentialError::Storage)
    }
}
