//! Tenant-scoped model selection and usage limits (spec §4.3 "Tenant-scope
//! ops", "SetDefaultModel algorithm", "Selection function", "Usage limits").

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use meshcore_core::errors::ModelError;
use meshcore_core::models::TenantEmbeddingModel;
use meshcore_storage::StorageEngine;

fn storage_err(e: rusqlite::Error) -> meshcore_core::errors::StorageError {
    meshcore_core::errors::StorageError::Sqlite {
        message: e.to_string(),
    }
}

fn row_to_tenant_model(row: &Row) -> rusqlite::Result<TenantEmbeddingModel> {
    let tenant_id: String = row.get("tenant_id")?;
    let model_id: String = row.get("model_id")?;
    let fallback: Option<String> = row.get("fallback_model_id")?;
    let prefs: String = row.get("agent_preferences")?;
    let created_at: String = row.get("created_at")?;
    Ok(TenantEmbeddingModel {
        tenant_id: Uuid::parse_str(&tenant_id).unwrap_or_default(),
        model_id: Uuid::parse_str(&model_id).unwrap_or_default(),
        is_enabled: row.get::<_, i64>("is_enabled")? != 0,
        is_default: row.get::<_, i64>("is_default")? != 0,
        priority: row.get("priority")?,
        fallback_model_id: fallback.and_then(|s| Uuid::parse_str(&s).ok()),
        monthly_token_limit: row.get("monthly_token_limit")?,
        daily_token_limit: row.get("daily_token_limit")?,
        monthly_request_limit: row.get("monthly_request_limit")?,
        agent_preferences: serde_json::from_str(&prefs).unwrap_or_default(),
        cost_per_million_tokens_override: row.get("cost_per_million_tokens_override")?,
        cost_per_million_chars_override: row.get("cost_per_million_chars_override")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Result shape of `GetModelForRequest` (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub model_uuid: Uuid,
    pub model_id: String,
    pub provider: String,
    pub dimensions: i64,
    pub cost_per_million_tokens: f64,
    pub is_default: bool,
    pub priority: i64,
}

/// `CheckUsageLimits` result (spec §4.3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageLimitsCheck {
    pub is_within_limits: bool,
    pub month_tokens_used: i64,
    pub month_requests: i64,
    pub day_tokens_used: i64,
    pub day_requests: i64,
}

pub struct TenantModelSelector {
    storage: Arc<StorageEngine>,
}

impl TenantModelSelector {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    pub fn get_tenant_model(
        &self,
        tenant_id: Uuid,
        model_id: Uuid,
    ) -> Result<TenantEmbeddingModel, ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM tenant_embedding_models WHERE tenant_id = ?1 AND model_id = ?2",
                    params![tenant_id.to_string(), model_id.to_string()],
                    row_to_tenant_model,
                )
                .optional()
                .map_err(storage_err)
            })
            .map_err(ModelError::Storage)?
            .ok_or(ModelError::NotFound {
                model_id: model_id.to_string(),
            })
    }

    /// Ordered `(priority DESC, is_default DESC)` (spec §4.3).
    pub fn list_tenant_models(
        &self,
        tenant_id: Uuid,
        enabled_only: bool,
    ) -> Result<Vec<TenantEmbeddingModel>, ModelError> {
        let predicate = if enabled_only {
            "tenant_id = ?1 AND is_enabled = 1"
        } else {
            "tenant_id = ?1"
        };
        self.storage
            .with_conn(|conn| {
                let sql = format!(
                    "SELECT * FROM tenant_embedding_models WHERE {predicate}
                     ORDER BY priority DESC, is_default DESC"
                );
                let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
                let rows = stmt
                    .query_map(params![tenant_id.to_string()], row_to_tenant_model)
                    .map_err(storage_err)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
            })
            .map_err(ModelError::Storage)
    }

    pub fn get_default_model(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantEmbeddingModel>, ModelError> {
        Ok(self
            .list_tenant_models(tenant_id, true)?
            .into_iter()
            .find(|m| m.is_default))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_tenant_model(
        &self,
        tenant_id: Uuid,
        model_id: Uuid,
        priority: i64,
        monthly_token_limit: Option<i64>,
        daily_token_limit: Option<i64>,
        monthly_request_limit: Option<i64>,
    ) -> Result<TenantEmbeddingModel, ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO tenant_embedding_models
                        (tenant_id, model_id, is_enabled, is_default, priority,
                         fallback_model_id, monthly_token_limit, daily_token_limit,
                         monthly_request_limit, agent_preferences, created_at)
                     VALUES (?1, ?2, 1, 0, ?3, NULL, ?4, ?5, ?6, '{}', ?7)",
                    params![
                        tenant_id.to_string(),
                        model_id.to_string(),
                        priority,
                        monthly_token_limit,
                        daily_token_limit,
                        monthly_request_limit,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(storage_err)
            })
            .map_err(ModelError::Storage)?;
        self.get_tenant_model(tenant_id, model_id)
    }

    pub fn delete_tenant_model(&self, tenant_id: Uuid, model_id: Uuid) -> Result<(), ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "DELETE FROM tenant_embedding_models WHERE tenant_id = ?1 AND model_id = ?2",
                    params![tenant_id.to_string(), model_id.to_string()],
                )
                .map_err(storage_err)
            })
            .map(|_| ())
            .map_err(ModelError::Storage)
    }

    pub fn update_priority(
        &self,
        tenant_id: Uuid,
        model_id: Uuid,
        priority: i64,
    ) -> Result<(), ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE tenant_embedding_models SET priority = ?1
                     WHERE tenant_id = ?2 AND model_id = ?3",
                    params![priority, tenant_id.to_string(), model_id.to_string()],
                )
                .map_err(storage_err)
            })
            .map(|_| ())
            .map_err(ModelError::Storage)
    }

    pub fn bulk_set_enabled(
        &self,
        tenant_id: Uuid,
        model_ids: &[Uuid],
        enabled: bool,
    ) -> Result<usize, ModelError> {
        self.storage
            .transaction(|tx| {
                let mut count = 0;
                for model_id in model_ids {
                    count += tx
                        .execute(
                            "UPDATE tenant_embedding_models SET is_enabled = ?1
                             WHERE tenant_id = ?2 AND model_id = ?3",
                            params![enabled as i64, tenant_id.to_string(), model_id.to_string()],
                        )
                        .map_err(storage_err)?;
                }
                Ok(count)
            })
            .map_err(ModelError::Storage)
    }

    /// Single transaction: clear every default for the tenant, then set the
    /// new one; fails if the set affects zero rows (spec §4.3 algorithm).
    /// The transaction helper rolls back automatically on `Err`, which is
    /// the "rollback-on-early-return guard" spec §4.3 calls for.
    #[instrument(skip(self))]
    pub fn set_default_model(&self, tenant_id: Uuid, model_id: Uuid) -> Result<(), ModelError> {
        self.storage
            .transaction(|tx| {
                tx.execute(
                    "UPDATE tenant_embedding_models SET is_default = 0 WHERE tenant_id = ?1",
                    params![tenant_id.to_string()],
                )
                .map_err(storage_err)?;

                let affected = tx
                    .execute(
                        "UPDATE tenant_embedding_models SET is_default = 1
                         WHERE tenant_id = ?1 AND model_id = ?2",
                        params![tenant_id.to_string(), model_id.to_string()],
                    )
                    .map_err(storage_err)?;

                if affected == 0 {
                    return Err(meshcore_core::errors::StorageError::Sqlite {
                        message: "set_default affected zero rows".into(),
                    });
                }
                Ok(())
            })
            .map_err(|e| match &e {
                meshcore_core::errors::StorageError::Sqlite { message }
                    if message == "set_default affected zero rows" =>
                {
                    ModelError::SetDefaultFailed {
                        tenant_id: tenant_id.to_string(),
                        model_id: model_id.to_string(),
                    }
                }
                _ => ModelError::Storage(e),
            })
    }

    /// spec §4.3 "Selection function": policy-ordered pick among the
    /// tenant's enabled, non-deprecated models.
    pub fn get_model_for_request(
        &self,
        tenant_id: Uuid,
        agent: Option<&str>,
        task_type: Option<&str>,
        requested_model: Option<&str>,
    ) -> Result<ResolvedModel, ModelError> {
        let candidates = self.storage.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT tem.tenant_id, tem.model_id, tem.is_enabled, tem.is_default,
                            tem.priority, tem.fallback_model_id, tem.monthly_token_limit,
                            tem.daily_token_limit, tem.monthly_request_limit,
                            tem.agent_preferences, tem.cost_per_million_tokens_override,
                            tem.cost_per_million_chars_override, tem.created_at,
                            emc.model_id AS catalog_model_id, emc.provider, emc.dimensions,
                            emc.cost_per_million_tokens, emc.created_at AS model_created_at
                     FROM tenant_embedding_models tem
                     JOIN embedding_model_catalog emc ON emc.id = tem.model_id
                     WHERE tem.tenant_id = ?1 AND tem.is_enabled = 1 AND emc.is_deprecated = 0",
                )
                .map_err(storage_err)?;

            let rows = stmt
                .query_map(params![tenant_id.to_string()], |row| {
                    let model_uuid: String = row.get("model_id")?;
                    let model_created_at: String = row.get("model_created_at")?;
                    let prefs: String = row.get("agent_preferences")?;
                    Ok((
                        Uuid::parse_str(&model_uuid).unwrap_or_default(),
                        row.get::<_, String>("catalog_model_id")?,
                        row.get::<_, String>("provider")?,
                        row.get::<_, i64>("dimensions")?,
                        row.get::<_, f64>("cost_per_million_tokens")?,
                        row.get::<_, i64>("is_default")? != 0,
                        row.get::<_, i64>("priority")?,
                        serde_json::from_str::<HashMap<String, String>>(&prefs).unwrap_or_default(),
                        DateTime::parse_from_rfc3339(&model_created_at)
                            .unwrap()
                            .with_timezone(&Utc),
                    ))
                })
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        });

        #[allow(clippy::type_complexity)]
        let candidates: Vec<(
            Uuid,
            String,
            String,
            i64,
            f64,
            bool,
            i64,
            HashMap<String, String>,
            DateTime<Utc>,
        )> = candidates.map_err(ModelError::Storage)?;

        if candidates.is_empty() {
            return Err(ModelError::NoModelAvailable {
                tenant_id: tenant_id.to_string(),
            });
        }

        // 1. requested_model names an enabled tenant model.
        if let Some(requested) = requested_model {
            if let Some(c) = candidates.iter().find(|c| c.1 == requested) {
                return Ok(Self::to_resolved(c));
            }
        }

        // 2. agent has a preference entry for task_type.
        if let (Some(_agent), Some(task_type)) = (agent, task_type) {
            if let Some(c) = candidates
                .iter()
                .find(|c| c.7.get(task_type).map(|m| m.as_str()) == Some(c.1.as_str()))
            {
                return Ok(Self::to_resolved(c));
            }
        }

        // 3/4. highest priority, tie-break by is_default then created_at asc.
        let best = candidates.iter().max_by(|a, b| {
            a.6.cmp(&b.6)
                .then(a.5.cmp(&b.5))
                .then(b.8.cmp(&a.8))
        });

        best.map(Self::to_resolved).ok_or(ModelError::NoModelAvailable {
            tenant_id: tenant_id.to_string(),
        })
    }

    fn to_resolved(
        c: &(
            Uuid,
            String,
            String,
            i64,
            f64,
            bool,
            i64,
            HashMap<String, String>,
            DateTime<Utc>,
        ),
    ) -> ResolvedModel {
        ResolvedModel {
            model_uuid: c.0,
            model_id: c.1.clone(),
            provider: c.2.clone(),
            dimensions: c.3,
            cost_per_million_tokens: c.4,
            is_default: c.5,
            priority: c.6,
        }
    }

    /// Sums `embedding_usage_tracking` over month-to-date and day-to-date
    /// windows and compares against the tenant override's limits (spec
    /// §4.3 "Usage limits"; a `None` limit means unlimited).
    pub fn check_usage_limits(
        &self,
        tenant_id: Uuid,
        model_id: Uuid,
    ) -> Result<UsageLimitsCheck, ModelError> {
        let tenant_model = self.get_tenant_model(tenant_id, model_id)?;
        let now = Utc::now();
        let month_start = now
            .with_day(1)
            .unwrap()
            .with_hour(0)
            .unwrap()
            .with_minute(0)
            .unwrap()
            .with_second(0)
            .unwrap();
        let day_start = now
            .with_hour(0)
            .unwrap()
            .with_minute(0)
            .unwrap()
            .with_second(0)
            .unwrap();

        let (month_tokens, month_requests, day_tokens, day_requests) = self
            .storage
            .with_conn(|conn| {
                let (mt, mr) = conn
                    .query_row(
                        "SELECT COALESCE(SUM(tokens_used), 0), COALESCE(SUM(request_count), 0)
                         FROM embedding_usage_tracking
                         WHERE tenant_id = ?1 AND model_id = ?2 AND created_at >= ?3",
                        params![tenant_id.to_string(), model_id.to_string(), month_start.to_rfc3339()],
                        |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)),
                    )
                    .map_err(storage_err)?;
                let (dt, dr) = conn
                    .query_row(
                        "SELECT COALESCE(SUM(tokens_used), 0), COALESCE(SUM(request_count), 0)
                         FROM embedding_usage_tracking
                         WHERE tenant_id = ?1 AND model_id = ?2 AND created_at >= ?3",
                        params![tenant_id.to_string(), model_id.to_string(), day_start.to_rfc3339()],
                        |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)),
                    )
                    .map_err(storage_err)?;
                Ok((mt, mr, dt, dr))
            })
            .map_err(ModelError::Storage)?;

        let within = tenant_model
            .monthly_token_limit
            .map(|l| month_tokens < l)
            .unwrap_or(true)
            && tenant_model
                .daily_token_limit
                .map(|l| day_tokens < l)
                .unwrap_or(true)
            && tenant_model
                .monthly_request_limit
                .map(|l| month_requests < l)
                .unwrap_or(true);

        Ok(UsageLimitsCheck {
            is_within_limits: within,
            month_tokens_used: month_tokens,
            month_requests,
            day_tokens_used: day_tokens,
            day_requests,
        })
    }

    pub fn record_usage(
        &self,
        tenant_id: Uuid,
        model_id: Uuid,
        tokens_used: i64,
    ) -> Result<(), ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO embedding_usage_tracking (id, tenant_id, model_id, tokens_used, request_count, created_at)
                     VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                    params![
                        Uuid::new_v4().to_string(),
                        tenant_id.to_string(),
                        model_id.to_string(),
                        tokens_used,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(storage_err)
            })
            .map(|_| ())
            .map_err(ModelError::Storage)
    }
}
