//! Embedding model catalog: the provider/model_name-keyed registry of
//! embedding models available to route to (spec §4.3 "Catalog ops").

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use meshcore_core::errors::ModelError;
use meshcore_core::models::EmbeddingModel;
use meshcore_storage::StorageEngine;

fn storage_err(e: rusqlite::Error) -> meshcore_core::errors::StorageError {
    meshcore_core::errors::StorageError::Sqlite {
        message: e.to_string(),
    }
}

fn row_to_model(row: &Row) -> rusqlite::Result<EmbeddingModel> {
    let id: String = row.get("id")?;
    let created_at: String = row.get("created_at")?;
    let deprecation_date: Option<String> = row.get("deprecation_date")?;
    Ok(EmbeddingModel {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        model_id: row.get("model_id")?,
        provider: row.get("provider")?,
        model_name: row.get("model_name")?,
        dimensions: row.get("dimensions")?,
        max_tokens: row.get("max_tokens")?,
        cost_per_million_tokens: row.get("cost_per_million_tokens")?,
        cost_per_million_chars: row.get("cost_per_million_chars")?,
        supports_binary: row.get::<_, i64>("supports_binary")? != 0,
        supports_dimensionality_reduction: row
            .get::<_, i64>("supports_dimensionality_reduction")?
            != 0,
        min_dimensions: row.get("min_dimensions")?,
        model_type: row.get("model_type")?,
        is_available: row.get::<_, i64>("is_available")? != 0,
        is_deprecated: row.get::<_, i64>("is_deprecated")? != 0,
        deprecation_date: deprecation_date
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))),
        minimum_tier: row.get("minimum_tier")?,
        requires_api_key: row.get::<_, i64>("requires_api_key")? != 0,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
    })
}

#[derive(Debug, Clone, Default)]
pub struct NewModel {
    pub model_id: String,
    pub provider: String,
    pub model_name: String,
    pub dimensions: i64,
    pub max_tokens: i64,
    pub cost_per_million_tokens: f64,
    pub cost_per_million_chars: f64,
    pub supports_binary: bool,
    pub supports_dimensionality_reduction: bool,
    pub min_dimensions: i64,
    pub model_type: String,
    pub minimum_tier: String,
    pub requires_api_key: bool,
}

pub struct ModelCatalog {
    storage: Arc<StorageEngine>,
}

impl ModelCatalog {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<EmbeddingModel, ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM embedding_model_catalog WHERE id = ?1",
                    params![id.to_string()],
                    row_to_model,
                )
                .optional()
                .map_err(storage_err)
            })
            .map_err(ModelError::Storage)?
            .ok_or(ModelError::NotFound {
                model_id: id.to_string(),
            })
    }

    pub fn get_by_model_id(&self, model_id: &str) -> Result<EmbeddingModel, ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM embedding_model_catalog WHERE model_id = ?1",
                    params![model_id],
                    row_to_model,
                )
                .optional()
                .map_err(storage_err)
            })
            .map_err(ModelError::Storage)?
            .ok_or_else(|| ModelError::NotFound {
                model_id: model_id.to_string(),
            })
    }

    /// `is_available ∧ ¬is_deprecated` (spec §4.3).
    pub fn list_available(&self) -> Result<Vec<EmbeddingModel>, ModelError> {
        self.list_where("is_available = 1 AND is_deprecated = 0")
    }

    pub fn list_all(&self) -> Result<Vec<EmbeddingModel>, ModelError> {
        self.list_where("1 = 1")
    }

    fn list_where(&self, predicate: &str) -> Result<Vec<EmbeddingModel>, ModelError> {
        self.storage
            .with_conn(|conn| {
                let sql = format!("SELECT * FROM embedding_model_catalog WHERE {predicate}");
                let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
                let rows = stmt.query_map([], row_to_model).map_err(storage_err)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
            })
            .map_err(ModelError::Storage)
    }

    #[instrument(skip(self, new))]
    pub fn create(&self, new: NewModel) -> Result<EmbeddingModel, ModelError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO embedding_model_catalog
                        (id, model_id, provider, model_name, dimensions, max_tokens,
                         cost_per_million_tokens, cost_per_million_chars, supports_binary,
                         supports_dimensionality_reduction, min_dimensions, model_type,
                         is_available, is_deprecated, deprecation_date, minimum_tier,
                         requires_api_key, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, 0, NULL, ?13, ?14, ?15)",
                    params![
                        id.to_string(),
                        new.model_id,
                        new.provider,
                        new.model_name,
                        new.dimensions,
                        new.max_tokens,
                        new.cost_per_million_tokens,
                        new.cost_per_million_chars,
                        new.supports_binary as i64,
                        new.supports_dimensionality_reduction as i64,
                        new.min_dimensions,
                        new.model_type,
                        new.minimum_tier,
                        new.requires_api_key as i64,
                        now.to_rfc3339(),
                    ],
                )
                .map_err(storage_err)
            })
            .map_err(ModelError::Storage)?;
        self.get_by_id(id)
    }

    pub fn set_availability(&self, id: Uuid, is_available: bool) -> Result<(), ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE embedding_model_catalog SET is_available = ?1 WHERE id = ?2",
                    params![is_available as i64, id.to_string()],
                )
                .map_err(storage_err)
            })
            .map(|_| ())
            .map_err(ModelError::Storage)
    }

    /// Defaults `date` to now when omitted (spec §4.3 `MarkDeprecated`).
    pub fn mark_deprecated(&self, id: Uuid, date: Option<DateTime<Utc>>) -> Result<(), ModelError> {
        let date = date.unwrap_or_else(Utc::now);
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE embedding_model_catalog SET is_deprecated = 1, deprecation_date = ?1 WHERE id = ?2",
                    params![date.to_rfc3339(), id.to_string()],
                )
                .map_err(storage_err)
            })
            .map(|_| ())
            .map_err(ModelError::Storage)
    }

    pub fn delete(&self, id: Uuid) -> Result<(), ModelError> {
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "DELETE FROM embedding_model_catalog WHERE id = ?1",
                    params![id.to_string()],
                )
                .map_err(storage_err)
            })
            .map(|_| ())
            .map_err(ModelError::Storage)
    }

    /// Distinct provider among available models.
    pub fn get_providers(&self) -> Result<Vec<String>, ModelError> {
        self.storage
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT DISTINCT provider FROM embedding_model_catalog
                         WHERE is_available = 1 AND is_deprecated = 0 ORDER BY provider",
                    )
                    .map_err(storage_err)?;
                let rows = stmt
                    .query_map([], |r| r.get::<_, String>(0))
                    .map_err(storage_err)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
            })
            .map_err(ModelError::Storage)
    }

    /// Transactional upsert on `(provider, model_name)` (spec §4.3).
    pub fn bulk_upsert(&self, models: Vec<NewModel>) -> Result<usize, ModelError> {
        let now = Utc::now().to_rfc3339();
        self.storage
            .transaction(|tx| {
                let mut count = 0;
                for m in &models {
                    tx.execute(
                        "INSERT INTO embedding_model_catalog
                            (id, model_id, provider, model_name, dimensions, max_tokens,
                             cost_per_million_tokens, cost_per_million_chars, supports_binary,
                             supports_dimensionality_reduction, min_dimensions, model_type,
                             is_available, is_deprecated, deprecation_date, minimum_tier,
                             requires_api_key, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, 0, NULL, ?13, ?14, ?15)
                         ON CONFLICT (provider, model_name) DO UPDATE SET
                            model_id = excluded.model_id,
                            dimensions = excluded.dimensions,
                            max_tokens = excluded.max_tokens,
                            cost_per_million_tokens = excluded.cost_per_million_tokens,
                            cost_per_million_chars = excluded.cost_per_million_chars,
                            supports_binary = excluded.supports_binary,
                            supports_dimensionality_reduction = excluded.supports_dimensionality_reduction,
                            min_dimensions = excluded.min_dimensions,
                            model_type = excluded.model_type,
                            minimum_tier = excluded.minimum_tier,
                            requires_api_key = excluded.requires_api_key",
                        params![
                            Uuid::new_v4().to_string(),
                            m.model_id,
                            m.provider,
                            m.model_name,
                            m.dimensions,
                            m.max_tokens,
                            m.cost_per_million_tokens,
                            m.cost_per_million_chars,
                            m.supports_binary as i64,
                            m.supports_dimensionality_reduction as i64,
                            m.min_dimensions,
                            m.model_type,
                            m.minimum_tier,
                            m.requires_api_key as i64,
                            now,
                        ],
                    )
                    .map_err(storage_err)?;
                    count += 1;
                }
                Ok(count)
            })
            .map_err(ModelError::Storage)
    }
}
