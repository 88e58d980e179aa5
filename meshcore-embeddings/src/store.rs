//! Embedding write path and similarity search (spec §4.6).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tracing::instrument;
use uuid::Uuid;

use meshcore_core::errors::ContextError;
use meshcore_core::models::{Embedding, VectorColumn};
use meshcore_models::ModelCatalog;
use meshcore_storage::{decode_vector, encode_vector, StorageEngine};

fn storage_err(e: rusqlite::Error) -> meshcore_core::errors::StorageError {
    meshcore_core::errors::StorageError::Sqlite {
        message: e.to_string(),
    }
}

/// Splits a `provider/model_name` id, or infers the provider from known
/// prefixes when no `/` is present (spec §4.6 step 1).
pub fn resolve_provider_and_name(model_id: &str) -> (String, String) {
    if let Some((provider, name)) = model_id.split_once('/') {
        return (provider.to_string(), name.to_string());
    }
    let provider = if model_id.starts_with("amazon.")
        || model_id.starts_with("cohere.")
        || model_id.starts_with("anthropic.")
    {
        "bedrock"
    } else if model_id.starts_with("text-embedding") {
        "openai"
    } else {
        "bedrock"
    };
    (provider.to_string(), model_id.to_string())
}

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn row_to_embedding(row: &Row) -> rusqlite::Result<Embedding> {
    let id: String = row.get("id")?;
    let tenant_id: String = row.get("tenant_id")?;
    let context_id: Option<String> = row.get("context_id")?;
    let model_uuid: String = row.get("model_uuid")?;
    let created_at: String = row.get("created_at")?;
    let dims: i64 = row.get("model_dimensions")?;
    let metadata: String = row.get("metadata")?;
    let column = VectorColumn::for_dimensions(dims).ok_or(rusqlite::Error::InvalidQuery)?;
    let bytes: Vec<u8> = row.get(column.column_name())?;
    Ok(Embedding {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        tenant_id: Uuid::parse_str(&tenant_id).unwrap_or_default(),
        context_id: context_id.and_then(|s| Uuid::parse_str(&s).ok()),
        content_index: row.get("content_index")?,
        chunk_index: row.get("chunk_index")?,
        content: row.get("content")?,
        content_hash: row.get("content_hash")?,
        model_uuid: Uuid::parse_str(&model_uuid).unwrap_or_default(),
        provider: row.get("provider")?,
        model_name: row.get("model_name")?,
        model_dimensions: dims,
        vector: decode_vector(&bytes),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::json!({})),
    })
}

/// Inputs to `StoreEmbedding` (spec §4.6).
#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub tenant_id: Uuid,
    pub context_id: Option<Uuid>,
    pub content_index: i64,
    pub chunk_index: i64,
    pub content: String,
    pub model_id: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

pub struct EmbeddingStore {
    storage: Arc<StorageEngine>,
    catalog: Arc<ModelCatalog>,
}

impl EmbeddingStore {
    pub fn new(storage: Arc<StorageEngine>, catalog: Arc<ModelCatalog>) -> Self {
        Self { storage, catalog }
    }

    #[instrument(skip(self, new))]
    pub fn store_embedding(&self, new: NewEmbedding) -> Result<Embedding, ContextError> {
        let (provider, model_name) = resolve_provider_and_name(&new.model_id);
        let model = self
            .catalog
            .get_by_model_id(&new.model_id)
            .or_else(|_| self.catalog.get_by_model_id(&model_name))
            .map_err(|_| ContextError::UnknownModel {
                model_id: new.model_id.clone(),
            })?;
        let column = VectorColumn::for_dimensions(model.dimensions).ok_or(
            ContextError::UnsupportedDimensions {
                dimensions: model.dimensions,
            },
        )?;

        let source_is_rag = new
            .metadata
            .get("source_type")
            .and_then(|v| v.as_str())
            .map(|s| s == "rag")
            .unwrap_or(false);
        let context_id = if source_is_rag { None } else { new.context_id };
        let hash = content_hash(&new.content);
        let id = Uuid::new_v4();
        let now = Utc::now();
        let bytes = encode_vector(&new.vector);

        self.storage
            .with_conn(|conn| {
                let sql = format!(
                    "INSERT INTO embeddings
                        (id, tenant_id, context_id, content_index, chunk_index, content,
                         content_hash, model_uuid, provider, model_name, model_dimensions,
                         {col}, created_at, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                     ON CONFLICT (id) DO UPDATE SET
                        content = excluded.content,
                        content_hash = excluded.content_hash,
                        {col} = excluded.{col},
                        metadata = excluded.metadata",
                    col = column.column_name()
                );
                conn.execute(
                    &sql,
                    params![
                        id.to_string(),
                        new.tenant_id.to_string(),
                        context_id.map(|c| c.to_string()),
                        new.content_index,
                        new.chunk_index,
                        new.content,
                        hash,
                        model.id.to_string(),
                        provider,
                        model_name,
                        model.dimensions,
                        bytes,
                        now.to_rfc3339(),
                        new.metadata.to_string(),
                    ],
                )
                .map_err(storage_err)
            })
            .map_err(ContextError::Storage)?;

        self.get_embedding(id)
    }

    /// `StoreContextEmbedding`: stores the embedding, then replaces the
    /// `(context_id, chunk_sequence)` link in one transaction (spec §4.6).
    #[instrument(skip(self, new))]
    pub fn store_context_embedding(
        &self,
        context_id: Uuid,
        new: NewEmbedding,
        chunk_sequence: i64,
        importance_score: f64,
    ) -> Result<Embedding, ContextError> {
        let embedding = self.store_embedding(new)?;
        let now = Utc::now().to_rfc3339();
        self.storage
            .transaction(|tx| {
                tx.execute(
                    "DELETE FROM context_embeddings WHERE context_id = ?1 AND chunk_sequence = ?2",
                    params![context_id.to_string(), chunk_sequence],
                )
                .map_err(storage_err)?;
                tx.execute(
                    "INSERT INTO context_embeddings
                        (context_id, embedding_id, chunk_sequence, importance_score,
                         is_summary, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                    params![
                        context_id.to_string(),
                        embedding.id.to_string(),
                        chunk_sequence,
                        importance_score,
                        now,
                    ],
                )
                .map_err(storage_err)
            })
            .map_err(ContextError::Storage)?;
        Ok(embedding)
    }

    pub fn get_embedding(&self, id: Uuid) -> Result<Embedding, ContextError> {
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM embeddings WHERE id = ?1",
                    params![id.to_string()],
                    row_to_embedding,
                )
                .optional()
                .map_err(storage_err)
            })
            .map_err(ContextError::Storage)?
            .ok_or(ContextError::EmbeddingNotFound { id: id.to_string() })
    }

    /// `SearchEmbeddings`: filters by context/model, sorts by decreasing
    /// similarity, drops rows below `similarity_threshold` (spec §4.6).
    pub fn search_embeddings(
        &self,
        query_vector: &[f32],
        context_id: Option<Uuid>,
        model_uuid: Option<Uuid>,
        limit: usize,
        similarity_threshold: f64,
    ) -> Result<Vec<(Embedding, f64)>, ContextError> {
        let mut sql = "SELECT * FROM embeddings WHERE 1 = 1".to_string();
        let mut conds = Vec::new();
        if context_id.is_some() {
            conds.push("context_id = ?".to_string());
        }
        if model_uuid.is_some() {
            conds.push("model_uuid = ?".to_string());
        }
        for c in &conds {
            sql.push_str(" AND ");
            sql.push_str(c);
        }

        let rows = self
            .storage
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
                let mut bind = Vec::new();
                if let Some(c) = context_id {
                    bind.push(c.to_string());
                }
                if let Some(m) = model_uuid {
                    bind.push(m.to_string());
                }
                let refs: Vec<&dyn rusqlite::ToSql> =
                    bind.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
                let rows = stmt
                    .query_map(refs.as_slice(), row_to_embedding)
                    .map_err(storage_err)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
            })
            .map_err(ContextError::Storage)?;

        let mut scored: Vec<(Embedding, f64)> = rows
            .into_iter()
            .map(|e| {
                let sim = cosine_similarity(query_vector, &e.vector);
                (e, sim)
            })
            .filter(|(_, sim)| *sim >= similarity_threshold)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Joins through `context_embeddings`, ordered by `chunk_sequence`.
    pub fn get_context_embeddings_by_sequence(
        &self,
        context_id: Uuid,
        start: i64,
        end: i64,
    ) -> Result<Vec<Embedding>, ContextError> {
        self.storage
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT e.* FROM embeddings e
                         JOIN context_embeddings ce ON ce.embedding_id = e.id
                         WHERE ce.context_id = ?1 AND ce.chunk_sequence BETWEEN ?2 AND ?3
                         ORDER BY ce.chunk_sequence ASC",
                    )
                    .map_err(storage_err)?;
                let rows = stmt
                    .query_map(params![context_id.to_string(), start, end], row_to_embedding)
                    .map_err(storage_err)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
            })
            .map_err(ContextError::Storage)
    }
}
