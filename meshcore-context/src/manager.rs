//! Semantic Context Manager (spec §4.6): composes chunking, an injected
//! embedding provider, and the embedding store's retrieval primitives.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use meshcore_core::errors::ContextError;
use meshcore_core::models::{CompactionStrategy, Context, ContextRetrievalOptions, Embedding};
use meshcore_core::traits::{EmbeddingProvider, TextChunker, Tokenizer};
use meshcore_embeddings::{EmbeddingStore, NewEmbedding};
use meshcore_storage::StorageEngine;

fn storage_err(e: rusqlite::Error) -> meshcore_core::errors::StorageError {
    meshcore_core::errors::StorageError::Sqlite {
        message: e.to_string(),
    }
}

fn row_to_context(row: &Row) -> rusqlite::Result<Context> {
    let id: String = row.get("id")?;
    let tenant_id: String = row.get("tenant_id")?;
    let session_id: Option<String> = row.get("session_id")?;
    let properties: String = row.get("properties")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(Context {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        tenant_id: Uuid::parse_str(&tenant_id).unwrap_or_default(),
        name: row.get("name")?,
        agent_id: row.get("agent_id")?,
        session_id: session_id.and_then(|s| Uuid::parse_str(&s).ok()),
        status: row.get("status")?,
        properties: serde_json::from_str(&properties).unwrap_or(serde_json::json!({})),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .unwrap()
            .with_timezone(&Utc),
    })
}

#[derive(Debug, Clone, Default)]
pub struct NewContext {
    pub tenant_id: Uuid,
    pub name: String,
    pub agent_id: Option<String>,
    pub session_id: Option<Uuid>,
    pub properties: serde_json::Value,
}

pub struct ContextManager {
    storage: Arc<StorageEngine>,
    embeddings: Arc<EmbeddingStore>,
}

impl ContextManager {
    pub fn new(storage: Arc<StorageEngine>, embeddings: Arc<EmbeddingStore>) -> Self {
        Self { storage, embeddings }
    }

    pub fn create_context(&self, new: NewContext) -> Result<Context, ContextError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO contexts
                        (id, tenant_id, name, agent_id, session_id, status, properties,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7, ?7)",
                    params![
                        id.to_string(),
                        new.tenant_id.to_string(),
                        new.name,
                        new.agent_id,
                        new.session_id.map(|s| s.to_string()),
                        new.properties.to_string(),
                        now,
                    ],
                )
                .map_err(storage_err)
            })
            .map_err(ContextError::Storage)?;
        self.get_context(id, &ContextRetrievalOptions::default())
    }

    pub fn get_context(
        &self,
        id: Uuid,
        _options: &ContextRetrievalOptions,
    ) -> Result<Context, ContextError> {
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT * FROM contexts WHERE id = ?1",
                    params![id.to_string()],
                    row_to_context,
                )
                .optional()
                .map_err(storage_err)
            })
            .map_err(ContextError::Storage)?
            .ok_or(ContextError::NotFound { id: id.to_string() })
    }

    pub fn update_context_metadata(
        &self,
        id: Uuid,
        name: Option<String>,
        properties: Option<serde_json::Value>,
    ) -> Result<Context, ContextError> {
        let current = self.get_context(id, &ContextRetrievalOptions::default())?;
        let name = name.unwrap_or(current.name);
        let properties = properties.unwrap_or(current.properties);
        let now = Utc::now().to_rfc3339();
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE contexts SET name = ?1, properties = ?2, updated_at = ?3 WHERE id = ?4",
                    params![name, properties.to_string(), now, id.to_string()],
                )
                .map_err(storage_err)
            })
            .map_err(ContextError::Storage)?;
        self.get_context(id, &ContextRetrievalOptions::default())
    }

    pub fn delete_context(&self, id: Uuid) -> Result<(), ContextError> {
        self.storage
            .transaction(|tx| {
                tx.execute(
                    "DELETE FROM context_embeddings WHERE context_id = ?1",
                    params![id.to_string()],
                )
                .map_err(storage_err)?;
                tx.execute(
                    "DELETE FROM context_items WHERE context_id = ?1",
                    params![id.to_string()],
                )
                .map_err(storage_err)?;
                tx.execute("DELETE FROM contexts WHERE id = ?1", params![id.to_string()])
                    .map_err(storage_err)
            })
            .map(|_| ())
            .map_err(ContextError::Storage)
    }

    fn next_chunk_sequence(&self, context_id: Uuid) -> Result<i64, ContextError> {
        self.storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COALESCE(MAX(chunk_sequence), -1) FROM context_embeddings WHERE context_id = ?1",
                    params![context_id.to_string()],
                    |r| r.get::<_, i64>(0),
                )
                .map_err(storage_err)
            })
            .map(|max| max + 1)
            .map_err(ContextError::Storage)
    }

    /// Chunks `content`, embeds each chunk via `provider`, and writes the
    /// chunks + links with `chunk_sequence` strictly increasing from
    /// whatever the context already has (spec §4.6 `UpdateContext`).
    #[instrument(skip(self, content, provider, chunker))]
    pub async fn update_context(
        &self,
        context_id: Uuid,
        content: &str,
        model_id: &str,
        provider: &dyn EmbeddingProvider,
        chunker: &dyn TextChunker,
    ) -> Result<Vec<Embedding>, ContextError> {
        let context = self.get_context(context_id, &ContextRetrievalOptions::default())?;
        let chunks = chunker
            .chunk(content)
            .map_err(|e| ContextError::ProviderCall(e.to_string()))?;

        let mut next_seq = self.next_chunk_sequence(context_id)?;
        let mut stored = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = provider
                .embed(model_id, &chunk.content)
                .await
                .map_err(|e| ContextError::ProviderCall(e.to_string()))?;
            let embedding = self.embeddings.store_context_embedding(
                context_id,
                NewEmbedding {
                    tenant_id: context.tenant_id,
                    context_id: Some(context_id),
                    content_index: chunk.chunk_index as i64,
                    chunk_index: chunk.chunk_index as i64,
                    content: chunk.content,
                    model_id: model_id.to_string(),
                    vector,
                    metadata: chunk.metadata,
                },
                next_seq,
                0.5,
            )?;
            stored.push(embedding);
            next_seq += 1;
        }

        let now = Utc::now().to_rfc3339();
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE contexts SET updated_at = ?1 WHERE id = ?2",
                    params![now, context_id.to_string()],
                )
                .map_err(storage_err)
            })
            .map_err(ContextError::Storage)?;

        Ok(stored)
    }

    /// Embeds `query`, then calls `SearchEmbeddings` scoped to `context_id`.
    pub async fn search_context(
        &self,
        query: &str,
        context_id: Uuid,
        limit: usize,
        model_id: &str,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<(Embedding, f64)>, ContextError> {
        let vector = provider
            .embed(model_id, query)
            .await
            .map_err(|e| ContextError::ProviderCall(e.to_string()))?;
        self.embeddings
            .search_embeddings(&vector, Some(context_id), None, limit, 0.0)
    }

    /// Retrieves top-ranked items and greedily packs within `max_tokens` by
    /// descending relevance (spec §4.6 `GetRelevantContext`).
    pub async fn get_relevant_context(
        &self,
        context_id: Uuid,
        query: &str,
        max_tokens: usize,
        model_id: &str,
        provider: &dyn EmbeddingProvider,
        tokenizer: &dyn Tokenizer,
    ) -> Result<Vec<Embedding>, ContextError> {
        let ranked = self
            .search_context(query, context_id, usize::MAX, model_id, provider)
            .await?;

        let mut budget = max_tokens;
        let mut packed = Vec::new();
        for (embedding, _similarity) in ranked {
            let cost = tokenizer.count_tokens(&embedding.content);
            if cost > budget {
                continue;
            }
            budget -= cost;
            packed.push(embedding);
            if budget == 0 {
                break;
            }
        }
        Ok(packed)
    }

    /// Applies one of the five compaction strategies and records what ran
    /// in `contexts.properties.compaction` (spec §4.6 `CompactContext`).
    #[instrument(skip(self))]
    pub fn compact_context(
        &self,
        context_id: Uuid,
        strategy: CompactionStrategy,
    ) -> Result<usize, ContextError> {
        let affected = match strategy {
            CompactionStrategy::Prune => self.storage.with_conn(|conn| {
                conn.execute(
                    "DELETE FROM context_embeddings
                     WHERE context_id = ?1 AND chunk_sequence NOT IN (
                         SELECT chunk_sequence FROM context_embeddings
                         WHERE context_id = ?1
                         ORDER BY importance_score DESC LIMIT 50
                     )",
                    params![context_id.to_string()],
                )
                .map_err(storage_err)
            }),
            CompactionStrategy::Sliding => self.storage.with_conn(|conn| {
                conn.execute(
                    "DELETE FROM context_embeddings
                     WHERE context_id = ?1 AND chunk_sequence NOT IN (
                         SELECT chunk_sequence FROM context_embeddings
                         WHERE context_id = ?1
                         ORDER BY chunk_sequence DESC LIMIT 20
                     )",
                    params![context_id.to_string()],
                )
                .map_err(storage_err)
            }),
            CompactionStrategy::ToolClear => self.storage.with_conn(|conn| {
                conn.execute(
                    "DELETE FROM context_items WHERE context_id = ?1 AND item_type IN ('tool_call', 'tool_result')",
                    params![context_id.to_string()],
                )
                .map_err(storage_err)
            }),
            CompactionStrategy::Summarize => self.storage.with_conn(|conn| {
                conn.execute(
                    "UPDATE context_embeddings SET is_summary = 0 WHERE context_id = ?1",
                    params![context_id.to_string()],
                )
                .and_then(|_| {
                    conn.execute(
                        "UPDATE context_embeddings SET is_summary = 1
                         WHERE context_id = ?1 AND chunk_sequence = (
                             SELECT chunk_sequence FROM context_embeddings
                             WHERE context_id = ?1 ORDER BY importance_score DESC LIMIT 1
                         )",
                        params![context_id.to_string()],
                    )
                })
                .map_err(storage_err)
            }),
            CompactionStrategy::Semantic => self.storage.with_conn(|conn| {
                // Drop the lower-importance half of near-duplicate pairs; a
                // full semantic dedup needs vector comparison which happens
                // above this layer, so this pass trims by importance only.
                conn.execute(
                    "DELETE FROM context_embeddings
                     WHERE context_id = ?1 AND importance_score < (
                         SELECT COALESCE(AVG(importance_score), 0) FROM context_embeddings WHERE context_id = ?1
                     )",
                    params![context_id.to_string()],
                )
                .map_err(storage_err)
            }),
        }
        .map_err(ContextError::Storage)?;

        let context = self.get_context(context_id, &ContextRetrievalOptions::default())?;
        let mut properties = context.properties;
        if !properties.is_object() {
            properties = serde_json::json!({});
        }
        properties["compaction"] = serde_json::json!({
            "strategy": format!("{strategy:?}"),
            "compacted_at": Utc::now().to_rfc3339(),
            "rows_affected": affected,
        });
        self.update_context_metadata(context_id, None, Some(properties))?;

        Ok(affected)
    }

    pub fn audit_context_access(
        &self,
        context_id: Uuid,
        actor: &str,
        operation: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<(), ContextError> {
        self.storage
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO context_audit_log
                        (id, context_id, actor, operation, success, error, metadata, occurred_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, '{}', ?7)",
                    params![
                        Uuid::new_v4().to_string(),
                        context_id.to_string(),
                        actor,
                        operation,
                        success as i64,
                        error,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(storage_err)
            })
            .map(|_| ())
            .map_err(ContextError::Storage)
    }

    /// Checks `chunk_sequence` is strictly increasing/unique and every link
    /// resolves to a stored embedding (spec §4.6 `ValidateContextIntegrity`).
    pub fn validate_context_integrity(&self, context_id: Uuid) -> Result<(), ContextError> {
        self.get_context(context_id, &ContextRetrievalOptions::default())?;

        let sequences: Vec<i64> = self
            .storage
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT chunk_sequence FROM context_embeddings
                         WHERE context_id = ?1 ORDER BY chunk_sequence ASC",
                    )
                    .map_err(storage_err)?;
                let rows = stmt
                    .query_map(params![context_id.to_string()], |r| r.get::<_, i64>(0))
                    .map_err(storage_err)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
            })
            .map_err(ContextError::Storage)?;

        let mut last = None;
        for seq in &sequences {
            if let Some(prev) = last {
                if *seq <= prev {
                    return Err(ContextError::NonMonotonicSequence { got: *seq, last: prev });
                }
            }
            last = Some(*seq);
        }

        let orphans: i64 = self
            .storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM context_embeddings ce
                     LEFT JOIN embeddings e ON e.id = ce.embedding_id
                     WHERE ce.context_id = ?1 AND e.id IS NULL",
                    params![context_id.to_string()],
                    |r| r.get(0),
                )
                .map_err(storage_err)
            })
            .map_err(ContextError::Storage)?;

        if orphans > 0 {
            return Err(ContextError::IntegrityViolation {
                id: context_id.to_string(),
                reason: format!("{orphans} link(s) reference a missing embedding"),
            });
        }

        Ok(())
    }
}
