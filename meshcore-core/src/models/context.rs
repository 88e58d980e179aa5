use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// spec §3 `Context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub agent_id: Option<String>,
    pub session_id: Option<Uuid>,
    pub status: String,
    pub properties: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// spec §3 `ContextItem`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: Uuid,
    pub context_id: Uuid,
    pub content: String,
    pub item_type: String,
    pub score: f64,
    pub metadata: serde_json::Value,
}

/// spec §3 `ContextEmbeddingLink`. `(context_id, chunk_sequence)` unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEmbeddingLink {
    pub context_id: Uuid,
    pub embedding_id: Uuid,
    pub chunk_sequence: i64,
    pub importance_score: f64,
    pub is_summary: bool,
    pub created_at: DateTime<Utc>,
}

/// Retrieval options passed to context reads (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct ContextRetrievalOptions {
    pub include_embeddings: bool,
    pub max_tokens: Option<usize>,
    pub relevance_query: Option<String>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub min_similarity: Option<f64>,
}

/// spec §4.6 `CompactContext` strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionStrategy {
    Summarize,
    Prune,
    Semantic,
    Sliding,
    ToolClear,
}
