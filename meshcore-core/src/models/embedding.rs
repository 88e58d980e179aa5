use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which physical column a vector lands in, keyed by dimensionality
/// (spec §3 `Embedding` storage rule, §8 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorColumn {
    Embedding1024,
    Vector1536,
    Embedding4096,
}

impl VectorColumn {
    pub fn for_dimensions(dimensions: i64) -> Option<Self> {
        match dimensions {
            1024 => Some(VectorColumn::Embedding1024),
            1536 => Some(VectorColumn::Vector1536),
            4096 => Some(VectorColumn::Embedding4096),
            _ => None,
        }
    }

    pub fn column_name(&self) -> &'static str {
        match self {
            VectorColumn::Embedding1024 => "embedding_1024",
            VectorColumn::Vector1536 => "vector",
            VectorColumn::Embedding4096 => "embedding",
        }
    }
}

/// spec §3 `Embedding`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub context_id: Option<Uuid>,
    pub content_index: i64,
    pub chunk_index: i64,
    pub content: String,
    pub content_hash: String,
    pub model_uuid: Uuid,
    pub provider: String,
    pub model_name: String,
    pub model_dimensions: i64,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl Embedding {
    pub fn source_is_rag(&self) -> bool {
        self.metadata
            .get("source_type")
            .and_then(|v| v.as_str())
            .map(|s| s == "rag")
            .unwrap_or(false)
    }
}
