use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog entry identity is `(provider, model_name)`; see spec §3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingModel {
    pub id: Uuid,
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
    pub is_available: bool,
    pub is_deprecated: bool,
    pub deprecation_date: Option<DateTime<Utc>>,
    pub minimum_tier: String,
    pub requires_api_key: bool,
    pub created_at: DateTime<Utc>,
}

/// Storage-eligible vector widths; see spec §3 invariant on `Embedding`.
pub const STORABLE_DIMENSIONS: [i64; 3] = [1024, 1536, 4096];

impl EmbeddingModel {
    pub fn is_storable(&self) -> bool {
        STORABLE_DIMENSIONS.contains(&self.dimensions)
    }
}

/// Per-tenant override/join row — spec §3 `TenantEmbeddingModel`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantEmbeddingModel {
    pub tenant_id: Uuid,
    pub model_id: Uuid,
    pub is_enabled: bool,
    pub is_default: bool,
    pub priority: i64,
    pub fallback_model_id: Option<Uuid>,
    pub monthly_token_limit: Option<i64>,
    pub daily_token_limit: Option<i64>,
    pub monthly_request_limit: Option<i64>,
    pub agent_preferences: std::collections::HashMap<String, String>,
    pub cost_per_million_tokens_override: Option<f64>,
    pub cost_per_million_chars_override: Option<f64>,
    pub created_at: DateTime<Utc>,
}
