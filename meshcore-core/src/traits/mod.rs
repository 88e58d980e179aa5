//! Capability-set traits (spec §9 "Interface polymorphism"): the places
//! that used run-time dispatch in the source system become small trait
//! objects keyed by the operations callers actually need, mirroring how
//! `cortex-core::traits::ITemporalEngine` exposes only the operations the
//! temporal engine needs rather than a god-interface.

use crate::errors::CoreResult;
use crate::models::{Chunk, HealingDecision, Incident};
use async_trait::async_trait;

/// `{CountTokens}` — spec §9.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// `{Split}` — spec §9, implemented by the rule-based Sentence Splitter.
pub trait SentenceSplit: Send + Sync {
    fn split(&self, text: &str) -> Vec<String>;
}

/// `{Chunk, GetConfig}` — spec §9, implemented by both chunking strategies.
pub trait TextChunker: Send + Sync {
    fn chunk(&self, text: &str) -> CoreResult<Vec<Chunk>>;
    fn config_json(&self) -> serde_json::Value;
}

/// `{RecordEvent, RecordLatency, RecordCounter, RecordGauge, Close}` — spec §9.
pub trait MetricsClient: Send + Sync {
    fn record_event(&self, name: &str, fields: serde_json::Value);
    fn record_latency(&self, name: &str, millis: f64);
    fn record_counter(&self, name: &str, delta: i64);
    fn record_gauge(&self, name: &str, value: f64);
    fn close(&self);
}

/// `{CanHandle, Recover, Priority, SuccessRate}` — spec §9, one impl per
/// self-healing recovery strategy, tried in priority order.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn can_handle(&self, incident: &Incident) -> bool;
    fn priority(&self) -> i32;
    fn success_rate(&self) -> f64;
    async fn recover(&self, incident: &Incident) -> CoreResult<HealingDecision>;
}

/// Embedding provider seam the Semantic Context Manager calls through
/// (spec §1 Non-goals: "no embedding-model inference is performed
/// in-process"; this is the external-provider interface).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, model_id: &str, text: &str) -> CoreResult<Vec<f32>>;
}
