mod audit;
mod breaker;
mod chunk;
mod context;
mod credential;
mod embedding;
mod embedding_model;
mod incident;
mod session;
mod telemetry;

pub use audit::AuditEntry;
pub use breaker::{
    BreakerEvent, BreakerStateKind, BreakerStats, CircuitBreakerState, BREAKER_HISTORY_CAPACITY,
};
pub use chunk::{Chunk, ChunkingMethod};
pub use context::{
    CompactionStrategy, Context, ContextEmbeddingLink, ContextItem, ContextRetrievalOptions,
};
pub use credential::{Credential, CredentialAudit, CredentialType};
pub use embedding::{Embedding, VectorColumn};
pub use embedding_model::{EmbeddingModel, TenantEmbeddingModel, STORABLE_DIMENSIONS};
pub use incident::{
    FailureEvent, FailureType, HealingDecision, Incident, IncidentSeverity, IncidentStatus,
};
pub use session::{EdgeSession, SessionFilter, SessionMetrics, SessionStatus, ToolExecution};
pub use telemetry::{ProtocolObservation, ProtocolRecommendation, RemovalVerdict};
