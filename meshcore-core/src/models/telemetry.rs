use serde::{Deserialize, Serialize};

/// One recorded protocol message observation (spec §4.7 Protocol Telemetry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolObservation {
    pub protocol: String,
    pub message_type: String,
    pub size_bytes: usize,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolRecommendation {
    Prefetch,
    Batch,
    Standard,
}

/// Result of `ShouldRemoveCustomProtocol` (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalVerdict {
    pub safe: bool,
    pub reason: String,
    pub migration_path_hint: Option<String>,
}
