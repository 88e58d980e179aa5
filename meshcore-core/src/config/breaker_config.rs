use serde::{Deserialize, Serialize};

/// Per-breaker tuning (spec §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub timeout_multiplier: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            timeout_ms: 30_000,
            max_timeout_ms: 5 * 60_000,
            timeout_multiplier: 2.0,
        }
    }
}
