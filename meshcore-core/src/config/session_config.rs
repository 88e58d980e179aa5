use serde::{Deserialize, Serialize};

/// Edge-session lifetime defaults (spec §3 EdgeSession).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub default_session_ttl_secs: i64,
    pub cleanup_batch_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_session_ttl_secs: 4 * 3600,
            cleanup_batch_size: 500,
        }
    }
}
