pub mod breaker_config;
pub mod chunking_config;
pub mod credentials_config;
pub mod healing_config;
pub mod session_config;
pub mod storage_config;
pub mod streams_config;

use serde::{Deserialize, Serialize};

pub use breaker_config::BreakerConfig;
pub use chunking_config::{ChunkingConfig, RecursiveChunkerConfig, SemanticChunkerConfig};
pub use credentials_config::CredentialsConfig;
pub use healing_config::HealingConfig;
pub use session_config::SessionConfig;
pub use storage_config::StorageConfig;
pub use streams_config::StreamsConfig;

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    pub storage: StorageConfig,
    pub breaker: BreakerConfig,
    pub streams: StreamsConfig,
    pub credentials: CredentialsConfig,
    pub chunking: ChunkingConfig,
    pub healing: HealingConfig,
    pub session: SessionConfig,
}

impl MeshConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_empty_toml() {
        let cfg = MeshConfig::from_toml("").unwrap();
        assert_eq!(cfg.breaker.failure_threshold, 5);
        assert_eq!(cfg.storage.max_connections, 10);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = MeshConfig::from_toml("[breaker]\nfailure_threshold = 2\n").unwrap();
        assert_eq!(cfg.breaker.failure_threshold, 2);
        assert_eq!(cfg.breaker.success_threshold, 3);
    }
}
