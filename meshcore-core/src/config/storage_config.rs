use serde::{Deserialize, Serialize};

/// DB connection pool configuration (spec §5 "Shared resources").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
    pub min_idle: u32,
    pub max_connections: u32,
    pub connection_max_age_secs: u64,
    pub pool_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "meshcore.db".to_string(),
            min_idle: 1,
            max_connections: 10,
            connection_max_age_secs: 30 * 60,
            pool_timeout_secs: 4,
        }
    }
}
