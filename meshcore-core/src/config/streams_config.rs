use serde::{Deserialize, Serialize};

/// Redis Streams transport configuration (spec §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamsConfig {
    pub addresses: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub dial_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub tls_enabled: bool,
    pub pool_size: u32,
    pub min_idle_conns: u32,
    pub max_conn_age_secs: u64,
    pub pool_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub cluster_enabled: bool,
    pub read_only: bool,
    pub route_by_latency: bool,
    pub sentinel_enabled: bool,
    pub master_name: Option<String>,
    pub sentinel_addrs: Vec<String>,
    pub sentinel_password: Option<String>,
    pub health_check_interval_secs: u64,
    pub health_check_timeout_secs: u64,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            addresses: vec!["127.0.0.1:6379".to_string()],
            username: None,
            password: None,
            db: 0,
            max_retries: 3,
            retry_backoff_ms: 100,
            dial_timeout_secs: 15,
            read_timeout_secs: 10,
            write_timeout_secs: 10,
            tls_enabled: false,
            pool_size: 10,
            min_idle_conns: 1,
            max_conn_age_secs: 30 * 60,
            pool_timeout_secs: 4,
            idle_timeout_secs: 5 * 60,
            cluster_enabled: false,
            read_only: false,
            route_by_latency: false,
            sentinel_enabled: false,
            master_name: None,
            sentinel_addrs: Vec::new(),
            sentinel_password: None,
            health_check_interval_secs: 10,
            health_check_timeout_secs: 3,
        }
    }
}
