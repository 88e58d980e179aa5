use serde::{Deserialize, Serialize};

/// Credential lifecycle configuration (spec §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub default_expiry_days: i64,
    pub rotation_interval_days: i64,
    pub expiry_warning_threshold_days: i64,
    pub min_password_length: usize,
    pub require_strong_passwords: bool,
    pub inactivity_threshold_days: i64,
    pub pbkdf2_iterations: u32,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            default_expiry_days: 90,
            rotation_interval_days: 30,
            expiry_warning_threshold_days: 7,
            min_password_length: 12,
            require_strong_passwords: true,
            inactivity_threshold_days: 60,
            pbkdf2_iterations: 10_000,
        }
    }
}
