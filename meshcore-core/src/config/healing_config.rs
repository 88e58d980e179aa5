use serde::{Deserialize, Serialize};

/// Self-Healing Controller + Protocol Telemetry timers (spec §4.7, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingConfig {
    pub monitor_interval_secs: u64,
    pub telemetry_analysis_interval_secs: u64,
    pub healing_decisions_capacity: usize,
    pub cascade_probability_threshold: f64,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: 10,
            telemetry_analysis_interval_secs: 30,
            healing_decisions_capacity: 1_000,
            cascade_probability_threshold: 0.7,
        }
    }
}
