use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Active,
    Recovering,
    Resolved,
}

/// spec §3 `Incident`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub incident_type: String,
    pub severity: IncidentSeverity,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub affected_components: Vec<String>,
    pub root_cause: Option<String>,
    pub status: IncidentStatus,
}

impl IncidentSeverity {
    /// spec §4.7 step 1: severity by fan-out size.
    pub fn from_fanout(affected_count: usize) -> Self {
        if affected_count > 5 {
            IncidentSeverity::Critical
        } else if affected_count > 2 {
            IncidentSeverity::High
        } else {
            IncidentSeverity::Medium
        }
    }
}

/// A recorded healing decision (spec §4.7 step 4, bounded FIFO of 1000).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingDecision {
    pub incident_id: Uuid,
    pub strategy_name: String,
    pub succeeded: bool,
    pub decided_at: DateTime<Utc>,
    pub detail: Option<String>,
}

/// An incoming failure event driving the self-healing loop (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    pub component: String,
    pub failure_type: FailureType,
    pub affected_components: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    Timeout,
    ConnectionError,
    Other,
}
