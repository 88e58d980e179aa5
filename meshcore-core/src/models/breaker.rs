use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Circuit breaker states (spec §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStateKind {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerStateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerStateKind::Closed => "closed",
            BreakerStateKind::Open => "open",
            BreakerStateKind::HalfOpen => "half-open",
        }
    }
}

/// A single transition or outcome recorded in a breaker's bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerEvent {
    pub at: DateTime<Utc>,
    pub description: String,
}

/// spec §3 `CircuitBreakerState`, per named component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub component: String,
    pub state: BreakerStateKind,
    pub failures: u32,
    pub successes: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
    pub current_timeout_ms: u64,
    pub generation: u64,
    pub confidence_score: f64,
    pub failure_threshold: u32,
    #[serde(skip)]
    pub history: VecDeque<BreakerEvent>,
}

pub const BREAKER_HISTORY_CAPACITY: usize = 100;

impl CircuitBreakerState {
    pub fn push_event(&mut self, description: impl Into<String>, now: DateTime<Utc>) {
        if self.history.len() >= BREAKER_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(BreakerEvent {
            at: now,
            description: description.into(),
        });
    }
}

/// Wire-facing stats surface (spec §6 "Circuit breaker stats surface").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerStats {
    pub state: String,
    pub failures: u32,
    pub successes: u32,
    pub current_timeout_ms: u64,
    pub generation: u64,
    pub last_failure: Option<DateTime<Utc>>,
    pub time_since_failure_ms: Option<i64>,
}
