use uuid::Uuid;

/// Errors from the Self-Healing Controller & Protocol Telemetry (spec §4.7).
#[derive(Debug, thiserror::Error)]
pub enum HealingError {
    #[error("incident not found: {id}")]
    IncidentNotFound { id: Uuid },

    #[error("no recovery strategy could handle incident {id}")]
    NoStrategyAvailable { id: Uuid },

    #[error("breaker error: {0}")]
    Breaker(#[from] super::BreakerError),
}
