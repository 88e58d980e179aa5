/// Errors from the Adaptive Circuit Breaker & Network (spec §4.7).
#[derive(Debug, thiserror::Error)]
pub enum BreakerError {
    #[error("circuit open for component '{component}'")]
    CircuitOpen { component: String },

    #[error("operation cancelled")]
    Cancelled,
}
