//! Continuous monitor loop (spec §4.7 step 5): ticks every
//! `monitor_interval_secs`, running checkHealth / predictFailures /
//! optimizeThresholds. Idempotent — a tick that overruns its interval
//! simply delays the next one rather than overlapping with it, since the
//! loop body is awaited to completion before the next `sleep`.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{instrument, warn};

use crate::adaptive::{self, AdaptiveThresholds, ComponentAssessment, ThresholdAdjustment};
use crate::controller::HealingController;

/// Runs the monitor tick loop as a detached task. Returns a handle the
/// caller can abort on shutdown.
pub fn spawn_monitor(controller: Arc<HealingController>) -> tokio::task::JoinHandle<()> {
    let interval = std::time::Duration::from_secs(controller.config().monitor_interval_secs.max(1));
    let thresholds = Arc::new(AsyncMutex::new(AdaptiveThresholds::default()));

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            run_tick(&controller, &thresholds).await;
        }
    })
}

#[instrument(skip(controller, thresholds))]
async fn run_tick(
    controller: &Arc<HealingController>,
    thresholds: &Arc<AsyncMutex<AdaptiveThresholds>>,
) -> Vec<ThresholdAdjustment> {
    let assessments = check_health(controller);
    if assessments.is_empty() {
        return vec![];
    }

    predict_failures(controller, &assessments);

    let mut thresholds = thresholds.lock().await;
    let adjustments = adaptive::adjust(&mut thresholds, &assessments);
    for a in &adjustments {
        warn!(
            component = %a.component,
            parameter = %a.parameter,
            old = a.old_value,
            new = a.new_value,
            reason = %a.reason,
            "monitor adjusted adaptive threshold"
        );
    }
    adjustments
}

/// checkHealth: summarize each active incident's component into an
/// assessment the tuner can act on.
fn check_health(controller: &HealingController) -> Vec<ComponentAssessment> {
    controller
        .active_incidents()
        .into_iter()
        .flat_map(|incident| {
            incident
                .affected_components
                .into_iter()
                .map(move |component| ComponentAssessment {
                    component,
                    recent_failures: 1,
                    recent_successes: 0,
                    cascade_triggered: incident.severity
                        >= meshcore_core::models::IncidentSeverity::High,
                })
        })
        .collect()
}

/// predictFailures: components already flagged at-risk get logged so
/// operators can see cascade pressure building before it trips.
fn predict_failures(_controller: &HealingController, assessments: &[ComponentAssessment]) {
    for a in assessments {
        if a.cascade_triggered {
            warn!(component = %a.component, "component under cascade pressure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcore_breaker::CircuitBreakerNetwork;
    use meshcore_core::config::HealingConfig;
    use meshcore_core::models::{FailureEvent, FailureType};

    #[tokio::test]
    async fn tick_with_no_incidents_produces_no_adjustments() {
        let controller = Arc::new(HealingController::new(
            HealingConfig::default(),
            Arc::new(CircuitBreakerNetwork::default()),
        ));
        let thresholds = Arc::new(AsyncMutex::new(AdaptiveThresholds::default()));
        let adjustments = run_tick(&controller, &thresholds).await;
        assert!(adjustments.is_empty());
    }

    #[tokio::test]
    async fn tick_with_active_high_severity_incident_tightens_threshold() {
        let controller = Arc::new(HealingController::new(
            HealingConfig::default(),
            Arc::new(CircuitBreakerNetwork::default()),
        ));
        controller
            .handle_failure(FailureEvent {
                component: "github".to_string(),
                failure_type: FailureType::ConnectionError,
                affected_components: vec!["a".into(), "b".into(), "c".into()],
                occurred_at: chrono::Utc::now(),
            })
            .await;

        let thresholds = Arc::new(AsyncMutex::new(AdaptiveThresholds::default()));
        let adjustments = run_tick(&controller, &thresholds).await;
        assert!(!adjustments.is_empty());
    }
}
