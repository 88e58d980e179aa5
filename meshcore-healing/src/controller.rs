//! Self-Healing Controller (spec §4.7): turns `FailureEvent`s into
//! `Incident`s, trips the affected component's breaker, predicts cascades,
//! and dispatches recovery strategies in priority order.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use meshcore_core::config::HealingConfig;
use meshcore_core::errors::HealingError;
use meshcore_core::models::{
    FailureEvent, FailureType, HealingDecision, Incident, IncidentSeverity, IncidentStatus,
};
use meshcore_core::traits::RecoveryStrategy;
use meshcore_breaker::CircuitBreakerNetwork;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Estimated cascade probability for a failure, used to gate pre-emptive
/// protection of components beyond the ones already affected (spec §4.7
/// step 2 "Failure Predictor").
fn predict_cascade_probability(event: &FailureEvent) -> f64 {
    let base = match event.failure_type {
        FailureType::Timeout => 0.4,
        FailureType::ConnectionError => 0.6,
        FailureType::Other => 0.2,
    };
    let fanout_bonus = (event.affected_components.len() as f64 * 0.1).min(0.4);
    (base + fanout_bonus).min(1.0)
}

/// The Self-Healing Controller: incident registry, breaker coordination,
/// and recovery dispatch for one control plane instance.
pub struct HealingController {
    config: HealingConfig,
    network: Arc<CircuitBreakerNetwork>,
    strategies: AsyncMutex<Vec<Arc<dyn RecoveryStrategy>>>,
    incidents: DashMap<Uuid, Incident>,
    decisions: AsyncMutex<VecDeque<HealingDecision>>,
}

impl HealingController {
    pub fn new(config: HealingConfig, network: Arc<CircuitBreakerNetwork>) -> Self {
        Self {
            config,
            network,
            strategies: AsyncMutex::new(Vec::new()),
            incidents: DashMap::new(),
            decisions: AsyncMutex::new(VecDeque::new()),
        }
    }

    /// Register a recovery strategy. Dispatch order is by descending
    /// `priority()`, re-sorted on every registration.
    pub async fn register_strategy(&self, strategy: Arc<dyn RecoveryStrategy>) {
        let mut strategies = self.strategies.lock().await;
        strategies.push(strategy);
        strategies.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn get_incident(&self, id: Uuid) -> Option<Incident> {
        self.incidents.get(&id).map(|e| e.clone())
    }

    pub fn active_incidents(&self) -> Vec<Incident> {
        self.incidents
            .iter()
            .filter(|e| e.status != IncidentStatus::Resolved)
            .map(|e| e.clone())
            .collect()
    }

    pub async fn recent_decisions(&self) -> Vec<HealingDecision> {
        self.decisions.lock().await.iter().cloned().collect()
    }

    /// spec §4.7 steps 1-5: severity by fan-out, trip the breaker for
    /// connection-level failures, predict cascades, dispatch recovery, and
    /// record the decision. Recovery dispatch runs detached so the caller
    /// (typically the ingestion path recording the failure) isn't blocked
    /// on strategy execution.
    #[instrument(skip(self, event), fields(component = %event.component))]
    pub async fn handle_failure(self: &Arc<Self>, event: FailureEvent) -> Incident {
        let severity = IncidentSeverity::from_fanout(event.affected_components.len());
        let incident = Incident {
            id: Uuid::new_v4(),
            incident_type: format!("{:?}", event.failure_type).to_lowercase(),
            severity,
            start: event.occurred_at,
            end: None,
            affected_components: event.affected_components.clone(),
            root_cause: None,
            status: IncidentStatus::Active,
        };
        self.incidents.insert(incident.id, incident.clone());

        if matches!(event.failure_type, FailureType::Timeout | FailureType::ConnectionError) {
            if let Ok(admission) = self.network.try_acquire(&event.component) {
                self.network.record_failure(&event.component, admission);
            }
        }

        let cascade_probability = predict_cascade_probability(&event);
        if cascade_probability > self.config.cascade_probability_threshold {
            warn!(
                component = %event.component,
                cascade_probability,
                "cascade probability exceeds threshold, protecting related components"
            );
            for related in &event.affected_components {
                self.network.try_acquire(related).ok();
            }
        }

        let controller = self.clone();
        let incident_id = incident.id;
        tokio::spawn(async move {
            controller.dispatch_recovery(incident_id).await;
        });

        incident
    }

    /// Try each registered strategy in priority order until one succeeds
    /// or none can handle the incident (spec §4.7 step 3 "Recovery
    /// Strategy Dispatch").
    #[instrument(skip(self))]
    async fn dispatch_recovery(self: Arc<Self>, incident_id: Uuid) {
        let Some(incident) = self.get_incident(incident_id) else {
            return;
        };

        let strategies: Vec<Arc<dyn RecoveryStrategy>> =
            self.strategies.lock().await.iter().cloned().collect();

        let mut outcome: Result<HealingDecision, HealingError> =
            Err(HealingError::NoStrategyAvailable { id: incident_id });

        for strategy in &strategies {
            if !strategy.can_handle(&incident) {
                continue;
            }
            match strategy.recover(&incident).await {
                Ok(decision) => {
                    outcome = Ok(decision);
                    break;
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "recovery strategy failed");
                    continue;
                }
            }
        }

        let decision = match outcome {
            Ok(decision) => {
                if let Some(mut entry) = self.incidents.get_mut(&incident_id) {
                    entry.status = IncidentStatus::Resolved;
                    entry.end = Some(Utc::now());
                }
                info!(incident = %incident_id, strategy = %decision.strategy_name, "incident resolved");
                decision
            }
            Err(e) => {
                if let Some(mut entry) = self.incidents.get_mut(&incident_id) {
                    entry.status = IncidentStatus::Recovering;
                }
                HealingDecision {
                    incident_id,
                    strategy_name: "none".to_string(),
                    succeeded: false,
                    decided_at: Utc::now(),
                    detail: Some(e.to_string()),
                }
            }
        };

        self.record_decision(decision).await;
    }

    async fn record_decision(&self, decision: HealingDecision) {
        let mut decisions = self.decisions.lock().await;
        decisions.push_back(decision);
        while decisions.len() > self.config.healing_decisions_capacity {
            decisions.pop_front();
        }
    }

    pub fn config(&self) -> &HealingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meshcore_breaker::CircuitBreakerNetwork;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysSucceeds {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecoveryStrategy for AlwaysSucceeds {
        fn name(&self) -> &str {
            "always-succeeds"
        }
        fn can_handle(&self, _incident: &Incident) -> bool {
            true
        }
        fn priority(&self) -> i32 {
            10
        }
        fn success_rate(&self) -> f64 {
            1.0
        }
        async fn recover(
            &self,
            incident: &Incident,
        ) -> meshcore_core::errors::CoreResult<HealingDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HealingDecision {
                incident_id: incident.id,
                strategy_name: self.name().to_string(),
                succeeded: true,
                decided_at: Utc::now(),
                detail: None,
            })
        }
    }

    struct NeverHandles;

    #[async_trait]
    impl RecoveryStrategy for NeverHandles {
        fn name(&self) -> &str {
            "never-handles"
        }
        fn can_handle(&self, _incident: &Incident) -> bool {
            false
        }
        fn priority(&self) -> i32 {
            100
        }
        fn success_rate(&self) -> f64 {
            0.0
        }
        async fn recover(
            &self,
            incident: &Incident,
        ) -> meshcore_core::errors::CoreResult<HealingDecision> {
            Ok(HealingDecision {
                incident_id: incident.id,
                strategy_name: self.name().to_string(),
                succeeded: true,
                decided_at: Utc::now(),
                detail: None,
            })
        }
    }

    fn event(component: &str, fanout: usize) -> FailureEvent {
        FailureEvent {
            component: component.to_string(),
            failure_type: FailureType::ConnectionError,
            affected_components: (0..fanout).map(|i| format!("dep-{i}")).collect(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn severity_scales_with_fanout() {
        let controller = Arc::new(HealingController::new(
            HealingConfig::default(),
            Arc::new(CircuitBreakerNetwork::default()),
        ));
        let incident = controller.handle_failure(event("github", 6)).await;
        assert_eq!(incident.severity, IncidentSeverity::Critical);

        let incident = controller.handle_failure(event("slack", 1)).await;
        assert_eq!(incident.severity, IncidentSeverity::Medium);
    }

    #[tokio::test]
    async fn dispatch_skips_strategies_that_cannot_handle() {
        let controller = Arc::new(HealingController::new(
            HealingConfig::default(),
            Arc::new(CircuitBreakerNetwork::default()),
        ));
        controller.register_strategy(Arc::new(NeverHandles)).await;
        let succeeder = Arc::new(AlwaysSucceeds {
            calls: AtomicUsize::new(0),
        });
        controller.register_strategy(succeeder.clone()).await;

        let incident = controller.handle_failure(event("github", 1)).await;

        // Recovery runs detached; give it a moment to land.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(succeeder.calls.load(Ordering::SeqCst), 1);
        let resolved = controller.get_incident(incident.id).unwrap();
        assert_eq!(resolved.status, IncidentStatus::Resolved);
    }

    #[tokio::test]
    async fn connection_error_trips_component_breaker_after_enough_failures() {
        let network = Arc::new(CircuitBreakerNetwork::new(meshcore_breaker::BreakerParams {
            failure_threshold: 1,
            success_threshold: 1,
            timeout_ms: 10_000,
            max_timeout_ms: 20_000,
            timeout_multiplier: 2.0,
        }));
        let controller = Arc::new(HealingController::new(HealingConfig::default(), network.clone()));
        controller.handle_failure(event("flaky-dep", 1)).await;
        assert_eq!(
            network.stats_for("flaky-dep").unwrap().state,
            "open"
        );
    }

    #[tokio::test]
    async fn decisions_are_capped_at_configured_capacity() {
        let controller = Arc::new(HealingController::new(
            HealingConfig {
                healing_decisions_capacity: 2,
                ..Default::default()
            },
            Arc::new(CircuitBreakerNetwork::default()),
        ));
        controller
            .register_strategy(Arc::new(AlwaysSucceeds {
                calls: AtomicUsize::new(0),
            }))
            .await;

        for i in 0..5 {
            controller.handle_failure(event(&format!("svc-{i}"), 0)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(controller.recent_decisions().await.len(), 2);
    }
}
