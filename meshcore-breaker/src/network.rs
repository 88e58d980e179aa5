//! Circuit Breaker Network: a registry keyed by component name that
//! coordinates many breakers and provides cascade protection (spec §4.7,
//! §9 "Cyclic graphs among resilience components" — components are keyed
//! by name rather than holding pointers to each other, which is what
//! breaks the cycle between breaker <-> network <-> strategies).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use meshcore_core::errors::BreakerError;
use tracing::{info, instrument};

use crate::breaker::{Admission, BreakerParams, CircuitBreaker};

/// Conservative defaults used when a breaker is created lazily on first
/// trip/trial (spec §4.7 "Network").
pub fn default_params() -> BreakerParams {
    BreakerParams {
        failure_threshold: 5,
        success_threshold: 3,
        timeout_ms: 30_000,
        max_timeout_ms: 5 * 60_000,
        timeout_multiplier: 2.0,
    }
}

/// Flags components whose breakers are trending toward a trip so the
/// network can pre-emptively protect related components.
#[derive(Default)]
pub struct CascadeProtector {
    at_risk: Mutex<HashSet<String>>,
}

impl CascadeProtector {
    pub fn flag_at_risk(&self, component: &str) {
        self.at_risk.lock().unwrap().insert(component.to_string());
    }

    pub fn clear(&self, component: &str) {
        self.at_risk.lock().unwrap().remove(component);
    }

    pub fn is_at_risk(&self, component: &str) -> bool {
        self.at_risk.lock().unwrap().contains(component)
    }
}

/// A registry of named circuit breakers with cascade coordination.
pub struct CircuitBreakerNetwork {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_params: BreakerParams,
    cascade: CascadeProtector,
    /// component -> components it protects transitively when it trips.
    related: DashMap<String, Vec<String>>,
}

impl Default for CircuitBreakerNetwork {
    fn default() -> Self {
        Self::new(default_params())
    }
}

impl CircuitBreakerNetwork {
    pub fn new(default_params: BreakerParams) -> Self {
        Self {
            breakers: DashMap::new(),
            default_params,
            cascade: CascadeProtector::default(),
            related: DashMap::new(),
        }
    }

    /// Declare that tripping `component` should pre-emptively trip
    /// `related_components` if the Cascade Protector flags them at-risk.
    pub fn declare_related(&self, component: &str, related_components: Vec<String>) {
        self.related
            .insert(component.to_string(), related_components);
    }

    pub fn get_or_create(&self, component: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(component) {
            return existing.clone();
        }
        let created = Arc::new(CircuitBreaker::new(component, self.default_params));
        self.breakers
            .entry(component.to_string())
            .or_insert(created)
            .clone()
    }

    #[instrument(skip(self))]
    pub fn try_acquire(&self, component: &str) -> Result<Admission, BreakerError> {
        self.get_or_create(component).try_acquire()
    }

    pub fn record_success(&self, component: &str, admission: Admission) {
        self.get_or_create(component).record_success(admission);
        self.cascade.clear(component);
    }

    /// Records a failure and, if the breaker tripped as a result, consults
    /// the cascade protector to pre-emptively trip related components that
    /// are themselves flagged at-risk (spec §4.7 "On trip... Coordinator
    /// may pre-emptively trip related breakers").
    #[instrument(skip(self))]
    pub fn record_failure(&self, component: &str, admission: Admission) {
        let breaker = self.get_or_create(component);
        let was_open = breaker.state_kind() == meshcore_core::models::BreakerStateKind::Open;
        breaker.record_failure(admission);
        let now_open = breaker.state_kind() == meshcore_core::models::BreakerStateKind::Open;

        if !was_open && now_open {
            self.cascade.flag_at_risk(component);
            if let Some(related) = self.related.get(component) {
                for r in related.iter() {
                    if self.cascade.is_at_risk(r) {
                        info!(from = %component, to = %r, "cascade protection: pre-emptively tripping related breaker");
                        let related_breaker = self.get_or_create(r);
                        if let Ok(a) = related_breaker.try_acquire() {
                            related_breaker.record_failure(a);
                        }
                    }
                }
            }
        }
    }

    pub fn breaker_names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn stats_for(&self, component: &str) -> Option<meshcore_core::models::BreakerStats> {
        self.breakers.get(component).map(|b| b.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazily_creates_breakers_with_conservative_defaults() {
        let net = CircuitBreakerNetwork::default();
        let stats = net.get_or_create("github").stats();
        assert_eq!(stats.state, "closed");
    }

    #[test]
    fn cascade_protection_trips_related_at_risk_component() {
        let net = CircuitBreakerNetwork::new(BreakerParams {
            failure_threshold: 1,
            success_threshold: 1,
            timeout_ms: 10_000,
            max_timeout_ms: 20_000,
            timeout_multiplier: 2.0,
        });
        net.declare_related("github", vec!["github-webhooks".to_string()]);
        net.cascade.flag_at_risk("github-webhooks");

        let a = net.try_acquire("github").unwrap();
        net.record_failure("github", a);

        assert_eq!(
            net.stats_for("github-webhooks").unwrap().state,
            "open"
        );
    }
}
