//! Single adaptive circuit breaker (spec §4.7, §5, §8).

use std::sync::Mutex;

use chrono::Utc;
use meshcore_core::errors::BreakerError;
use meshcore_core::models::{BreakerStateKind, BreakerStats, CircuitBreakerState};
use tracing::{debug, instrument, warn};

/// Tuning knobs for a single breaker (spec §6 "Breaker" configuration).
#[derive(Debug, Clone, Copy)]
pub struct BreakerParams {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub timeout_multiplier: f64,
}

impl From<meshcore_core::config::BreakerConfig> for BreakerParams {
    fn from(c: meshcore_core::config::BreakerConfig) -> Self {
        Self {
            failure_threshold: c.failure_threshold,
            success_threshold: c.success_threshold,
            timeout_ms: c.timeout_ms,
            max_timeout_ms: c.max_timeout_ms,
            timeout_multiplier: c.timeout_multiplier,
        }
    }
}

/// A ticket handed to a caller that was admitted through the breaker. The
/// generation it carries must be echoed back into `record_success` /
/// `record_failure` / `record_cancelled` so stale bookkeeping from a
/// since-transitioned state is discarded (spec §4.7 "Generation
/// discipline").
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    pub generation: u64,
}

/// Adaptive circuit breaker for one named component.
pub struct CircuitBreaker {
    component: String,
    params: Mutex<BreakerParams>,
    state: Mutex<CircuitBreakerState>,
    half_open_in_flight: Mutex<bool>,
}

impl CircuitBreaker {
    pub fn new(component: impl Into<String>, params: BreakerParams) -> Self {
        let component = component.into();
        let now = Utc::now();
        Self {
            state: Mutex::new(CircuitBreakerState {
                component: component.clone(),
                state: BreakerStateKind::Closed,
                failures: 0,
                successes: 0,
                last_failure_time: None,
                last_state_change: now,
                current_timeout_ms: params.timeout_ms,
                generation: 0,
                confidence_score: 0.5,
                failure_threshold: params.failure_threshold,
                history: Default::default(),
            }),
            params: Mutex::new(params),
            half_open_in_flight: Mutex::new(false),
            component,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Attempt to enter the breaker. Fails fast with `CircuitOpen` while
    /// open and the timeout hasn't elapsed. The first request after the
    /// timeout elapses transitions the breaker to half-open and is
    /// admitted as the sole in-flight trial.
    #[instrument(skip(self), fields(component = %self.component))]
    pub fn try_acquire(&self) -> Result<Admission, BreakerError> {
        let now = Utc::now();
        let mut st = self.state.lock().unwrap();

        match st.state {
            BreakerStateKind::Closed => Ok(Admission {
                generation: st.generation,
            }),
            BreakerStateKind::HalfOpen => {
                let mut in_flight = self.half_open_in_flight.lock().unwrap();
                if *in_flight {
                    return Err(BreakerError::CircuitOpen {
                        component: self.component.clone(),
                    });
                }
                *in_flight = true;
                Ok(Admission {
                    generation: st.generation,
                })
            }
            BreakerStateKind::Open => {
                let elapsed = (now - st.last_state_change).num_milliseconds().max(0) as u64;
                if elapsed > st.current_timeout_ms {
                    st.state = BreakerStateKind::HalfOpen;
                    st.last_state_change = now;
                    st.generation += 1;
                    st.successes = 0;
                    st.push_event("open -> half_open (timeout elapsed)", now);
                    debug!(generation = st.generation, "breaker transitioning to half-open");
                    let mut in_flight = self.half_open_in_flight.lock().unwrap();
                    *in_flight = true;
                    Ok(Admission {
                        generation: st.generation,
                    })
                } else {
                    Err(BreakerError::CircuitOpen {
                        component: self.component.clone(),
                    })
                }
            }
        }
    }

    /// Record a successful call made under `admission`.
    pub fn record_success(&self, admission: Admission) {
        let now = Utc::now();
        let mut st = self.state.lock().unwrap();
        if st.generation != admission.generation {
            return;
        }

        match st.state {
            BreakerStateKind::Closed => {
                st.failures = 0;
            }
            BreakerStateKind::HalfOpen => {
                st.successes += 1;
                let params = *self.params.lock().unwrap();
                if st.successes >= params.success_threshold {
                    st.state = BreakerStateKind::Closed;
                    st.failures = 0;
                    st.successes = 0;
                    st.current_timeout_ms = params.timeout_ms;
                    st.generation += 1;
                    st.push_event("half_open -> closed", now);
                    self.raise_confidence(&mut st);
                    *self.half_open_in_flight.lock().unwrap() = false;
                }
            }
            BreakerStateKind::Open => {}
        }
    }

    /// Record a failed call made under `admission`.
    #[instrument(skip(self), fields(component = %self.component))]
    pub fn record_failure(&self, admission: Admission) {
        let now = Utc::now();
        let mut st = self.state.lock().unwrap();
        if st.generation != admission.generation {
            return;
        }

        let params = *self.params.lock().unwrap();
        match st.state {
            BreakerStateKind::Closed => {
                st.failures += 1;
                st.last_failure_time = Some(now);
                if st.failures >= st.failure_threshold {
                    st.state = BreakerStateKind::Open;
                    st.last_state_change = now;
                    st.generation += 1;
                    st.current_timeout_ms = params.timeout_ms;
                    st.push_event("closed -> open (failure threshold reached)", now);
                    warn!(component = %self.component, "circuit breaker tripped open");
                }
            }
            BreakerStateKind::HalfOpen => {
                st.state = BreakerStateKind::Open;
                st.last_state_change = now;
                st.last_failure_time = Some(now);
                st.generation += 1;
                st.current_timeout_ms =
                    ((st.current_timeout_ms as f64) * params.timeout_multiplier)
                        .min(params.max_timeout_ms as f64) as u64;
                st.push_event("half_open -> open (trial failed)", now);
                self.lower_confidence(&mut st);
                *self.half_open_in_flight.lock().unwrap() = false;
            }
            BreakerStateKind::Open => {}
        }
    }

    /// Cancellation during a half-open trial counts as neither success nor
    /// failure but still bumps the generation so the next arrival
    /// re-evaluates (spec §5 "Cancellation").
    pub fn record_cancelled(&self, admission: Admission) {
        let mut st = self.state.lock().unwrap();
        if st.generation != admission.generation {
            return;
        }
        if st.state == BreakerStateKind::HalfOpen {
            st.generation += 1;
            *self.half_open_in_flight.lock().unwrap() = false;
        }
    }

    fn raise_confidence(&self, st: &mut CircuitBreakerState) {
        st.confidence_score = (st.confidence_score + 0.1).min(1.0);
        if st.confidence_score > 0.8 && st.failure_threshold < 10 {
            st.failure_threshold += 1;
        }
    }

    fn lower_confidence(&self, st: &mut CircuitBreakerState) {
        st.confidence_score = (st.confidence_score - 0.2).max(0.0);
        if st.confidence_score < 0.5 && st.failure_threshold > 3 {
            st.failure_threshold -= 1;
        }
    }

    pub fn stats(&self) -> BreakerStats {
        let now = Utc::now();
        let st = self.state.lock().unwrap();
        BreakerStats {
            state: st.state.as_str().to_string(),
            failures: st.failures,
            successes: st.successes,
            current_timeout_ms: st.current_timeout_ms,
            generation: st.generation,
            last_failure: st.last_failure_time,
            time_since_failure_ms: st
                .last_failure_time
                .map(|t| (now - t).num_milliseconds()),
        }
    }

    pub fn state_kind(&self) -> BreakerStateKind {
        self.state.lock().unwrap().state
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn params(failure_threshold: u32, success_threshold: u32, timeout_ms: u64) -> BreakerParams {
        BreakerParams {
            failure_threshold,
            success_threshold,
            timeout_ms,
            max_timeout_ms: 1_000,
            timeout_multiplier: 2.0,
        }
    }

    /// Scenario 1 — open -> half-open -> close (spec §8).
    #[test]
    fn open_half_open_close_cycle() {
        let cb = CircuitBreaker::new("svc", params(2, 2, 50));

        for _ in 0..2 {
            let a = cb.try_acquire().unwrap();
            cb.record_failure(a);
        }
        assert_eq!(cb.state_kind(), BreakerStateKind::Open);

        sleep(Duration::from_millis(60));

        let a1 = cb.try_acquire().unwrap();
        cb.record_success(a1);
        assert_eq!(cb.state_kind(), BreakerStateKind::HalfOpen);
        assert_eq!(cb.stats().successes, 1);

        let a2 = cb.try_acquire().unwrap();
        cb.record_success(a2);
        assert_eq!(cb.state_kind(), BreakerStateKind::Closed);
    }

    /// Scenario 2 — half-open failure raises timeout (spec §8).
    #[test]
    fn half_open_failure_raises_timeout() {
        let cb = CircuitBreaker::new("svc", params(2, 2, 50));
        for _ in 0..2 {
            let a = cb.try_acquire().unwrap();
            cb.record_failure(a);
        }

        sleep(Duration::from_millis(60));
        let a = cb.try_acquire().unwrap();
        cb.record_failure(a);
        assert_eq!(cb.state_kind(), BreakerStateKind::Open);
        assert_eq!(cb.stats().current_timeout_ms, 100);

        sleep(Duration::from_millis(110));
        let a = cb.try_acquire().unwrap();
        cb.record_failure(a);
        assert_eq!(cb.stats().current_timeout_ms, 200);
    }

    #[test]
    fn generation_always_increases_on_transition() {
        let cb = CircuitBreaker::new("svc", params(1, 1, 10));
        let gen0 = cb.generation();
        let a = cb.try_acquire().unwrap();
        cb.record_failure(a);
        assert!(cb.generation() > gen0);
    }

    #[test]
    fn stale_generation_update_is_a_no_op() {
        let cb = CircuitBreaker::new("svc", params(1, 2, 10));
        let a = cb.try_acquire().unwrap();
        // trips open, bumping generation
        cb.record_failure(a);
        let failures_after = cb.stats().failures;
        // replaying the same (now stale) admission must not mutate state
        cb.record_failure(a);
        assert_eq!(cb.stats().failures, failures_after);
    }

    #[test]
    fn only_one_half_open_trial_at_a_time() {
        let cb = CircuitBreaker::new("svc", params(1, 2, 10));
        let a = cb.try_acquire().unwrap();
        cb.record_failure(a);
        sleep(Duration::from_millis(15));

        let trial = cb.try_acquire().unwrap();
        assert_eq!(cb.state_kind(), BreakerStateKind::HalfOpen);
        assert!(cb.try_acquire().is_err());
        cb.record_success(trial);
    }

    proptest::proptest! {
        #[test]
        fn generation_is_monotonic_across_random_outcomes(outcomes: Vec<bool>) {
            let cb = CircuitBreaker::new("svc", params(3, 2, 1));
            let mut last_gen = cb.generation();
            for ok in outcomes {
                if let Ok(a) = cb.try_acquire() {
                    if ok {
                        cb.record_success(a);
                    } else {
                        cb.record_failure(a);
                    }
                }
                let gen = cb.generation();
                proptest::prop_assert!(gen >= last_gen);
                last_gen = gen;
            }
        }
    }
}
