//! Periodic threshold auto-tuning for the monitor's "optimizeThresholds"
//! tick (spec §4.7 "Adaptive thresholds"). Distinct from the breaker's own
//! per-call confidence adjustment: this runs on a batch of recent incident
//! assessments once per monitor interval.

/// One component's recent track record, fed to [`adjust`].
#[derive(Debug, Clone)]
pub struct ComponentAssessment {
    pub component: String,
    pub recent_failures: u32,
    pub recent_successes: u32,
    pub cascade_triggered: bool,
}

/// Tunable knobs the monitor may adjust for a component's breaker.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveThresholds {
    pub failure_threshold: u32,
    pub timeout_multiplier: f64,
}

impl Default for AdaptiveThresholds {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_multiplier: 2.0,
        }
    }
}

/// An adjustment the tuner decided to make, for the audit trail.
#[derive(Debug, Clone)]
pub struct ThresholdAdjustment {
    pub component: String,
    pub parameter: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
}

/// Apply tuning based on a round of recent per-component assessments.
///
/// Mirrors the consolidation pipeline's batch auto-tuner: count failures
/// against the round, nudge thresholds, and report every adjustment made.
/// Returns an empty vec if nothing warranted a change.
pub fn adjust(
    thresholds: &mut AdaptiveThresholds,
    assessments: &[ComponentAssessment],
) -> Vec<ThresholdAdjustment> {
    if assessments.is_empty() {
        return vec![];
    }

    let mut adjustments = Vec::new();

    for a in assessments {
        let total = a.recent_failures + a.recent_successes;
        if total == 0 {
            continue;
        }
        let failure_rate = a.recent_failures as f64 / total as f64;

        // Frequent failures without a full trip: tighten the threshold so
        // the breaker opens sooner next time.
        if failure_rate > 0.4 && thresholds.failure_threshold > 3 {
            let old = thresholds.failure_threshold as f64;
            thresholds.failure_threshold -= 1;
            adjustments.push(ThresholdAdjustment {
                component: a.component.clone(),
                parameter: "failure_threshold".to_string(),
                old_value: old,
                new_value: thresholds.failure_threshold as f64,
                reason: format!(
                    "failure rate {:.0}% over last {} calls",
                    failure_rate * 100.0,
                    total
                ),
            });
        }

        // A cascade means the component's recovery window is too short:
        // back the timeout multiplier off to recover more conservatively.
        if a.cascade_triggered && thresholds.timeout_multiplier < 4.0 {
            let old = thresholds.timeout_multiplier;
            thresholds.timeout_multiplier = (old + 0.5).min(4.0);
            adjustments.push(ThresholdAdjustment {
                component: a.component.clone(),
                parameter: "timeout_multiplier".to_string(),
                old_value: old,
                new_value: thresholds.timeout_multiplier,
                reason: "cascade triggered through this component".to_string(),
            });
        }

        // Mostly-clean track record: relax the threshold back up.
        if failure_rate < 0.05 && thresholds.failure_threshold < 10 {
            let old = thresholds.failure_threshold as f64;
            thresholds.failure_threshold += 1;
            adjustments.push(ThresholdAdjustment {
                component: a.component.clone(),
                parameter: "failure_threshold".to_string(),
                old_value: old,
                new_value: thresholds.failure_threshold as f64,
                reason: format!("failure rate {:.0}% over last {} calls", failure_rate * 100.0, total),
            });
        }
    }

    adjustments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tuning_on_empty_assessments() {
        let mut thresholds = AdaptiveThresholds::default();
        let adjustments = adjust(&mut thresholds, &[]);
        assert!(adjustments.is_empty());
    }

    #[test]
    fn high_failure_rate_tightens_threshold() {
        let mut thresholds = AdaptiveThresholds::default();
        let assessments = vec![ComponentAssessment {
            component: "github".to_string(),
            recent_failures: 8,
            recent_successes: 2,
            cascade_triggered: false,
        }];
        let adjustments = adjust(&mut thresholds, &assessments);
        assert!(!adjustments.is_empty());
        assert_eq!(thresholds.failure_threshold, 4);
    }

    #[test]
    fn cascade_raises_timeout_multiplier() {
        let mut thresholds = AdaptiveThresholds::default();
        let assessments = vec![ComponentAssessment {
            component: "github-webhooks".to_string(),
            recent_failures: 1,
            recent_successes: 1,
            cascade_triggered: true,
        }];
        let adjustments = adjust(&mut thresholds, &assessments);
        assert!(adjustments
            .iter()
            .any(|a| a.parameter == "timeout_multiplier"));
        assert_eq!(thresholds.timeout_multiplier, 2.5);
    }

    #[test]
    fn clean_track_record_relaxes_threshold() {
        let mut thresholds = AdaptiveThresholds::default();
        let assessments = vec![ComponentAssessment {
            component: "stable-service".to_string(),
            recent_failures: 0,
            recent_successes: 100,
            cascade_triggered: false,
        }];
        let adjustments = adjust(&mut thresholds, &assessments);
        assert_eq!(thresholds.failure_threshold, 6);
        assert!(!adjustments.is_empty());
    }

    #[test]
    fn threshold_never_drops_below_floor() {
        let mut thresholds = AdaptiveThresholds {
            failure_threshold: 3,
            timeout_multiplier: 2.0,
        };
        let assessments = vec![ComponentAssessment {
            component: "flaky".to_string(),
            recent_failures: 9,
            recent_successes: 1,
            cascade_triggered: false,
        }];
        adjust(&mut thresholds, &assessments);
        assert_eq!(thresholds.failure_threshold, 3);
    }
}
