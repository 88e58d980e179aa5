//! Protocol Telemetry (spec §4.7): rolling per-(protocol, message_type)
//! averages feeding transport recommendations and custom-protocol
//! removal verdicts.

use std::sync::Mutex;

use dashmap::DashMap;
use meshcore_core::models::{ProtocolObservation, ProtocolRecommendation, RemovalVerdict};

#[derive(Debug, Clone, Default)]
struct RollingStats {
    count: u64,
    total_latency_ms: f64,
    total_size_bytes: u64,
    /// Observations with the same size bucket (within 10%) back to back,
    /// used as a cheap stand-in for "predictability".
    repeat_size_hits: u64,
    last_size_bucket: Option<u64>,
    last_seen: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
}

impl RollingStats {
    fn record(&mut self, obs: &ProtocolObservation, now: chrono::DateTime<chrono::Utc>) {
        self.count += 1;
        self.total_latency_ms += obs.latency_ms;
        self.total_size_bytes += obs.size_bytes as u64;

        let bucket = (obs.size_bytes as u64) / 128;
        if self.last_size_bucket == Some(bucket) {
            self.repeat_size_hits += 1;
        }
        self.last_size_bucket = Some(bucket);
        *self.last_seen.lock().unwrap() = Some(now);
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_latency_ms / self.count as f64
        }
    }

    fn avg_size_bytes(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_size_bytes as f64 / self.count as f64
        }
    }

    fn predictability(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.repeat_size_hits as f64 / self.count as f64
        }
    }
}

/// Tracks protocol usage for recommendation and deprecation decisions.
#[derive(Default)]
pub struct ProtocolTelemetry {
    /// keyed by (protocol, message_type)
    stats: DashMap<(String, String), RollingStats>,
    /// keyed by protocol, total observations across all message types
    protocol_totals: DashMap<String, u64>,
}

impl ProtocolTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_observation(&self, obs: ProtocolObservation) {
        let now = chrono::Utc::now();
        self.stats
            .entry((obs.protocol.clone(), obs.message_type.clone()))
            .or_default()
            .record(&obs, now);
        *self.protocol_totals.entry(obs.protocol.clone()).or_insert(0) += 1;
    }

    /// `GetProtocolRecommendation(messageType, size)` (spec §4.7): high
    /// predictability favors prefetching; small, slow messages favor
    /// batching; a message far larger than history has seen always gets
    /// the plain transport since batching/prefetch assumptions don't hold
    /// for it; otherwise leave the transport alone.
    pub fn get_protocol_recommendation(
        &self,
        protocol: &str,
        message_type: &str,
        size: usize,
    ) -> ProtocolRecommendation {
        let key = (protocol.to_string(), message_type.to_string());
        let Some(stats) = self.stats.get(&key) else {
            return ProtocolRecommendation::Standard;
        };

        let avg_size = stats.avg_size_bytes();
        let size_in_line_with_history = avg_size == 0.0 || (size as f64) <= avg_size * 1.5;

        if stats.predictability() > 0.8 && size_in_line_with_history {
            ProtocolRecommendation::Prefetch
        } else if stats.avg_latency_ms() > 100.0 && (size as f64) < 1024.0 {
            ProtocolRecommendation::Batch
        } else {
            ProtocolRecommendation::Standard
        }
    }

    /// `ShouldRemoveCustomProtocol(protocol)` (spec §4.7): safe to remove a
    /// custom transport once it's been idle for over 30 days, or once its
    /// share of total traffic has fallen below 1%.
    pub fn should_remove_custom_protocol(&self, protocol: &str) -> RemovalVerdict {
        let Some(uses) = self.protocol_totals.get(protocol) else {
            return RemovalVerdict {
                safe: true,
                reason: "no recorded usage".to_string(),
                migration_path_hint: None,
            };
        };

        let total_all: u64 = self.protocol_totals.iter().map(|e| *e.value()).sum();
        let share = if total_all == 0 {
            0.0
        } else {
            *uses as f64 / total_all as f64
        };

        let last_seen = self
            .stats
            .iter()
            .filter(|e| e.key().0 == protocol)
            .filter_map(|e| *e.value().last_seen.lock().unwrap())
            .max();
        let days_since_last_use = last_seen
            .map(|t| (chrono::Utc::now() - t).num_days())
            .unwrap_or(i64::MAX);

        if days_since_last_use > 30 {
            return RemovalVerdict {
                safe: true,
                reason: format!("unused for {days_since_last_use} days"),
                migration_path_hint: Some("standard".to_string()),
            };
        }

        if share < 0.01 {
            return RemovalVerdict {
                safe: true,
                reason: format!("traffic share {:.2}% below 1% threshold", share * 100.0),
                migration_path_hint: Some("standard".to_string()),
            };
        }

        RemovalVerdict {
            safe: false,
            reason: format!(
                "still carries {:.2}% of traffic, last used {} days ago",
                share * 100.0,
                days_since_last_use
            ),
            migration_path_hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(protocol: &str, message_type: &str, size: usize, latency: f64) -> ProtocolObservation {
        ProtocolObservation {
            protocol: protocol.to_string(),
            message_type: message_type.to_string(),
            size_bytes: size,
            latency_ms: latency,
        }
    }

    #[test]
    fn unknown_message_type_recommends_standard() {
        let telemetry = ProtocolTelemetry::new();
        assert_eq!(
            telemetry.get_protocol_recommendation("grpc", "unknown", 256),
            ProtocolRecommendation::Standard
        );
    }

    #[test]
    fn repeated_similar_sizes_recommend_prefetch() {
        let telemetry = ProtocolTelemetry::new();
        for _ in 0..10 {
            telemetry.record_observation(obs("grpc", "heartbeat", 256, 5.0));
        }
        assert_eq!(
            telemetry.get_protocol_recommendation("grpc", "heartbeat", 256),
            ProtocolRecommendation::Prefetch
        );
    }

    #[test]
    fn slow_small_messages_recommend_batch() {
        let telemetry = ProtocolTelemetry::new();
        telemetry.record_observation(obs("websocket", "event", 100, 150.0));
        telemetry.record_observation(obs("websocket", "event", 900, 150.0));
        assert_eq!(
            telemetry.get_protocol_recommendation("websocket", "event", 900),
            ProtocolRecommendation::Batch
        );
    }

    #[test]
    fn unused_protocol_is_safe_to_remove() {
        let telemetry = ProtocolTelemetry::new();
        let verdict = telemetry.should_remove_custom_protocol("legacy-binary");
        assert!(verdict.safe);
    }

    #[test]
    fn low_share_protocol_is_safe_to_remove() {
        let telemetry = ProtocolTelemetry::new();
        for _ in 0..995 {
            telemetry.record_observation(obs("grpc", "rpc", 256, 5.0));
        }
        for _ in 0..5 {
            telemetry.record_observation(obs("legacy-binary", "rpc", 256, 5.0));
        }
        let verdict = telemetry.should_remove_custom_protocol("legacy-binary");
        assert!(verdict.safe);
        assert!(verdict.migration_path_hint.is_some());
    }

    #[test]
    fn heavily_used_protocol_is_unsafe_to_remove() {
        let telemetry = ProtocolTelemetry::new();
        for _ in 0..50 {
            telemetry.record_observation(obs("legacy-binary", "rpc", 256, 5.0));
        }
        let verdict = telemetry.should_remove_custom_protocol("legacy-binary");
        assert!(!verdict.safe);
    }
}
