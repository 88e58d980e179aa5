//! Self-Healing Controller and Protocol Telemetry (spec §4.7): turns
//! failure events into tracked incidents, dispatches recovery strategies,
//! periodically auto-tunes breaker thresholds from recent outcomes, and
//! recommends transport behavior from observed protocol traffic.

pub mod adaptive;
pub mod controller;
pub mod monitor;
pub mod telemetry;

pub use adaptive::{adjust, AdaptiveThresholds, ComponentAssessment, ThresholdAdjustment};
pub use controller::HealingController;
pub use monitor::spawn_monitor;
pub use telemetry::ProtocolTelemetry;
