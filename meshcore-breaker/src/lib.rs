//! Adaptive circuit breaker and the network that coordinates many of them
//! (spec §4.7).

mod breaker;
mod network;

pub use breaker::{Admission, BreakerParams, CircuitBreaker};
pub use network::{default_params, CascadeProtector, CircuitBreakerNetwork};
