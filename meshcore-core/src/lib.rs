//! Shared data model, error taxonomy, configuration, and capability traits
//! for the developer-mesh control plane (spec §3, §7, §9).
//!
//! Every other `meshcore-*` crate depends on this one for its domain types
//! and its slice of [`errors`], rather than redefining them locally.

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::MeshConfig;
pub use errors::{CoreError, CoreResult};
