//! Shared SQLite storage engine (spec §5 "Shared resources", §6 storage
//! schema). The session/credential/model/embedding/context crates each
//! hold an `Arc<StorageEngine>` and own their slice of the schema; this
//! crate centralizes connection handling and leaves per-domain query
//! modules to its consumers.

pub mod engine;
pub mod schema;

pub use engine::{decode_vector, encode_vector, StorageEngine};
