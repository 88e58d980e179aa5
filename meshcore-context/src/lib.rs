//! Semantic Context Manager (spec §4.6): chunking + embedding orchestration
//! over stored context, retrieval, and compaction.

pub mod manager;

pub use manager::{ContextManager, NewContext};
