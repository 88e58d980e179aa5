//! Session Store & Tool-Execution Ledger (spec §4.1): edge session
//! lifecycle (create/get/expire/terminate/list/cleanup) and an
//! append-only, atomically-recorded tool-execution ledger.

pub mod store;

pub use store::{NewSession, NewToolExecution, SessionStore};
