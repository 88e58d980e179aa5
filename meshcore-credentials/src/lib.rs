//! Credential Store & Manager (spec §4.4): envelope-encrypted per-tenant
//! credentials with CRUD, lifecycle (expiry/rotation/inactivity), and an
//! audit trail whose writes never fail the underlying operation.

pub mod store;
pub mod validation;

pub use store::{CredentialStore, NewCredential};
