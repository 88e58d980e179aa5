use std::sync::Arc;

use chrono::{Duration, Utc};
use meshcore_core::config::CredentialsConfig;
use meshcore_core::models::CredentialType;
use meshcore_credentials::{CredentialStore, NewCredential};
use meshcore_crypto::EncryptionService;
use meshcore_storage::StorageEngine;
use uuid::Uuid;

fn store() -> CredentialStore {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let encryption = EncryptionService::new("test-master-key", 100);
    CredentialStore::new(storage, encryption, CredentialsConfig::default())
}

fn base(tenant_id: Uuid) -> NewCredential {
    NewCredential {
        tenant_id,
        tool_id: Some("github".into()),
        name: "ci-bot".into(),
        credential_type: CredentialType::ApiKey,
        value: "ghp_abcDEF123456".into(),
        oauth_client_id: None,
        oauth_refresh_token: None,
        oauth_token_expiry: None,
        tags: vec!["ci".into()],
        expires_at: None,
        allowed_edge_ids: vec![],
        metadata: serde_json::json!({}),
    }
}

#[test]
fn create_then_read_round_trips_plaintext() {
    let store = store();
    let tenant = Uuid::new_v4();
    let created = store.create_credential(base(tenant)).unwrap();

    let (cred, plaintext) = store.get_credential(created.id).unwrap();
    assert_eq!(plaintext, "ghp_abcDEF123456");
    assert!(cred.is_active);
}

#[test]
fn duplicate_active_name_rejected() {
    let store = store();
    let tenant = Uuid::new_v4();
    store.create_credential(base(tenant)).unwrap();
    let err = store.create_credential(base(tenant)).unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::CredentialError::AlreadyExists { .. }
    ));
}

#[test]
fn deactivating_then_recreating_same_name_succeeds() {
    let store = store();
    let tenant = Uuid::new_v4();
    let created = store.create_credential(base(tenant)).unwrap();
    store.deactivate(created.id).unwrap();

    // Soft-deleted rows don't block a fresh active row under the same name.
    let recreated = store.create_credential(base(tenant)).unwrap();
    assert_ne!(created.id, recreated.id);
}

#[test]
fn expired_credential_read_fails_and_is_audited() {
    let store = store();
    let tenant = Uuid::new_v4();
    let mut new = base(tenant);
    new.expires_at = Some(Utc::now() - Duration::seconds(1));
    let created = store.create_credential(new).unwrap();

    let err = store.get_credential(created.id).unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::CredentialError::Expired { .. }
    ));
}

#[test]
fn rotation_preserves_id_and_changes_ciphertext() {
    let store = store();
    let tenant = Uuid::new_v4();
    let created = store.create_credential(base(tenant)).unwrap();

    let rotated = store
        .rotate_credential(created.id, "ghp_newTOKEN9999", None)
        .unwrap();
    assert_eq!(rotated.id, created.id);
    assert_ne!(rotated.encrypted_value, created.encrypted_value);

    let (_, plaintext) = store.get_credential(created.id).unwrap();
    assert_eq!(plaintext, "ghp_newTOKEN9999");
}

#[test]
fn enforce_expiry_deactivates_past_due_rows() {
    let store = store();
    let tenant = Uuid::new_v4();
    let mut new = base(tenant);
    new.expires_at = Some(Utc::now() - Duration::seconds(1));
    let created = store.create_credential(new).unwrap();

    let affected = store.enforce_expiry().unwrap();
    assert_eq!(affected, 1);

    let err = store.get_credential(created.id).unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::CredentialError::Inactive { .. }
    ));
}

#[test]
fn check_inactive_surfaces_never_used_credentials() {
    let store = store();
    let tenant = Uuid::new_v4();
    store.create_credential(base(tenant)).unwrap();

    let inactive = store.check_inactive(Duration::days(30)).unwrap();
    assert_eq!(inactive.len(), 1);
}

#[test]
fn audit_trail_records_every_transition() {
    let store = store();
    let tenant = Uuid::new_v4();
    let created = store.create_credential(base(tenant)).unwrap();
    store.get_credential(created.id).unwrap();
    store.rotate_credential(created.id, "ghp_rotated12345", None).unwrap();
    store.deactivate(created.id).unwrap();

    let audits = store.list_audit(created.id).unwrap();
    let ops: Vec<&str> = audits.iter().map(|a| a.operation.as_str()).collect();
    assert_eq!(ops, vec!["create", "read", "rotate", "deactivate"]);
}

#[test]
fn weak_basic_password_rejected_when_required() {
    let store = store();
    let tenant = Uuid::new_v4();
    let mut new = base(tenant);
    new.credential_type = CredentialType::Basic;
    new.value = "user:weak".into();

    let err = store.create_credential(new).unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::CredentialError::Validation { .. }
    ));
}
