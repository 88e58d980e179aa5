use std::sync::Arc;
use std::thread;

use meshcore_models::{ModelCatalog, NewModel, TenantModelSelector};
use meshcore_storage::StorageEngine;
use uuid::Uuid;

fn setup() -> (Arc<StorageEngine>, ModelCatalog, TenantModelSelector) {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let catalog = ModelCatalog::new(storage.clone());
    let selector = TenantModelSelector::new(storage.clone());
    (storage, catalog, selector)
}

fn model(model_id: &str, provider: &str) -> NewModel {
    NewModel {
        model_id: model_id.into(),
        provider: provider.into(),
        model_name: model_id.into(),
        dimensions: 1536,
        max_tokens: 8192,
        cost_per_million_tokens: 0.13,
        cost_per_million_chars: 0.0,
        supports_binary: false,
        supports_dimensionality_reduction: false,
        min_dimensions: 256,
        model_type: "text".into(),
        minimum_tier: "free".into(),
        requires_api_key: true,
    }
}

#[test]
fn catalog_create_then_lookup_by_model_id() {
    let (_storage, catalog, _selector) = setup();
    let created = catalog.create(model("openai/text-embedding-3-small", "openai")).unwrap();
    let found = catalog.get_by_model_id("openai/text-embedding-3-small").unwrap();
    assert_eq!(found.id, created.id);
    assert!(found.is_available);
}

#[test]
fn list_available_excludes_deprecated() {
    let (_storage, catalog, _selector) = setup();
    let a = catalog.create(model("a", "openai")).unwrap();
    catalog.create(model("b", "cohere")).unwrap();
    catalog.mark_deprecated(a.id, None).unwrap();

    let available = catalog.list_available().unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].model_id, "b");
}

#[test]
fn set_default_model_clears_previous_default() {
    let (_storage, catalog, selector) = setup();
    let tenant = Uuid::new_v4();
    let a = catalog.create(model("a", "openai")).unwrap();
    let b = catalog.create(model("b", "openai")).unwrap();
    selector.create_tenant_model(tenant, a.id, 1, None, None, None).unwrap();
    selector.create_tenant_model(tenant, b.id, 1, None, None, None).unwrap();

    selector.set_default_model(tenant, a.id).unwrap();
    assert!(selector.get_tenant_model(tenant, a.id).unwrap().is_default);

    selector.set_default_model(tenant, b.id).unwrap();
    assert!(!selector.get_tenant_model(tenant, a.id).unwrap().is_default);
    assert!(selector.get_tenant_model(tenant, b.id).unwrap().is_default);
}

#[test]
fn set_default_model_unknown_model_fails() {
    let (_storage, _catalog, selector) = setup();
    let tenant = Uuid::new_v4();
    let err = selector.set_default_model(tenant, Uuid::new_v4()).unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::ModelError::SetDefaultFailed { .. }
    ));
}

/// spec §8 scenario 8: two concurrent `SetDefaultModel` calls for the same
/// tenant leave exactly one of the two models as default.
#[test]
fn concurrent_set_default_model_is_exclusive() {
    let (_storage, catalog, selector) = setup();
    let tenant = Uuid::new_v4();
    let a = catalog.create(model("a", "openai")).unwrap();
    let b = catalog.create(model("b", "openai")).unwrap();
    selector.create_tenant_model(tenant, a.id, 1, None, None, None).unwrap();
    selector.create_tenant_model(tenant, b.id, 1, None, None, None).unwrap();

    let selector = Arc::new(selector);
    let s1 = selector.clone();
    let s2 = selector.clone();
    let t1 = thread::spawn(move || s1.set_default_model(tenant, a.id));
    let t2 = thread::spawn(move || s2.set_default_model(tenant, b.id));
    t1.join().unwrap().unwrap();
    t2.join().unwrap().unwrap();

    let models = selector.list_tenant_models(tenant, false).unwrap();
    let defaults: Vec<_> = models.iter().filter(|m| m.is_default).collect();
    assert_eq!(defaults.len(), 1);
}

#[test]
fn get_model_for_request_prefers_requested_model() {
    let (_storage, catalog, selector) = setup();
    let tenant = Uuid::new_v4();
    let a = catalog.create(model("a", "openai")).unwrap();
    let b = catalog.create(model("b", "openai")).unwrap();
    selector.create_tenant_model(tenant, a.id, 1, None, None, None).unwrap();
    selector.create_tenant_model(tenant, b.id, 5, None, None, None).unwrap();

    let resolved = selector
        .get_model_for_request(tenant, None, None, Some("a"))
        .unwrap();
    assert_eq!(resolved.model_id, "a");
}

#[test]
fn get_model_for_request_falls_back_to_highest_priority() {
    let (_storage, catalog, selector) = setup();
    let tenant = Uuid::new_v4();
    let a = catalog.create(model("a", "openai")).unwrap();
    let b = catalog.create(model("b", "openai")).unwrap();
    selector.create_tenant_model(tenant, a.id, 1, None, None, None).unwrap();
    selector.create_tenant_model(tenant, b.id, 9, None, None, None).unwrap();

    let resolved = selector.get_model_for_request(tenant, None, None, None).unwrap();
    assert_eq!(resolved.model_id, "b");
}

#[test]
fn get_model_for_request_no_candidates_errors() {
    let (_storage, _catalog, selector) = setup();
    let err = selector
        .get_model_for_request(Uuid::new_v4(), None, None, None)
        .unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::ModelError::NoModelAvailable { .. }
    ));
}

#[test]
fn usage_limits_respect_monthly_token_cap() {
    let (_storage, catalog, selector) = setup();
    let tenant = Uuid::new_v4();
    let a = catalog.create(model("a", "openai")).unwrap();
    selector
        .create_tenant_model(tenant, a.id, 1, Some(1000), None, None)
        .unwrap();

    selector.record_usage(tenant, a.id, 600).unwrap();
    let check = selector.check_usage_limits(tenant, a.id).unwrap();
    assert!(check.is_within_limits);

    selector.record_usage(tenant, a.id, 500).unwrap();
    let check = selector.check_usage_limits(tenant, a.id).unwrap();
    assert!(!check.is_within_limits);
    assert_eq!(check.month_tokens_used, 1100);
}

#[test]
fn bulk_enable_disable_updates_all_rows() {
    let (_storage, catalog, selector) = setup();
    let tenant = Uuid::new_v4();
    let a = catalog.create(model("a", "openai")).unwrap();
    let b = catalog.create(model("b", "openai")).unwrap();
    selector.create_tenant_model(tenant, a.id, 1, None, None, None).unwrap();
    selector.create_tenant_model(tenant, b.id, 1, None, None, None).unwrap();

    let count = selector.bulk_set_enabled(tenant, &[a.id, b.id], false).unwrap();
    assert_eq!(count, 2);
    assert!(selector.list_tenant_models(tenant, true).unwrap().is_empty());
}
