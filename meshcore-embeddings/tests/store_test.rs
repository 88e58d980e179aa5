use std::sync::Arc;

use meshcore_embeddings::{resolve_provider_and_name, EmbeddingStore, NewEmbedding};
use meshcore_models::{ModelCatalog, NewModel};
use meshcore_storage::StorageEngine;
use uuid::Uuid;

fn setup() -> (Arc<StorageEngine>, Arc<ModelCatalog>, EmbeddingStore) {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let catalog = Arc::new(ModelCatalog::new(storage.clone()));
    catalog
        .create(NewModel {
            model_id: "openai/text-embedding-3-small".into(),
            provider: "openai".into(),
            model_name: "text-embedding-3-small".into(),
            dimensions: 1536,
            max_tokens: 8192,
            cost_per_million_tokens: 0.02,
            cost_per_million_chars: 0.0,
            supports_binary: false,
            supports_dimensionality_reduction: false,
            min_dimensions: 256,
            model_type: "text".into(),
            minimum_tier: "free".into(),
            requires_api_key: true,
        })
        .unwrap();
    let store = EmbeddingStore::new(storage.clone(), catalog.clone());
    (storage, catalog, store)
}

fn vec1536(seed: f32) -> Vec<f32> {
    (0..1536).map(|i| seed + i as f32 * 0.0001).collect()
}

#[test]
fn provider_inference_matches_known_prefixes() {
    assert_eq!(
        resolve_provider_and_name("openai/text-embedding-3-small"),
        ("openai".into(), "text-embedding-3-small".into())
    );
    assert_eq!(
        resolve_provider_and_name("amazon.titan-embed-text-v1"),
        ("bedrock".into(), "amazon.titan-embed-text-v1".into())
    );
    assert_eq!(
        resolve_provider_and_name("text-embedding-ada-002"),
        ("openai".into(), "text-embedding-ada-002".into())
    );
}

#[test]
fn store_embedding_rejects_unknown_model() {
    let (_storage, _catalog, store) = setup();
    let err = store
        .store_embedding(NewEmbedding {
            tenant_id: Uuid::new_v4(),
            context_id: None,
            content_index: 0,
            chunk_index: 0,
            content: "hello".into(),
            model_id: "nobody/nothing".into(),
            vector: vec1536(0.1),
            metadata: serde_json::json!({}),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        meshcore_core::errors::ContextError::UnknownModel { .. }
    ));
}

#[test]
fn store_embedding_round_trips_vector() {
    let (_storage, _catalog, store) = setup();
    let tenant = Uuid::new_v4();
    let vector = vec1536(0.25);
    let embedding = store
        .store_embedding(NewEmbedding {
            tenant_id: tenant,
            context_id: Some(tenant),
            content_index: 0,
            chunk_index: 0,
            content: "some chunk of text".into(),
            model_id: "openai/text-embedding-3-small".into(),
            vector: vector.clone(),
            metadata: serde_json::json!({}),
        })
        .unwrap();
    assert_eq!(embedding.vector, vector);
    assert_eq!(embedding.model_dimensions, 1536);

    let fetched = store.get_embedding(embedding.id).unwrap();
    assert_eq!(fetched.content_hash, embedding.content_hash);
}

#[test]
fn rag_source_type_clears_context_id() {
    let (_storage, _catalog, store) = setup();
    let tenant = Uuid::new_v4();
    let embedding = store
        .store_embedding(NewEmbedding {
            tenant_id: tenant,
            context_id: Some(tenant),
            content_index: 0,
            chunk_index: 0,
            content: "rag doc".into(),
            model_id: "openai/text-embedding-3-small".into(),
            vector: vec1536(0.5),
            metadata: serde_json::json!({"source_type": "rag"}),
        })
        .unwrap();
    assert!(embedding.context_id.is_none());
}

#[test]
fn search_embeddings_orders_by_decreasing_similarity() {
    let (_storage, _catalog, store) = setup();
    let tenant = Uuid::new_v4();
    let query = vec1536(1.0);

    let close = store
        .store_embedding(NewEmbedding {
            tenant_id: tenant,
            context_id: None,
            content_index: 0,
            chunk_index: 0,
            content: "close match".into(),
            model_id: "openai/text-embedding-3-small".into(),
            vector: vec1536(0.99),
            metadata: serde_json::json!({}),
        })
        .unwrap();
    let far = store
        .store_embedding(NewEmbedding {
            tenant_id: tenant,
            context_id: None,
            content_index: 0,
            chunk_index: 0,
            content: "far match".into(),
            model_id: "openai/text-embedding-3-small".into(),
            vector: (0..1536).map(|i| -1.0 + i as f32 * -0.0001).collect(),
            metadata: serde_json::json!({}),
        })
        .unwrap();

    let results = store
        .search_embeddings(&query, None, None, 10, 0.0)
        .unwrap();
    let ids: Vec<Uuid> = results.iter().map(|(e, _)| e.id).collect();
    assert_eq!(ids[0], close.id);
    assert!(ids.contains(&far.id));
}

#[test]
fn store_context_embedding_replaces_existing_sequence_link() {
    let (_storage, _catalog, store) = setup();
    let tenant = Uuid::new_v4();
    let context_id = Uuid::new_v4();

    store
        .store_context_embedding(
            context_id,
            NewEmbedding {
                tenant_id: tenant,
                context_id: Some(context_id),
                content_index: 0,
                chunk_index: 0,
                content: "v1".into(),
                model_id: "openai/text-embedding-3-small".into(),
                vector: vec1536(0.1),
                metadata: serde_json::json!({}),
            },
            0,
            0.5,
        )
        .unwrap();
    store
        .store_context_embedding(
            context_id,
            NewEmbedding {
                tenant_id: tenant,
                context_id: Some(context_id),
                content_index: 0,
                chunk_index: 0,
                content: "v2".into(),
                model_id: "openai/text-embedding-3-small".into(),
                vector: vec1536(0.2),
                metadata: serde_json::json!({}),
            },
            0,
            0.9,
        )
        .unwrap();

    let linked = store
        .get_context_embeddings_by_sequence(context_id, 0, 0)
        .unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].content, "v2");
}
