use std::sync::Arc;

use async_trait::async_trait;
use meshcore_chunking::RecursiveCharacterSplitter;
use meshcore_context::{ContextManager, NewContext};
use meshcore_core::errors::{ContextError, CoreResult};
use meshcore_core::models::CompactionStrategy;
use meshcore_core::traits::EmbeddingProvider;
use meshcore_embeddings::EmbeddingStore;
use meshcore_models::{ModelCatalog, NewModel};
use meshcore_storage::StorageEngine;
use uuid::Uuid;

struct FakeProvider;

#[async_trait]
impl EmbeddingProvider for FakeProvider {
    async fn embed(&self, _model_id: &str, text: &str) -> CoreResult<Vec<f32>> {
        let seed = text.len() as f32 * 0.01;
        Ok((0..1536).map(|i| seed + i as f32 * 0.0001).collect())
    }
}

fn setup() -> (ContextManager, Uuid) {
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
    let embeddings = Arc::new(EmbeddingStore::new(storage.clone(), catalog));
    let manager = ContextManager::new(storage, embeddings);

    let context = manager
        .create_context(NewContext {
            tenant_id: Uuid::new_v4(),
            name: "conversation-1".into(),
            agent_id: Some("agent-a".into()),
            session_id: None,
            properties: serde_json::json!({}),
        })
        .unwrap();
    (manager, context.id)
}

#[tokio::test]
async fn update_context_chunks_and_embeds_with_increasing_sequence() {
    let (manager, context_id) = setup();
    let chunker = RecursiveCharacterSplitter::new(80, 10);
    let provider = FakeProvider;

    let stored = manager
        .update_context(
            context_id,
            "First sentence here. Second sentence follows. Third sentence wraps up the paragraph nicely.",
            "openai/text-embedding-3-small",
            &provider,
            &chunker,
        )
        .await
        .unwrap();

    assert!(!stored.is_empty());
    manager.validate_context_integrity(context_id).unwrap();
}

#[tokio::test]
async fn update_context_twice_keeps_sequence_monotonic() {
    let (manager, context_id) = setup();
    let chunker = RecursiveCharacterSplitter::new(80, 10);
    let provider = FakeProvider;

    manager
        .update_context(context_id, "Alpha content block one.", "openai/text-embedding-3-small", &provider, &chunker)
        .await
        .unwrap();
    manager
        .update_context(context_id, "Beta content block two.", "openai/text-embedding-3-small", &provider, &chunker)
        .await
        .unwrap();

    manager.validate_context_integrity(context_id).unwrap();
}

#[tokio::test]
async fn search_context_returns_scoped_results() {
    let (manager, context_id) = setup();
    let chunker = RecursiveCharacterSplitter::new(80, 10);
    let provider = FakeProvider;
    manager
        .update_context(
            context_id,
            "Rust ownership rules prevent data races at compile time.",
            "openai/text-embedding-3-small",
            &provider,
            &chunker,
        )
        .await
        .unwrap();

    let results = manager
        .search_context("ownership", context_id, 5, "openai/text-embedding-3-small", &provider)
        .await
        .unwrap();
    assert!(!results.is_empty());
}

#[test]
fn delete_context_removes_it() {
    let (manager, context_id) = setup();
    manager.delete_context(context_id).unwrap();
    let err = manager
        .get_context(context_id, &Default::default())
        .unwrap_err();
    assert!(matches!(err, ContextError::NotFound { .. }));
}

#[tokio::test]
async fn compact_context_sliding_keeps_only_recent_window() {
    let (manager, context_id) = setup();
    let chunker = RecursiveCharacterSplitter::new(40, 5);
    let provider = FakeProvider;
    let long_text = "Sentence number one. Sentence number two. Sentence number three. Sentence number four. Sentence number five.";
    manager
        .update_context(context_id, long_text, "openai/text-embedding-3-small", &provider, &chunker)
        .await
        .unwrap();

    manager
        .compact_context(context_id, CompactionStrategy::Sliding)
        .unwrap();

    let context = manager.get_context(context_id, &Default::default()).unwrap();
    assert!(context.properties["compaction"]["strategy"].is_string());
}

#[test]
fn audit_context_access_records_entry() {
    let (manager, context_id) = setup();
    manager
        .audit_context_access(context_id, "agent-a", "read", true, None)
        .unwrap();
}
