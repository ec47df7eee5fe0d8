use super::*;

use std::time::Duration;

use crate::query::Intent;
use crate::query::PolicyDecision;
use crate::query::ProcessedQuery;
use crate::query::QueryPreprocessor;
use crate::types::ChunkRecord;
use crate::types::EmbeddingRecord;
use crate::types::FileRecord;
use crate::types::MemoryKind;
use crate::types::MemoryRecord;
use crate::types::MemoryScope;
use crate::types::SpanKind;
use crate::types::SpanRecord;

const NOW: i64 = 1_700_000_000;

async fn seed_store() -> Store {
    let store = Store::open_in_memory().unwrap();

    let content = "fn getUserById(id: u64) -> User { lookup(id) }";
    let file = FileRecord::new("repo", "src/user.rs", content.as_bytes(), "rust");
    let span = SpanRecord::new(
        "repo",
        "src/user.rs",
        0,
        content.len() as u64,
        SpanKind::Function,
        Some("getUserById".to_string()),
        Some("fn getUserById(id: u64) -> User".to_string()),
        None,
        vec![],
    );
    let chunk = ChunkRecord::new(&span, content, NOW);
    let chunk_id = chunk.id.clone();
    store
        .upsert_file(file, vec![span], vec![chunk], vec![])
        .await
        .unwrap();
    store
        .insert_embeddings(vec![EmbeddingRecord {
            chunk_id,
            model: "embed-model".to_string(),
            dimension: 2,
            vector: vec![1.0, 0.0],
        }])
        .await
        .unwrap();

    store
        .put_memory(MemoryRecord::new(
            MemoryScope::Repo,
            Some("repo".to_string()),
            MemoryKind::Gotcha,
            None,
            "user lookup is cached aggressively",
            NOW,
        ))
        .await
        .unwrap();

    store
}

fn request<'a>(
    processed: &'a ProcessedQuery,
    policy: &'a PolicyDecision,
    query_vector: Option<&'a [f32]>,
) -> LaneRequest<'a> {
    LaneRequest {
        processed,
        policy,
        query_vector,
        embedding_model: "embed-model",
        repo: Some("repo"),
        branch: None,
        limit: 10,
        timeout: Duration::from_secs(2),
        now: NOW + 1,
    }
}

#[tokio::test]
async fn test_all_lanes_produce_candidates() {
    let store = seed_store().await;
    let processed = QueryPreprocessor::new().process("getUserById user lookup");
    let policy = PolicyDecision::base(Intent::Symbol);
    let vector = [1.0_f32, 0.0];

    let output = run_lanes(&store, request(&processed, &policy, Some(&vector))).await;

    assert_eq!(output.lanes.len(), 4);
    assert!(!output.all_empty());
    for status in &output.statuses {
        assert!(
            matches!(status.state, LaneState::Completed { .. }),
            "{:?}",
            status
        );
    }

    let symbol = output
        .lanes
        .iter()
        .find(|(lane, _)| *lane == Lane::Symbol)
        .unwrap();
    assert_eq!(symbol.1.len(), 1);
    assert_eq!(symbol.1[0].symbol.as_deref(), Some("getUserById"));

    let memory = output
        .lanes
        .iter()
        .find(|(lane, _)| *lane == Lane::Memory)
        .unwrap();
    assert_eq!(memory.1.len(), 1);
}

#[tokio::test]
async fn test_vector_lane_skipped_without_embedding() {
    let store = seed_store().await;
    let processed = QueryPreprocessor::new().process("user lookup");
    let policy = PolicyDecision::base(Intent::Search);

    let output = run_lanes(&store, request(&processed, &policy, None)).await;

    let vector_status = output
        .statuses
        .iter()
        .find(|s| s.lane == Lane::Vector)
        .unwrap();
    assert_eq!(vector_status.state, LaneState::Skipped);
    // Skipped lanes are excluded from the fusion input entirely.
    assert!(!output.lanes.iter().any(|(lane, _)| *lane == Lane::Vector));
}

#[tokio::test]
async fn test_symbol_lane_skipped_without_identifier() {
    let store = seed_store().await;
    let processed = QueryPreprocessor::new().process("how caching works here");
    let policy = PolicyDecision::base(Intent::Search);

    let output = run_lanes(&store, request(&processed, &policy, None)).await;
    let symbol_status = output
        .statuses
        .iter()
        .find(|s| s.lane == Lane::Symbol)
        .unwrap();
    assert_eq!(symbol_status.state, LaneState::Skipped);
}

#[tokio::test]
async fn test_symbol_lane_respects_policy() {
    let store = seed_store().await;
    let processed = QueryPreprocessor::new().process("getUserById");
    let mut policy = PolicyDecision::base(Intent::Symbol);
    policy.include_symbols = false;

    let output = run_lanes(&store, request(&processed, &policy, None)).await;
    let symbol_status = output
        .statuses
        .iter()
        .find(|s| s.lane == Lane::Symbol)
        .unwrap();
    assert_eq!(symbol_status.state, LaneState::Skipped);
}

#[tokio::test]
async fn test_expired_memories_not_surfaced() {
    let store = seed_store().await;
    let mut expired = MemoryRecord::new(
        MemoryScope::Repo,
        Some("repo".to_string()),
        MemoryKind::Plan,
        None,
        "user migration plan",
        NOW - 100,
    );
    expired.expires_at = Some(NOW - 10);
    store.put_memory(expired).await.unwrap();

    let processed = QueryPreprocessor::new().process("user migration");
    let policy = PolicyDecision::base(Intent::Search);
    let output = run_lanes(&store, request(&processed, &policy, None)).await;

    let memory = output
        .lanes
        .iter()
        .find(|(lane, _)| *lane == Lane::Memory)
        .unwrap();
    // Only the unexpired gotcha matches "user".
    assert_eq!(memory.1.len(), 1);
}

#[tokio::test]
async fn test_empty_store_all_lanes_empty() {
    let store = Store::open_in_memory().unwrap();
    let processed = QueryPreprocessor::new().process("anything at all");
    let policy = PolicyDecision::base(Intent::Search);
    let output = run_lanes(&store, request(&processed, &policy, None)).await;
    assert!(output.all_empty());
}
