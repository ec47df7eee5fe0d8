use super::*;

use crate::types::SessionRecord;

fn make_session(id: &str) -> SessionRecord {
    SessionRecord {
        id: id.to_string(),
        tool: "cli".to_string(),
        user: "dev".to_string(),
        repo: Some("repo".to_string()),
        branch: Some("main".to_string()),
        started_at: 1_700_000_000,
        finished_at: None,
    }
}

#[tokio::test]
async fn test_session_interaction_flow() {
    let store = Store::open_in_memory().unwrap();
    store.start_session(make_session("s1")).await.unwrap();

    let id = store
        .record_interaction("s1", 1_700_000_010, "getUserById definition", Some("bundle-1"))
        .await
        .unwrap();
    store.mark_satisfied(id, true, Some("found it")).await.unwrap();
    store
        .record_interaction("s1", 1_700_000_020, "unjudged query", None)
        .await
        .unwrap();
    store.finish_session("s1", 1_700_000_030).await.unwrap();

    let judged = store.judged_interactions().await.unwrap();
    assert_eq!(judged.len(), 1);
    assert_eq!(judged[0].satisfied, Some(1));
    assert_eq!(judged[0].bundle_id.as_deref(), Some("bundle-1"));
}

#[tokio::test]
async fn test_interaction_requires_session() {
    let store = Store::open_in_memory().unwrap();
    let err = store
        .record_interaction("missing-session", 0, "q", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Constraint);
}

#[tokio::test]
async fn test_job_run_bookkeeping() {
    let store = Store::open_in_memory().unwrap();
    let job = store.job_started("learning-batch", 1_700_000_000).await.unwrap();
    store
        .job_finished(job, JobStatus::Failed, 1_700_000_100, Some("store unavailable"))
        .await
        .unwrap();
    // A second job id is distinct.
    let job2 = store.job_started("learning-batch", 1_700_000_200).await.unwrap();
    assert_ne!(job, job2);
}

#[tokio::test]
async fn test_rerank_cache_roundtrip_and_eviction() {
    let store = Store::open_in_memory().unwrap();
    let row = RerankCacheRow {
        id: "cache-key-1".to_string(),
        provider: "api".to_string(),
        model: "reranker-v1".to_string(),
        query: "auth errors".to_string(),
        created_at: 1_700_000_000,
        result_json: "[\"a\",\"b\"]".to_string(),
    };
    store.rerank_cache_put(row.clone()).await.unwrap();
    let fetched = store.rerank_cache_get("cache-key-1").await.unwrap().unwrap();
    assert_eq!(fetched, row);
    assert!(store.rerank_cache_get("other-key").await.unwrap().is_none());

    let evicted = store.rerank_cache_evict_before(1_700_000_001).await.unwrap();
    assert_eq!(evicted, 1);
    assert!(store.rerank_cache_get("cache-key-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_search_log_append() {
    let store = Store::open_in_memory().unwrap();
    store.log_search("database config", 1_700_000_000, 20).await.unwrap();
    store.log_search("auth handler", 1_700_000_001, 10).await.unwrap();
}

#[tokio::test]
async fn test_packing_profile_roundtrip() {
    let store = Store::open_in_memory().unwrap();
    assert!(store.packing_profile("repo", "gpt-4").await.unwrap().is_none());
    store
        .save_packing_profile("repo", "gpt-4", "{\"capsule\":true}", 1_700_000_000)
        .await
        .unwrap();
    let json = store.packing_profile("repo", "gpt-4").await.unwrap().unwrap();
    assert_eq!(json, "{\"capsule\":true}");
    // Upsert replaces.
    store
        .save_packing_profile("repo", "gpt-4", "{\"capsule\":false}", 1_700_000_100)
        .await
        .unwrap();
    let json = store.packing_profile("repo", "gpt-4").await.unwrap().unwrap();
    assert_eq!(json, "{\"capsule\":false}");
}

#[tokio::test]
async fn test_policy_versions_chain() {
    let store = Store::open_in_memory().unwrap();
    assert!(store.latest_policy_version().await.unwrap().is_none());

    let v1 = store
        .push_policy_version("{\"k\":60}", None, 1_700_000_000)
        .await
        .unwrap();
    let v2 = store
        .push_policy_version("{\"k\":65}", Some(v1), 1_700_000_100)
        .await
        .unwrap();

    let (latest, params, parent) = store.latest_policy_version().await.unwrap().unwrap();
    assert_eq!(latest, v2);
    assert_eq!(params, "{\"k\":65}");
    assert_eq!(parent, Some(v1));
}
