use super::*;

use crate::types::MemoryKind;
use crate::types::MemoryRecord;
use crate::types::MemoryScope;

fn make_memory(kind: MemoryKind, value: &str, weight: f64) -> MemoryRecord {
    let mut memory = MemoryRecord::new(
        MemoryScope::Repo,
        Some("repo".to_string()),
        kind,
        None,
        value,
        1_700_000_000,
    );
    memory.weight = weight;
    memory
}

#[tokio::test]
async fn test_put_get_roundtrip() {
    let store = Store::open_in_memory().unwrap();
    let mut memory = make_memory(MemoryKind::Gotcha, "The auth tests need a live database.", 1.0);
    memory.source_json = serde_json::json!({"files": ["src/auth.rs"]});
    store.put_memory(memory.clone()).await.unwrap();

    let fetched = store.memory(&memory.id).await.unwrap().unwrap();
    assert_eq!(fetched, memory);
}

#[tokio::test]
async fn test_search_orders_by_score_then_weight() {
    let store = Store::open_in_memory().unwrap();
    let weak = make_memory(MemoryKind::Fact, "database pooling notes", 0.5);
    let strong = make_memory(MemoryKind::Fact, "database connection pooling details", 2.0);
    store.put_memory(weak.clone()).await.unwrap();
    store.put_memory(strong.clone()).await.unwrap();

    let results = store
        .search_memories(
            vec!["database".to_string(), "connection".to_string()],
            MemoryFilter::default(),
            1_700_000_001,
            10,
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0.id, strong.id);
    assert!(results[0].1 > results[1].1);
}

#[tokio::test]
async fn test_expired_excluded_by_default() {
    let store = Store::open_in_memory().unwrap();
    let mut expired = make_memory(MemoryKind::Plan, "migrate the database schema", 1.0);
    expired.expires_at = Some(1_700_000_000);
    store.put_memory(expired.clone()).await.unwrap();

    let now = 1_700_000_100;
    let results = store
        .search_memories(
            vec!["database".to_string()],
            MemoryFilter::default(),
            now,
            10,
        )
        .await
        .unwrap();
    assert!(results.is_empty());

    let with_expired = store
        .search_memories(
            vec!["database".to_string()],
            MemoryFilter {
                include_expired: true,
                ..Default::default()
            },
            now,
            10,
        )
        .await
        .unwrap();
    assert_eq!(with_expired.len(), 1);
}

#[tokio::test]
async fn test_scope_and_repo_filters() {
    let store = Store::open_in_memory().unwrap();
    let repo_mem = make_memory(MemoryKind::Fact, "repo scoped note", 1.0);
    let global_mem = MemoryRecord::new(
        MemoryScope::Global,
        None,
        MemoryKind::Rule,
        None,
        "global scoped note",
        1_700_000_000,
    );
    store.put_memory(repo_mem).await.unwrap();
    store.put_memory(global_mem).await.unwrap();

    // Repo filter still admits global-scope memories.
    let results = store
        .search_memories(
            vec!["note".to_string()],
            MemoryFilter {
                repo: Some("repo".to_string()),
                ..Default::default()
            },
            1_700_000_001,
            10,
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 2);

    // Scope filter narrows to one.
    let global_only = store
        .search_memories(
            vec!["note".to_string()],
            MemoryFilter {
                scope: Some(MemoryScope::Global),
                ..Default::default()
            },
            1_700_000_001,
            10,
        )
        .await
        .unwrap();
    assert_eq!(global_only.len(), 1);
    assert_eq!(global_only[0].0.scope, MemoryScope::Global);
}

#[tokio::test]
async fn test_key_hits_outscore_body_hits() {
    let store = Store::open_in_memory().unwrap();
    let mut keyed = make_memory(MemoryKind::NameAlias, "see the service module", 1.0);
    keyed.key = Some("auth".to_string());
    let body_only = make_memory(MemoryKind::Fact, "auth is handled in middleware", 1.0);
    store.put_memory(keyed.clone()).await.unwrap();
    store.put_memory(body_only).await.unwrap();

    let results = store
        .search_memories(
            vec!["auth".to_string()],
            MemoryFilter::default(),
            1_700_000_001,
            10,
        )
        .await
        .unwrap();
    assert_eq!(results[0].0.id, keyed.id);
}

#[tokio::test]
async fn test_links_roundtrip_and_cascade() {
    let store = Store::open_in_memory().unwrap();
    let a = make_memory(MemoryKind::Fact, "first", 1.0);
    let b = make_memory(MemoryKind::Fact, "second", 1.0);
    store.put_memory(a.clone()).await.unwrap();
    store.put_memory(b.clone()).await.unwrap();
    store
        .link_memories(MemoryLink {
            src: a.id.clone(),
            dst: b.id.clone(),
            kind: "refines".to_string(),
            score: 0.8,
        })
        .await
        .unwrap();

    let links = store.links_from(&a.id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].dst, b.id);

    // Deleting the target memory cascades the link away.
    assert!(store.delete_memory(&b.id).await.unwrap());
    assert!(store.links_from(&a.id).await.unwrap().is_empty());
}
