use super::*;

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::config::CacheConfig;
use crate::error::EngineError;

fn manager() -> CacheManager {
    CacheManager::new(&CacheConfig::default())
}

#[test]
fn test_key_schema() {
    let cache = manager();
    let key = cache.key(Namespace::Search, "payload");
    assert!(key.starts_with("v1:search:"));
    // sha256 hex suffix
    assert_eq!(key.len(), "v1:search:".len() + 64);
    // Same payload, same key; different payload, different key.
    assert_eq!(key, cache.key(Namespace::Search, "payload"));
    assert_ne!(key, cache.key(Namespace::Search, "other"));
    assert_ne!(key, cache.key(Namespace::Bundle, "payload"));
}

#[test]
fn test_version_bump_changes_keys() {
    let v1 = manager();
    let v2 = CacheManager::new(&CacheConfig {
        version: 2,
        ..Default::default()
    });
    assert_ne!(
        v1.key(Namespace::Search, "x"),
        v2.key(Namespace::Search, "x")
    );
}

#[tokio::test]
async fn test_get_or_compute_caches() {
    let cache = manager();
    let calls = AtomicUsize::new(0);

    let compute = || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, EngineError>(42u32)
    };
    let key = cache.key(Namespace::Search, "q");
    let first = cache
        .get_or_compute(Namespace::Search, &key, compute)
        .await
        .unwrap();
    assert_eq!(first, 42);

    // Within TTL: origin not re-invoked.
    let second = cache
        .get_or_compute(Namespace::Search, &key, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, EngineError>(99u32)
        })
        .await
        .unwrap();
    assert_eq!(second, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ttl_expiry_recomputes() {
    let cache = CacheManager::new(&CacheConfig {
        search_ttl_secs: 0, // everything expires immediately
        ..Default::default()
    });
    let key = cache.key(Namespace::Search, "q");
    let first = cache
        .get_or_compute(Namespace::Search, &key, || async {
            Ok::<_, EngineError>(1u32)
        })
        .await
        .unwrap();
    let second = cache
        .get_or_compute(Namespace::Search, &key, || async {
            Ok::<_, EngineError>(2u32)
        })
        .await
        .unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[tokio::test]
async fn test_errors_not_cached() {
    let cache = manager();
    let key = cache.key(Namespace::Index, "q");
    let err = cache
        .get_or_compute(Namespace::Index, &key, || async {
            Err::<u32, _>(EngineError::Cache {
                namespace: "index".to_string(),
                cause: "boom".to_string(),
            })
        })
        .await;
    assert!(err.is_err());

    // A later call may succeed and is cached normally.
    let ok = cache
        .get_or_compute(Namespace::Index, &key, || async {
            Ok::<_, EngineError>(7u32)
        })
        .await
        .unwrap();
    assert_eq!(ok, 7);
    assert_eq!(cache.get::<u32>(Namespace::Index, &key).await, Some(7));
}

#[tokio::test]
async fn test_concurrent_misses_coalesce() {
    let cache = Arc::new(manager());
    let calls = Arc::new(AtomicUsize::new(0));
    let key = cache.key(Namespace::Bundle, "shared");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        let calls = Arc::clone(&calls);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute(Namespace::Bundle, &key, || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Hold the computation open so the other tasks pile up.
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        Ok::<_, EngineError>("computed".to_string())
                    }
                })
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), "computed");
    }
    // Exactly one origin invocation despite 16 concurrent misses.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lru_eviction_respects_cap() {
    let cache = CacheManager::new(&CacheConfig {
        index_max_entries: 2,
        ..Default::default()
    });
    for i in 0..5 {
        let key = cache.key(Namespace::Index, &format!("k{i}"));
        cache.insert(Namespace::Index, &key, i).await;
    }
    assert_eq!(cache.len(Namespace::Index).await, 2);
    // Most recent entries survive.
    let k4 = cache.key(Namespace::Index, "k4");
    assert_eq!(cache.get::<i32>(Namespace::Index, &k4).await, Some(4));
}

#[tokio::test]
async fn test_rerank_namespace_unbounded() {
    let cache = manager();
    for i in 0..2_000 {
        let key = cache.key(Namespace::Rerank, &format!("k{i}"));
        cache.insert(Namespace::Rerank, &key, i).await;
    }
    assert_eq!(cache.len(Namespace::Rerank).await, 2_000);
}

#[tokio::test]
async fn test_clear_with_predicate() {
    let cache = manager();
    let keep = cache.key(Namespace::Search, "keep");
    let drop1 = cache.key(Namespace::Search, "drop-1");
    let drop2 = cache.key(Namespace::Search, "drop-2");
    cache.insert(Namespace::Search, &keep, 1).await;
    cache.insert(Namespace::Search, &drop1, 2).await;
    cache.insert(Namespace::Search, &drop2, 3).await;

    let doomed = [drop1.clone(), drop2.clone()];
    let removed = cache
        .clear(Namespace::Search, |key| doomed.contains(&key.to_string()))
        .await;
    assert_eq!(removed, 2);
    assert_eq!(cache.get::<i32>(Namespace::Search, &keep).await, Some(1));
    assert_eq!(cache.get::<i32>(Namespace::Search, &drop1).await, None);
}

#[tokio::test]
async fn test_clear_all() {
    let cache = manager();
    let key = cache.key(Namespace::Search, "x");
    cache.insert(Namespace::Search, &key, 1).await;
    cache.insert(Namespace::Bundle, &key, 2).await;
    cache.clear_all().await;
    assert_eq!(cache.len(Namespace::Search).await, 0);
    assert_eq!(cache.len(Namespace::Bundle).await, 0);
}

#[tokio::test]
async fn test_last_write_wins() {
    let cache = manager();
    let key = cache.key(Namespace::Search, "x");
    cache.insert(Namespace::Search, &key, 1).await;
    cache.insert(Namespace::Search, &key, 2).await;
    assert_eq!(cache.get::<i32>(Namespace::Search, &key).await, Some(2));
}
