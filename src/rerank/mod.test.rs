use super::*;

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::store::Store;

fn candidates(ids: &[&str]) -> Vec<RerankCandidate> {
    ids.iter()
        .map(|id| RerankCandidate {
            id: id.to_string(),
            content: format!("content of {id}"),
        })
        .collect()
}

/// Provider that reverses the input and counts invocations.
struct ReversingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl RerankProvider for ReversingProvider {
    fn name(&self) -> &'static str {
        "cross-encoder"
    }
    fn model(&self) -> &str {
        "reversing-test-model"
    }
    async fn rerank(&self, _query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(candidates.iter().rev().map(|c| c.id.clone()).collect())
    }
}

/// Provider that always fails with the given error kind.
struct FailingProvider {
    transient: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl RerankProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "api"
    }
    fn model(&self) -> &str {
        "failing-test-model"
    }
    async fn rerank(&self, _query: &str, _candidates: &[RerankCandidate]) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.transient {
            Err(EngineError::ProviderTransient {
                provider: "api".to_string(),
                cause: "503".to_string(),
            })
        } else {
            Err(EngineError::ProviderPermanent {
                provider: "api".to_string(),
                cause: "401".to_string(),
            })
        }
    }
}

#[tokio::test]
async fn test_rerank_and_cache_roundtrip() {
    let store = Store::open_in_memory().unwrap();
    let primary = Arc::new(ReversingProvider {
        calls: AtomicUsize::new(0),
    });
    let reranker =
        Reranker::with_providers(primary.clone(), Arc::new(RrfProvider::new()), store);

    let cands = candidates(&["a", "b", "c"]);
    let first = reranker.rerank("query", &cands).await.unwrap();
    assert_eq!(first.order, vec!["c", "b", "a"]);
    assert!(!first.cached);
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);

    // Second call: identical ordering, served from cache, origin not hit.
    let second = reranker.rerank("query", &cands).await.unwrap();
    assert_eq!(second.order, first.order);
    assert!(second.cached);
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_key_ignores_candidate_order() {
    let store = Store::open_in_memory().unwrap();
    let primary = Arc::new(ReversingProvider {
        calls: AtomicUsize::new(0),
    });
    let reranker =
        Reranker::with_providers(primary.clone(), Arc::new(RrfProvider::new()), store);

    let forward = candidates(&["a", "b", "c"]);
    let shuffled = candidates(&["c", "a", "b"]);
    let first = reranker.rerank("query", &forward).await.unwrap();
    let second = reranker.rerank("query", &shuffled).await.unwrap();
    // Same id set + query: the second call is a cache hit and returns the
    // cached ordering verbatim.
    assert!(second.cached);
    assert_eq!(second.order, first.order);
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_different_query_misses_cache() {
    let store = Store::open_in_memory().unwrap();
    let primary = Arc::new(ReversingProvider {
        calls: AtomicUsize::new(0),
    });
    let reranker =
        Reranker::with_providers(primary.clone(), Arc::new(RrfProvider::new()), store);

    let cands = candidates(&["a", "b"]);
    reranker.rerank("query one", &cands).await.unwrap();
    let second = reranker.rerank("query two", &cands).await.unwrap();
    assert!(!second.cached);
    assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transient_failure_retries_then_falls_back() {
    let store = Store::open_in_memory().unwrap();
    let primary = Arc::new(FailingProvider {
        transient: true,
        calls: AtomicUsize::new(0),
    });
    let reranker =
        Reranker::with_providers(primary.clone(), Arc::new(RrfProvider::new()), store);

    let cands = candidates(&["a", "b"]);
    let outcome = reranker.rerank("query", &cands).await.unwrap();
    // Fallback preserves input order and notes the failure.
    assert_eq!(outcome.order, vec!["a", "b"]);
    assert_eq!(outcome.provider, "rrf");
    assert!(outcome.fell_back.is_some());
    // Three attempts before giving up.
    assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_permanent_failure_skips_retries() {
    let store = Store::open_in_memory().unwrap();
    let primary = Arc::new(FailingProvider {
        transient: false,
        calls: AtomicUsize::new(0),
    });
    let reranker =
        Reranker::with_providers(primary.clone(), Arc::new(RrfProvider::new()), store);

    let cands = candidates(&["a", "b"]);
    let outcome = reranker.rerank("query", &cands).await.unwrap();
    assert_eq!(outcome.provider, "rrf");
    assert!(outcome.fell_back.is_some());
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_candidates_short_circuit() {
    let store = Store::open_in_memory().unwrap();
    let primary = Arc::new(ReversingProvider {
        calls: AtomicUsize::new(0),
    });
    let reranker =
        Reranker::with_providers(primary.clone(), Arc::new(RrfProvider::new()), store);

    let outcome = reranker.rerank("query", &[]).await.unwrap();
    assert!(outcome.order.is_empty());
    assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_from_config_rejects_missing_scorer() {
    let store = Store::open_in_memory().unwrap();
    let config = RerankConfig {
        provider: "cross-encoder".to_string(),
        ..Default::default()
    };
    assert!(Reranker::from_config(&config, store, None).is_err());
}

#[test]
fn test_from_config_rrf_default() {
    let store = Store::open_in_memory().unwrap();
    let config = RerankConfig::default();
    assert!(Reranker::from_config(&config, store, None).is_ok());
}
