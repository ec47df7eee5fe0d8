//! Namespaced read-through caches.
//!
//! Four namespaces (search, bundle, rerank, index), each with its own TTL
//! and entry cap, guarded by per-namespace locks. Keys follow
//! `v{version}:{namespace}:{sha256(payload)}` so a version bump invalidates
//! everything at once. Concurrent computations of the same missing key are
//! coalesced: exactly one origin call runs, every waiter receives its
//! result.

use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::sync::OnceCell;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::ids;

/// Cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Search,
    Bundle,
    Rerank,
    Index,
}

impl Namespace {
    pub fn label(&self) -> &'static str {
        match self {
            Namespace::Search => "search",
            Namespace::Bundle => "bundle",
            Namespace::Rerank => "rerank",
            Namespace::Index => "index",
        }
    }

    fn all() -> [Namespace; 4] {
        [
            Namespace::Search,
            Namespace::Bundle,
            Namespace::Rerank,
            Namespace::Index,
        ]
    }
}

type Value = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: Value,
    inserted: Instant,
}

struct Space {
    ttl: Duration,
    entries: Mutex<LruCache<String, Entry>>,
    /// In-flight computations for missing keys, for coalescing.
    inflight: Mutex<HashMap<String, Arc<OnceCell<Value>>>>,
}

impl Space {
    fn new(ttl: Duration, max_entries: usize) -> Self {
        let entries = match NonZeroUsize::new(max_entries) {
            Some(cap) => LruCache::new(cap),
            // 0 = unbounded (the rerank namespace).
            None => LruCache::unbounded(),
        };
        Self {
            ttl,
            entries: Mutex::new(entries),
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

/// The namespaced cache manager.
pub struct CacheManager {
    version: u32,
    spaces: HashMap<Namespace, Space>,
}

impl CacheManager {
    pub fn new(config: &CacheConfig) -> Self {
        let mut spaces = HashMap::new();
        spaces.insert(
            Namespace::Search,
            Space::new(
                Duration::from_secs(config.search_ttl_secs),
                config.search_max_entries,
            ),
        );
        spaces.insert(
            Namespace::Bundle,
            Space::new(
                Duration::from_secs(config.bundle_ttl_secs),
                config.bundle_max_entries,
            ),
        );
        spaces.insert(
            Namespace::Rerank,
            Space::new(Duration::from_secs(config.rerank_ttl_secs), 0),
        );
        spaces.insert(
            Namespace::Index,
            Space::new(
                Duration::from_secs(config.index_ttl_secs),
                config.index_max_entries,
            ),
        );
        Self {
            version: config.version,
            spaces,
        }
    }

    /// Build a versioned key from an arbitrary payload.
    pub fn key(&self, namespace: Namespace, payload: &str) -> String {
        format!(
            "v{}:{}:{}",
            self.version,
            namespace.label(),
            ids::sha256_hex(payload.as_bytes())
        )
    }

    /// Fetch a cached value if present and unexpired.
    pub async fn get<T>(&self, namespace: Namespace, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let space = &self.spaces[&namespace];
        let mut entries = space.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < space.ttl => {
                entry.value.downcast_ref::<T>().cloned()
            }
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value unconditionally. Last write wins.
    pub async fn insert<T>(&self, namespace: Namespace, key: &str, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let space = &self.spaces[&namespace];
        let mut entries = space.entries.lock().await;
        entries.put(
            key.to_string(),
            Entry {
                value: Arc::new(value),
                inserted: Instant::now(),
            },
        );
    }

    /// Read-through lookup with single-flight coalescing.
    ///
    /// Returns the cached value when unexpired; otherwise calls `f`, stores
    /// the result and returns it. While one computation is in flight, other
    /// callers of the same key await it instead of invoking their own `f`.
    /// Origin errors are never cached.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        namespace: Namespace,
        key: &str,
        f: F,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get::<T>(namespace, key).await {
            tracing::trace!(namespace = namespace.label(), key, "Cache hit");
            return Ok(hit);
        }

        let space = &self.spaces[&namespace];
        let cell = {
            let mut inflight = space.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let result = cell
            .get_or_try_init(|| async {
                let value = f().await?;
                Ok::<Value, crate::error::EngineError>(Arc::new(value) as Value)
            })
            .await;

        // Whoever finishes clears the in-flight slot; the cell's value (if
        // any) has already been shared with all waiters.
        {
            let mut inflight = space.inflight.lock().await;
            inflight.remove(key);
        }

        match result {
            Ok(value) => {
                let typed = value
                    .downcast_ref::<T>()
                    .cloned()
                    .expect("in-flight cell holds the type its key was computed with");
                self.insert(namespace, key, typed.clone()).await;
                Ok(typed)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove entries whose key matches the predicate. Returns the count.
    pub async fn clear<P>(&self, namespace: Namespace, predicate: P) -> usize
    where
        P: Fn(&str) -> bool,
    {
        let space = &self.spaces[&namespace];
        let mut entries = space.entries.lock().await;
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Drop every entry in every namespace.
    pub async fn clear_all(&self) {
        for namespace in Namespace::all() {
            let space = &self.spaces[&namespace];
            space.entries.lock().await.clear();
        }
    }

    /// Entry count for one namespace.
    pub async fn len(&self, namespace: Namespace) -> usize {
        self.spaces[&namespace].entries.lock().await.len()
    }
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
