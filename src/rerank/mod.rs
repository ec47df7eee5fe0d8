//! Post-retrieval reranking.
//!
//! Three provider variants: `cross-encoder` (a pluggable scoring model),
//! `api` (remote endpoint) and `rrf` (pure rank fusion, the fallback that
//! can never fail). The determinism contract holds for all of them: equal
//! inputs produce equal orderings, backed by a persistent read-through
//! cache keyed by `sha256(provider|model|query|sorted candidate ids)`.

pub mod api;
pub mod cross_encoder;
pub mod rrf;

pub use api::ApiProvider;
pub use cross_encoder::CrossEncoderProvider;
pub use cross_encoder::CrossEncoderScorer;
pub use rrf::RrfProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RerankConfig;
use crate::error::EngineError;
use crate::error::Result;
use crate::ids;
use crate::store::RerankCacheRow;
use crate::store::Store;

/// Retry schedule for transient provider failures: exponential backoff with
/// 100 ms base, 2 s cap, 3 attempts total.
const RETRY_BASE_MS: u64 = 100;
const RETRY_CAP_MS: u64 = 2_000;
const RETRY_MAX_ATTEMPTS: u32 = 3;

/// One candidate handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerankCandidate {
    pub id: String,
    /// Text scored against the query (chunk content or memory body).
    pub content: String,
}

/// A reranking provider.
///
/// Contract: calling twice with the same `(query, candidates)` must return
/// the same ordering. Providers return the full candidate id set, reordered.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn model(&self) -> &str;
    async fn rerank(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>>;
}

/// Result of the rerank step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerankOutcome {
    /// Candidate ids, best first.
    pub order: Vec<String>,
    /// Provider that produced the ordering.
    pub provider: String,
    /// Whether the ordering came from the persistent cache.
    pub cached: bool,
    /// Error message of the primary provider when a fallback was used.
    pub fell_back: Option<String>,
}

/// Caching, retrying, falling-back rerank front end.
pub struct Reranker {
    primary: Arc<dyn RerankProvider>,
    fallback: Arc<dyn RerankProvider>,
    store: Store,
}

impl Reranker {
    /// Build from config. `scorer` backs the `cross-encoder` provider and is
    /// required only when that provider is selected.
    pub fn from_config(
        config: &RerankConfig,
        store: Store,
        scorer: Option<Arc<dyn CrossEncoderScorer>>,
    ) -> Result<Self> {
        let fallback: Arc<dyn RerankProvider> = Arc::new(RrfProvider::new());
        let primary: Arc<dyn RerankProvider> = match config.provider.as_str() {
            "rrf" => Arc::clone(&fallback),
            "cross-encoder" => {
                let scorer = scorer.ok_or_else(|| EngineError::Config {
                    field: "rerank.provider".to_string(),
                    cause: "cross-encoder selected but no scorer installed".to_string(),
                })?;
                Arc::new(CrossEncoderProvider::new(scorer))
            }
            "api" => {
                let endpoint = config.endpoint.clone().ok_or_else(|| EngineError::Config {
                    field: "rerank.endpoint".to_string(),
                    cause: "required for the api provider".to_string(),
                })?;
                let api_key = std::env::var(&config.api_key_env).ok();
                Arc::new(ApiProvider::new(
                    endpoint,
                    config.model.clone(),
                    api_key,
                    Duration::from_secs(config.timeout_secs),
                ))
            }
            other => {
                return Err(EngineError::Config {
                    field: "rerank.provider".to_string(),
                    cause: format!("unknown provider `{other}`"),
                });
            }
        };
        Ok(Self {
            primary,
            fallback,
            store,
        })
    }

    /// Build directly from providers. Test and embedding-host hook.
    pub fn with_providers(
        primary: Arc<dyn RerankProvider>,
        fallback: Arc<dyn RerankProvider>,
        store: Store,
    ) -> Self {
        Self {
            primary,
            fallback,
            store,
        }
    }

    /// Rerank candidates, consulting the persistent cache first.
    ///
    /// Transient provider errors retry with backoff and then fall through to
    /// the rank-fusion fallback; permanent errors skip retries and fall
    /// through immediately, with the failure noted in the outcome.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
    ) -> Result<RerankOutcome> {
        if candidates.is_empty() {
            return Ok(RerankOutcome {
                order: Vec::new(),
                provider: self.primary.name().to_string(),
                cached: false,
                fell_back: None,
            });
        }

        let ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
        let key = ids::rerank_cache_key(self.primary.name(), self.primary.model(), query, &ids);

        if let Some(row) = self.store.rerank_cache_get(&key).await? {
            if let Ok(order) = serde_json::from_str::<Vec<String>>(&row.result_json) {
                tracing::debug!(key = %key, "Rerank cache hit");
                return Ok(RerankOutcome {
                    order,
                    provider: row.provider,
                    cached: true,
                    fell_back: None,
                });
            }
            tracing::warn!(key = %key, "Unreadable rerank cache row, recomputing");
        }

        match self.call_with_retry(&*self.primary, query, candidates).await {
            Ok(order) => {
                self.cache_result(&key, query, &order).await;
                Ok(RerankOutcome {
                    order,
                    provider: self.primary.name().to_string(),
                    cached: false,
                    fell_back: None,
                })
            }
            Err(err) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    error = %err,
                    "Primary reranker failed, falling back to rank fusion"
                );
                let order = self.fallback.rerank(query, candidates).await?;
                Ok(RerankOutcome {
                    order,
                    provider: self.fallback.name().to_string(),
                    cached: false,
                    fell_back: Some(err.to_string()),
                })
            }
        }
    }

    async fn call_with_retry(
        &self,
        provider: &dyn RerankProvider,
        query: &str,
        candidates: &[RerankCandidate],
    ) -> Result<Vec<String>> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match provider.rerank(query, candidates).await {
                Ok(order) => return Ok(order),
                Err(err) if err.is_transient() && attempt < RETRY_MAX_ATTEMPTS => {
                    let backoff_ms =
                        (RETRY_BASE_MS << (attempt - 1)).min(RETRY_CAP_MS);
                    tracing::debug!(
                        provider = provider.name(),
                        attempt,
                        backoff_ms,
                        "Transient rerank failure, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn cache_result(&self, key: &str, query: &str, order: &[String]) {
        let result_json = match serde_json::to_string(order) {
            Ok(json) => json,
            Err(_) => return,
        };
        let row = RerankCacheRow {
            id: key.to_string(),
            provider: self.primary.name().to_string(),
            model: self.primary.model().to_string(),
            query: query.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            result_json,
        };
        // Cache write failures are never fatal to the rerank itself.
        if let Err(err) = self.store.rerank_cache_put(row).await {
            tracing::warn!(error = %err, "Failed to persist rerank cache row");
        }
    }
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
