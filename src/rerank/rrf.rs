//! Pure rank-fusion provider.
//!
//! No model, no I/O, cannot fail: the fallback of last resort. Given one
//! candidate list it preserves the upstream (fusion) ordering; given
//! several lists, `fuse_lists` combines them with unweighted RRF.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

use super::RerankCandidate;
use super::RerankProvider;

/// Rank-fusion provider.
pub struct RrfProvider {
    k: f32,
}

impl RrfProvider {
    pub fn new() -> Self {
        Self { k: 60.0 }
    }

    pub fn with_k(k: f32) -> Self {
        Self { k }
    }

    /// Unweighted RRF over several ranked id lists.
    pub fn fuse_lists(&self, lists: &[Vec<String>]) -> Vec<String> {
        let mut scores: HashMap<String, f32> = HashMap::new();
        for list in lists {
            for (rank, id) in list.iter().enumerate() {
                *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (self.k + rank as f32 + 1.0);
            }
        }
        let mut fused: Vec<(String, f32)> = scores.into_iter().collect();
        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        fused.into_iter().map(|(id, _)| id).collect()
    }
}

impl Default for RrfProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RerankProvider for RrfProvider {
    fn name(&self) -> &'static str {
        "rrf"
    }

    fn model(&self) -> &str {
        "rank-fusion"
    }

    async fn rerank(&self, _query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>> {
        // The input arrives already fused best-first; rank fusion of one
        // list is the identity.
        Ok(candidates.iter().map(|c| c.id.clone()).collect())
    }
}

#[cfg(test)]
#[path = "rrf.test.rs"]
mod tests;
