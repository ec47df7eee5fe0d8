//! Cross-encoder reranking over a pluggable scoring model.
//!
//! The model runtime itself lives outside this crate; it plugs in through
//! `CrossEncoderScorer`. The provider's job is the ordering contract: score
//! every `(query, content)` pair, stable-sort descending so ties preserve
//! input order.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::RerankCandidate;
use super::RerankProvider;

/// Scoring function over `(query, candidate content)` pairs.
///
/// Implementations must be pure: equal inputs give equal scores.
pub trait CrossEncoderScorer: Send + Sync {
    fn score(&self, query: &str, content: &str) -> f32;
    fn model(&self) -> &str;
}

/// Cross-encoder provider.
pub struct CrossEncoderProvider {
    scorer: Arc<dyn CrossEncoderScorer>,
}

impl CrossEncoderProvider {
    pub fn new(scorer: Arc<dyn CrossEncoderScorer>) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl RerankProvider for CrossEncoderProvider {
    fn name(&self) -> &'static str {
        "cross-encoder"
    }

    fn model(&self) -> &str {
        self.scorer.model()
    }

    async fn rerank(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>> {
        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .enumerate()
            .map(|(idx, c)| (idx, self.scorer.score(query, &c.content)))
            .collect();
        // Stable sort: equal scores keep input order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .map(|(idx, _)| candidates[idx].id.clone())
            .collect())
    }
}

#[cfg(test)]
#[path = "cross_encoder.test.rs"]
mod tests;
