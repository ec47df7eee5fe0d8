//! Policy derivation: `(intent, context) -> PolicyDecision`.
//!
//! Pure function over its inputs. Base policies come from a fixed per-intent
//! table; the context (classifier confidence, query length, token budget)
//! adjusts depth and early-stop bounds; per-repo overrides and per-language
//! multipliers apply last and may override any field.

use serde::Deserialize;
use serde::Serialize;

use crate::config::glob_match;
use crate::config::LaneMultipliers;
use crate::config::PolicyOverrides;

use super::intent::Intent;

/// Per-lane seed weights consumed by the fusion step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedWeights {
    pub vector: f32,
    pub bm25: f32,
    pub memory: f32,
    pub symbol: f32,
}

impl SeedWeights {
    pub const fn new(vector: f32, bm25: f32, memory: f32, symbol: f32) -> Self {
        Self {
            vector,
            bm25,
            memory,
            symbol,
        }
    }

    /// Multiply every lane by `factor`, clamping each to [0, 5].
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            vector: clamp_weight(self.vector * factor),
            bm25: clamp_weight(self.bm25 * factor),
            memory: clamp_weight(self.memory * factor),
            symbol: clamp_weight(self.symbol * factor),
        }
    }

    /// Lane-wise multiplication (language multipliers), clamped to [0, 5].
    pub fn multiplied(self, m: &LaneMultipliers) -> Self {
        Self {
            vector: clamp_weight(self.vector * m.vector),
            bm25: clamp_weight(self.bm25 * m.bm25),
            memory: clamp_weight(self.memory * m.memory),
            symbol: clamp_weight(self.symbol * m.symbol),
        }
    }
}

fn clamp_weight(w: f32) -> f32 {
    w.clamp(0.0, 5.0)
}

/// What the retrieval pipeline is allowed to do for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Graph traversal depth cap.
    pub max_depth: u8,
    pub include_symbols: bool,
    pub include_files: bool,
    /// May be forced off by a small budget; items then pack as capsules.
    pub include_content: bool,
    /// Result count after which early stopping is considered.
    pub early_stop_threshold: u8,
    pub seed_weights: SeedWeights,
}

impl PolicyDecision {
    /// Base policy for an intent. The table is part of the external
    /// contract and is exercised verbatim by tests.
    pub fn base(intent: Intent) -> Self {
        let (max_depth, early_stop_threshold, seed_weights) = match intent {
            Intent::Symbol => (2, 3, SeedWeights::new(1.2, 0.8, 1.0, 2.0)),
            Intent::Config => (1, 2, SeedWeights::new(0.8, 1.5, 1.2, 0.5)),
            Intent::Api => (2, 2, SeedWeights::new(1.0, 1.0, 1.3, 1.2)),
            Intent::Incident => (3, 5, SeedWeights::new(1.3, 1.1, 1.8, 1.5)),
            Intent::Search => (2, 10, SeedWeights::new(1.0, 1.0, 1.0, 1.0)),
        };
        Self {
            max_depth,
            include_symbols: true,
            include_files: true,
            include_content: true,
            early_stop_threshold,
            seed_weights,
        }
    }

    /// Stable fingerprint for memoization and bundle signatures.
    pub fn fingerprint(&self) -> String {
        format!(
            "d{}e{}s{}f{}c{}w{:.3}:{:.3}:{:.3}:{:.3}",
            self.max_depth,
            self.early_stop_threshold,
            self.include_symbols as u8,
            self.include_files as u8,
            self.include_content as u8,
            self.seed_weights.vector,
            self.seed_weights.bm25,
            self.seed_weights.memory,
            self.seed_weights.symbol,
        )
    }
}

/// Context fed into policy derivation.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub confidence: f32,
    /// Query length in characters.
    pub query_length: usize,
    /// Caller token budget for the bundle.
    pub token_budget: u32,
    pub repo: Option<String>,
    pub language: Option<String>,
}

/// Derive the effective policy.
pub fn derive(intent: Intent, ctx: &PolicyContext, overrides: &PolicyOverrides) -> PolicyDecision {
    let base = PolicyDecision::base(intent);
    let mut policy = base.clone();

    // Confidence band adjustments.
    if ctx.confidence < 0.5 {
        policy.max_depth = base.max_depth.saturating_sub(1).max(1);
        policy.early_stop_threshold = base.early_stop_threshold.saturating_sub(1).max(1);
    } else if ctx.confidence > 0.8 {
        policy.max_depth = (base.max_depth + 1).min(4);
        policy.early_stop_threshold = base.early_stop_threshold.saturating_add(1);
    }

    // Very short queries broaden the search.
    if ctx.query_length < 10 {
        policy.max_depth = policy.max_depth.max(2);
    }

    // Small budgets cannot afford full content.
    if ctx.token_budget < 2_000 {
        policy.include_content = false;
        policy.early_stop_threshold = policy.early_stop_threshold.saturating_sub(1).max(1);
    }

    // Per-repo overrides, in declaration order (later entries win).
    if let Some(repo) = ctx.repo.as_deref() {
        for over in &overrides.repos {
            if !glob_match(&over.pattern, repo) {
                continue;
            }
            if let Some(depth) = over.max_depth {
                policy.max_depth = depth.min(4);
            }
            if let Some(early) = over.early_stop_threshold {
                policy.early_stop_threshold = early.max(1);
            }
            if let Some(content) = over.include_content {
                policy.include_content = content;
            }
            if let Some(w) = over.seed_weights {
                policy.seed_weights = policy.seed_weights.multiplied(&w);
            }
        }
    }

    // Language multipliers apply last; multiplication is the canonical
    // combination rule.
    if let Some(language) = ctx.language.as_deref() {
        if let Some(m) = overrides.language_multipliers.get(language) {
            policy.seed_weights = policy.seed_weights.multiplied(m);
        }
    }

    policy
}

#[cfg(test)]
#[path = "policy.test.rs"]
mod tests;
