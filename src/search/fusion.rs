//! Weighted Reciprocal Rank Fusion across retrieval lanes.
//!
//! `score(doc) = Σ_lane weight_lane / (k + rank_lane(doc) + 1)` with k = 60.
//! Lane weights come from the policy's seed weights multiplied by a
//! confidence factor `0.7 + 0.3 · confidence`, each clamped to [0, 5]. Ties
//! break by rank stability `1 / (1 + variance(ranks))`, then candidate id,
//! so fusion output is a pure function of the lane lists regardless of lane
//! arrival order.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use lru::LruCache;

use crate::query::Intent;
use crate::query::PolicyDecision;
use crate::query::SeedWeights;
use crate::types::Candidate;

/// A retrieval lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lane {
    Vector,
    Bm25,
    Memory,
    Symbol,
    /// Graph expansion; not fused, but appears in evidence.
    Graph,
}

impl Lane {
    pub fn label(&self) -> &'static str {
        match self {
            Lane::Vector => "vector",
            Lane::Bm25 => "bm25",
            Lane::Memory => "memory",
            Lane::Symbol => "symbol",
            Lane::Graph => "graph",
        }
    }
}

/// One fused candidate with its provenance.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub candidate: Candidate,
    /// Accumulated RRF score.
    pub score: f32,
    /// `1 / (1 + variance(ranks))` across contributing lanes.
    pub stability: f32,
    /// `(lane, zero-based rank)` pairs, in fixed lane order.
    pub lanes: Vec<(Lane, usize)>,
}

impl FusedCandidate {
    /// The strongest contributing lane (first in fixed order among those
    /// with the best rank).
    pub fn primary_lane(&self) -> Lane {
        self.lanes
            .iter()
            .min_by_key(|(lane, rank)| (*rank, *lane))
            .map(|(lane, _)| *lane)
            .unwrap_or(Lane::Bm25)
    }
}

/// Scale policy weights by the confidence factor `0.7 + 0.3 · confidence`.
pub fn effective_weights(seed: SeedWeights, confidence: f32) -> SeedWeights {
    seed.scaled(0.7 + 0.3 * confidence.clamp(0.0, 1.0))
}

fn lane_weight(weights: &SeedWeights, lane: Lane) -> f32 {
    match lane {
        Lane::Vector => weights.vector,
        Lane::Bm25 => weights.bm25,
        Lane::Memory => weights.memory,
        Lane::Symbol => weights.symbol,
        Lane::Graph => 0.0,
    }
}

/// Fuse ranked lane lists into one ordered candidate list.
///
/// `early_stop_threshold` and `early_stop_ratio` implement the §4.F early
/// stop: once sorted, if more than `threshold` results exist and the score
/// at position `threshold - 1` falls below `ratio` of the top score, the
/// list truncates to `threshold`.
pub fn fuse(
    lane_lists: &[(Lane, Vec<Candidate>)],
    weights: SeedWeights,
    k: f32,
    early_stop_threshold: usize,
    early_stop_ratio: f32,
) -> Vec<FusedCandidate> {
    fuse_with_report(lane_lists, weights, k, early_stop_threshold, early_stop_ratio).0
}

/// Like [`fuse`], also reporting whether the early stop truncated the list.
pub fn fuse_with_report(
    lane_lists: &[(Lane, Vec<Candidate>)],
    weights: SeedWeights,
    k: f32,
    early_stop_threshold: usize,
    early_stop_ratio: f32,
) -> (Vec<FusedCandidate>, bool) {
    struct Accum {
        candidate: Candidate,
        score: f32,
        lanes: Vec<(Lane, usize)>,
    }

    let mut accum: HashMap<String, Accum> = HashMap::new();

    // Fixed lane iteration order keeps fusion commutative in arrival order.
    let mut ordered: Vec<&(Lane, Vec<Candidate>)> = lane_lists.iter().collect();
    ordered.sort_by_key(|(lane, _)| *lane);

    for (lane, candidates) in ordered {
        let weight = lane_weight(&weights, *lane);
        if weight <= 0.0 {
            continue;
        }
        for (rank, candidate) in candidates.iter().enumerate() {
            let contribution = weight / (k + rank as f32 + 1.0);
            match accum.get_mut(&candidate.id) {
                Some(entry) => {
                    entry.score += contribution;
                    entry.lanes.push((*lane, rank));
                }
                None => {
                    accum.insert(
                        candidate.id.clone(),
                        Accum {
                            candidate: candidate.clone(),
                            score: contribution,
                            lanes: vec![(*lane, rank)],
                        },
                    );
                }
            }
        }
    }

    let mut fused: Vec<FusedCandidate> = accum
        .into_values()
        .map(|a| {
            let stability = rank_stability(&a.lanes);
            FusedCandidate {
                candidate: a.candidate,
                score: a.score,
                stability,
                lanes: a.lanes,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.stability
                    .partial_cmp(&a.stability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });

    // Early stop: a steep score cliff after the threshold position means the
    // tail is noise.
    let mut early_stopped = false;
    if early_stop_threshold > 0 && fused.len() > early_stop_threshold {
        let top = fused[0].score;
        let at_threshold = fused[early_stop_threshold - 1].score;
        if top > 0.0 && at_threshold < early_stop_ratio * top {
            tracing::debug!(
                kept = early_stop_threshold,
                dropped = fused.len() - early_stop_threshold,
                "Early stop truncation"
            );
            fused.truncate(early_stop_threshold);
            early_stopped = true;
        }
    }

    (fused, early_stopped)
}

/// `1 / (1 + variance)` of a candidate's ranks across lanes.
fn rank_stability(lanes: &[(Lane, usize)]) -> f32 {
    if lanes.is_empty() {
        return 0.0;
    }
    let n = lanes.len() as f32;
    let mean = lanes.iter().map(|(_, r)| *r as f32).sum::<f32>() / n;
    let variance = lanes
        .iter()
        .map(|(_, r)| {
            let d = *r as f32 - mean;
            d * d
        })
        .sum::<f32>()
        / n;
    1.0 / (1.0 + variance)
}

// ========== Weight memoization ==========

type MemoKey = (Intent, u8, String);

/// Bounded memo of derived weight vectors.
///
/// Keyed by `(intent, confidence bucket, policy fingerprint)`; entries
/// expire after the configured lifetime so learning-loop adoptions take
/// effect without a restart.
pub struct WeightMemo {
    cache: Mutex<LruCache<MemoKey, (SeedWeights, Instant)>>,
    ttl: Duration,
}

impl WeightMemo {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1"),
            )),
            ttl,
        }
    }

    /// Fetch or derive the effective weights for a classified query.
    pub fn effective(&self, intent: Intent, confidence: f32, policy: &PolicyDecision) -> SeedWeights {
        let bucket = (confidence.clamp(0.0, 1.0) * 10.0).round() as u8;
        let key = (intent, bucket, policy.fingerprint());

        if let Ok(mut cache) = self.cache.lock() {
            if let Some((weights, stamp)) = cache.get(&key) {
                if stamp.elapsed() < self.ttl {
                    return *weights;
                }
            }
        }

        // Bucketed confidence keeps the memo hit rate high while staying
        // within one weight step of the exact factor.
        let weights = effective_weights(policy.seed_weights, bucket as f32 / 10.0);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, (weights, Instant::now()));
        }
        weights
    }
}

#[cfg(test)]
#[path = "fusion.test.rs"]
mod tests;
