//! The learning loop: interaction outcomes tune retrieval parameters.
//!
//! Each batch consumes judged interactions, computes win rates grouped by
//! intent, and proposes bounded adjustments to the per-intent seed weights,
//! the early-stop thresholds and the RRF constant. Adoption is
//! transactional: a proposal becomes a new policy version with a rollback
//! pointer to its predecessor, or nothing changes at all.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::query::Intent;
use crate::query::IntentClassifier;
use crate::query::PolicyDecision;
use crate::query::SeedWeights;
use crate::store::JobStatus;
use crate::store::Store;
use crate::types::InteractionRecord;

/// Gradient step size.
const ETA: f32 = 0.05;
/// Seed-weight bounds.
const WEIGHT_MIN: f32 = 0.0;
const WEIGHT_MAX: f32 = 5.0;
/// RRF k bounds and step.
const RRF_K_MIN: f32 = 30.0;
const RRF_K_MAX: f32 = 120.0;
const RRF_K_STEP: f32 = 5.0;
/// Convergence: ‖Δ‖₂ below this, or this many adopted versions.
const CONVERGENCE_EPSILON: f32 = 1e-3;
const MAX_STEPS: i64 = 50;

/// The tunable parameter set, persisted as one policy version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedParams {
    /// Per-intent seed weights, keyed by intent label.
    pub seed_weights: BTreeMap<String, SeedWeights>,
    /// Per-intent early-stop thresholds.
    pub early_stop: BTreeMap<String, u8>,
    /// RRF constant.
    pub rrf_k: f32,
}

impl Default for LearnedParams {
    fn default() -> Self {
        let mut seed_weights = BTreeMap::new();
        let mut early_stop = BTreeMap::new();
        for intent in [
            Intent::Symbol,
            Intent::Config,
            Intent::Api,
            Intent::Incident,
            Intent::Search,
        ] {
            let base = PolicyDecision::base(intent);
            seed_weights.insert(intent.label().to_string(), base.seed_weights);
            early_stop.insert(intent.label().to_string(), base.early_stop_threshold);
        }
        Self {
            seed_weights,
            early_stop,
            rrf_k: 60.0,
        }
    }
}

/// One proposed parameter change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub field: String,
    pub old: f32,
    pub new: f32,
}

/// A batch proposal: old and new parameters plus the individual deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub old: LearnedParams,
    pub new: LearnedParams,
    pub deltas: Vec<Delta>,
    /// L2 norm of the delta vector.
    pub l2_norm: f32,
    /// Number of judged interactions consumed.
    pub interactions: usize,
}

impl Proposal {
    pub fn converged(&self) -> bool {
        self.l2_norm < CONVERGENCE_EPSILON
    }
}

/// Per-intent outcome signals.
#[derive(Debug, Clone, Default)]
struct IntentSignal {
    satisfied: usize,
    total: usize,
}

impl IntentSignal {
    fn win_rate(&self) -> f32 {
        if self.total == 0 {
            0.5
        } else {
            self.satisfied as f32 / self.total as f32
        }
    }
}

/// The learning loop driver.
pub struct LearningLoop {
    store: Store,
    classifier: IntentClassifier,
}

impl LearningLoop {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            classifier: IntentClassifier::new(),
        }
    }

    /// Load the currently adopted parameters, or the defaults.
    pub async fn current_params(&self) -> Result<LearnedParams> {
        match self.store.latest_policy_version().await? {
            Some((_, json, _)) => Ok(serde_json::from_str(&json).unwrap_or_default()),
            None => Ok(LearnedParams::default()),
        }
    }

    /// Whether the loop has converged: the last proposal's norm fell under
    /// epsilon, or the step budget is spent.
    pub async fn step_count(&self) -> Result<i64> {
        match self.store.latest_policy_version().await? {
            Some((id, _, _)) => Ok(id),
            None => Ok(0),
        }
    }

    /// Run one batch: compute signals, build a proposal. Does not adopt.
    ///
    /// Returns `None` when there are no judged interactions or the step
    /// budget is exhausted. Batch errors abort without partial writes.
    pub async fn run_batch(&self, now: i64) -> Result<Option<Proposal>> {
        let job = self.store.job_started("learning-batch", now).await?;
        match self.run_batch_inner().await {
            Ok(proposal) => {
                self.store
                    .job_finished(job, JobStatus::Succeeded, now, None)
                    .await?;
                Ok(proposal)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Learning batch aborted");
                self.store
                    .job_finished(job, JobStatus::Failed, now, Some(&err.to_string()))
                    .await?;
                Err(err)
            }
        }
    }

    async fn run_batch_inner(&self) -> Result<Option<Proposal>> {
        if self.step_count().await? >= MAX_STEPS {
            tracing::info!("Learning loop step budget spent, holding parameters");
            return Ok(None);
        }

        let interactions = self.store.judged_interactions().await?;
        if interactions.is_empty() {
            return Ok(None);
        }

        let old = self.current_params().await?;
        let signals = self.compute_signals(&interactions);
        let new = adjust(&old, &signals, &self.observed_thresholds(&interactions));
        let deltas = diff(&old, &new);
        let l2_norm = deltas.iter().map(|d| (d.new - d.old).powi(2)).sum::<f32>().sqrt();

        tracing::info!(
            interactions = interactions.len(),
            deltas = deltas.len(),
            l2_norm,
            "Learning batch computed"
        );

        Ok(Some(Proposal {
            old,
            new,
            deltas,
            l2_norm,
            interactions: interactions.len(),
        }))
    }

    /// Adopt a proposal as a new policy version. Transactional: the version
    /// row either lands with its rollback pointer or not at all.
    pub async fn adopt(&self, proposal: &Proposal, now: i64) -> Result<i64> {
        let parent = self
            .store
            .latest_policy_version()
            .await?
            .map(|(id, _, _)| id);
        let json = serde_json::to_string(&proposal.new)
            .map_err(|e| crate::error::EngineError::store_io("serialize params", e))?;
        let version = self.store.push_policy_version(&json, parent, now).await?;
        tracing::info!(version, parent = ?parent, "Adopted learning proposal");
        Ok(version)
    }

    /// Roll back to the previous policy version, if any. The rollback lands
    /// as a new head version re-stating the predecessor's parameters, so
    /// history stays append-only.
    pub async fn rollback(&self, now: i64) -> Result<Option<i64>> {
        let Some((current, _, Some(parent))) = self.store.latest_policy_version().await? else {
            return Ok(None);
        };
        let Some((_, parent_json, _)) = self.store.policy_version_by_id(parent).await? else {
            return Ok(None);
        };
        let version = self
            .store
            .push_policy_version(&parent_json, Some(current), now)
            .await?;
        tracing::info!(version, restored = parent, "Rolled back policy parameters");
        Ok(Some(version))
    }

    /// Win rates grouped by intent (the query is re-classified; language
    /// and repo grouping collapse into the intent group when absent).
    fn compute_signals(&self, interactions: &[InteractionRecord]) -> BTreeMap<String, IntentSignal> {
        let mut signals: BTreeMap<String, IntentSignal> = BTreeMap::new();
        for interaction in interactions {
            let intent = self.classifier.classify(&interaction.query).intent;
            let signal = signals.entry(intent.label().to_string()).or_default();
            signal.total += 1;
            if interaction.satisfied == Some(1) {
                signal.satisfied += 1;
            }
        }
        signals
    }

    /// Median policy threshold among satisfied interactions, per intent.
    fn observed_thresholds(&self, interactions: &[InteractionRecord]) -> BTreeMap<String, u8> {
        let mut per_intent: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for interaction in interactions {
            if interaction.satisfied != Some(1) {
                continue;
            }
            let classification = self.classifier.classify(&interaction.query);
            let base = PolicyDecision::base(classification.intent);
            per_intent
                .entry(classification.intent.label().to_string())
                .or_default()
                .push(base.early_stop_threshold);
        }
        per_intent
            .into_iter()
            .map(|(intent, mut thresholds)| {
                thresholds.sort_unstable();
                let median = thresholds[thresholds.len() / 2];
                (intent, median)
            })
            .collect()
    }
}

/// Apply the bounded adjustment rules.
fn adjust(
    old: &LearnedParams,
    signals: &BTreeMap<String, IntentSignal>,
    medians: &BTreeMap<String, u8>,
) -> LearnedParams {
    let mut new = old.clone();

    let mut total_satisfied = 0usize;
    let mut total = 0usize;
    for (intent, signal) in signals {
        total_satisfied += signal.satisfied;
        total += signal.total;

        // Seed weights: gradient step scaled by how far the win rate sits
        // from even odds, bounded to [0, 5] per lane.
        if let Some(weights) = new.seed_weights.get_mut(intent) {
            let gradient = ETA * (signal.win_rate() - 0.5);
            weights.vector = (weights.vector + gradient).clamp(WEIGHT_MIN, WEIGHT_MAX);
            weights.bm25 = (weights.bm25 + gradient).clamp(WEIGHT_MIN, WEIGHT_MAX);
            weights.memory = (weights.memory + gradient).clamp(WEIGHT_MIN, WEIGHT_MAX);
            weights.symbol = (weights.symbol + gradient).clamp(WEIGHT_MIN, WEIGHT_MAX);
        }

        // Early stop: one step toward the satisfied-session median.
        if let (Some(current), Some(&median)) =
            (new.early_stop.get_mut(intent), medians.get(intent))
        {
            if *current < median {
                *current += 1;
            } else if *current > median {
                *current = current.saturating_sub(1).max(1);
            }
        }
    }

    // RRF k: one bounded step, widening the rank smoothing when outcomes
    // are poor and tightening it when they are good.
    let overall = if total == 0 {
        0.5
    } else {
        total_satisfied as f32 / total as f32
    };
    if overall < 0.5 {
        new.rrf_k = (new.rrf_k + RRF_K_STEP).min(RRF_K_MAX);
    } else if overall > 0.5 {
        new.rrf_k = (new.rrf_k - RRF_K_STEP).max(RRF_K_MIN);
    }

    new
}

/// Field-level diff between parameter sets.
fn diff(old: &LearnedParams, new: &LearnedParams) -> Vec<Delta> {
    let mut deltas = Vec::new();
    for (intent, old_weights) in &old.seed_weights {
        let Some(new_weights) = new.seed_weights.get(intent) else {
            continue;
        };
        for (lane, old_value, new_value) in [
            ("vector", old_weights.vector, new_weights.vector),
            ("bm25", old_weights.bm25, new_weights.bm25),
            ("memory", old_weights.memory, new_weights.memory),
            ("symbol", old_weights.symbol, new_weights.symbol),
        ] {
            if (old_value - new_value).abs() > f32::EPSILON {
                deltas.push(Delta {
                    field: format!("seed_weights.{intent}.{lane}"),
                    old: old_value,
                    new: new_value,
                });
            }
        }
    }
    for (intent, old_threshold) in &old.early_stop {
        if let Some(new_threshold) = new.early_stop.get(intent) {
            if old_threshold != new_threshold {
                deltas.push(Delta {
                    field: format!("early_stop.{intent}"),
                    old: *old_threshold as f32,
                    new: *new_threshold as f32,
                });
            }
        }
    }
    if (old.rrf_k - new.rrf_k).abs() > f32::EPSILON {
        deltas.push(Delta {
            field: "rrf_k".to_string(),
            old: old.rrf_k,
            new: new.rrf_k,
        });
    }
    deltas
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
