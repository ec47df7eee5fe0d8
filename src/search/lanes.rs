//! Concurrent retrieval-lane execution.
//!
//! The vector, bm25, memory and symbol lanes run in parallel and join at
//! the fusion step. A lane that times out or fails contributes nothing; its
//! status is carried into the bundle's evidence metadata. Only the whole
//! assembly can be cancelled, not individual lanes.

use std::time::Duration;
use std::time::Instant;

use crate::error::Result;
use crate::query::PolicyDecision;
use crate::query::ProcessedQuery;
use crate::store::MemoryFilter;
use crate::store::Store;
use crate::types::Candidate;

use super::fusion::Lane;

/// Outcome of one lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneState {
    /// Lane produced `n` candidates.
    Completed { count: usize },
    /// Lane exceeded the soft timeout and was dropped.
    TimedOut,
    /// Lane failed; the error is absorbed, not propagated.
    Failed { message: String },
    /// Lane disabled by policy or missing inputs.
    Skipped,
}

/// Status row for evidence metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneStatus {
    pub lane: Lane,
    pub state: LaneState,
    pub elapsed_ms: u64,
}

/// Inputs for one lane sweep.
pub struct LaneRequest<'a> {
    pub processed: &'a ProcessedQuery,
    pub policy: &'a PolicyDecision,
    /// Pre-computed query embedding; the vector lane is skipped without it.
    pub query_vector: Option<&'a [f32]>,
    /// Embedding model name for vector-lane lookup.
    pub embedding_model: &'a str,
    pub repo: Option<&'a str>,
    pub branch: Option<&'a str>,
    /// Per-lane candidate cap.
    pub limit: usize,
    /// Per-lane soft timeout.
    pub timeout: Duration,
    /// Unix seconds, for memory expiry filtering.
    pub now: i64,
}

/// Combined lane results, ready for fusion.
#[derive(Debug, Clone)]
pub struct LaneOutput {
    pub lanes: Vec<(Lane, Vec<Candidate>)>,
    pub statuses: Vec<LaneStatus>,
}

impl LaneOutput {
    /// Whether every enabled lane came back empty.
    pub fn all_empty(&self) -> bool {
        self.lanes.iter().all(|(_, candidates)| candidates.is_empty())
    }
}

/// Run all enabled lanes concurrently and collect their candidates.
pub async fn run_lanes(store: &Store, request: LaneRequest<'_>) -> LaneOutput {
    let (bm25, vector, memory, symbol) = tokio::join!(
        run_lane(Lane::Bm25, request.timeout, bm25_lane(store, &request)),
        run_lane(Lane::Vector, request.timeout, vector_lane(store, &request)),
        run_lane(Lane::Memory, request.timeout, memory_lane(store, &request)),
        run_lane(Lane::Symbol, request.timeout, symbol_lane(store, &request)),
    );

    let mut lanes = Vec::new();
    let mut statuses = Vec::new();
    for (lane, candidates, status) in [bm25, vector, memory, symbol] {
        if !matches!(status.state, LaneState::Skipped) {
            lanes.push((lane, candidates));
        }
        statuses.push(status);
    }

    tracing::debug!(
        bm25 = lane_count(&statuses, Lane::Bm25),
        vector = lane_count(&statuses, Lane::Vector),
        memory = lane_count(&statuses, Lane::Memory),
        symbol = lane_count(&statuses, Lane::Symbol),
        "Lane sweep completed"
    );

    LaneOutput { lanes, statuses }
}

fn lane_count(statuses: &[LaneStatus], lane: Lane) -> usize {
    statuses
        .iter()
        .find(|s| s.lane == lane)
        .and_then(|s| match &s.state {
            LaneState::Completed { count } => Some(*count),
            _ => None,
        })
        .unwrap_or(0)
}

/// Drive one lane future under the soft timeout, absorbing failures.
async fn run_lane<F>(
    lane: Lane,
    timeout: Duration,
    fut: F,
) -> (Lane, Vec<Candidate>, LaneStatus)
where
    F: std::future::Future<Output = Option<Result<Vec<Candidate>>>>,
{
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, fut).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let (candidates, state) = match outcome {
        Err(_) => {
            tracing::warn!(lane = lane.label(), elapsed_ms, "Lane timed out");
            (Vec::new(), LaneState::TimedOut)
        }
        Ok(None) => (Vec::new(), LaneState::Skipped),
        Ok(Some(Ok(candidates))) => {
            let count = candidates.len();
            (candidates, LaneState::Completed { count })
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(lane = lane.label(), error = %e, "Lane failed");
            (
                Vec::new(),
                LaneState::Failed {
                    message: e.to_string(),
                },
            )
        }
    };

    (
        lane,
        candidates,
        LaneStatus {
            lane,
            state,
            elapsed_ms,
        },
    )
}

// ========== Individual lanes ==========

async fn bm25_lane(store: &Store, request: &LaneRequest<'_>) -> Option<Result<Vec<Candidate>>> {
    let result = store
        .fts_search(&request.processed.original, request.repo, request.limit)
        .await
        .map(|hits| {
            hits.into_iter()
                .map(|hit| {
                    // bm25 rank is ascending-better; negate for a
                    // descending-better candidate score.
                    Candidate::code(hit.chunk_id, hit.path, -hit.rank as f32)
                })
                .collect()
        });
    Some(result)
}

async fn vector_lane(store: &Store, request: &LaneRequest<'_>) -> Option<Result<Vec<Candidate>>> {
    let query_vector = request.query_vector?;
    let result = store
        .vector_search(query_vector, request.embedding_model, request.repo, request.limit)
        .await
        .map(|hits| {
            hits.into_iter()
                .map(|hit| Candidate::code(hit.chunk_id, hit.path, hit.similarity))
                .collect()
        });
    Some(result)
}

async fn memory_lane(store: &Store, request: &LaneRequest<'_>) -> Option<Result<Vec<Candidate>>> {
    let filter = MemoryFilter {
        repo: request.repo.map(str::to_string),
        branch: request.branch.map(str::to_string),
        ..Default::default()
    };
    let result = store
        .search_memories(
            request.processed.memory_terms.clone(),
            filter,
            request.now,
            request.limit,
        )
        .await
        .map(|hits| {
            hits.into_iter()
                .map(|(memory, score)| Candidate::memory(memory.id, score as f32))
                .collect()
        });
    Some(result)
}

async fn symbol_lane(store: &Store, request: &LaneRequest<'_>) -> Option<Result<Vec<Candidate>>> {
    if !request.policy.include_symbols {
        return None;
    }
    let needle = request.processed.identifier.as_deref()?;
    let result = store
        .symbol_search(needle, request.repo, request.limit)
        .await
        .map(|hits| {
            hits.into_iter()
                .filter_map(|hit| {
                    // Spans with no chunk cannot be packed; skip them.
                    let chunk_id = hit.chunk_id?;
                    let score = if hit.exact { 2.0 } else { 1.0 };
                    Some(Candidate::code(chunk_id, hit.path, score).with_symbol(hit.name))
                })
                .collect()
        });
    Some(result)
}

#[cfg(test)]
#[path = "lanes.test.rs"]
mod tests;
