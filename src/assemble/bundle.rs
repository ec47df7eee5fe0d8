//! Bundle types: the assembled result, its evidence and stopping reasons.

use serde::Deserialize;
use serde::Serialize;

use crate::pack::Degradation;
use crate::pack::ItemCategory;
use crate::search::LaneState;
use crate::search::LaneStatus;

/// How an item earned its place in the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceEdge {
    /// Structural match (symbol definition).
    Code,
    /// Discovered through graph traversal.
    Graph,
    /// Persisted memory.
    Memory,
    /// Served from a cache layer.
    Cache,
    /// Lexical or semantic search hit.
    Search,
}

impl EvidenceEdge {
    pub fn label(&self) -> &'static str {
        match self {
            EvidenceEdge::Code => "code",
            EvidenceEdge::Graph => "graph",
            EvidenceEdge::Memory => "memory",
            EvidenceEdge::Cache => "cache",
            EvidenceEdge::Search => "search",
        }
    }
}

/// Per-item inclusion record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub reason: String,
    pub edge_type: EvidenceEdge,
    /// Zero-based position in the final item order.
    pub rank: u32,
    pub cached: bool,
    pub score: f32,
}

/// Why assembly stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoppingReason {
    BudgetReached,
    EarlyStopThreshold,
    NoMoreCandidates,
    GraphDepthCap,
    ReachedTokenReserve,
    AllLanesExhausted,
    UserLimitReached,
}

impl StoppingReason {
    pub fn label(&self) -> &'static str {
        match self {
            StoppingReason::BudgetReached => "budget_reached",
            StoppingReason::EarlyStopThreshold => "early_stop_threshold",
            StoppingReason::NoMoreCandidates => "no_more_candidates",
            StoppingReason::GraphDepthCap => "graph_depth_cap",
            StoppingReason::ReachedTokenReserve => "reached_token_reserve",
            StoppingReason::AllLanesExhausted => "all_lanes_exhausted",
            StoppingReason::UserLimitReached => "user_limit_reached",
        }
    }

    /// Rendering severity for the explainer.
    pub fn severity(&self) -> &'static str {
        match self {
            StoppingReason::EarlyStopThreshold | StoppingReason::NoMoreCandidates => "info",
            StoppingReason::GraphDepthCap | StoppingReason::ReachedTokenReserve => "notice",
            StoppingReason::BudgetReached
            | StoppingReason::AllLanesExhausted
            | StoppingReason::UserLimitReached => "warning",
        }
    }

    /// Precedence when several conditions hold; the highest becomes primary.
    fn precedence(&self) -> u8 {
        match self {
            StoppingReason::UserLimitReached => 6,
            StoppingReason::BudgetReached => 5,
            StoppingReason::ReachedTokenReserve => 4,
            StoppingReason::EarlyStopThreshold => 3,
            StoppingReason::GraphDepthCap => 2,
            StoppingReason::AllLanesExhausted => 1,
            StoppingReason::NoMoreCandidates => 0,
        }
    }
}

impl std::fmt::Display for StoppingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The set of stopping conditions with one primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppingReasons {
    pub conditions: Vec<StoppingReason>,
    pub summary: StoppingSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppingSummary {
    pub primary: StoppingReason,
    pub count: usize,
}

impl StoppingReasons {
    /// Build from the observed conditions; falls back to
    /// `NoMoreCandidates` when nothing else fired.
    pub fn from_conditions(mut conditions: Vec<StoppingReason>) -> Self {
        conditions.sort_by_key(|c| std::cmp::Reverse(c.precedence()));
        conditions.dedup();
        if conditions.is_empty() {
            conditions.push(StoppingReason::NoMoreCandidates);
        }
        let primary = conditions[0];
        let count = conditions.len();
        Self {
            conditions,
            summary: StoppingSummary { primary, count },
        }
    }

    pub fn contains(&self, reason: StoppingReason) -> bool {
        self.conditions.contains(&reason)
    }

    pub fn primary(&self) -> StoppingReason {
        self.summary.primary
    }
}

/// One packed item in the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleItem {
    pub id: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub content: String,
    pub tokens: u32,
    pub degradation: Degradation,
    pub category: ItemCategory,
    pub score: f32,
}

/// Items grouped by source type for the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceGroup {
    #[serde(rename = "type")]
    pub source_type: String,
    pub items: Vec<BundleItem>,
    pub tokens: u32,
}

/// Outcome of one retrieval lane, carried as evidence metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneReport {
    pub lane: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

impl From<&LaneStatus> for LaneReport {
    fn from(status: &LaneStatus) -> Self {
        let (state, detail) = match &status.state {
            LaneState::Completed { count } => ("completed".to_string(), Some(format!("{count} candidates"))),
            LaneState::TimedOut => ("timed_out".to_string(), None),
            LaneState::Failed { message } => ("failed".to_string(), Some(message.clone())),
            LaneState::Skipped => ("skipped".to_string(), None),
        };
        Self {
            lane: status.lane.label().to_string(),
            state,
            detail,
            elapsed_ms: status.elapsed_ms,
        }
    }
}

/// The assembled, token-budgeted bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Content-addressed signature of the inputs that produced this bundle.
    pub id: String,
    pub query: String,
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub evidence: Vec<Evidence>,
    pub stopping_reasons: StoppingReasons,
    pub total_tokens: u32,
    pub budget: u32,
    pub model: String,
    /// Reranker provider that ordered the items.
    pub provider: String,
    pub sources: Vec<SourceGroup>,
    /// Per-lane execution reports.
    #[serde(default)]
    pub lanes: Vec<LaneReport>,
}

impl Bundle {
    /// All items across source groups, in final order.
    pub fn items(&self) -> impl Iterator<Item = &BundleItem> {
        self.sources.iter().flat_map(|group| group.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.sources.iter().map(|group| group.items.len()).sum()
    }

    /// Mark every evidence row as cache-served. Applied when the bundle
    /// itself is returned from the bundle cache.
    pub fn mark_cached(&mut self) {
        for evidence in &mut self.evidence {
            evidence.cached = true;
        }
    }

    /// Serialize to the wire JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
#[path = "bundle.test.rs"]
mod tests;
