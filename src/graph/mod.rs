//! Reference-graph traversal.
//!
//! Builds a directed graph over spans from the store's reference edges and
//! expands outward from seed spans with a bounded breadth-first walk. Edges
//! carry a confidence weight by provenance (SCIP 1.0, LSP 0.8, heuristic
//! 0.6); within a frontier, higher-confidence edges are followed first,
//! ties by destination path. Every discovered node costs tokens; when the
//! next node would exceed the traversal budget the walk stops and reports
//! `truncated`.

use std::collections::HashMap;
use std::collections::HashSet;

use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction as PetDirection;

use crate::types::RefKind;
use crate::types::ReferenceRecord;
use crate::types::SpanRecord;

/// Traversal direction relative to the seed spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Spans that reference the seeds.
    Callers,
    /// Spans the seeds reference.
    Callees,
    Both,
}

/// Node payload: one span.
#[derive(Debug, Clone)]
struct GraphNode {
    span_id: String,
    path: String,
    name: Option<String>,
    /// Token cost of the span's chunk, charged when the node is discovered.
    token_cost: u32,
}

/// Edge payload.
#[derive(Debug, Clone)]
struct GraphEdge {
    kind: RefKind,
    confidence: f32,
}

/// A node discovered during expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedNode {
    pub span_id: String,
    pub path: String,
    pub name: Option<String>,
    /// BFS depth: 1 = direct neighbor of a seed.
    pub depth: u8,
    /// Kind of the edge that discovered this node.
    pub via: RefKind,
    pub confidence: f32,
    pub token_cost: u32,
}

/// An edge walked during expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversedEdge {
    pub src_span_id: String,
    pub dst_span_id: String,
    pub kind: RefKind,
    pub confidence: f32,
}

/// Expansion result.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub nodes: Vec<ExpandedNode>,
    pub edges: Vec<TraversedEdge>,
    /// Token budget ran out before the frontier was exhausted.
    pub truncated: bool,
    /// BFS halted on the depth cap with unexplored neighbors remaining.
    pub depth_capped: bool,
}

/// In-memory reference graph for one repository.
pub struct ReferenceGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    indices: HashMap<String, NodeIndex>,
}

impl ReferenceGraph {
    /// Build the graph from a repository's spans and reference edges.
    ///
    /// References target byte positions, not span ids; each resolves to the
    /// most specific (shortest) span overlapping the target range in the
    /// destination file. References into unindexed regions are dropped.
    /// `token_costs` maps span id to the token cost of its chunk.
    pub fn build(
        spans: &[SpanRecord],
        references: &[ReferenceRecord],
        token_costs: &HashMap<String, u32>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::new();

        // Span lookup by path for position resolution.
        let mut by_path: HashMap<&str, Vec<&SpanRecord>> = HashMap::new();
        for span in spans {
            by_path.entry(span.path.as_str()).or_default().push(span);
            let idx = graph.add_node(GraphNode {
                span_id: span.id.clone(),
                path: span.path.clone(),
                name: span.name.clone(),
                token_cost: token_costs.get(&span.id).copied().unwrap_or(0),
            });
            indices.insert(span.id.clone(), idx);
        }

        for reference in references {
            let Some(&src_idx) = indices.get(&reference.src_span_id) else {
                continue;
            };
            let Some(dst) = resolve_target(&by_path, reference) else {
                continue;
            };
            let dst_idx = indices[&dst.id];
            if src_idx == dst_idx {
                continue;
            }
            graph.add_edge(
                src_idx,
                dst_idx,
                GraphEdge {
                    kind: reference.kind,
                    confidence: reference.origin.confidence(),
                },
            );
        }

        Self { graph, indices }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Bounded BFS from the seed spans.
    ///
    /// Seeds themselves are not re-emitted and cost nothing; each discovered
    /// neighbor charges its token cost against `token_budget` before being
    /// appended. Frontier ordering is deterministic: confidence descending,
    /// then destination path, then span id.
    pub fn expand(
        &self,
        seed_span_ids: &[String],
        direction: Direction,
        max_depth: u8,
        token_budget: u32,
    ) -> Expansion {
        let mut expansion = Expansion::default();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut frontier: Vec<NodeIndex> = Vec::new();

        for id in seed_span_ids {
            if let Some(&idx) = self.indices.get(id) {
                if visited.insert(idx) {
                    frontier.push(idx);
                }
            }
        }

        let mut budget_left = token_budget;
        let mut depth = 0u8;

        while !frontier.is_empty() {
            if depth >= max_depth {
                // Anything still reachable from the frontier is beyond the cap.
                expansion.depth_capped = frontier
                    .iter()
                    .any(|&idx| self.has_unvisited_neighbor(idx, direction, &visited));
                break;
            }
            depth += 1;

            // Collect candidate edges out of the whole frontier, then walk
            // them best-confidence-first.
            let mut candidates: Vec<(NodeIndex, NodeIndex, RefKind, f32)> = Vec::new();
            for &idx in &frontier {
                self.neighbor_edges(idx, direction, &mut candidates);
            }
            candidates.sort_by(|a, b| {
                b.3.partial_cmp(&a.3)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| self.graph[a.1].path.cmp(&self.graph[b.1].path))
                    .then_with(|| self.graph[a.1].span_id.cmp(&self.graph[b.1].span_id))
            });

            let mut next_frontier = Vec::new();
            for (src_idx, dst_idx, kind, confidence) in candidates {
                if visited.contains(&dst_idx) {
                    continue;
                }
                let node = &self.graph[dst_idx];
                if node.token_cost > budget_left {
                    expansion.truncated = true;
                    tracing::debug!(
                        span = %node.span_id,
                        cost = node.token_cost,
                        budget_left,
                        "Graph expansion stopped on token budget"
                    );
                    return expansion;
                }
                budget_left -= node.token_cost;
                visited.insert(dst_idx);
                next_frontier.push(dst_idx);
                expansion.edges.push(TraversedEdge {
                    src_span_id: self.graph[src_idx].span_id.clone(),
                    dst_span_id: node.span_id.clone(),
                    kind,
                    confidence,
                });
                expansion.nodes.push(ExpandedNode {
                    span_id: node.span_id.clone(),
                    path: node.path.clone(),
                    name: node.name.clone(),
                    depth,
                    via: kind,
                    confidence,
                    token_cost: node.token_cost,
                });
            }

            frontier = next_frontier;
        }

        expansion
    }

    fn neighbor_edges(
        &self,
        idx: NodeIndex,
        direction: Direction,
        out: &mut Vec<(NodeIndex, NodeIndex, RefKind, f32)>,
    ) {
        if matches!(direction, Direction::Callees | Direction::Both) {
            for edge in self.graph.edges_directed(idx, PetDirection::Outgoing) {
                let payload = edge.weight();
                out.push((idx, edge.target(), payload.kind, payload.confidence));
            }
        }
        if matches!(direction, Direction::Callers | Direction::Both) {
            for edge in self.graph.edges_directed(idx, PetDirection::Incoming) {
                let payload = edge.weight();
                out.push((idx, edge.source(), payload.kind, payload.confidence));
            }
        }
    }

    fn has_unvisited_neighbor(
        &self,
        idx: NodeIndex,
        direction: Direction,
        visited: &HashSet<NodeIndex>,
    ) -> bool {
        let mut edges = Vec::new();
        self.neighbor_edges(idx, direction, &mut edges);
        edges.iter().any(|(_, dst, _, _)| !visited.contains(dst))
    }
}

/// Most specific span overlapping the reference target.
fn resolve_target<'a>(
    by_path: &HashMap<&str, Vec<&'a SpanRecord>>,
    reference: &ReferenceRecord,
) -> Option<&'a SpanRecord> {
    let spans = by_path.get(reference.dst_path.as_str())?;
    spans
        .iter()
        .filter(|s| s.byte_start < reference.byte_end && s.byte_end > reference.byte_start)
        .min_by_key(|s| (s.len(), s.id.clone()))
        .copied()
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
