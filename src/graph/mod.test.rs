use super::*;

use crate::types::RefOrigin;
use crate::types::SpanKind;

/// Build a span at a fixed range inside `path` named `name`.
fn span(path: &str, name: &str, start: u64, end: u64) -> SpanRecord {
    SpanRecord::new(
        "repo",
        path,
        start,
        end,
        SpanKind::Function,
        Some(name.to_string()),
        None,
        None,
        vec![],
    )
}

fn call(src: &SpanRecord, dst: &SpanRecord, origin: RefOrigin) -> ReferenceRecord {
    ReferenceRecord {
        src_span_id: src.id.clone(),
        dst_path: dst.path.clone(),
        byte_start: dst.byte_start,
        byte_end: dst.byte_end,
        kind: RefKind::Call,
        origin,
    }
}

/// Linear chain a -> b -> c -> d with uniform costs.
fn chain() -> (Vec<SpanRecord>, Vec<ReferenceRecord>, HashMap<String, u32>) {
    let a = span("src/a.rs", "a", 0, 100);
    let b = span("src/b.rs", "b", 0, 100);
    let c = span("src/c.rs", "c", 0, 100);
    let d = span("src/d.rs", "d", 0, 100);
    let refs = vec![
        call(&a, &b, RefOrigin::Scip),
        call(&b, &c, RefOrigin::Scip),
        call(&c, &d, RefOrigin::Scip),
    ];
    let spans = vec![a, b, c, d];
    let costs = spans.iter().map(|s| (s.id.clone(), 10u32)).collect();
    (spans, refs, costs)
}

#[test]
fn test_build_resolves_positions_to_spans() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn test_unresolvable_reference_dropped() {
    let a = span("src/a.rs", "a", 0, 100);
    let refs = vec![ReferenceRecord {
        src_span_id: a.id.clone(),
        dst_path: "src/unindexed.rs".to_string(),
        byte_start: 0,
        byte_end: 50,
        kind: RefKind::Call,
        origin: RefOrigin::Heuristic,
    }];
    let costs = HashMap::new();
    let graph = ReferenceGraph::build(std::slice::from_ref(&a), &refs, &costs);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn test_most_specific_overlapping_span_wins() {
    let outer = span("src/b.rs", "outer", 0, 200);
    let inner = span("src/b.rs", "inner", 50, 100);
    let a = span("src/a.rs", "a", 0, 100);
    let refs = vec![ReferenceRecord {
        src_span_id: a.id.clone(),
        dst_path: "src/b.rs".to_string(),
        byte_start: 60,
        byte_end: 70,
        kind: RefKind::Call,
        origin: RefOrigin::Scip,
    }];
    let spans = vec![a.clone(), outer, inner.clone()];
    let costs = spans.iter().map(|s| (s.id.clone(), 1u32)).collect();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);

    let expansion = graph.expand(&[a.id], Direction::Callees, 1, 1_000);
    assert_eq!(expansion.nodes.len(), 1);
    assert_eq!(expansion.nodes[0].name.as_deref(), Some("inner"));
}

#[test]
fn test_depth_cap_excludes_deeper_nodes() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);

    let seed = vec![spans[0].id.clone()];
    let expansion = graph.expand(&seed, Direction::Callees, 2, 10_000);
    let names: Vec<Option<&str>> = expansion.nodes.iter().map(|n| n.name.as_deref()).collect();
    // Depth 1 = b, depth 2 = c; d (depth 3) must be absent.
    assert_eq!(names, vec![Some("b"), Some("c")]);
    assert!(expansion.depth_capped);
    assert!(!expansion.truncated);
}

#[test]
fn test_depth_cap_flag_only_when_neighbors_remain() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);
    let seed = vec![spans[0].id.clone()];
    // Depth 3 reaches everything; no cap reported.
    let expansion = graph.expand(&seed, Direction::Callees, 3, 10_000);
    assert_eq!(expansion.nodes.len(), 3);
    assert!(!expansion.depth_capped);
}

#[test]
fn test_token_budget_truncates() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);
    let seed = vec![spans[0].id.clone()];
    // Each node costs 10; budget 15 admits exactly one.
    let expansion = graph.expand(&seed, Direction::Callees, 3, 15);
    assert_eq!(expansion.nodes.len(), 1);
    assert!(expansion.truncated);
}

#[test]
fn test_zero_budget_discovers_nothing() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);
    let seed = vec![spans[0].id.clone()];
    let expansion = graph.expand(&seed, Direction::Callees, 2, 5);
    assert!(expansion.nodes.is_empty());
    assert!(expansion.truncated);
}

#[test]
fn test_callers_direction() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);
    // From c, callers walks the chain backwards: b then a.
    let seed = vec![spans[2].id.clone()];
    let expansion = graph.expand(&seed, Direction::Callers, 2, 10_000);
    let names: Vec<Option<&str>> = expansion.nodes.iter().map(|n| n.name.as_deref()).collect();
    assert_eq!(names, vec![Some("b"), Some("a")]);
}

#[test]
fn test_both_directions() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);
    let seed = vec![spans[1].id.clone()]; // b
    let expansion = graph.expand(&seed, Direction::Both, 1, 10_000);
    let mut names: Vec<Option<&str>> = expansion.nodes.iter().map(|n| n.name.as_deref()).collect();
    names.sort();
    assert_eq!(names, vec![Some("a"), Some("c")]);
}

#[test]
fn test_confidence_orders_frontier() {
    let a = span("src/a.rs", "a", 0, 100);
    let weak = span("src/weak.rs", "weak", 0, 100);
    let strong = span("src/strong.rs", "strong", 0, 100);
    let refs = vec![
        call(&a, &weak, RefOrigin::Heuristic),
        call(&a, &strong, RefOrigin::Scip),
    ];
    let spans = vec![a.clone(), weak, strong];
    let costs: HashMap<String, u32> = spans.iter().map(|s| (s.id.clone(), 10u32)).collect();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);

    // Budget for only one node: the SCIP edge must win.
    let expansion = graph.expand(&[a.id], Direction::Callees, 1, 10);
    assert_eq!(expansion.nodes.len(), 1);
    assert_eq!(expansion.nodes[0].name.as_deref(), Some("strong"));
    assert!((expansion.nodes[0].confidence - 1.0).abs() < 1e-6);
}

#[test]
fn test_cycle_terminates() {
    let a = span("src/a.rs", "a", 0, 100);
    let b = span("src/b.rs", "b", 0, 100);
    let refs = vec![call(&a, &b, RefOrigin::Scip), call(&b, &a, RefOrigin::Scip)];
    let spans = vec![a.clone(), b];
    let costs: HashMap<String, u32> = spans.iter().map(|s| (s.id.clone(), 1u32)).collect();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);

    let expansion = graph.expand(&[a.id], Direction::Both, 4, 1_000);
    // Only b is ever discovered; the cycle back to a is ignored.
    assert_eq!(expansion.nodes.len(), 1);
}

#[test]
fn test_missing_seed_is_ignored() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);
    let expansion = graph.expand(&["not-a-span".to_string()], Direction::Both, 2, 1_000);
    assert!(expansion.nodes.is_empty());
    assert!(!expansion.truncated);
}

#[test]
fn test_edges_recorded() {
    let (spans, refs, costs) = chain();
    let graph = ReferenceGraph::build(&spans, &refs, &costs);
    let expansion = graph.expand(&[spans[0].id.clone()], Direction::Callees, 2, 10_000);
    assert_eq!(expansion.edges.len(), 2);
    assert_eq!(expansion.edges[0].src_span_id, spans[0].id);
    assert_eq!(expansion.edges[0].kind, RefKind::Call);
}
