use super::*;

use crate::search::fusion::FusedCandidate;
use crate::search::fusion::Lane;
use crate::types::Candidate;

fn fused(id: &str, path: &str) -> FusedCandidate {
    FusedCandidate {
        candidate: Candidate::code(id, path, 1.0),
        score: 1.0,
        stability: 1.0,
        lanes: vec![(Lane::Bm25, 0)],
    }
}

fn fused_memory(id: &str) -> FusedCandidate {
    FusedCandidate {
        candidate: Candidate::memory(id, 1.0),
        score: 1.0,
        stability: 1.0,
        lanes: vec![(Lane::Memory, 0)],
    }
}

#[test]
fn test_cap_enforced_per_file() {
    let input = vec![
        fused("a1", "src/a.rs"),
        fused("a2", "src/a.rs"),
        fused("a3", "src/a.rs"),
        fused("b1", "src/b.rs"),
    ];
    let capped = limit_chunks_per_file(input, 2);
    let ids: Vec<&str> = capped.iter().map(|f| f.candidate.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2", "b1"]);
}

#[test]
fn test_zero_disables_cap() {
    let input = vec![
        fused("a1", "src/a.rs"),
        fused("a2", "src/a.rs"),
        fused("a3", "src/a.rs"),
    ];
    assert_eq!(limit_chunks_per_file(input, 0).len(), 3);
}

#[test]
fn test_memory_candidates_never_capped() {
    let input = vec![
        fused_memory("m1"),
        fused_memory("m2"),
        fused_memory("m3"),
        fused("a1", "src/a.rs"),
    ];
    let capped = limit_chunks_per_file(input, 1);
    assert_eq!(capped.len(), 4);
}

#[test]
fn test_order_preserved() {
    let input = vec![
        fused("b1", "src/b.rs"),
        fused("a1", "src/a.rs"),
        fused("b2", "src/b.rs"),
        fused("a2", "src/a.rs"),
        fused("b3", "src/b.rs"),
    ];
    let capped = limit_chunks_per_file(input, 2);
    let ids: Vec<&str> = capped.iter().map(|f| f.candidate.id.as_str()).collect();
    assert_eq!(ids, vec!["b1", "a1", "b2", "a2"]);
}
