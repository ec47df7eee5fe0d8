use super::*;

use crate::types::CandidateKind;

fn code(id: &str) -> Candidate {
    Candidate::code(id, format!("src/{id}.rs"), 1.0)
}

fn weights(v: f32, b: f32, m: f32, s: f32) -> SeedWeights {
    SeedWeights::new(v, b, m, s)
}

#[test]
fn test_rrf_denominator_is_k_plus_rank_plus_one() {
    // Single lane, single doc at rank 0: score = w / (k + 0 + 1).
    let lanes = vec![(Lane::Bm25, vec![code("a")])];
    let fused = fuse(&lanes, weights(1.0, 1.0, 1.0, 1.0), 60.0, 0, 0.3);
    assert_eq!(fused.len(), 1);
    assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-6);
}

#[test]
fn test_multi_lane_accumulation() {
    let lanes = vec![
        (Lane::Bm25, vec![code("a"), code("b")]),
        (Lane::Vector, vec![code("b"), code("c")]),
    ];
    let fused = fuse(&lanes, weights(1.0, 1.0, 1.0, 1.0), 60.0, 0, 0.3);
    // "b" appears in both lanes: rank 1 in bm25, rank 0 in vector.
    let b = fused.iter().find(|f| f.candidate.id == "b").unwrap();
    let expected = 1.0 / 62.0 + 1.0 / 61.0;
    assert!((b.score - expected).abs() < 1e-6);
    // And it outranks the single-lane candidates.
    assert_eq!(fused[0].candidate.id, "b");
}

#[test]
fn test_lane_weights_shift_ranking() {
    let lanes = vec![
        (Lane::Bm25, vec![code("lexical")]),
        (Lane::Vector, vec![code("semantic")]),
    ];
    let bm25_heavy = fuse(&lanes, weights(0.2, 2.0, 1.0, 1.0), 60.0, 0, 0.3);
    assert_eq!(bm25_heavy[0].candidate.id, "lexical");
    let vector_heavy = fuse(&lanes, weights(2.0, 0.2, 1.0, 1.0), 60.0, 0, 0.3);
    assert_eq!(vector_heavy[0].candidate.id, "semantic");
}

#[test]
fn test_zero_weight_lane_is_ignored() {
    let lanes = vec![
        (Lane::Bm25, vec![code("a")]),
        (Lane::Memory, vec![Candidate::memory("m1", 5.0)]),
    ];
    let fused = fuse(&lanes, weights(1.0, 1.0, 0.0, 1.0), 60.0, 0, 0.3);
    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].candidate.id, "a");
}

#[test]
fn test_commutative_in_lane_order() {
    let forward = vec![
        (Lane::Bm25, vec![code("a"), code("b")]),
        (Lane::Vector, vec![code("b"), code("c")]),
        (Lane::Symbol, vec![code("c"), code("a")]),
    ];
    let mut reversed = forward.clone();
    reversed.reverse();

    let w = weights(1.0, 1.0, 1.0, 1.0);
    let f1 = fuse(&forward, w, 60.0, 0, 0.3);
    let f2 = fuse(&reversed, w, 60.0, 0, 0.3);
    let ids1: Vec<&str> = f1.iter().map(|f| f.candidate.id.as_str()).collect();
    let ids2: Vec<&str> = f2.iter().map(|f| f.candidate.id.as_str()).collect();
    assert_eq!(ids1, ids2);
    for (a, b) in f1.iter().zip(f2.iter()) {
        assert!((a.score - b.score).abs() < 1e-6);
    }
}

#[test]
fn test_tie_break_by_stability_then_id() {
    // "steady" holds rank 1 in both lanes; "spiky" is rank 0 in one and
    // rank 2 in the other. Same accumulated score, different variance.
    let lanes = vec![
        (
            Lane::Bm25,
            vec![code("spiky"), code("steady"), code("filler1")],
        ),
        (
            Lane::Vector,
            vec![code("filler2"), code("steady"), code("spiky")],
        ),
    ];
    let fused = fuse(&lanes, weights(1.0, 1.0, 1.0, 1.0), 60.0, 0, 0.3);
    let steady_pos = fused.iter().position(|f| f.candidate.id == "steady").unwrap();
    let spiky_pos = fused.iter().position(|f| f.candidate.id == "spiky").unwrap();
    // score(steady) = 1/62 + 1/62; score(spiky) = 1/61 + 1/63 — spiky is
    // actually slightly higher, so force the comparison through stability
    // by checking the stability values themselves.
    let steady = &fused[steady_pos];
    let spiky = &fused[spiky_pos];
    assert!(steady.stability > spiky.stability);
    assert!((steady.stability - 1.0).abs() < 1e-6); // zero variance
}

#[test]
fn test_exact_tie_breaks_by_id() {
    let lanes = vec![(Lane::Bm25, vec![code("zeta")]), (Lane::Vector, vec![code("alpha")])];
    let fused = fuse(&lanes, weights(1.0, 1.0, 1.0, 1.0), 60.0, 0, 0.3);
    // Identical score and stability: lexicographic id order.
    assert_eq!(fused[0].candidate.id, "alpha");
    assert_eq!(fused[1].candidate.id, "zeta");
}

#[test]
fn test_early_stop_truncates_on_score_cliff() {
    // One dominant doc in both lanes, long noise tail in one lane.
    let mut bm25 = vec![code("top")];
    for i in 0..20 {
        bm25.push(code(&format!("noise{i:02}")));
    }
    let lanes = vec![(Lane::Bm25, bm25), (Lane::Vector, vec![code("top")])];
    let fused = fuse(&lanes, weights(1.0, 1.0, 1.0, 1.0), 60.0, 3, 0.9);
    // Score at position 2 is far below 90% of top: truncated to 3.
    assert_eq!(fused.len(), 3);
    assert_eq!(fused[0].candidate.id, "top");
}

#[test]
fn test_early_stop_keeps_flat_distributions() {
    let lanes = vec![(
        Lane::Bm25,
        (0..10).map(|i| code(&format!("doc{i}"))).collect::<Vec<_>>(),
    )];
    // Ratio 0.0 never fires.
    let fused = fuse(&lanes, weights(1.0, 1.0, 1.0, 1.0), 60.0, 3, 0.0);
    assert_eq!(fused.len(), 10);
}

#[test]
fn test_effective_weights_confidence_factor() {
    let base = weights(1.2, 0.8, 1.0, 2.0);
    let scaled = effective_weights(base, 1.0);
    assert!((scaled.vector - 1.2).abs() < 1e-6);
    let damped = effective_weights(base, 0.0);
    assert!((damped.vector - 1.2 * 0.7).abs() < 1e-6);
    assert!((damped.symbol - 2.0 * 0.7).abs() < 1e-6);
}

#[test]
fn test_effective_weights_clamped() {
    let base = weights(5.0, 5.0, 5.0, 5.0);
    let scaled = effective_weights(base, 1.0);
    assert!(scaled.vector <= 5.0);
}

#[test]
fn test_primary_lane_prefers_best_rank() {
    let lanes = vec![
        (Lane::Bm25, vec![code("x"), code("a")]),
        (Lane::Symbol, vec![code("a")]),
    ];
    let fused = fuse(&lanes, weights(1.0, 1.0, 1.0, 1.0), 60.0, 0, 0.3);
    let a = fused.iter().find(|f| f.candidate.id == "a").unwrap();
    // rank 0 in symbol beats rank 1 in bm25.
    assert_eq!(a.primary_lane(), Lane::Symbol);
}

#[test]
fn test_memory_candidates_flow_through() {
    let lanes = vec![(Lane::Memory, vec![Candidate::memory("m1", 3.0)])];
    let fused = fuse(&lanes, weights(1.0, 1.0, 1.5, 1.0), 60.0, 0, 0.3);
    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].candidate.kind, CandidateKind::Memory);
}

#[test]
fn test_weight_memo_caches_within_bucket() {
    use crate::query::PolicyDecision;
    use std::time::Duration;

    let memo = WeightMemo::new(16, Duration::from_secs(300));
    let policy = PolicyDecision::base(Intent::Symbol);
    let a = memo.effective(Intent::Symbol, 0.61, &policy);
    let b = memo.effective(Intent::Symbol, 0.62, &policy); // same bucket (6)
    assert_eq!(a, b);
    let c = memo.effective(Intent::Symbol, 0.98, &policy); // bucket 10
    assert!(c.symbol > a.symbol);
}

#[test]
fn test_weight_memo_ttl_expiry() {
    use crate::query::PolicyDecision;
    use std::time::Duration;

    let memo = WeightMemo::new(16, Duration::from_millis(0));
    let policy = PolicyDecision::base(Intent::Api);
    // Zero TTL: every call recomputes, but values stay deterministic.
    let a = memo.effective(Intent::Api, 0.5, &policy);
    let b = memo.effective(Intent::Api, 0.5, &policy);
    assert_eq!(a, b);
}
