use super::*;

fn candidates(ids: &[&str]) -> Vec<RerankCandidate> {
    ids.iter()
        .map(|id| RerankCandidate {
            id: id.to_string(),
            content: format!("text {id}"),
        })
        .collect()
}

fn response(results: &[(&str, f32)]) -> ApiResponse {
    ApiResponse {
        results: results
            .iter()
            .map(|(id, score)| ApiResult {
                id: id.to_string(),
                score: *score,
            })
            .collect(),
    }
}

#[test]
fn test_map_response_orders_by_score() {
    let cands = candidates(&["a", "b", "c"]);
    let order = map_response(&cands, response(&[("a", 0.1), ("b", 0.9), ("c", 0.5)]));
    assert_eq!(order, vec!["b", "c", "a"]);
}

#[test]
fn test_map_response_appends_missing_ids() {
    let cands = candidates(&["a", "b", "c"]);
    // Endpoint only scored "b".
    let order = map_response(&cands, response(&[("b", 0.9)]));
    assert_eq!(order, vec!["b", "a", "c"]);
}

#[test]
fn test_map_response_ignores_unknown_ids() {
    let cands = candidates(&["a", "b"]);
    let order = map_response(&cands, response(&[("ghost", 1.0), ("b", 0.5)]));
    assert_eq!(order, vec!["b", "a"]);
}

#[test]
fn test_map_response_ties_resolve_by_input_position() {
    let cands = candidates(&["first", "second"]);
    let order = map_response(&cands, response(&[("second", 0.5), ("first", 0.5)]));
    assert_eq!(order, vec!["first", "second"]);
}

#[test]
fn test_map_response_duplicate_ids_counted_once() {
    let cands = candidates(&["a", "b"]);
    let order = map_response(&cands, response(&[("a", 0.9), ("a", 0.1), ("b", 0.5)]));
    assert_eq!(order, vec!["a", "b"]);
}
