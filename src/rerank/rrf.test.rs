use super::*;

fn candidates(ids: &[&str]) -> Vec<RerankCandidate> {
    ids.iter()
        .map(|id| RerankCandidate {
            id: id.to_string(),
            content: String::new(),
        })
        .collect()
}

fn list(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_single_list_is_identity() {
    let provider = RrfProvider::new();
    let cands = candidates(&["b", "a", "c"]);
    let order = provider.rerank("ignored", &cands).await.unwrap();
    assert_eq!(order, vec!["b", "a", "c"]);
}

#[test]
fn test_fuse_lists_rewards_agreement() {
    let provider = RrfProvider::new();
    let fused = provider.fuse_lists(&[list(&["a", "b", "c"]), list(&["b", "c", "d"])]);
    // "b": 1/62 + 1/61 beats "a": 1/61 alone.
    assert_eq!(fused[0], "b");
    assert!(fused.contains(&"d".to_string()));
}

#[test]
fn test_fuse_lists_tie_breaks_by_id() {
    let provider = RrfProvider::new();
    let fused = provider.fuse_lists(&[list(&["zeta"]), list(&["alpha"])]);
    assert_eq!(fused, vec!["alpha", "zeta"]);
}

#[test]
fn test_fuse_lists_empty() {
    let provider = RrfProvider::new();
    assert!(provider.fuse_lists(&[]).is_empty());
    assert!(provider.fuse_lists(&[Vec::new()]).is_empty());
}

#[test]
fn test_custom_k_changes_spread_not_order() {
    let tight = RrfProvider::with_k(30.0);
    let loose = RrfProvider::with_k(120.0);
    let lists = [list(&["a", "b"]), list(&["a", "c"])];
    assert_eq!(tight.fuse_lists(&lists)[0], "a");
    assert_eq!(loose.fuse_lists(&lists)[0], "a");
}
