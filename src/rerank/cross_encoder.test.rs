use super::*;

use std::sync::Arc;

/// Scorer that ranks by content length.
struct LengthScorer;

impl CrossEncoderScorer for LengthScorer {
    fn score(&self, _query: &str, content: &str) -> f32 {
        content.len() as f32
    }
    fn model(&self) -> &str {
        "length-test-model"
    }
}

/// Scorer that gives every pair the same score.
struct ConstantScorer;

impl CrossEncoderScorer for ConstantScorer {
    fn score(&self, _query: &str, _content: &str) -> f32 {
        0.5
    }
    fn model(&self) -> &str {
        "constant-test-model"
    }
}

fn candidate(id: &str, content: &str) -> RerankCandidate {
    RerankCandidate {
        id: id.to_string(),
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_sorts_descending_by_score() {
    let provider = CrossEncoderProvider::new(Arc::new(LengthScorer));
    let cands = vec![
        candidate("short", "ab"),
        candidate("long", "abcdefgh"),
        candidate("mid", "abcd"),
    ];
    let order = provider.rerank("q", &cands).await.unwrap();
    assert_eq!(order, vec!["long", "mid", "short"]);
}

#[tokio::test]
async fn test_ties_preserve_input_order() {
    let provider = CrossEncoderProvider::new(Arc::new(ConstantScorer));
    let cands = vec![
        candidate("first", "aaa"),
        candidate("second", "bbb"),
        candidate("third", "ccc"),
    ];
    let order = provider.rerank("q", &cands).await.unwrap();
    assert_eq!(order, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_determinism() {
    let provider = CrossEncoderProvider::new(Arc::new(LengthScorer));
    let cands = vec![
        candidate("a", "xx"),
        candidate("b", "xxxx"),
        candidate("c", "xxx"),
    ];
    let first = provider.rerank("q", &cands).await.unwrap();
    let second = provider.rerank("q", &cands).await.unwrap();
    assert_eq!(first, second);
}
