use super::*;

use pretty_assertions::assert_eq;

fn evidence(file: &str, rank: u32) -> Evidence {
    Evidence {
        file: file.to_string(),
        symbol: None,
        reason: "lexical match".to_string(),
        edge_type: EvidenceEdge::Search,
        rank,
        cached: false,
        score: 0.5,
    }
}

fn item(id: &str, tokens: u32) -> BundleItem {
    BundleItem {
        id: id.to_string(),
        file: format!("src/{id}.rs"),
        symbol: None,
        content: "fn x() {}".to_string(),
        tokens,
        degradation: Degradation::Full,
        category: ItemCategory::Code,
        score: 0.5,
    }
}

fn bundle() -> Bundle {
    Bundle {
        id: "sig".to_string(),
        query: "q".to_string(),
        repository: "repo".to_string(),
        session_id: None,
        evidence: vec![evidence("src/a.rs", 0), evidence("src/b.rs", 1)],
        stopping_reasons: StoppingReasons::from_conditions(vec![
            StoppingReason::NoMoreCandidates,
        ]),
        total_tokens: 12,
        budget: 1000,
        model: "gpt-4".to_string(),
        provider: "rrf".to_string(),
        sources: vec![SourceGroup {
            source_type: "code".to_string(),
            items: vec![item("a", 7), item("b", 5)],
            tokens: 12,
        }],
        lanes: vec![],
    }
}

#[test]
fn test_primary_selection_precedence() {
    let reasons = StoppingReasons::from_conditions(vec![
        StoppingReason::EarlyStopThreshold,
        StoppingReason::BudgetReached,
        StoppingReason::GraphDepthCap,
    ]);
    assert_eq!(reasons.primary(), StoppingReason::BudgetReached);
    assert_eq!(reasons.summary.count, 3);
    assert!(reasons.contains(StoppingReason::GraphDepthCap));
}

#[test]
fn test_user_limit_dominates() {
    let reasons = StoppingReasons::from_conditions(vec![
        StoppingReason::BudgetReached,
        StoppingReason::UserLimitReached,
    ]);
    assert_eq!(reasons.primary(), StoppingReason::UserLimitReached);
}

#[test]
fn test_empty_conditions_default_to_no_more_candidates() {
    let reasons = StoppingReasons::from_conditions(vec![]);
    assert_eq!(reasons.primary(), StoppingReason::NoMoreCandidates);
    assert_eq!(reasons.conditions.len(), 1);
}

#[test]
fn test_duplicate_conditions_deduped() {
    let reasons = StoppingReasons::from_conditions(vec![
        StoppingReason::BudgetReached,
        StoppingReason::BudgetReached,
    ]);
    assert_eq!(reasons.conditions.len(), 1);
}

#[test]
fn test_severities() {
    assert_eq!(StoppingReason::BudgetReached.severity(), "warning");
    assert_eq!(StoppingReason::EarlyStopThreshold.severity(), "info");
    assert_eq!(StoppingReason::GraphDepthCap.severity(), "notice");
    assert_eq!(StoppingReason::UserLimitReached.severity(), "warning");
}

#[test]
fn test_bundle_items_iterator_and_count() {
    let b = bundle();
    assert_eq!(b.item_count(), 2);
    let ids: Vec<&str> = b.items().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn test_mark_cached_flips_every_row() {
    let mut b = bundle();
    assert!(b.evidence.iter().all(|e| !e.cached));
    b.mark_cached();
    assert!(b.evidence.iter().all(|e| e.cached));
}

#[test]
fn test_wire_json_shape() {
    let b = bundle();
    let json: serde_json::Value = serde_json::from_str(&b.to_json()).unwrap();
    assert_eq!(json["query"], "q");
    assert_eq!(json["repository"], "repo");
    assert_eq!(json["total_tokens"], 12);
    assert_eq!(json["budget"], 1000);
    assert_eq!(json["model"], "gpt-4");
    assert_eq!(json["provider"], "rrf");
    assert_eq!(json["sources"][0]["type"], "code");
    assert_eq!(json["sources"][0]["tokens"], 12);
    assert_eq!(json["sources"][0]["items"][0]["id"], "a");
    assert_eq!(json["evidence"][0]["file"], "src/a.rs");
    assert_eq!(json["evidence"][0]["edge_type"], "search");
    assert_eq!(json["evidence"][0]["rank"], 0);
    assert!(json["stopping_reasons"]["conditions"].is_array());
    assert_eq!(
        json["stopping_reasons"]["summary"]["primary"],
        "NoMoreCandidates"
    );
    // session_id is omitted when absent.
    assert!(json.get("session_id").is_none());
}

#[test]
fn test_json_roundtrip() {
    let b = bundle();
    let parsed: Bundle = serde_json::from_str(&b.to_json()).unwrap();
    assert_eq!(parsed, b);
}

#[test]
fn test_lane_report_from_status() {
    use crate::search::Lane;

    let status = LaneStatus {
        lane: Lane::Vector,
        state: LaneState::Failed {
            message: "lost connection".to_string(),
        },
        elapsed_ms: 17,
    };
    let report = LaneReport::from(&status);
    assert_eq!(report.lane, "vector");
    assert_eq!(report.state, "failed");
    assert_eq!(report.detail.as_deref(), Some("lost connection"));
    assert_eq!(report.elapsed_ms, 17);
}
