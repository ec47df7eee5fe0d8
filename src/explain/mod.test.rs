use super::*;

use crate::assemble::bundle::BundleItem;
use crate::assemble::bundle::SourceGroup;
use crate::assemble::bundle::StoppingReasons;
use crate::assemble::Evidence;
use crate::assemble::EvidenceEdge;
use crate::pack::Degradation;
use crate::pack::ItemCategory;

fn sample_bundle() -> Bundle {
    Bundle {
        id: "sig".to_string(),
        query: "getUserById function definition".to_string(),
        repository: "repo".to_string(),
        session_id: None,
        evidence: vec![
            Evidence {
                file: "src/user.rs".to_string(),
                symbol: Some("getUserById".to_string()),
                reason: "symbol definition".to_string(),
                edge_type: EvidenceEdge::Code,
                rank: 0,
                cached: false,
                score: 0.9,
            },
            Evidence {
                file: "memory:gotcha".to_string(),
                symbol: None,
                reason: "memory recall".to_string(),
                edge_type: EvidenceEdge::Memory,
                rank: 1,
                cached: true,
                score: 0.4,
            },
        ],
        stopping_reasons: StoppingReasons::from_conditions(vec![
            crate::assemble::StoppingReason::BudgetReached,
            crate::assemble::StoppingReason::GraphDepthCap,
        ]),
        total_tokens: 512,
        budget: 1024,
        model: "gpt-4".to_string(),
        provider: "rrf".to_string(),
        sources: vec![SourceGroup {
            source_type: "code".to_string(),
            items: vec![BundleItem {
                id: "chunk-1".to_string(),
                file: "src/user.rs".to_string(),
                symbol: Some("getUserById".to_string()),
                content: (0..40)
                    .map(|i| format!("line {i}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                tokens: 512,
                degradation: Degradation::Full,
                category: ItemCategory::Code,
                score: 0.9,
            }],
            tokens: 512,
        }],
        lanes: vec![],
    }
}

#[test]
fn test_rendering_is_byte_identical_for_equal_bundles() {
    let bundle = sample_bundle();
    let options = ExplainConfig::default();
    let first = render(&bundle, &options);
    let second = render(&bundle.clone(), &options);
    assert_eq!(first, second);
}

#[test]
fn test_header_line() {
    let markdown = render(&sample_bundle(), &ExplainConfig::default());
    assert!(markdown.starts_with(
        "# Context bundle for \"getUserById function definition\" (1 items, gpt-4 model)"
    ));
}

#[test]
fn test_evidence_table() {
    let markdown = render(&sample_bundle(), &ExplainConfig::default());
    assert!(markdown.contains("| File | Symbol | Reason | Edge Type | Rank | Cached |"));
    assert!(markdown.contains("| src/user.rs | getUserById | symbol definition | code | 0 | no |"));
    assert!(markdown.contains("| memory:gotcha | — | memory recall | memory | 1 | yes |"));
}

#[test]
fn test_stopping_reason_sections() {
    let markdown = render(&sample_bundle(), &ExplainConfig::default());
    assert!(markdown.contains("### budget_reached [warning] (primary)"));
    assert!(markdown.contains("### graph_depth_cap [notice]"));
    assert!(markdown.contains("The token budget ran out"));
}

#[test]
fn test_token_report_with_bar_and_cost() {
    let markdown = render(&sample_bundle(), &ExplainConfig::default());
    // 512/1024 = 50% → half the bar filled.
    assert!(markdown.contains("`[##########----------]` 512 / 1024 tokens (50.0%)"));
    // gpt-4 is priced: 512 tokens at $0.03/1k.
    assert!(markdown.contains("Estimated prompt cost: $0.0154"));
}

#[test]
fn test_unpriced_model_has_no_cost_line() {
    let mut bundle = sample_bundle();
    bundle.model = "my-local-model".to_string();
    let markdown = render(&bundle, &ExplainConfig::default());
    assert!(!markdown.contains("Estimated prompt cost"));
}

#[test]
fn test_preview_truncation() {
    let markdown = render(&sample_bundle(), &ExplainConfig::default());
    // Default preview is 20 lines of the 40-line item.
    assert!(markdown.contains("line 19"));
    assert!(!markdown.contains("line 20\n"));
    assert!(markdown.contains("... (20 more lines)"));
}

#[test]
fn test_preview_lines_configurable() {
    let markdown = render(
        &sample_bundle(),
        &ExplainConfig { preview_lines: 5 },
    );
    assert!(markdown.contains("line 4"));
    assert!(markdown.contains("... (35 more lines)"));
}

#[test]
fn test_pipe_escaping_in_cells() {
    let mut bundle = sample_bundle();
    bundle.evidence[0].file = "src/a|b.rs".to_string();
    let markdown = render(&bundle, &ExplainConfig::default());
    assert!(markdown.contains("src/a\\|b.rs"));
}

#[test]
fn test_empty_bundle_renders() {
    let mut bundle = sample_bundle();
    bundle.evidence.clear();
    bundle.sources.clear();
    bundle.total_tokens = 0;
    let markdown = render(&bundle, &ExplainConfig::default());
    assert!(markdown.contains("_No items were included._"));
    assert!(markdown.contains("0 / 1024 tokens (0.0%)"));
}
