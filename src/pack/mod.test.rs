use super::*;

const MODEL: &str = "gpt-4";

fn input(id: &str, category: ItemCategory, relevance: f32, content: &str) -> PackInput {
    PackInput {
        id: id.to_string(),
        path: format!("src/{id}.rs"),
        symbol: None,
        content: content.to_string(),
        signature: Some(format!("fn {id}()")),
        category,
        relevance,
    }
}

fn code_body(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("    let value_{i} = compute_{i}(input_{i});"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_category_from_path() {
    assert_eq!(ItemCategory::from_path("src/auth.rs"), ItemCategory::Code);
    assert_eq!(ItemCategory::from_path("tests/auth.rs"), ItemCategory::Tests);
    assert_eq!(ItemCategory::from_path("docs/guide.md"), ItemCategory::Docs);
    assert_eq!(ItemCategory::from_path("config/app.yaml"), ItemCategory::Config);
    assert_eq!(ItemCategory::from_path("Cargo.toml"), ItemCategory::Config);
}

#[test]
fn test_default_allocation_sums_to_one() {
    let profile = PackingProfile::new("repo", MODEL);
    assert!(profile.validate().is_ok());
    assert!((profile.budget_allocation.sum() - 1.0).abs() < 1e-6);
}

#[test]
fn test_validate_rejects_bad_allocation() {
    let mut profile = PackingProfile::new("repo", MODEL);
    profile.budget_allocation.reserve = 0.5;
    assert!(profile.validate().is_err());
}

#[test]
fn test_everything_fits_stays_full() {
    let profile = PackingProfile::new("repo", MODEL);
    let inputs = vec![
        input("a", ItemCategory::Code, 1.0, "fn a() { body(); }"),
        input("b", ItemCategory::Code, 0.9, "fn b() { body(); }"),
    ];
    let outcome = pack(inputs, &profile, 10_000, MODEL, true);
    assert_eq!(outcome.items.len(), 2);
    assert!(outcome.dropped.is_empty());
    assert!(!outcome.budget_reached);
    assert!(outcome
        .items
        .iter()
        .all(|i| i.degradation == Degradation::Full));
}

#[test]
fn test_priority_times_relevance_order() {
    let profile = PackingProfile::new("repo", MODEL);
    let inputs = vec![
        // tests priority 0.7 × 1.0 = 0.7
        input("test_item", ItemCategory::Tests, 1.0, "fn t() {}"),
        // code priority 1.0 × 0.9 = 0.9
        input("code_item", ItemCategory::Code, 0.9, "fn c() {}"),
        // memory priority 0.9 × 0.5 = 0.45
        input("memory_item", ItemCategory::Memory, 0.5, "note"),
    ];
    let outcome = pack(inputs, &profile, 10_000, MODEL, true);
    let ids: Vec<&str> = outcome.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["code_item", "test_item", "memory_item"]);
}

#[test]
fn test_low_priority_degrades_first() {
    let profile = PackingProfile::new("repo", MODEL);
    let hot_content = format!("fn hot() {{\n{}\n}}", code_body(20));
    let cold_content = format!("fn cold() {{\n{}\n}}", code_body(100));
    let inputs = vec![
        input("hot", ItemCategory::Code, 1.0, &hot_content),
        input("cold", ItemCategory::Code, 0.2, &cold_content),
    ];
    // Budget fits the hot body in full (within its tier share) but not the
    // much larger cold body.
    let hot_tokens = crate::tokenizer::count_tokens(&hot_content, MODEL);
    let outcome = pack(inputs, &profile, hot_tokens * 3 + 80, MODEL, true);

    let hot = outcome.items.iter().find(|i| i.id == "hot").unwrap();
    assert_eq!(hot.degradation, Degradation::Full);
    let cold = outcome.items.iter().find(|i| i.id == "cold").unwrap();
    assert_eq!(cold.degradation, Degradation::Capsule);
    assert!(outcome.budget_reached);
}

#[test]
fn test_capsule_form_when_content_disabled() {
    let profile = PackingProfile::new("repo", MODEL);
    let inputs = vec![input(
        "a",
        ItemCategory::Code,
        1.0,
        &format!("fn a() {{\n{}\n}}", code_body(50)),
    )];
    let outcome = pack(inputs, &profile, 10_000, MODEL, false);
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].degradation, Degradation::Capsule);
    assert!(outcome.items[0].content.contains("{ ... }"));
    // Capsules under an ample budget are policy-driven, not budget-driven.
    assert!(!outcome.budget_reached);
}

#[test]
fn test_drop_when_nothing_fits() {
    let profile = PackingProfile::new("repo", MODEL);
    let inputs = vec![input(
        "a",
        ItemCategory::Code,
        1.0,
        &format!("fn a() {{\n{}\n}}", code_body(200)),
    )];
    let outcome = pack(inputs, &profile, 3, MODEL, true);
    assert!(outcome.items.is_empty());
    assert_eq!(outcome.dropped.len(), 1);
    assert!(outcome.budget_reached);
    assert!(outcome.dropped[0].reason.contains("degradation ladder"));
}

#[test]
fn test_used_tokens_never_exceed_budget() {
    let profile = PackingProfile::new("repo", MODEL);
    let inputs: Vec<PackInput> = (0..30)
        .map(|i| {
            input(
                &format!("item{i:02}"),
                ItemCategory::Code,
                1.0 - i as f32 * 0.03,
                &format!("fn item{i}() {{\n{}\n}}", code_body(10)),
            )
        })
        .collect();
    let budget = 500;
    let outcome = pack(inputs, &profile, budget, MODEL, true);
    assert!(outcome.used_tokens <= budget);
    // With thirty items and a tight budget, something had to give.
    assert!(outcome.budget_reached || outcome.items.len() == 30);
}

#[test]
fn test_docs_summarize_step() {
    let profile = PackingProfile::new("repo", MODEL);
    let mut doc = String::from("# Guide\n\n");
    for i in 0..40 {
        doc.push_str(&format!(
            "Step {i} is short. The long tail of this paragraph repeats \
             implementation detail that a summary can safely drop, padding \
             the body with many extra tokens of prose.\n\n"
        ));
    }
    let mut item = input("guide", ItemCategory::Docs, 1.0, &doc);
    item.path = "docs/guide.md".to_string();
    item.signature = None;

    let full_tokens = crate::tokenizer::count_tokens(&doc, MODEL);
    // Budget below the full doc but plenty for the bullet summary.
    let outcome = pack(vec![item], &profile, full_tokens / 2, MODEL, true);
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].degradation, Degradation::Summarized);
    assert!(outcome.items[0].content.contains("- Step 0 is short."));
    assert!(outcome.items[0].tokens < full_tokens);
}

#[test]
fn test_profile_fingerprint_changes_with_settings() {
    let a = PackingProfile::new("repo", MODEL);
    let mut b = PackingProfile::new("repo", MODEL);
    b.priorities.code = 0.5;
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[tokio::test]
async fn test_profile_persistence_roundtrip() {
    let store = crate::store::Store::open_in_memory().unwrap();
    let mut profile = PackingProfile::new("repo", MODEL);
    profile.priorities.tests = 0.3;
    profile.save(&store, 1_700_000_000).await.unwrap();

    let loaded = PackingProfile::load_or_default(&store, "repo", MODEL).await;
    assert_eq!(loaded, profile);

    // Unknown pair falls back to defaults.
    let fallback = PackingProfile::load_or_default(&store, "other", MODEL).await;
    assert_eq!(fallback.priorities, Priorities::default());
}
