use super::*;

use crate::config::RepoPolicyOverride;

fn ctx(confidence: f32) -> PolicyContext {
    PolicyContext {
        confidence,
        query_length: 30,
        token_budget: 6_000,
        repo: None,
        language: None,
    }
}

#[test]
fn test_base_policy_table() {
    // The per-intent table, reproduced exactly.
    let cases = [
        (Intent::Symbol, 2, 3, (1.2, 0.8, 1.0, 2.0)),
        (Intent::Config, 1, 2, (0.8, 1.5, 1.2, 0.5)),
        (Intent::Api, 2, 2, (1.0, 1.0, 1.3, 1.2)),
        (Intent::Incident, 3, 5, (1.3, 1.1, 1.8, 1.5)),
        (Intent::Search, 2, 10, (1.0, 1.0, 1.0, 1.0)),
    ];
    for (intent, depth, early, (v, b, m, s)) in cases {
        let policy = PolicyDecision::base(intent);
        assert_eq!(policy.max_depth, depth, "{intent}");
        assert_eq!(policy.early_stop_threshold, early, "{intent}");
        assert_eq!(policy.seed_weights, SeedWeights::new(v, b, m, s), "{intent}");
        assert!(policy.include_symbols);
        assert!(policy.include_files);
        assert!(policy.include_content);
    }
}

#[test]
fn test_low_confidence_narrows() {
    let policy = derive(Intent::Incident, &ctx(0.3), &PolicyOverrides::default());
    assert_eq!(policy.max_depth, 2); // 3 - 1
    assert_eq!(policy.early_stop_threshold, 4); // 5 - 1
}

#[test]
fn test_low_confidence_never_below_one() {
    let policy = derive(Intent::Config, &ctx(0.1), &PolicyOverrides::default());
    assert_eq!(policy.max_depth, 1); // max(1, 1-1) — but short queries would broaden
    assert_eq!(policy.early_stop_threshold, 1);
}

#[test]
fn test_high_confidence_deepens() {
    let policy = derive(Intent::Incident, &ctx(0.9), &PolicyOverrides::default());
    assert_eq!(policy.max_depth, 4); // 3 + 1, capped at 4
    assert_eq!(policy.early_stop_threshold, 6);
}

#[test]
fn test_depth_capped_at_four() {
    let overrides = PolicyOverrides {
        repos: vec![RepoPolicyOverride {
            pattern: "*".to_string(),
            max_depth: Some(9),
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut context = ctx(0.9);
    context.repo = Some("anything".to_string());
    let policy = derive(Intent::Incident, &context, &overrides);
    assert_eq!(policy.max_depth, 4);
}

#[test]
fn test_short_query_broadens() {
    let mut context = ctx(0.3);
    context.query_length = 5;
    let policy = derive(Intent::Config, &context, &PolicyOverrides::default());
    // Config base depth 1, low confidence keeps it at 1, short query lifts to 2.
    assert_eq!(policy.max_depth, 2);
}

#[test]
fn test_small_budget_disables_content_and_decrements_early_stop() {
    let mut context = ctx(0.6);
    context.token_budget = 500;
    let policy = derive(Intent::Symbol, &context, &PolicyOverrides::default());
    assert!(!policy.include_content);
    assert_eq!(policy.early_stop_threshold, 2); // 3 - 1
}

#[test]
fn test_medium_confidence_is_base() {
    let policy = derive(Intent::Symbol, &ctx(0.6), &PolicyOverrides::default());
    assert_eq!(policy, PolicyDecision::base(Intent::Symbol));
}

#[test]
fn test_repo_override_matches_glob() {
    let overrides = PolicyOverrides {
        repos: vec![RepoPolicyOverride {
            pattern: "backend-*".to_string(),
            max_depth: Some(3),
            include_content: Some(false),
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut context = ctx(0.6);
    context.repo = Some("backend-api".to_string());
    let policy = derive(Intent::Symbol, &context, &overrides);
    assert_eq!(policy.max_depth, 3);
    assert!(!policy.include_content);

    context.repo = Some("frontend-app".to_string());
    let policy = derive(Intent::Symbol, &context, &overrides);
    assert_eq!(policy.max_depth, 2);
    assert!(policy.include_content);
}

#[test]
fn test_language_multipliers_multiply() {
    let mut overrides = PolicyOverrides::default();
    overrides.language_multipliers.insert(
        "rust".to_string(),
        LaneMultipliers {
            symbol: 2.0,
            ..Default::default()
        },
    );
    let mut context = ctx(0.6);
    context.language = Some("rust".to_string());
    let policy = derive(Intent::Symbol, &context, &overrides);
    assert_eq!(policy.seed_weights.symbol, 4.0); // 2.0 * 2.0
    assert_eq!(policy.seed_weights.vector, 1.2); // untouched
}

#[test]
fn test_weights_clamped_to_five() {
    let mut overrides = PolicyOverrides::default();
    overrides.language_multipliers.insert(
        "rust".to_string(),
        LaneMultipliers {
            symbol: 100.0,
            ..Default::default()
        },
    );
    let mut context = ctx(0.6);
    context.language = Some("rust".to_string());
    let policy = derive(Intent::Symbol, &context, &overrides);
    assert_eq!(policy.seed_weights.symbol, 5.0);
}

#[test]
fn test_scaled_clamps_low_and_high() {
    let weights = SeedWeights::new(1.0, 2.0, 3.0, 4.0).scaled(2.0);
    assert_eq!(weights.vector, 2.0);
    assert_eq!(weights.symbol, 5.0); // clamped
    let zeroed = SeedWeights::new(1.0, 1.0, 1.0, 1.0).scaled(-1.0);
    assert_eq!(zeroed.vector, 0.0); // clamped at zero
}

#[test]
fn test_fingerprint_distinguishes_policies() {
    let a = PolicyDecision::base(Intent::Symbol);
    let b = PolicyDecision::base(Intent::Config);
    assert_ne!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint(), PolicyDecision::base(Intent::Symbol).fingerprint());
}
