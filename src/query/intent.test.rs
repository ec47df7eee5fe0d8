use super::*;

fn classify(query: &str) -> Classification {
    IntentClassifier::new().classify(query)
}

#[test]
fn test_symbol_lookup_query() {
    let c = classify("getUserById function definition");
    assert_eq!(c.intent, Intent::Symbol);
    assert!(c.confidence >= 0.4, "confidence {}", c.confidence);
    // The identifier itself is extracted as a function entity.
    assert!(c
        .entities
        .iter()
        .any(|e| e.kind == EntityKind::Function && e.text == "getUserById"));
}

#[test]
fn test_config_query() {
    let c = classify("database connection config");
    assert_eq!(c.intent, Intent::Config);
    assert!(c.confidence > 0.2);
}

#[test]
fn test_incident_query() {
    let c = classify("authentication error handling");
    assert_eq!(c.intent, Intent::Incident);
    // Both "error" and "error handling" match, keeping confidence high
    // enough that the policy gate does not shrink the graph depth.
    assert!(c.confidence >= 0.5, "confidence {}", c.confidence);
}

#[test]
fn test_api_query() {
    let c = classify("users endpoint request handler");
    assert_eq!(c.intent, Intent::Api);
}

#[test]
fn test_fallback_to_search() {
    let c = classify("thing stuff whatever");
    assert_eq!(c.intent, Intent::Search);
    assert!(c.confidence <= 0.5);
    // Fallback is always in the suggested policy list.
    assert!(c.suggested_policies.contains(&"search".to_string()));
}

#[test]
fn test_empty_query_falls_back() {
    let c = classify("");
    assert_eq!(c.intent, Intent::Search);
}

#[test]
fn test_scoring_formula() {
    // One match out of ten patterns: 1/10 + 0.2 + 0.1 = 0.4
    let c = classify("config");
    assert_eq!(c.intent, Intent::Config);
    assert!((c.confidence - 0.4).abs() < 1e-5, "got {}", c.confidence);

    // Two matches: 2/10 + 0.2 + 0.2 = 0.6
    let c = classify("function definition");
    assert_eq!(c.intent, Intent::Symbol);
    assert!((c.confidence - 0.6).abs() < 1e-5, "got {}", c.confidence);
}

#[test]
fn test_score_capped_at_one() {
    let c = classify("error exception crash panic bug incident failure failing broken regression");
    assert_eq!(c.intent, Intent::Incident);
    assert!(c.confidence <= 1.0);
}

#[test]
fn test_single_word_patterns_match_whole_words_only() {
    // "rapid" must not match the "api" pattern.
    let c = classify("rapid prototyping notes");
    assert_ne!(c.intent, Intent::Api);
}

#[test]
fn test_multiword_pattern_matches_substring() {
    let c = classify("where is the session store");
    assert_eq!(c.intent, Intent::Symbol);
}

#[test]
fn test_threshold_override() {
    let strict = IntentClassifier::with_threshold(0.9);
    let c = strict.classify("config");
    assert_eq!(c.intent, Intent::Search);
}

#[test]
fn test_entity_extraction_kinds() {
    let entities = extract_entities(
        "fix parse_token in src/lexer.rs for the /api/v1/users route using MAX_RETRIES",
    );
    let kinds: Vec<(EntityKind, &str)> = entities
        .iter()
        .map(|e| (e.kind, e.text.as_str()))
        .collect();
    assert!(kinds.contains(&(EntityKind::Function, "parse_token")));
    assert!(kinds.contains(&(EntityKind::File, "src/lexer.rs")));
    assert!(kinds.contains(&(EntityKind::Route, "/api/v1/users")));
    assert!(kinds.contains(&(EntityKind::Config, "MAX_RETRIES")));
}

#[test]
fn test_entity_positions() {
    let query = "find getUserById here";
    let entities = extract_entities(query);
    let func = entities
        .iter()
        .find(|e| e.text == "getUserById")
        .expect("function entity");
    assert_eq!(func.position, query.find("getUserById").unwrap());
}

#[test]
fn test_file_entity_shadows_inner_identifiers() {
    let entities = extract_entities("open user_service.py");
    // "user_service" alone must not also appear as a function entity.
    assert!(entities.iter().any(|e| e.kind == EntityKind::File));
    assert!(!entities
        .iter()
        .any(|e| e.kind == EntityKind::Function && e.text == "user_service"));
}

#[test]
fn test_class_entities() {
    let entities = extract_entities("where does UserService call struct RateLimiter");
    assert!(entities
        .iter()
        .any(|e| e.kind == EntityKind::Class && e.text == "UserService"));
    assert!(entities
        .iter()
        .any(|e| e.kind == EntityKind::Class && e.text == "RateLimiter"));
}

#[test]
fn test_dotted_config_key() {
    let entities = extract_entities("what does lanes.timeout_ms control");
    assert!(entities
        .iter()
        .any(|e| e.kind == EntityKind::Config && e.text == "lanes.timeout_ms"));
}
