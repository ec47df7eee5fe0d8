use super::*;

#[test]
fn test_is_identifier() {
    assert!(is_identifier("getUserById"));
    assert!(is_identifier("get_user_by_id"));
    assert!(is_identifier("MAX_SIZE"));
    assert!(is_identifier("main"));
    assert!(is_identifier("_private"));
    assert!(!is_identifier("get user"));
    assert!(!is_identifier("how to parse json"));
    assert!(!is_identifier(""));
    assert!(!is_identifier("123abc"));
}

#[test]
fn test_split_identifier() {
    assert_eq!(
        split_identifier("calculateUserScore"),
        vec!["calculate", "user", "score"]
    );
    assert_eq!(
        split_identifier("calculate_user_score"),
        vec!["calculate", "user", "score"]
    );
    assert_eq!(split_identifier("getUserById"), vec!["get", "user", "by", "id"]);
    assert_eq!(split_identifier("HTTPServer"), vec!["httpserver"]);
}

#[test]
fn test_identifier_query_keeps_needle() {
    let p = QueryPreprocessor::new().process("getUserById");
    assert_eq!(p.query_type, QueryType::CodeIdentifier);
    assert_eq!(p.identifier.as_deref(), Some("getUserById"));
    assert_eq!(p.tokens, vec!["get", "user", "by", "id"]);
    // No stemming on identifier parts.
    assert!(p.tokens.iter().all(|t| !t.is_empty()));
}

#[test]
fn test_natural_language_stems_and_filters() {
    let p = QueryPreprocessor::new().process("how does the authentication handling work");
    assert_eq!(p.query_type, QueryType::NaturalLanguage);
    // Stopwords removed from both token sets.
    assert!(!p.memory_terms.contains(&"the".to_string()));
    assert!(!p.memory_terms.contains(&"how".to_string()));
    // Memory terms stay unstemmed for substring matching.
    assert!(p.memory_terms.contains(&"authentication".to_string()));
    // Tokens are stemmed.
    assert!(p.tokens.iter().any(|t| t.starts_with("authent")));
    assert!(p.identifier.is_none());
}

#[test]
fn test_embedded_identifier_detected() {
    let p = QueryPreprocessor::new().process("where is getUserById defined");
    assert_eq!(p.query_type, QueryType::NaturalLanguage);
    assert_eq!(p.identifier.as_deref(), Some("getUserById"));

    let p = QueryPreprocessor::new().process("find parse_token usage");
    assert_eq!(p.identifier.as_deref(), Some("parse_token"));
}

#[test]
fn test_empty_query() {
    let p = QueryPreprocessor::new().process("");
    assert_eq!(p.query_type, QueryType::NaturalLanguage);
    assert!(p.tokens.is_empty());
    assert!(p.memory_terms.is_empty());
    assert!(p.identifier.is_none());
}

#[test]
fn test_punctuation_only() {
    let p = QueryPreprocessor::new().process("??? !!!");
    assert!(p.tokens.is_empty());
}
