use super::*;

#[test]
fn test_defaults_validate() {
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.lanes.timeout_ms, 2_000);
    assert_eq!(config.lanes.candidate_limit, 50);
    assert_eq!(config.fusion.rrf_k, 60.0);
    assert_eq!(config.cache.search_ttl_secs, 300);
    assert_eq!(config.cache.bundle_ttl_secs, 1800);
    assert_eq!(config.cache.rerank_ttl_secs, 86_400);
    assert_eq!(config.explain.preview_lines, 20);
}

#[test]
fn test_parse_toml() {
    let toml_str = r#"
        default_model = "claude-3-sonnet"

        [lanes]
        timeout_ms = 500

        [fusion]
        rrf_k = 90.0

        [rerank]
        provider = "api"
        endpoint = "https://rerank.example/v1"

        [[policy.repos]]
        pattern = "backend-*"
        max_depth = 3

        [policy.language_multipliers.rust]
        symbol = 1.5
    "#;
    let config: EngineConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.default_model, "claude-3-sonnet");
    assert_eq!(config.lanes.timeout_ms, 500);
    assert_eq!(config.fusion.rrf_k, 90.0);
    assert!(config.validate().is_ok());
    assert_eq!(config.policy.repos.len(), 1);
    assert_eq!(config.policy.repos[0].max_depth, Some(3));
    let rust = config.policy.language_multipliers.get("rust").unwrap();
    assert_eq!(rust.symbol, 1.5);
    assert_eq!(rust.vector, 1.0); // unspecified lanes default to 1.0
}

#[test]
fn test_env_overrides() {
    let mut config = EngineConfig::default();
    config
        .apply_env_overrides(vec![
            ("CTXPACK_LANES_TIMEOUT_MS".to_string(), "750".to_string()),
            ("CTXPACK_DEFAULT_MODEL".to_string(), "gemini-pro".to_string()),
            ("CTXPACK_RERANK_PROVIDER".to_string(), "rrf".to_string()),
            ("UNRELATED_VAR".to_string(), "x".to_string()),
            ("CTXPACK_UNKNOWN_KEY".to_string(), "ignored".to_string()),
        ])
        .unwrap();
    assert_eq!(config.lanes.timeout_ms, 750);
    assert_eq!(config.default_model, "gemini-pro");
}

#[test]
fn test_env_override_bad_number_is_config_error() {
    let mut config = EngineConfig::default();
    let err = config
        .apply_env_overrides(vec![(
            "CTXPACK_LANES_TIMEOUT_MS".to_string(),
            "not-a-number".to_string(),
        )])
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Config);
}

#[test]
fn test_validate_rejects_unknown_provider() {
    let mut config = EngineConfig::default();
    config.rerank.provider = "quantum".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_api_provider_requires_endpoint() {
    let mut config = EngineConfig::default();
    config.rerank.provider = "api".to_string();
    assert!(config.validate().is_err());
    config.rerank.endpoint = Some("https://rerank.example".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_zero_timeout() {
    let mut config = EngineConfig::default();
    config.lanes.timeout_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_warnings_nonfatal() {
    let mut config = EngineConfig::default();
    config.data_dir = PathBuf::from("/definitely/not/a/real/path/ctxpack");
    config.lanes.timeout_ms = 60_000;
    let warnings = config.warnings();
    assert_eq!(warnings.len(), 2);
    // Still valid — warnings never block startup
    assert!(config.validate().is_ok());
}

#[test]
fn test_glob_match() {
    assert!(glob_match("backend-*", "backend-api"));
    assert!(glob_match("*", "anything"));
    assert!(glob_match("svc-?", "svc-a"));
    assert!(!glob_match("svc-?", "svc-ab"));
    assert!(!glob_match("backend-*", "frontend-api"));
    assert!(glob_match("exact", "exact"));
    assert!(!glob_match("exact", "exact2"));
}
