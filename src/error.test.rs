use super::*;

#[test]
fn test_kind_mapping() {
    let err = EngineError::Config {
        field: "lanes.timeout_ms".to_string(),
        cause: "must be positive".to_string(),
    };
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(err.exit_code(), 2);

    let err = EngineError::store_io("insert chunk", "disk full");
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.exit_code(), 3);

    let err = EngineError::ProviderPermanent {
        provider: "api".to_string(),
        cause: "401".to_string(),
    };
    assert_eq!(err.kind(), ErrorKind::Permanent);
    assert_eq!(err.exit_code(), 4);

    let err = EngineError::Timeout {
        stage: "lane:vector".to_string(),
        elapsed_ms: 2000,
    };
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn test_transient_classification() {
    assert!(EngineError::store_io("read", "busy").is_transient());
    assert!(
        EngineError::ProviderTransient {
            provider: "api".to_string(),
            cause: "503".to_string(),
        }
        .is_transient()
    );
    assert!(
        !EngineError::ProviderPermanent {
            provider: "api".to_string(),
            cause: "401".to_string(),
        }
        .is_transient()
    );
    assert!(
        !EngineError::StoreCorruption {
            detail: "bad page".to_string(),
        }
        .is_transient()
    );
}

#[test]
fn test_display_includes_context() {
    let err = EngineError::store_constraint("insert span", "UNIQUE violated");
    let msg = format!("{err}");
    assert!(msg.contains("insert span"));
    assert!(msg.contains("UNIQUE violated"));
}

#[test]
fn test_sqlite_constraint_conversion() {
    let sqlite_err = rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
        Some("UNIQUE constraint failed".to_string()),
    );
    let err: EngineError = sqlite_err.into();
    assert_eq!(err.kind(), ErrorKind::Constraint);
}

#[test]
fn test_result_propagation() {
    fn inner() -> Result<()> {
        Err(EngineError::StoreCorruption {
            detail: "test".to_string(),
        })
    }
    fn outer() -> Result<()> {
        inner()?;
        Ok(())
    }
    assert_eq!(outer().unwrap_err().kind(), ErrorKind::Corruption);
}
