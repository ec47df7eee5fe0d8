use super::*;

use crate::types::ChunkRecord;
use crate::types::EmbeddingRecord;
use crate::types::FileRecord;
use crate::types::RefKind;
use crate::types::RefOrigin;
use crate::types::ReferenceRecord;
use crate::types::SpanKind;
use crate::types::SpanRecord;

fn make_file(repo: &str, path: &str, content: &str) -> FileRecord {
    FileRecord::new(repo, path, content.as_bytes(), "rust")
}

fn make_span(repo: &str, path: &str, start: u64, end: u64, name: Option<&str>) -> SpanRecord {
    SpanRecord::new(
        repo,
        path,
        start,
        end,
        SpanKind::Function,
        name.map(str::to_string),
        None,
        None,
        vec![],
    )
}

fn make_chunk(span: &SpanRecord, content: &str) -> ChunkRecord {
    ChunkRecord::new(span, content, 1_700_000_000)
}

async fn seed_one_file(store: &Store) -> (SpanRecord, ChunkRecord) {
    let file = make_file("repo", "src/auth.rs", "fn login() {}\nfn logout() {}");
    let span = make_span("repo", "src/auth.rs", 0, 13, Some("login"));
    let chunk = make_chunk(&span, "fn login() {}");
    let reference = ReferenceRecord {
        src_span_id: span.id.clone(),
        dst_path: "src/db.rs".to_string(),
        byte_start: 0,
        byte_end: 10,
        kind: RefKind::Call,
        origin: RefOrigin::Scip,
    };
    store
        .upsert_file(file, vec![span.clone()], vec![chunk.clone()], vec![reference])
        .await
        .unwrap();
    (span, chunk)
}

#[tokio::test]
async fn test_open_and_migrate() {
    let store = Store::open_in_memory().unwrap();
    assert_eq!(store.schema_version().await.unwrap(), 1);
    store.integrity_check().await.unwrap();
}

#[tokio::test]
async fn test_open_on_disk_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        seed_one_file(&store).await;
    }
    // Re-open: migrations must be no-ops and data must survive.
    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.schema_version().await.unwrap(), 1);
    let (files, spans, chunks, _, refs) = store.entity_counts().await.unwrap();
    assert_eq!((files, spans, chunks, refs), (1, 1, 1, 1));
}

#[tokio::test]
async fn test_upsert_same_hash_is_noop() {
    let store = Store::open_in_memory().unwrap();
    let (span, chunk) = seed_one_file(&store).await;

    let file = make_file("repo", "src/auth.rs", "fn login() {}\nfn logout() {}");
    let changed = store
        .upsert_file(file, vec![span], vec![chunk], vec![])
        .await
        .unwrap();
    assert!(!changed);
    // The original reference row must still be there (no replace happened).
    let (_, _, _, _, refs) = store.entity_counts().await.unwrap();
    assert_eq!(refs, 1);
}

#[tokio::test]
async fn test_content_change_replaces_generation() {
    let store = Store::open_in_memory().unwrap();
    let (old_span, old_chunk) = seed_one_file(&store).await;

    store
        .insert_embeddings(vec![EmbeddingRecord {
            chunk_id: old_chunk.id.clone(),
            model: "test-model".to_string(),
            dimension: 3,
            vector: vec![1.0, 0.0, 0.0],
        }])
        .await
        .unwrap();

    let file = make_file("repo", "src/auth.rs", "fn login_v2() {}");
    let new_span = make_span("repo", "src/auth.rs", 0, 16, Some("login_v2"));
    let new_chunk = make_chunk(&new_span, "fn login_v2() {}");
    let changed = store
        .upsert_file(file, vec![new_span.clone()], vec![new_chunk], vec![])
        .await
        .unwrap();
    assert!(changed);

    // Old span, chunk, embedding and reference are gone; no orphans remain.
    assert!(store.span(&old_span.id).await.unwrap().is_none());
    assert!(store.chunk(&old_chunk.id).await.unwrap().is_none());
    let (files, spans, chunks, embeddings, refs) = store.entity_counts().await.unwrap();
    assert_eq!((files, spans, chunks, embeddings, refs), (1, 1, 1, 0, 0));
    store.integrity_check().await.unwrap();
}

#[tokio::test]
async fn test_remove_file_cascades() {
    let store = Store::open_in_memory().unwrap();
    let (_, chunk) = seed_one_file(&store).await;
    store
        .insert_embeddings(vec![EmbeddingRecord {
            chunk_id: chunk.id.clone(),
            model: "test-model".to_string(),
            dimension: 2,
            vector: vec![0.5, 0.5],
        }])
        .await
        .unwrap();

    assert!(store.remove_file("repo", "src/auth.rs").await.unwrap());
    let (files, spans, chunks, embeddings, refs) = store.entity_counts().await.unwrap();
    assert_eq!((files, spans, chunks, embeddings, refs), (0, 0, 0, 0, 0));
    // FTS projection is cleared by the delete trigger.
    let hits = store.fts_search("login", None, 10).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_remove_missing_file_returns_false() {
    let store = Store::open_in_memory().unwrap();
    assert!(!store.remove_file("repo", "nope.rs").await.unwrap());
}

#[tokio::test]
async fn test_rejects_empty_span_range() {
    let store = Store::open_in_memory().unwrap();
    let file = make_file("repo", "src/x.rs", "fn a() {}");
    let span = make_span("repo", "src/x.rs", 5, 5, Some("a"));
    let err = store
        .upsert_file(file, vec![span], vec![], vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Constraint);
}

#[tokio::test]
async fn test_rejects_partial_overlap_same_name_kind() {
    let store = Store::open_in_memory().unwrap();
    let file = make_file("repo", "src/x.rs", "fn a() {} fn a() {}");
    // 0..10 and 5..15 straddle; same name + kind.
    let a = make_span("repo", "src/x.rs", 0, 10, Some("a"));
    let b = make_span("repo", "src/x.rs", 5, 15, Some("a"));
    let err = store
        .upsert_file(file, vec![a, b], vec![], vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Constraint);
}

#[tokio::test]
async fn test_allows_nested_spans_same_name() {
    let store = Store::open_in_memory().unwrap();
    let file = make_file("repo", "src/x.rs", "mod m { fn a() {} }");
    // Full containment is allowed.
    let outer = make_span("repo", "src/x.rs", 0, 19, Some("a"));
    let inner = make_span("repo", "src/x.rs", 8, 17, Some("a"));
    store
        .upsert_file(file, vec![outer, inner], vec![], vec![])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejects_chunk_with_unknown_span() {
    let store = Store::open_in_memory().unwrap();
    let file = make_file("repo", "src/x.rs", "fn a() {}");
    let span = make_span("repo", "src/x.rs", 0, 9, Some("a"));
    let orphan_parent = make_span("repo", "src/other.rs", 0, 9, Some("b"));
    let chunk = make_chunk(&orphan_parent, "fn b() {}");
    let err = store
        .upsert_file(file, vec![span], vec![chunk], vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Constraint);
}

#[tokio::test]
async fn test_chunks_by_ids_preserves_order() {
    let store = Store::open_in_memory().unwrap();
    let file = make_file("repo", "src/m.rs", "fn a() {} fn b() {}");
    let sa = make_span("repo", "src/m.rs", 0, 9, Some("a"));
    let sb = make_span("repo", "src/m.rs", 10, 19, Some("b"));
    let ca = make_chunk(&sa, "fn a() {}");
    let cb = make_chunk(&sb, "fn b() {}");
    store
        .upsert_file(file, vec![sa, sb], vec![ca.clone(), cb.clone()], vec![])
        .await
        .unwrap();

    let fetched = store
        .chunks_by_ids(vec![cb.id.clone(), "missing".to_string(), ca.id.clone()])
        .await
        .unwrap();
    let ids: Vec<&str> = fetched.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![cb.id.as_str(), ca.id.as_str()]);
}
