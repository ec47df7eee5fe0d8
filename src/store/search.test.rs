use super::*;

use crate::types::ChunkRecord;
use crate::types::EmbeddingRecord;
use crate::types::FileRecord;
use crate::types::SpanKind;
use crate::types::SpanRecord;

async fn seed(store: &Store, repo: &str, path: &str, name: &str, content: &str) -> String {
    let file = FileRecord::new(repo, path, content.as_bytes(), "rust");
    let span = SpanRecord::new(
        repo,
        path,
        0,
        content.len() as u64,
        SpanKind::Function,
        Some(name.to_string()),
        Some(format!("fn {name}()")),
        None,
        vec![],
    );
    let chunk = ChunkRecord::new(&span, content, 1_700_000_000);
    let chunk_id = chunk.id.clone();
    store
        .upsert_file(file, vec![span], vec![chunk], vec![])
        .await
        .unwrap();
    chunk_id
}

#[tokio::test]
async fn test_fts_matches_and_orders() {
    let store = Store::open_in_memory().unwrap();
    seed(
        &store,
        "repo",
        "src/db.rs",
        "connect",
        "fn connect() { /* database connection pool */ }",
    )
    .await;
    seed(
        &store,
        "repo",
        "src/http.rs",
        "serve",
        "fn serve() { /* http server loop */ }",
    )
    .await;

    let hits = store.fts_search("database connection", None, 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "src/db.rs");
}

#[tokio::test]
async fn test_fts_repo_filter() {
    let store = Store::open_in_memory().unwrap();
    seed(&store, "alpha", "src/a.rs", "alpha_fn", "fn alpha_fn() { shared_term }").await;
    seed(&store, "beta", "src/b.rs", "beta_fn", "fn beta_fn() { shared_term }").await;

    let all = store.fts_search("shared_term", None, 10).await.unwrap();
    assert_eq!(all.len(), 2);
    let alpha_only = store.fts_search("shared_term", Some("alpha"), 10).await.unwrap();
    assert_eq!(alpha_only.len(), 1);
    assert_eq!(alpha_only[0].path, "src/a.rs");
}

#[tokio::test]
async fn test_fts_porter_stemming() {
    let store = Store::open_in_memory().unwrap();
    seed(
        &store,
        "repo",
        "src/auth.rs",
        "authenticate",
        "fn authenticate() { /* authentication handling */ }",
    )
    .await;
    // Porter stems "authenticating" and "authentication" to the same root.
    let hits = store.fts_search("authenticating", None, 10).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_fts_hostile_query_is_safe() {
    let store = Store::open_in_memory().unwrap();
    seed(&store, "repo", "src/a.rs", "a", "fn a() {}").await;
    // FTS operators and quotes must not inject syntax.
    for query in ["NEAR(", "\"unterminated", "a AND OR *", "(((", "-"] {
        let _ = store.fts_search(query, None, 10).await.unwrap();
    }
    assert!(store.fts_search("", None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fts_rebuild_produces_identical_results() {
    let store = Store::open_in_memory().unwrap();
    seed(&store, "repo", "src/a.rs", "parse", "fn parse() { tokenizer }").await;
    seed(&store, "repo", "src/b.rs", "lex", "fn lex() { tokenizer stream }").await;

    let before = store.fts_search("tokenizer", None, 10).await.unwrap();
    store.rebuild_fts().await.unwrap();
    let after = store.fts_search("tokenizer", None, 10).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_vector_search_cosine_ordering() {
    let store = Store::open_in_memory().unwrap();
    let a = seed(&store, "repo", "src/a.rs", "a", "fn a() {}").await;
    let b = seed(&store, "repo", "src/b.rs", "b", "fn b() {}").await;
    store
        .insert_embeddings(vec![
            EmbeddingRecord {
                chunk_id: a.clone(),
                model: "m".to_string(),
                dimension: 2,
                vector: vec![1.0, 0.0],
            },
            EmbeddingRecord {
                chunk_id: b.clone(),
                model: "m".to_string(),
                dimension: 2,
                vector: vec![0.0, 1.0],
            },
        ])
        .await
        .unwrap();

    let hits = store.vector_search(&[1.0, 0.1], "m", None, 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, a);
    assert!(hits[0].similarity > hits[1].similarity);
}

#[tokio::test]
async fn test_vector_search_ties_break_by_chunk_id() {
    let store = Store::open_in_memory().unwrap();
    let a = seed(&store, "repo", "src/a.rs", "a", "fn a() {}").await;
    let b = seed(&store, "repo", "src/b.rs", "b", "fn b() {}").await;
    // Identical vectors — identical similarity.
    for id in [&a, &b] {
        store
            .insert_embeddings(vec![EmbeddingRecord {
                chunk_id: id.clone(),
                model: "m".to_string(),
                dimension: 2,
                vector: vec![0.6, 0.8],
            }])
            .await
            .unwrap();
    }
    let hits = store.vector_search(&[0.6, 0.8], "m", None, 10).await.unwrap();
    let expected_first = if a < b { &a } else { &b };
    assert_eq!(&hits[0].chunk_id, expected_first);
}

#[tokio::test]
async fn test_vector_search_model_isolation() {
    let store = Store::open_in_memory().unwrap();
    let a = seed(&store, "repo", "src/a.rs", "a", "fn a() {}").await;
    store
        .insert_embeddings(vec![EmbeddingRecord {
            chunk_id: a,
            model: "model-one".to_string(),
            dimension: 2,
            vector: vec![1.0, 0.0],
        }])
        .await
        .unwrap();
    let hits = store
        .vector_search(&[1.0, 0.0], "model-two", None, 10)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_symbol_search_exact_before_prefix() {
    let store = Store::open_in_memory().unwrap();
    seed(&store, "repo", "src/user.rs", "getUser", "fn getUser() {}").await;
    seed(&store, "repo", "src/user_by_id.rs", "getUserById", "fn getUserById() {}").await;

    let hits = store.symbol_search("getUser", None, 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].name, "getUser");
    assert!(hits[0].exact);
    assert_eq!(hits[1].name, "getUserById");
    assert!(!hits[1].exact);
    assert!(hits[0].chunk_id.is_some());
}

#[tokio::test]
async fn test_symbol_search_underscores_are_literal() {
    let store = Store::open_in_memory().unwrap();
    seed(&store, "repo", "src/a.rs", "get_user", "fn get_user() {}").await;
    seed(&store, "repo", "src/b.rs", "getXuser", "fn getXuser() {}").await;
    // `_` in the needle must not act as a LIKE wildcard.
    let hits = store.symbol_search("get_user", None, 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "get_user");
}

#[test]
fn test_fts_match_expr_quotes_tokens() {
    assert_eq!(
        fts_match_expr("database connection"),
        Some("\"database\" OR \"connection\"".to_string())
    );
    assert_eq!(
        fts_match_expr("error-handling (auth)"),
        Some("\"error\" OR \"handling\" OR \"auth\"".to_string())
    );
    assert_eq!(fts_match_expr("   "), None);
    assert_eq!(fts_match_expr("!!!"), None);
}

#[test]
fn test_cosine_similarity_basics() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
}

#[test]
fn test_bytes_roundtrip() {
    use zerocopy::AsBytes;
    let v: Vec<f32> = vec![0.25, -1.5, 3.25];
    assert_eq!(bytes_to_f32_vec(v.as_bytes()), v);
}
