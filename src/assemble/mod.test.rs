use super::*;

use crate::cache::CacheManager;
use crate::config::EngineConfig;
use crate::types::ChunkRecord;
use crate::types::EmbeddingRecord;
use crate::types::FileRecord;
use crate::types::MemoryKind;
use crate::types::MemoryRecord;
use crate::types::MemoryScope;
use crate::types::RefKind;
use crate::types::RefOrigin;
use crate::types::ReferenceRecord;
use crate::types::SpanKind;

const NOW: i64 = 1_700_000_000;

struct Fixture {
    assembler: Assembler,
    store: Store,
}

fn build_assembler(store: Store) -> Assembler {
    let config = Arc::new(EngineConfig::default());
    let cache = Arc::new(CacheManager::new(&config.cache));
    let reranker = Arc::new(
        Reranker::from_config(&config.rerank, store.clone(), None).expect("rrf reranker"),
    );
    Assembler::new(store, config, cache, reranker)
}

/// Index one function file and return its chunk id.
async fn index_fn(store: &Store, path: &str, name: &str, body: &str) -> (String, String) {
    let content = format!("fn {name}() {{\n{body}\n}}");
    let file = FileRecord::new("repo", path, content.as_bytes(), "rust");
    let span = crate::types::SpanRecord::new(
        "repo",
        path,
        0,
        content.len() as u64,
        SpanKind::Function,
        Some(name.to_string()),
        Some(format!("fn {name}()")),
        None,
        vec![],
    );
    let chunk = ChunkRecord::new(&span, &content, NOW);
    let ids = (span.id.clone(), chunk.id.clone());
    store
        .upsert_file(file, vec![span], vec![chunk], vec![])
        .await
        .unwrap();
    ids
}

async fn fixture() -> Fixture {
    let store = Store::open_in_memory().unwrap();

    index_fn(
        &store,
        "src/user.rs",
        "getUserById",
        "    lookup_user(id)",
    )
    .await;
    index_fn(
        &store,
        "src/db.rs",
        "open_pool",
        "    // database connection config lives in settings.toml\n    connect(settings)",
    )
    .await;
    index_fn(
        &store,
        "src/auth.rs",
        "authenticate",
        "    // authentication error handling wraps provider failures\n    verify(token)",
    )
    .await;

    store
        .put_memory(MemoryRecord::new(
            MemoryScope::Repo,
            Some("repo".to_string()),
            MemoryKind::Gotcha,
            Some("auth".to_string()),
            "authentication retries must back off or the provider locks the account",
            NOW,
        ))
        .await
        .unwrap();

    Fixture {
        assembler: build_assembler(store.clone()),
        store,
    }
}

fn request(query: &str, budget: u32) -> AssembleRequest {
    AssembleRequest {
        query: query.to_string(),
        repo: Some("repo".to_string()),
        budget,
        model: Some("gpt-4".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_symbol_lookup_scenario() {
    let f = fixture().await;
    let bundle = f
        .assembler
        .assemble(request("getUserById function definition", 3_000))
        .await
        .unwrap();

    assert!(bundle.item_count() >= 1);
    // The definition span of getUserById is the top item.
    let top = bundle.items().next().unwrap();
    assert_eq!(top.file, "src/user.rs");
    assert_eq!(top.symbol.as_deref(), Some("getUserById"));
    assert_eq!(bundle.evidence[0].rank, 0);
    assert!(bundle.total_tokens <= 3_000);
    assert_eq!(bundle.model, "gpt-4");
}

#[tokio::test]
async fn test_config_lookup_scenario() {
    let f = fixture().await;
    let bundle = f
        .assembler
        .assemble(request("database connection config", 3_000))
        .await
        .unwrap();

    assert!(bundle.item_count() >= 1);
    let top = bundle.items().next().unwrap();
    assert_eq!(top.file, "src/db.rs");
    // Evidence is search/code flavored, not graph flavored.
    assert!(matches!(
        bundle.evidence[0].edge_type,
        EvidenceEdge::Search | EvidenceEdge::Code
    ));
}

#[tokio::test]
async fn test_incident_scenario_consults_memory() {
    let f = fixture().await;
    let bundle = f
        .assembler
        .assemble(request("authentication error handling", 6_000))
        .await
        .unwrap();

    // The memory lane contributed the gotcha.
    assert!(bundle
        .evidence
        .iter()
        .any(|e| e.edge_type == EvidenceEdge::Memory));
    assert!(bundle
        .sources
        .iter()
        .any(|group| group.source_type == "memory"));
}

#[tokio::test]
async fn test_incident_scenario_walks_graph_edges() {
    let f = fixture().await;

    // Add caller/callee edges around authenticate: login -> authenticate.
    // The caller body shares no terms with the query, so it can only enter
    // the bundle through the graph lane.
    let content = "fn login() {\n    run_session_flow()\n}";
    let file = FileRecord::new("repo", "src/login.rs", content.as_bytes(), "rust");
    let span = crate::types::SpanRecord::new(
        "repo",
        "src/login.rs",
        0,
        content.len() as u64,
        SpanKind::Function,
        Some("login".to_string()),
        Some("fn login()".to_string()),
        None,
        vec![],
    );
    let chunk = ChunkRecord::new(&span, content, NOW);
    let auth_span = f.store.spans_for_file("repo", "src/auth.rs").await.unwrap();
    let reference = ReferenceRecord {
        src_span_id: span.id.clone(),
        dst_path: "src/auth.rs".to_string(),
        byte_start: auth_span[0].byte_start,
        byte_end: auth_span[0].byte_end,
        kind: RefKind::Call,
        origin: RefOrigin::Scip,
    };
    f.store
        .upsert_file(file, vec![span], vec![chunk], vec![reference])
        .await
        .unwrap();

    let bundle = f
        .assembler
        .assemble(request("authentication error handling", 6_000))
        .await
        .unwrap();

    assert!(
        bundle
            .evidence
            .iter()
            .any(|e| e.edge_type == EvidenceEdge::Graph),
        "expected a graph evidence row: {:?}",
        bundle.evidence
    );
}

#[tokio::test]
async fn test_budget_exhaustion_scenario() {
    let f = fixture().await;
    let bundle = f
        .assembler
        .assemble(request("getUserById function definition", 500))
        .await
        .unwrap();

    assert!(bundle.total_tokens <= 500);
    assert!(bundle.stopping_reasons.contains(StoppingReason::BudgetReached));
    // Small budgets disable content: items arrive as capsules.
    for item in bundle.items() {
        assert!(
            matches!(
                item.degradation,
                crate::pack::Degradation::Capsule | crate::pack::Degradation::Summarized
            ),
            "unexpected degradation {:?}",
            item.degradation
        );
    }
}

#[tokio::test]
async fn test_repeat_query_served_from_cache_with_identical_order() {
    let f = fixture().await;
    let req = request("getUserById function definition", 3_000);

    let first = f.assembler.assemble(req.clone()).await.unwrap();
    let second = f.assembler.assemble(req).await.unwrap();

    let first_ids: Vec<&str> = first.items().map(|i| i.id.as_str()).collect();
    let second_ids: Vec<&str> = second.items().map(|i| i.id.as_str()).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(first.id, second.id);
    // Every evidence row of the repeat is cache-marked.
    assert!(second.evidence.iter().all(|e| e.cached));
}

#[tokio::test]
async fn test_evidence_rank_matches_item_order() {
    let f = fixture().await;
    let bundle = f
        .assembler
        .assemble(request("authentication error handling", 6_000))
        .await
        .unwrap();

    let ranks: Vec<u32> = bundle.evidence.iter().map(|e| e.rank).collect();
    let sorted = {
        let mut r = ranks.clone();
        r.sort_unstable();
        r
    };
    assert_eq!(ranks, sorted);
    assert_eq!(bundle.evidence.len(), bundle.item_count());
}

#[tokio::test]
async fn test_deadline_returns_partial_with_user_limit() {
    let f = fixture().await;
    let mut req = request("authentication error handling", 3_000);
    req.deadline = Some(Duration::from_millis(0));

    let started = std::time::Instant::now();
    let bundle = f.assembler.assemble(req).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(bundle
        .stopping_reasons
        .contains(StoppingReason::UserLimitReached));
    assert_eq!(
        bundle.stopping_reasons.primary(),
        StoppingReason::UserLimitReached
    );
}

#[tokio::test]
async fn test_cancellation_token() {
    let f = fixture().await;
    let token = CancellationToken::new();
    token.cancel();
    let mut req = request("getUserById", 3_000);
    req.cancel = Some(token);

    let bundle = f.assembler.assemble(req).await.unwrap();
    assert!(bundle
        .stopping_reasons
        .contains(StoppingReason::UserLimitReached));
}

#[tokio::test]
async fn test_empty_store_reports_lanes_exhausted() {
    let store = Store::open_in_memory().unwrap();
    let assembler = build_assembler(store);
    let bundle = assembler
        .assemble(request("anything whatsoever", 2_000))
        .await
        .unwrap();

    assert_eq!(bundle.item_count(), 0);
    assert!(bundle
        .stopping_reasons
        .contains(StoppingReason::AllLanesExhausted));
}

#[tokio::test]
async fn test_vector_lane_participates_with_embeddings() {
    let f = fixture().await;
    let (_, chunk_id) = index_fn(&f.store, "src/vec.rs", "vector_target", "    embedded()").await;
    f.store
        .insert_embeddings(vec![EmbeddingRecord {
            chunk_id,
            model: "embed-model".to_string(),
            dimension: 2,
            vector: vec![1.0, 0.0],
        }])
        .await
        .unwrap();

    let mut req = request("unrelated words entirely", 3_000);
    req.query_vector = Some(vec![1.0, 0.0]);
    req.embedding_model = Some("embed-model".to_string());
    let bundle = f.assembler.assemble(req).await.unwrap();

    assert!(bundle.items().any(|i| i.file == "src/vec.rs"));
    let vec_evidence = bundle
        .evidence
        .iter()
        .find(|e| e.file == "src/vec.rs")
        .unwrap();
    assert_eq!(vec_evidence.reason, "semantic match");
}

#[tokio::test]
async fn test_session_id_carried_through() {
    let f = fixture().await;
    let mut req = request("getUserById", 2_500);
    req.session_id = Some("session-7".to_string());
    let bundle = f.assembler.assemble(req).await.unwrap();
    assert_eq!(bundle.session_id.as_deref(), Some("session-7"));
}
