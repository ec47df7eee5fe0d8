use super::*;

use crate::types::SessionRecord;

const NOW: i64 = 1_700_000_000;

async fn store_with_session() -> Store {
    let store = Store::open_in_memory().unwrap();
    store
        .start_session(SessionRecord {
            id: "s1".to_string(),
            tool: "cli".to_string(),
            user: "dev".to_string(),
            repo: Some("repo".to_string()),
            branch: None,
            started_at: NOW,
            finished_at: None,
        })
        .await
        .unwrap();
    store
}

async fn record(store: &Store, query: &str, satisfied: bool) {
    let id = store
        .record_interaction("s1", NOW, query, None)
        .await
        .unwrap();
    store.mark_satisfied(id, satisfied, None).await.unwrap();
}

#[test]
fn test_default_params_mirror_policy_table() {
    let params = LearnedParams::default();
    assert_eq!(params.rrf_k, 60.0);
    let symbol = params.seed_weights.get("symbol").unwrap();
    assert_eq!(*symbol, SeedWeights::new(1.2, 0.8, 1.0, 2.0));
    assert_eq!(params.early_stop.get("incident"), Some(&5));
    assert_eq!(params.early_stop.get("search"), Some(&10));
}

#[tokio::test]
async fn test_empty_batch_yields_no_proposal() {
    let store = store_with_session().await;
    let learning = LearningLoop::new(store);
    let proposal = learning.run_batch(NOW).await.unwrap();
    assert!(proposal.is_none());
}

#[tokio::test]
async fn test_satisfied_outcomes_raise_weights() {
    let store = store_with_session().await;
    for _ in 0..4 {
        record(&store, "getUserById function definition", true).await;
    }
    let learning = LearningLoop::new(store);
    let proposal = learning.run_batch(NOW).await.unwrap().unwrap();

    let old = proposal.old.seed_weights.get("symbol").unwrap();
    let new = proposal.new.seed_weights.get("symbol").unwrap();
    // Win rate 1.0 → gradient +η·0.5 on every lane.
    assert!(new.symbol > old.symbol);
    assert!((new.symbol - (old.symbol + 0.025)).abs() < 1e-4);
    // RRF k tightens on good outcomes.
    assert_eq!(proposal.new.rrf_k, 55.0);
    assert!(!proposal.deltas.is_empty());
    assert!(proposal.l2_norm > 0.0);
}

#[tokio::test]
async fn test_unsatisfied_outcomes_lower_weights_and_widen_k() {
    let store = store_with_session().await;
    for _ in 0..4 {
        record(&store, "database connection config", false).await;
    }
    let learning = LearningLoop::new(store);
    let proposal = learning.run_batch(NOW).await.unwrap().unwrap();

    let old = proposal.old.seed_weights.get("config").unwrap();
    let new = proposal.new.seed_weights.get("config").unwrap();
    assert!(new.bm25 < old.bm25);
    assert_eq!(proposal.new.rrf_k, 65.0);
}

#[tokio::test]
async fn test_weights_bounded() {
    let store = store_with_session().await;
    record(&store, "symbol function definition", true).await;
    let learning = LearningLoop::new(store.clone());

    // Drive many adopted steps; weights must stay in [0, 5] and k in
    // [30, 120].
    let mut last = None;
    for step in 0..20 {
        let Some(proposal) = learning.run_batch(NOW + step).await.unwrap() else {
            break;
        };
        learning.adopt(&proposal, NOW + step).await.unwrap();
        last = Some(proposal);
    }
    let params = learning.current_params().await.unwrap();
    for weights in params.seed_weights.values() {
        for w in [weights.vector, weights.bm25, weights.memory, weights.symbol] {
            assert!((WEIGHT_MIN..=WEIGHT_MAX).contains(&w));
        }
    }
    assert!((RRF_K_MIN..=RRF_K_MAX).contains(&params.rrf_k));
    assert!(last.is_some());
}

#[tokio::test]
async fn test_adoption_creates_version_chain() {
    let store = store_with_session().await;
    record(&store, "api endpoint handler", true).await;
    let learning = LearningLoop::new(store.clone());

    let proposal = learning.run_batch(NOW).await.unwrap().unwrap();
    let v1 = learning.adopt(&proposal, NOW).await.unwrap();
    let proposal2 = learning.run_batch(NOW + 1).await.unwrap().unwrap();
    let v2 = learning.adopt(&proposal2, NOW + 1).await.unwrap();

    let (head, _, parent) = store.latest_policy_version().await.unwrap().unwrap();
    assert_eq!(head, v2);
    assert_eq!(parent, Some(v1));

    // Adopted parameters are what the loop reports as current.
    let current = learning.current_params().await.unwrap();
    assert_eq!(current, proposal2.new);
}

#[tokio::test]
async fn test_rollback_restores_previous_params() {
    let store = store_with_session().await;
    record(&store, "api endpoint handler", true).await;
    let learning = LearningLoop::new(store.clone());

    let p1 = learning.run_batch(NOW).await.unwrap().unwrap();
    learning.adopt(&p1, NOW).await.unwrap();
    let p2 = learning.run_batch(NOW + 1).await.unwrap().unwrap();
    learning.adopt(&p2, NOW + 1).await.unwrap();

    let rolled = learning.rollback(NOW + 2).await.unwrap();
    assert!(rolled.is_some());
    let current = learning.current_params().await.unwrap();
    assert_eq!(current, p1.new);
}

#[tokio::test]
async fn test_rollback_without_history_is_noop() {
    let store = store_with_session().await;
    let learning = LearningLoop::new(store);
    assert!(learning.rollback(NOW).await.unwrap().is_none());
}

#[tokio::test]
async fn test_batch_failure_recorded_as_job() {
    // A store with no session: recording interactions is impossible, so the
    // batch sees no data and reports cleanly instead of failing.
    let store = Store::open_in_memory().unwrap();
    let learning = LearningLoop::new(store);
    let proposal = learning.run_batch(NOW).await.unwrap();
    assert!(proposal.is_none());
}

#[test]
fn test_convergence_on_identical_params() {
    let params = LearnedParams::default();
    let deltas = diff(&params, &params);
    assert!(deltas.is_empty());
    let proposal = Proposal {
        old: params.clone(),
        new: params,
        deltas,
        l2_norm: 0.0,
        interactions: 1,
    };
    assert!(proposal.converged());
}

#[test]
fn test_early_stop_moves_toward_median() {
    let mut old = LearnedParams::default();
    old.early_stop.insert("symbol".to_string(), 6);
    let mut medians = BTreeMap::new();
    medians.insert("symbol".to_string(), 3u8);
    let mut signals = BTreeMap::new();
    signals.insert(
        "symbol".to_string(),
        IntentSignal {
            satisfied: 1,
            total: 2,
        },
    );
    let new = adjust(&old, &signals, &medians);
    // One step only: 6 → 5.
    assert_eq!(new.early_stop.get("symbol"), Some(&5));
}
