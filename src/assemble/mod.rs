//! The bundle assembler: the pipeline entry point.
//!
//! classify → derive policy → sweep lanes → fuse → expand graph → rerank →
//! pack → emit bundle with evidence and stopping reasons. Lane failures are
//! absorbed; reranker failures fall through to rank fusion; running out of
//! budget is a stopping reason, never an error. A caller-supplied deadline
//! or cancellation token yields a partial bundle marked `UserLimitReached`.

pub mod bundle;

pub use bundle::Bundle;
pub use bundle::BundleItem;
pub use bundle::Evidence;
pub use bundle::EvidenceEdge;
pub use bundle::LaneReport;
pub use bundle::SourceGroup;
pub use bundle::StoppingReason;
pub use bundle::StoppingReasons;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::CacheManager;
use crate::cache::Namespace;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::Direction;
use crate::graph::ReferenceGraph;
use crate::ids;
use crate::pack;
use crate::pack::ItemCategory;
use crate::pack::PackInput;
use crate::pack::PackingProfile;
use crate::query::policy;
use crate::query::Intent;
use crate::query::IntentClassifier;
use crate::query::PolicyContext;
use crate::query::PolicyDecision;
use crate::query::QueryPreprocessor;
use crate::rerank::RerankCandidate;
use crate::rerank::Reranker;
use crate::search::fuse_with_report;
use crate::search::lanes::LaneRequest;
use crate::search::limit_chunks_per_file;
use crate::search::run_lanes;
use crate::search::FusedCandidate;
use crate::search::Lane;
use crate::search::LaneOutput;
use crate::search::WeightMemo;
use crate::store::Store;
use crate::tokenizer;
use crate::types::CandidateKind;
use crate::types::SpanRecord;

/// Fraction of the bundle budget that guards graph traversal.
const GRAPH_BUDGET_SHARE: f32 = 0.25;

/// Relevance assigned to graph-discovered items, divided by their depth.
const GRAPH_BASE_RELEVANCE: f32 = 0.45;

/// One assembly request.
#[derive(Debug, Clone, Default)]
pub struct AssembleRequest {
    pub query: String,
    pub repo: Option<String>,
    pub branch: Option<String>,
    /// Target model; defaults to the configured one.
    pub model: Option<String>,
    /// Token budget for the bundle.
    pub budget: u32,
    pub session_id: Option<String>,
    pub language: Option<String>,
    /// Pre-computed query embedding for the vector lane.
    pub query_vector: Option<Vec<f32>>,
    /// Model the query embedding (and stored embeddings) belong to.
    pub embedding_model: Option<String>,
    /// Overall deadline; expiry returns a partial bundle.
    pub deadline: Option<Duration>,
    /// External cancellation; firing returns a partial bundle.
    pub cancel: Option<CancellationToken>,
}

/// Per-candidate provenance collected during assembly.
#[derive(Debug, Clone)]
struct EvidenceMeta {
    edge: EvidenceEdge,
    reason: String,
    score: f32,
}

/// State shared with the deadline path: whatever has been gathered so far.
#[derive(Default)]
struct PartialState {
    inputs: Vec<PackInput>,
    meta: HashMap<String, EvidenceMeta>,
    lanes: Vec<LaneReport>,
    conditions: Vec<StoppingReason>,
    provider: String,
    rerank_cached: bool,
}

/// Graph data cached per `(repo, model)`.
struct GraphData {
    graph: ReferenceGraph,
    /// span id → (chunk id, path, content, signature, name)
    chunks: HashMap<String, GraphChunk>,
}

#[derive(Clone)]
struct GraphChunk {
    chunk_id: String,
    path: String,
    content: String,
    signature: Option<String>,
    name: Option<String>,
}

/// The assembler.
pub struct Assembler {
    store: Store,
    config: Arc<EngineConfig>,
    cache: Arc<CacheManager>,
    reranker: Arc<Reranker>,
    classifier: IntentClassifier,
    preprocessor: QueryPreprocessor,
    weight_memo: WeightMemo,
}

impl Assembler {
    pub fn new(
        store: Store,
        config: Arc<EngineConfig>,
        cache: Arc<CacheManager>,
        reranker: Arc<Reranker>,
    ) -> Self {
        let weight_memo = WeightMemo::new(
            config.fusion.weight_cache_entries,
            Duration::from_secs(config.fusion.weight_cache_ttl_secs),
        );
        Self {
            store,
            config,
            cache,
            reranker,
            classifier: IntentClassifier::new(),
            preprocessor: QueryPreprocessor::new(),
            weight_memo,
        }
    }

    /// Assemble a bundle for one query.
    pub async fn assemble(&self, request: AssembleRequest) -> Result<Bundle> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let repo_label = request.repo.clone().unwrap_or_default();

        let classification = self.classifier.classify(&request.query);
        let policy = policy::derive(
            classification.intent,
            &PolicyContext {
                confidence: classification.confidence,
                query_length: request.query.chars().count(),
                token_budget: request.budget,
                repo: request.repo.clone(),
                language: request.language.clone(),
            },
            &self.config.policy,
        );

        tracing::info!(
            query = %request.query,
            intent = %classification.intent,
            confidence = classification.confidence,
            budget = request.budget,
            model = %model,
            "Assembly started"
        );

        // Bundle cache: keyed by everything that shapes the output.
        let query_vector_tag = request
            .query_vector
            .as_deref()
            .map(|v| {
                use zerocopy::AsBytes;
                ids::sha256_hex(v.as_bytes())
            })
            .unwrap_or_default();
        let bundle_payload = format!(
            "bundle|{}|{}|{}|{}|{}|{}",
            request.query,
            repo_label,
            model,
            request.budget,
            policy.fingerprint(),
            query_vector_tag,
        );
        let bundle_key = self.cache.key(Namespace::Bundle, &bundle_payload);
        if let Some(mut cached) = self.cache.get::<Bundle>(Namespace::Bundle, &bundle_key).await {
            tracing::debug!(key = %bundle_key, "Bundle cache hit");
            cached.mark_cached();
            return Ok(cached);
        }

        let partial = Arc::new(StdMutex::new(PartialState {
            provider: "rrf".to_string(),
            ..Default::default()
        }));
        let cancel = request.cancel.clone().unwrap_or_default();

        let inner = self.assemble_inner(
            &request,
            &model,
            &classification.intent,
            classification.confidence,
            &policy,
            Arc::clone(&partial),
        );
        tokio::pin!(inner);

        let bundle = match request.deadline {
            Some(deadline) => {
                tokio::select! {
                    result = &mut inner => result?,
                    () = tokio::time::sleep(deadline) => {
                        tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Assembly deadline hit");
                        self.partial_bundle(&request, &model, &policy, &partial).await
                    }
                    () = cancel.cancelled() => {
                        tracing::warn!("Assembly cancelled");
                        self.partial_bundle(&request, &model, &policy, &partial).await
                    }
                }
            }
            None => {
                tokio::select! {
                    result = &mut inner => result?,
                    () = cancel.cancelled() => {
                        tracing::warn!("Assembly cancelled");
                        self.partial_bundle(&request, &model, &policy, &partial).await
                    }
                }
            }
        };

        // Partial bundles are not cached; they reflect a deadline, not data.
        if !bundle.stopping_reasons.contains(StoppingReason::UserLimitReached) {
            self.cache
                .insert(Namespace::Bundle, &bundle_key, bundle.clone())
                .await;
        }

        let now = chrono::Utc::now().timestamp();
        if let Err(err) = self
            .store
            .log_search(&request.query, now, bundle.item_count())
            .await
        {
            tracing::warn!(error = %err, "Failed to append search log");
        }

        tracing::info!(
            items = bundle.item_count(),
            tokens = bundle.total_tokens,
            stopping = %bundle.stopping_reasons.primary(),
            "Assembly finished"
        );
        Ok(bundle)
    }

    /// The uninterrupted pipeline.
    async fn assemble_inner(
        &self,
        request: &AssembleRequest,
        model: &str,
        intent: &Intent,
        confidence: f32,
        policy: &PolicyDecision,
        partial: Arc<StdMutex<PartialState>>,
    ) -> Result<Bundle> {
        let processed = self.preprocessor.process(&request.query);
        let now = chrono::Utc::now().timestamp();

        // Lane sweep, read-through cached in the search namespace. The
        // query vector participates in the key: the same text with a
        // different embedding is a different search.
        let vector_tag = request
            .query_vector
            .as_deref()
            .map(|v| {
                use zerocopy::AsBytes;
                ids::sha256_hex(v.as_bytes())
            })
            .unwrap_or_default();
        let lane_payload = format!(
            "lanes|{}|{}|{}|{}|{}|{}",
            request.query,
            request.repo.as_deref().unwrap_or(""),
            policy.fingerprint(),
            self.config.lanes.candidate_limit,
            request.embedding_model.as_deref().unwrap_or(""),
            vector_tag,
        );
        let lane_key = self.cache.key(Namespace::Search, &lane_payload);
        let lane_output: LaneOutput = self
            .cache
            .get_or_compute(Namespace::Search, &lane_key, || async {
                Ok(run_lanes(
                    &self.store,
                    LaneRequest {
                        processed: &processed,
                        policy,
                        query_vector: request.query_vector.as_deref(),
                        embedding_model: request.embedding_model.as_deref().unwrap_or(model),
                        repo: request.repo.as_deref(),
                        branch: request.branch.as_deref(),
                        limit: self.config.lanes.candidate_limit,
                        timeout: Duration::from_millis(self.config.lanes.timeout_ms),
                        now,
                    },
                )
                .await)
            })
            .await?;

        {
            let mut state = partial.lock().expect("partial state lock");
            state.lanes = lane_output.statuses.iter().map(LaneReport::from).collect();
        }

        let all_lanes_empty = lane_output.all_empty();

        // Fusion.
        let weights = self.weight_memo.effective(*intent, confidence, policy);
        let (fused, early_stopped) = fuse_with_report(
            &lane_output.lanes,
            weights,
            self.config.fusion.rrf_k,
            policy.early_stop_threshold as usize,
            self.config.fusion.early_stop_score_ratio,
        );
        let fused = limit_chunks_per_file(fused, self.config.fusion.max_chunks_per_file);

        // Hydrate candidates and record provenance.
        let (mut inputs, mut meta, span_by_chunk) = self.hydrate(&fused).await?;
        {
            let mut state = partial.lock().expect("partial state lock");
            state.inputs = inputs.clone();
            state.meta = meta.clone();
            if early_stopped {
                state.conditions.push(StoppingReason::EarlyStopThreshold);
            }
            if all_lanes_empty {
                state.conditions.push(StoppingReason::AllLanesExhausted);
            }
        }

        // Rerank the fused candidates.
        let rerank_inputs: Vec<RerankCandidate> = inputs
            .iter()
            .map(|input| RerankCandidate {
                id: input.id.clone(),
                content: input.content.clone(),
            })
            .collect();
        let outcome = self.reranker.rerank(&request.query, &rerank_inputs).await;
        let (provider, rerank_cached, fell_back) = match outcome {
            Ok(outcome) => {
                let position: HashMap<&str, usize> = outcome
                    .order
                    .iter()
                    .enumerate()
                    .map(|(idx, id)| (id.as_str(), idx))
                    .collect();
                inputs.sort_by_key(|input| {
                    position.get(input.id.as_str()).copied().unwrap_or(usize::MAX)
                });
                (outcome.provider, outcome.cached, outcome.fell_back)
            }
            Err(err) => {
                // Store-level cache failure under the reranker: keep the
                // fused order and note the fallback.
                tracing::warn!(error = %err, "Rerank step unavailable, keeping fused order");
                ("rrf".to_string(), false, Some(err.to_string()))
            }
        };
        {
            let mut state = partial.lock().expect("partial state lock");
            state.provider = provider.clone();
            state.rerank_cached = rerank_cached;
        }
        if let Some(cause) = fell_back {
            tracing::debug!(cause = %cause, "Rerank fell back to rank fusion");
        }

        // Graph expansion from the top reranked code candidates.
        let mut conditions: Vec<StoppingReason> = Vec::new();
        if early_stopped {
            conditions.push(StoppingReason::EarlyStopThreshold);
        }
        if all_lanes_empty {
            conditions.push(StoppingReason::AllLanesExhausted);
        }
        if !policy.include_content && request.budget < 2_000 {
            // The budget forced content off before packing even started.
            conditions.push(StoppingReason::BudgetReached);
        }

        if let Some(repo) = request.repo.as_deref() {
            if policy.max_depth > 0 && !span_by_chunk.is_empty() {
                let seeds: Vec<String> = inputs
                    .iter()
                    .filter_map(|input| span_by_chunk.get(&input.id))
                    .map(|span| span.id.clone())
                    .take(self.config.lanes.graph_seed_cap)
                    .collect();
                let graph_budget = (request.budget as f32 * GRAPH_BUDGET_SHARE) as u32;
                let expansion = self
                    .expand_graph(repo, model, &seeds, policy.max_depth, graph_budget)
                    .await;

                if let Some((expansion, graph_data)) = expansion {
                    if expansion.depth_capped {
                        conditions.push(StoppingReason::GraphDepthCap);
                    }
                    let seen: HashSet<&str> =
                        span_by_chunk.values().map(|span| span.id.as_str()).collect();
                    for node in &expansion.nodes {
                        if seen.contains(node.span_id.as_str()) {
                            continue;
                        }
                        let Some(chunk) = graph_data.chunks.get(&node.span_id) else {
                            continue;
                        };
                        if meta.contains_key(&chunk.chunk_id) {
                            continue;
                        }
                        let relevance = GRAPH_BASE_RELEVANCE / node.depth as f32;
                        inputs.push(PackInput {
                            id: chunk.chunk_id.clone(),
                            path: chunk.path.clone(),
                            symbol: chunk.name.clone(),
                            content: chunk.content.clone(),
                            signature: chunk.signature.clone(),
                            category: ItemCategory::from_path(&chunk.path),
                            relevance,
                        });
                        meta.insert(
                            chunk.chunk_id.clone(),
                            EvidenceMeta {
                                edge: EvidenceEdge::Graph,
                                reason: format!(
                                    "graph neighbor via {} (depth {})",
                                    node.via.label(),
                                    node.depth
                                ),
                                score: node.confidence * relevance,
                            },
                        );
                    }
                    let mut state = partial.lock().expect("partial state lock");
                    state.inputs = inputs.clone();
                    state.meta = meta.clone();
                }
            }
        }

        // Pack under the budget.
        let profile = PackingProfile::load_or_default(
            &self.store,
            request.repo.as_deref().unwrap_or(""),
            model,
        )
        .await;
        let outcome = pack::pack(
            inputs,
            &profile,
            request.budget,
            model,
            policy.include_content,
        );

        if outcome.budget_reached {
            conditions.push(StoppingReason::BudgetReached);
        }
        if outcome.reached_reserve {
            conditions.push(StoppingReason::ReachedTokenReserve);
        }

        let bundle = self
            .finish_bundle(
                request,
                model,
                policy,
                &profile,
                outcome,
                &meta,
                {
                    let state = partial.lock().expect("partial state lock");
                    state.lanes.clone()
                },
                conditions,
                provider,
                rerank_cached,
                &span_by_chunk,
            )
            .await;
        Ok(bundle)
    }

    /// Hydrate fused candidates into packable inputs with provenance.
    ///
    /// Returns the inputs (fused order), the evidence metadata per id, and
    /// the chunk-id → span mapping used for graph seeding.
    async fn hydrate(
        &self,
        fused: &[FusedCandidate],
    ) -> Result<(
        Vec<PackInput>,
        HashMap<String, EvidenceMeta>,
        HashMap<String, SpanRecord>,
    )> {
        let top_score = fused.first().map(|f| f.score).unwrap_or(0.0);

        let code_ids: Vec<String> = fused
            .iter()
            .filter(|f| f.candidate.kind == CandidateKind::Code)
            .map(|f| f.candidate.id.clone())
            .collect();
        let chunks = self.store.chunks_by_ids(code_ids).await?;
        let chunk_by_id: HashMap<&str, &crate::types::ChunkRecord> =
            chunks.iter().map(|c| (c.id.as_str(), c)).collect();

        let span_ids: Vec<String> = chunks.iter().map(|c| c.span_id.clone()).collect();
        let spans = self.store.spans_by_ids(span_ids).await?;
        let span_by_id: HashMap<&str, &SpanRecord> =
            spans.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut inputs = Vec::with_capacity(fused.len());
        let mut meta = HashMap::new();
        let mut span_by_chunk: HashMap<String, SpanRecord> = HashMap::new();

        for fused_candidate in fused {
            let relevance = if top_score > 0.0 {
                (fused_candidate.score / top_score).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let lane = fused_candidate.primary_lane();

            match fused_candidate.candidate.kind {
                CandidateKind::Code => {
                    let Some(chunk) = chunk_by_id.get(fused_candidate.candidate.id.as_str()) else {
                        continue; // candidate vanished between search and hydration
                    };
                    let span = span_by_id.get(chunk.span_id.as_str());
                    if let Some(span) = span {
                        span_by_chunk.insert(chunk.id.clone(), (*span).clone());
                    }
                    let symbol = fused_candidate
                        .candidate
                        .symbol
                        .clone()
                        .or_else(|| span.and_then(|s| s.name.clone()));
                    inputs.push(PackInput {
                        id: chunk.id.clone(),
                        path: chunk.path.clone(),
                        symbol,
                        content: chunk.content.clone(),
                        signature: span.and_then(|s| s.signature.clone()),
                        category: ItemCategory::from_path(&chunk.path),
                        relevance,
                    });
                    meta.insert(
                        chunk.id.clone(),
                        EvidenceMeta {
                            edge: lane_edge(lane),
                            reason: lane_reason(lane).to_string(),
                            score: fused_candidate.score,
                        },
                    );
                }
                CandidateKind::Memory => {
                    let Some(memory) =
                        self.store.memory(&fused_candidate.candidate.id).await?
                    else {
                        continue;
                    };
                    inputs.push(PackInput {
                        id: memory.id.clone(),
                        path: format!("memory:{}", memory.kind.label()),
                        symbol: memory.key.clone(),
                        content: memory.value.clone(),
                        signature: None,
                        category: ItemCategory::Memory,
                        relevance,
                    });
                    meta.insert(
                        memory.id.clone(),
                        EvidenceMeta {
                            edge: EvidenceEdge::Memory,
                            reason: "memory recall".to_string(),
                            score: fused_candidate.score,
                        },
                    );
                }
            }
        }
        Ok((inputs, meta, span_by_chunk))
    }

    /// Load (or build) the cached reference graph and expand from seeds.
    async fn expand_graph(
        &self,
        repo: &str,
        model: &str,
        seeds: &[String],
        max_depth: u8,
        token_budget: u32,
    ) -> Option<(crate::graph::Expansion, Arc<GraphData>)> {
        let key = self
            .cache
            .key(Namespace::Index, &format!("graph|{repo}|{model}"));
        let store = self.store.clone();
        let model = model.to_string();
        let repo_owned = repo.to_string();
        let graph_data: Arc<GraphData> = match self
            .cache
            .get_or_compute(Namespace::Index, &key, || async move {
                let spans = store.spans_for_repo(&repo_owned).await?;
                let references = store.references_for_repo(&repo_owned).await?;
                let firsts = store.first_chunks_for_repo(&repo_owned).await?;

                let mut chunks = HashMap::new();
                let mut costs = HashMap::new();
                let span_by_id: HashMap<&str, &SpanRecord> =
                    spans.iter().map(|s| (s.id.as_str(), s)).collect();
                for (span_id, chunk) in firsts {
                    costs.insert(
                        span_id.clone(),
                        tokenizer::count_tokens(&chunk.content, &model),
                    );
                    let span = span_by_id.get(span_id.as_str());
                    chunks.insert(
                        span_id,
                        GraphChunk {
                            chunk_id: chunk.id,
                            path: chunk.path,
                            content: chunk.content,
                            signature: span.and_then(|s| s.signature.clone()),
                            name: span.and_then(|s| s.name.clone()),
                        },
                    );
                }
                let graph = ReferenceGraph::build(&spans, &references, &costs);
                Ok(Arc::new(GraphData { graph, chunks }))
            })
            .await
        {
            Ok(data) => data,
            Err(err) => {
                // Graph is an enrichment lane: failures are absorbed.
                tracing::warn!(error = %err, "Graph construction failed, skipping expansion");
                return None;
            }
        };

        let expansion =
            graph_data
                .graph
                .expand(seeds, Direction::Both, max_depth, token_budget);
        tracing::debug!(
            nodes = expansion.nodes.len(),
            edges = expansion.edges.len(),
            truncated = expansion.truncated,
            depth_capped = expansion.depth_capped,
            "Graph expansion finished"
        );
        Some((expansion, graph_data))
    }

    /// Turn a pack outcome into the final bundle.
    #[allow(clippy::too_many_arguments)]
    async fn finish_bundle(
        &self,
        request: &AssembleRequest,
        model: &str,
        policy: &PolicyDecision,
        profile: &PackingProfile,
        outcome: pack::PackOutcome,
        meta: &HashMap<String, EvidenceMeta>,
        lanes: Vec<LaneReport>,
        conditions: Vec<StoppingReason>,
        provider: String,
        rerank_cached: bool,
        span_by_chunk: &HashMap<String, SpanRecord>,
    ) -> Bundle {
        let mut evidence = Vec::with_capacity(outcome.items.len());
        let mut code_group: Vec<BundleItem> = Vec::new();
        let mut memory_group: Vec<BundleItem> = Vec::new();
        let mut graph_group: Vec<BundleItem> = Vec::new();

        for (rank, item) in outcome.items.iter().enumerate() {
            let default_meta = EvidenceMeta {
                edge: EvidenceEdge::Search,
                reason: "semantic match".to_string(),
                score: item.relevance,
            };
            let item_meta = meta.get(&item.id).unwrap_or(&default_meta);
            evidence.push(Evidence {
                file: item.path.clone(),
                symbol: item.symbol.clone(),
                reason: item_meta.reason.clone(),
                edge_type: item_meta.edge,
                rank: rank as u32,
                cached: rerank_cached,
                score: item_meta.score,
            });

            let bundle_item = BundleItem {
                id: item.id.clone(),
                file: item.path.clone(),
                symbol: item.symbol.clone(),
                content: item.content.clone(),
                tokens: item.tokens,
                degradation: item.degradation,
                category: item.category,
                score: item_meta.score,
            };
            match item_meta.edge {
                EvidenceEdge::Graph => graph_group.push(bundle_item),
                EvidenceEdge::Memory => memory_group.push(bundle_item),
                _ => code_group.push(bundle_item),
            }
        }

        let mut sources = Vec::new();
        for (source_type, items) in [
            ("code", code_group),
            ("memory", memory_group),
            ("graph", graph_group),
        ] {
            if items.is_empty() {
                continue;
            }
            let tokens = items.iter().map(|i| i.tokens).sum();
            sources.push(SourceGroup {
                source_type: source_type.to_string(),
                items,
                tokens,
            });
        }

        // Content signature of the inputs that produced this bundle.
        let item_ids: Vec<String> = outcome.items.iter().map(|i| i.id.clone()).collect();
        let ranges: Vec<(u64, u64)> = outcome
            .items
            .iter()
            .map(|item| {
                span_by_chunk
                    .get(&item.id)
                    .map(|span| (span.byte_start, span.byte_end))
                    .unwrap_or((0, 0))
            })
            .collect();
        let signature = ids::bundle_signature(
            &item_ids,
            &ranges,
            &policy.fingerprint(),
            &profile.fingerprint(),
            tokenizer::tokenizer_for(model).name(),
        );

        Bundle {
            id: signature,
            query: request.query.clone(),
            repository: request.repo.clone().unwrap_or_default(),
            session_id: request.session_id.clone(),
            evidence,
            stopping_reasons: StoppingReasons::from_conditions(conditions),
            total_tokens: outcome.used_tokens,
            budget: request.budget,
            model: model.to_string(),
            provider,
            sources,
            lanes,
        }
    }

    /// Bundle whatever the pipeline had gathered when the deadline fired.
    async fn partial_bundle(
        &self,
        request: &AssembleRequest,
        model: &str,
        policy: &PolicyDecision,
        partial: &Arc<StdMutex<PartialState>>,
    ) -> Bundle {
        let (inputs, meta, lanes, mut conditions, provider, rerank_cached) = {
            let state = partial.lock().expect("partial state lock");
            (
                state.inputs.clone(),
                state.meta.clone(),
                state.lanes.clone(),
                state.conditions.clone(),
                state.provider.clone(),
                state.rerank_cached,
            )
        };
        conditions.push(StoppingReason::UserLimitReached);

        let profile = PackingProfile::load_or_default(
            &self.store,
            request.repo.as_deref().unwrap_or(""),
            model,
        )
        .await;
        let outcome = pack::pack(
            inputs,
            &profile,
            request.budget,
            model,
            policy.include_content,
        );
        if outcome.budget_reached {
            conditions.push(StoppingReason::BudgetReached);
        }

        self.finish_bundle(
            request,
            model,
            policy,
            &profile,
            outcome,
            &meta,
            lanes,
            conditions,
            provider,
            rerank_cached,
            &HashMap::new(),
        )
        .await
    }
}

/// Evidence edge for a fusion lane.
fn lane_edge(lane: Lane) -> EvidenceEdge {
    match lane {
        Lane::Symbol => EvidenceEdge::Code,
        Lane::Bm25 | Lane::Vector => EvidenceEdge::Search,
        Lane::Memory => EvidenceEdge::Memory,
        Lane::Graph => EvidenceEdge::Graph,
    }
}

/// Human-readable inclusion reason for a fusion lane.
fn lane_reason(lane: Lane) -> &'static str {
    match lane {
        Lane::Vector => "semantic match",
        Lane::Bm25 => "lexical match",
        Lane::Symbol => "symbol definition",
        Lane::Memory => "memory recall",
        Lane::Graph => "graph neighbor",
    }
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
