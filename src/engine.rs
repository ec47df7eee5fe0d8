//! Engine facade: one handle wiring the store, caches, reranker and
//! assembler together. Thin shells (CLI, MCP, editors) talk to this.

use std::sync::Arc;

use crate::assemble::AssembleRequest;
use crate::assemble::Assembler;
use crate::assemble::Bundle;
use crate::cache::CacheManager;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::explain;
use crate::learn::LearningLoop;
use crate::learn::Proposal;
use crate::rerank::CrossEncoderScorer;
use crate::rerank::Reranker;
use crate::store::Store;
use crate::types::MemoryKind;
use crate::types::MemoryRecord;
use crate::types::MemoryScope;

/// The assembled engine.
pub struct Engine {
    config: Arc<EngineConfig>,
    store: Store,
    assembler: Assembler,
    learning: LearningLoop,
}

impl Engine {
    /// Open the engine with an optional cross-encoder scorer.
    ///
    /// Validates config, opens (or creates) the store, and wires the
    /// pipeline. Configuration errors are fatal here, at startup.
    pub fn open(config: EngineConfig, scorer: Option<Arc<dyn CrossEncoderScorer>>) -> Result<Self> {
        config.validate()?;
        for warning in config.warnings() {
            tracing::warn!(%warning, "Configuration warning");
        }

        let store = Store::open(&config.data_dir)?;
        Self::with_store(config, store, scorer)
    }

    /// Wire the engine over an existing store. Test seam.
    pub fn with_store(
        config: EngineConfig,
        store: Store,
        scorer: Option<Arc<dyn CrossEncoderScorer>>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let cache = Arc::new(CacheManager::new(&config.cache));
        let reranker = Arc::new(Reranker::from_config(
            &config.rerank,
            store.clone(),
            scorer,
        )?);
        let assembler = Assembler::new(
            store.clone(),
            Arc::clone(&config),
            cache,
            reranker,
        );
        let learning = LearningLoop::new(store.clone());
        Ok(Self {
            config,
            store,
            assembler,
            learning,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Assemble a context bundle.
    pub async fn assemble(&self, request: AssembleRequest) -> Result<Bundle> {
        self.assembler.assemble(request).await
    }

    /// Render a bundle's explanation as Markdown.
    pub fn explain(&self, bundle: &Bundle) -> String {
        explain::render(bundle, &self.config.explain)
    }

    /// Persist a memory note.
    pub async fn remember(
        &self,
        scope: MemoryScope,
        repo: Option<String>,
        kind: MemoryKind,
        key: Option<String>,
        value: String,
    ) -> Result<MemoryRecord> {
        let now = chrono::Utc::now().timestamp();
        let memory = MemoryRecord::new(scope, repo, kind, key, value, now);
        self.store.put_memory(memory.clone()).await?;
        Ok(memory)
    }

    /// Run one learning batch; adopt the proposal when `adopt` is set.
    pub async fn learn_step(&self, adopt: bool) -> Result<Option<Proposal>> {
        let now = chrono::Utc::now().timestamp();
        let proposal = self.learning.run_batch(now).await?;
        if adopt {
            if let Some(proposal) = &proposal {
                self.learning.adopt(proposal, now).await?;
            }
        }
        Ok(proposal)
    }

    /// Health probe. A failing integrity check is fatal to the process.
    pub async fn health_check(&self) -> Result<()> {
        self.store.integrity_check().await
    }
}
