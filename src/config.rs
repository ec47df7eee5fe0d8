//! Configuration for the assembly engine.
//!
//! Loaded from TOML (project-level `.ctxpack/config.toml`, then the global
//! `~/.ctxpack/config.toml`), then overridden from the environment: a config
//! entry `a.b.c` maps to the variable `CTXPACK_A_B_C`. Secrets (reranker API
//! keys) are read from the environment only and never persisted or logged.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::EngineError;
use crate::error::Result;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "CTXPACK";

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Directory holding the store database and on-disk caches.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Default model used for token counting when the caller names none.
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default)]
    pub lanes: LaneConfig,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub rerank: RerankConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub explain: ExplainConfig,

    #[serde(default)]
    pub policy: PolicyOverrides,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_model: default_model(),
            lanes: LaneConfig::default(),
            fusion: FusionConfig::default(),
            rerank: RerankConfig::default(),
            cache: CacheConfig::default(),
            explain: ExplainConfig::default(),
            policy: PolicyOverrides::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ctxpack")
}

fn default_model() -> String {
    "gpt-4".to_string()
}

/// Retrieval-lane execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaneConfig {
    /// Per-lane soft timeout in milliseconds. Expired lanes contribute
    /// nothing and log.
    #[serde(default = "default_lane_timeout_ms")]
    pub timeout_ms: u64,

    /// Candidates fetched per lane before fusion.
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Cap on fused candidates passed into graph expansion.
    #[serde(default = "default_graph_seed_cap")]
    pub graph_seed_cap: usize,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lane_timeout_ms(),
            candidate_limit: default_candidate_limit(),
            graph_seed_cap: default_graph_seed_cap(),
        }
    }
}

fn default_lane_timeout_ms() -> u64 {
    2_000
}
fn default_candidate_limit() -> usize {
    50
}
fn default_graph_seed_cap() -> usize {
    50
}

/// Fusion parameters for the seed-mix optimizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusionConfig {
    /// RRF constant k.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Early stop fires when the score at the threshold position falls below
    /// this fraction of the top score.
    #[serde(default = "default_early_stop_ratio")]
    pub early_stop_score_ratio: f32,

    /// Maximum chunks kept per file after fusion (0 = unlimited).
    #[serde(default = "default_max_chunks_per_file")]
    pub max_chunks_per_file: usize,

    /// Entries in the derived-weight memo cache.
    #[serde(default = "default_weight_cache_entries")]
    pub weight_cache_entries: usize,

    /// Lifetime of memoized weight vectors, in seconds.
    #[serde(default = "default_weight_cache_ttl_secs")]
    pub weight_cache_ttl_secs: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            early_stop_score_ratio: default_early_stop_ratio(),
            max_chunks_per_file: default_max_chunks_per_file(),
            weight_cache_entries: default_weight_cache_entries(),
            weight_cache_ttl_secs: default_weight_cache_ttl_secs(),
        }
    }
}

fn default_rrf_k() -> f32 {
    60.0
}
fn default_early_stop_ratio() -> f32 {
    0.3
}
fn default_max_chunks_per_file() -> usize {
    2
}
fn default_weight_cache_entries() -> usize {
    256
}
fn default_weight_cache_ttl_secs() -> u64 {
    300
}

/// Reranker provider selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankConfig {
    /// Provider name: `cross-encoder`, `api`, or `rrf`.
    #[serde(default = "default_rerank_provider")]
    pub provider: String,

    /// Model identifier forwarded to the provider and baked into cache keys.
    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// Remote endpoint for the `api` provider.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout for the `api` provider, in seconds.
    #[serde(default = "default_rerank_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key. The value itself never
    /// appears in config files or logs.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: default_rerank_provider(),
            model: default_rerank_model(),
            endpoint: None,
            timeout_secs: default_rerank_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_rerank_provider() -> String {
    "rrf".to_string()
}
fn default_rerank_model() -> String {
    "rank-fusion".to_string()
}
fn default_rerank_timeout_secs() -> u64 {
    10
}
fn default_api_key_env() -> String {
    format!("{ENV_PREFIX}_RERANK_API_KEY")
}

/// In-process cache sizing. TTLs in seconds, 0 entries = unbounded LRU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Version baked into every cache key; bump to invalidate everything.
    #[serde(default = "default_cache_version")]
    pub version: u32,

    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: u64,
    #[serde(default = "default_search_max_entries")]
    pub search_max_entries: usize,

    #[serde(default = "default_bundle_ttl_secs")]
    pub bundle_ttl_secs: u64,
    #[serde(default = "default_bundle_max_entries")]
    pub bundle_max_entries: usize,

    #[serde(default = "default_rerank_ttl_secs")]
    pub rerank_ttl_secs: u64,

    #[serde(default = "default_index_ttl_secs")]
    pub index_ttl_secs: u64,
    #[serde(default = "default_index_max_entries")]
    pub index_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: default_cache_version(),
            search_ttl_secs: default_search_ttl_secs(),
            search_max_entries: default_search_max_entries(),
            bundle_ttl_secs: default_bundle_ttl_secs(),
            bundle_max_entries: default_bundle_max_entries(),
            rerank_ttl_secs: default_rerank_ttl_secs(),
            index_ttl_secs: default_index_ttl_secs(),
            index_max_entries: default_index_max_entries(),
        }
    }
}

fn default_cache_version() -> u32 {
    1
}
fn default_search_ttl_secs() -> u64 {
    300
}
fn default_search_max_entries() -> usize {
    1000
}
fn default_bundle_ttl_secs() -> u64 {
    1800
}
fn default_bundle_max_entries() -> usize {
    500
}
fn default_rerank_ttl_secs() -> u64 {
    86_400
}
fn default_index_ttl_secs() -> u64 {
    600
}
fn default_index_max_entries() -> usize {
    200
}

/// Explainer rendering options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplainConfig {
    /// Maximum preview lines per content section.
    #[serde(default = "default_preview_lines")]
    pub preview_lines: usize,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            preview_lines: default_preview_lines(),
        }
    }
}

fn default_preview_lines() -> usize {
    20
}

/// Declarative policy adjustments applied after the base derivation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyOverrides {
    /// Per-repository overrides, matched by glob on the repo name. Later
    /// entries win on conflict.
    #[serde(default)]
    pub repos: Vec<RepoPolicyOverride>,

    /// Per-language multipliers applied to the seed weights, keyed by
    /// language name (e.g. "rust", "python").
    #[serde(default)]
    pub language_multipliers: HashMap<String, LaneMultipliers>,
}

/// Override block for repositories matching a glob pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepoPolicyOverride {
    /// Glob on the repo name (`*` and `?` wildcards).
    pub pattern: String,
    #[serde(default)]
    pub max_depth: Option<u8>,
    #[serde(default)]
    pub early_stop_threshold: Option<u8>,
    #[serde(default)]
    pub include_content: Option<bool>,
    #[serde(default)]
    pub seed_weights: Option<LaneMultipliers>,
}

/// One value per retrieval lane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LaneMultipliers {
    #[serde(default = "default_one")]
    pub vector: f32,
    #[serde(default = "default_one")]
    pub bm25: f32,
    #[serde(default = "default_one")]
    pub memory: f32,
    #[serde(default = "default_one")]
    pub symbol: f32,
}

impl Default for LaneMultipliers {
    fn default() -> Self {
        Self {
            vector: 1.0,
            bm25: 1.0,
            memory: 1.0,
            symbol: 1.0,
        }
    }
}

fn default_one() -> f32 {
    1.0
}

/// Non-fatal configuration issue, reported at startup.
#[derive(Debug, Clone)]
pub enum ConfigWarning {
    /// Path does not exist yet (it will be created on first use).
    PathNotExists { field: &'static str, path: PathBuf },
    /// Suspicious numeric value that is still usable.
    SuspiciousValue { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::PathNotExists { field, path } => {
                write!(f, "config `{field}` path does not exist: {path:?}")
            }
            ConfigWarning::SuspiciousValue { field, reason } => {
                write!(f, "config `{field}`: {reason}")
            }
        }
    }
}

impl EngineConfig {
    /// Load configuration for a workspace.
    ///
    /// Search order (first found wins):
    /// 1. `{workdir}/.ctxpack/config.toml`
    /// 2. `~/.ctxpack/config.toml`
    /// 3. built-in defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load(workdir: &Path) -> Result<Self> {
        let mut config = {
            let project = workdir.join(".ctxpack/config.toml");
            if project.exists() {
                Self::from_file(&project)?
            } else if let Some(global) = dirs::home_dir()
                .map(|h| h.join(".ctxpack/config.toml"))
                .filter(|p| p.exists())
            {
                Self::from_file(&global)?
            } else {
                Self::default()
            }
        };
        config.apply_env_overrides(std::env::vars())?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| EngineError::ConfigParse {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })
    }

    /// Apply `CTXPACK_*` environment overrides.
    ///
    /// Each overridable entry has a fixed variable name; unknown `CTXPACK_*`
    /// variables are ignored so unrelated tooling can share the prefix.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(suffix) = name.strip_prefix(&format!("{ENV_PREFIX}_")) else {
                continue;
            };
            match suffix {
                "DATA_DIR" => self.data_dir = PathBuf::from(value),
                "DEFAULT_MODEL" => self.default_model = value,
                "LANES_TIMEOUT_MS" => {
                    self.lanes.timeout_ms = parse_env(&name, &value)?;
                }
                "LANES_CANDIDATE_LIMIT" => {
                    self.lanes.candidate_limit = parse_env(&name, &value)?;
                }
                "FUSION_RRF_K" => {
                    self.fusion.rrf_k = parse_env(&name, &value)?;
                }
                "FUSION_MAX_CHUNKS_PER_FILE" => {
                    self.fusion.max_chunks_per_file = parse_env(&name, &value)?;
                }
                "RERANK_PROVIDER" => self.rerank.provider = value,
                "RERANK_MODEL" => self.rerank.model = value,
                "RERANK_ENDPOINT" => self.rerank.endpoint = Some(value),
                "RERANK_TIMEOUT_SECS" => {
                    self.rerank.timeout_secs = parse_env(&name, &value)?;
                }
                "CACHE_VERSION" => {
                    self.cache.version = parse_env(&name, &value)?;
                }
                "EXPLAIN_PREVIEW_LINES" => {
                    self.explain.preview_lines = parse_env(&name, &value)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate hard invariants. Violations are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.lanes.timeout_ms == 0 {
            return Err(EngineError::Config {
                field: "lanes.timeout_ms".to_string(),
                cause: "must be positive".to_string(),
            });
        }
        if self.lanes.candidate_limit == 0 {
            return Err(EngineError::Config {
                field: "lanes.candidate_limit".to_string(),
                cause: "must be positive".to_string(),
            });
        }
        if !(self.fusion.rrf_k.is_finite() && self.fusion.rrf_k > 0.0) {
            return Err(EngineError::Config {
                field: "fusion.rrf_k".to_string(),
                cause: format!("must be positive, got {}", self.fusion.rrf_k),
            });
        }
        if !(0.0..=1.0).contains(&self.fusion.early_stop_score_ratio) {
            return Err(EngineError::Config {
                field: "fusion.early_stop_score_ratio".to_string(),
                cause: format!(
                    "must be within [0,1], got {}",
                    self.fusion.early_stop_score_ratio
                ),
            });
        }
        match self.rerank.provider.as_str() {
            "cross-encoder" | "api" | "rrf" => {}
            other => {
                return Err(EngineError::Config {
                    field: "rerank.provider".to_string(),
                    cause: format!("unknown provider `{other}`"),
                });
            }
        }
        if self.rerank.provider == "api" && self.rerank.endpoint.is_none() {
            return Err(EngineError::Config {
                field: "rerank.endpoint".to_string(),
                cause: "required when rerank.provider = \"api\"".to_string(),
            });
        }
        Ok(())
    }

    /// Collect non-fatal issues worth surfacing at startup.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if !self.data_dir.exists() {
            warnings.push(ConfigWarning::PathNotExists {
                field: "data_dir",
                path: self.data_dir.clone(),
            });
        }
        if self.lanes.timeout_ms > 30_000 {
            warnings.push(ConfigWarning::SuspiciousValue {
                field: "lanes.timeout_ms",
                reason: format!("{}ms exceeds any sensible lane budget", self.lanes.timeout_ms),
            });
        }
        if self.explain.preview_lines > 200 {
            warnings.push(ConfigWarning::SuspiciousValue {
                field: "explain.preview_lines",
                reason: format!("{} preview lines defeats budgeting", self.explain.preview_lines),
            });
        }
        warnings
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| EngineError::Config {
        field: name.to_string(),
        cause: format!("invalid override value `{value}`: {e}"),
    })
}

/// Glob match supporting `*` and `?`, used for repo pattern overrides.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..]))
            }
            (Some(b'?'), Some(_)) => inner(&p[1..], &t[1..]),
            (Some(a), Some(b)) if a == b => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
#[path = "config.test.rs"]
mod tests;
