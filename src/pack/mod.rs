//! Token-budgeted packing with capsule degradation.
//!
//! A `PackingProfile` describes, per `(repo, model)`, how much each content
//! category is worth and how the budget splits across priority tiers. Items
//! are packed in descending `priority × relevance` order; an item that does
//! not fit is degraded down a fixed ladder (strip → capsule → summarize →
//! drop) until it fits or falls off the end.

pub mod degrade;

pub use degrade::strip_trailing;
pub use degrade::summarize_docs;
pub use degrade::to_capsule;

use serde::Deserialize;
use serde::Serialize;

use crate::error::EngineError;
use crate::error::Result;
use crate::store::Store;
use crate::tokenizer;
use crate::tokenizer::BudgetManager;

/// Content category of a packable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Code,
    Tests,
    Docs,
    Config,
    Memory,
}

impl ItemCategory {
    /// Classify by file path. Memory items are categorized by the caller.
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_lowercase();
        if lower.contains("test") || lower.contains("spec") {
            ItemCategory::Tests
        } else if lower.ends_with(".md") || lower.ends_with(".rst") || lower.ends_with(".txt") {
            ItemCategory::Docs
        } else if lower.ends_with(".toml")
            || lower.ends_with(".yaml")
            || lower.ends_with(".yml")
            || lower.ends_with(".json")
            || lower.ends_with(".ini")
            || lower.ends_with(".cfg")
        {
            ItemCategory::Config
        } else {
            ItemCategory::Code
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemCategory::Code => "code",
            ItemCategory::Tests => "tests",
            ItemCategory::Docs => "docs",
            ItemCategory::Config => "config",
            ItemCategory::Memory => "memory",
        }
    }
}

/// Per-category packing priorities, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Priorities {
    #[serde(default = "default_code_priority")]
    pub code: f32,
    #[serde(default = "default_tests_priority")]
    pub tests: f32,
    #[serde(default = "default_comments_priority")]
    pub comments: f32,
    #[serde(default = "default_docs_priority")]
    pub docs: f32,
    #[serde(default = "default_config_priority")]
    pub config: f32,
    #[serde(default = "default_memory_priority")]
    pub memory: f32,
}

impl Default for Priorities {
    fn default() -> Self {
        Self {
            code: default_code_priority(),
            tests: default_tests_priority(),
            comments: default_comments_priority(),
            docs: default_docs_priority(),
            config: default_config_priority(),
            memory: default_memory_priority(),
        }
    }
}

fn default_code_priority() -> f32 {
    1.0
}
fn default_tests_priority() -> f32 {
    0.7
}
fn default_comments_priority() -> f32 {
    0.5
}
fn default_docs_priority() -> f32 {
    0.6
}
fn default_config_priority() -> f32 {
    0.8
}
fn default_memory_priority() -> f32 {
    0.9
}

impl Priorities {
    pub fn for_category(&self, category: ItemCategory) -> f32 {
        match category {
            ItemCategory::Code => self.code,
            ItemCategory::Tests => self.tests,
            ItemCategory::Docs => self.docs,
            ItemCategory::Config => self.config,
            ItemCategory::Memory => self.memory,
        }
    }
}

/// Budget split across priority tiers. Shares must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub must_have: f32,
    pub important: f32,
    pub supplementary: f32,
    pub optional: f32,
    pub reserve: f32,
}

impl Default for BudgetAllocation {
    fn default() -> Self {
        Self {
            must_have: 0.35,
            important: 0.30,
            supplementary: 0.20,
            optional: 0.10,
            reserve: 0.05,
        }
    }
}

impl BudgetAllocation {
    pub fn sum(&self) -> f32 {
        self.must_have + self.important + self.supplementary + self.optional + self.reserve
    }
}

/// Capsule conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsuleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Upper bound on capsule token size.
    #[serde(default = "default_capsule_max")]
    pub max_size: u32,
    /// Doc summaries never shrink below this many tokens.
    #[serde(default = "default_capsule_min")]
    pub min_size: u32,
    /// Relevance below which items degrade before larger, hotter items.
    #[serde(default = "default_capsule_threshold")]
    pub threshold: f32,
    /// Keep enclosing structure lines in capsules.
    #[serde(default = "default_true")]
    pub preserve_structure: bool,
}

impl Default for CapsuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: default_capsule_max(),
            min_size: default_capsule_min(),
            threshold: default_capsule_threshold(),
            preserve_structure: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_capsule_max() -> u32 {
    256
}
fn default_capsule_min() -> u32 {
    16
}
fn default_capsule_threshold() -> f32 {
    0.5
}

/// Packing profile for one `(repo, model)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingProfile {
    pub repo: String,
    pub model: String,
    #[serde(default)]
    pub priorities: Priorities,
    #[serde(default)]
    pub budget_allocation: BudgetAllocation,
    #[serde(default)]
    pub capsule: CapsuleConfig,
}

impl PackingProfile {
    pub fn new(repo: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            model: model.into(),
            priorities: Priorities::default(),
            budget_allocation: BudgetAllocation::default(),
            capsule: CapsuleConfig::default(),
        }
    }

    /// Load the persisted profile for `(repo, model)`, or the default.
    pub async fn load_or_default(store: &Store, repo: &str, model: &str) -> Self {
        match store.packing_profile(repo, model).await {
            Ok(Some(json)) => match serde_json::from_str::<PackingProfile>(&json) {
                Ok(profile) if profile.validate().is_ok() => profile,
                _ => {
                    tracing::warn!(repo, model, "Unreadable packing profile, using default");
                    Self::new(repo, model)
                }
            },
            _ => Self::new(repo, model),
        }
    }

    /// Persist this profile.
    pub async fn save(&self, store: &Store, now: i64) -> Result<()> {
        let json = serde_json::to_string(self)
            .map_err(|e| EngineError::store_io("serialize packing profile", e))?;
        store
            .save_packing_profile(&self.repo, &self.model, &json, now)
            .await
    }

    pub fn validate(&self) -> Result<()> {
        if (self.budget_allocation.sum() - 1.0).abs() > 0.01 {
            return Err(EngineError::Config {
                field: "packing.budget_allocation".to_string(),
                cause: format!("shares sum to {:.3}, expected 1.0", self.budget_allocation.sum()),
            });
        }
        Ok(())
    }

    /// Stable fingerprint for the bundle signature.
    pub fn fingerprint(&self) -> String {
        format!(
            "p{:.2}:{:.2}:{:.2}:{:.2}:{:.2}:{:.2}|a{:.2}:{:.2}:{:.2}:{:.2}:{:.2}|c{}:{}:{}",
            self.priorities.code,
            self.priorities.tests,
            self.priorities.comments,
            self.priorities.docs,
            self.priorities.config,
            self.priorities.memory,
            self.budget_allocation.must_have,
            self.budget_allocation.important,
            self.budget_allocation.supplementary,
            self.budget_allocation.optional,
            self.budget_allocation.reserve,
            self.capsule.enabled as u8,
            self.capsule.max_size,
            self.capsule.min_size,
        )
    }
}

/// How far an item was degraded to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Degradation {
    Full,
    Stripped,
    Capsule,
    Summarized,
}

impl Degradation {
    pub fn label(&self) -> &'static str {
        match self {
            Degradation::Full => "full",
            Degradation::Stripped => "stripped",
            Degradation::Capsule => "capsule",
            Degradation::Summarized => "summarized",
        }
    }
}

/// One item offered to the packer.
#[derive(Debug, Clone)]
pub struct PackInput {
    pub id: String,
    pub path: String,
    pub symbol: Option<String>,
    pub content: String,
    /// Declaration line used for capsule conversion.
    pub signature: Option<String>,
    pub category: ItemCategory,
    /// Fused relevance score, normalized to [0, 1].
    pub relevance: f32,
}

/// One packed item.
#[derive(Debug, Clone)]
pub struct PackedItem {
    pub id: String,
    pub path: String,
    pub symbol: Option<String>,
    pub content: String,
    pub tokens: u32,
    pub degradation: Degradation,
    pub category: ItemCategory,
    pub relevance: f32,
}

/// An item that fell off the degradation ladder.
#[derive(Debug, Clone)]
pub struct DroppedItem {
    pub id: String,
    pub path: String,
    pub reason: String,
}

/// Packing outcome.
#[derive(Debug, Clone)]
pub struct PackOutcome {
    pub items: Vec<PackedItem>,
    pub dropped: Vec<DroppedItem>,
    pub used_tokens: u32,
    /// At least one item was degraded or dropped for budget reasons.
    pub budget_reached: bool,
    /// An item was blocked specifically by the reserve share.
    pub reached_reserve: bool,
}

/// Pack items under the budget.
///
/// `include_content = false` (small-budget policies) capsules every code
/// item up front instead of offering full content.
pub fn pack(
    mut inputs: Vec<PackInput>,
    profile: &PackingProfile,
    budget_tokens: u32,
    model: &str,
    include_content: bool,
) -> PackOutcome {
    let reserve = (budget_tokens as f32 * profile.budget_allocation.reserve).round() as u32;
    let mut budget = BudgetManager::new(budget_tokens, reserve);

    // Priority-weighted order: priority × relevance, ties by id.
    inputs.sort_by(|a, b| {
        let score_a = profile.priorities.for_category(a.category) * a.relevance;
        let score_b = profile.priorities.for_category(b.category) * b.relevance;
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut outcome = PackOutcome {
        items: Vec::new(),
        dropped: Vec::new(),
        used_tokens: 0,
        budget_reached: false,
        reached_reserve: false,
    };

    // Cumulative tier ceilings: a lower-priority tier can spend its own
    // share plus whatever the tiers above left unused, never more.
    let alloc = &profile.budget_allocation;
    let spendable = budget_tokens.saturating_sub(reserve) as f32;
    let ceilings = [
        (spendable * alloc.must_have) as u32,
        (spendable * (alloc.must_have + alloc.important)) as u32,
        (spendable * (alloc.must_have + alloc.important + alloc.supplementary)) as u32,
        budget_tokens.saturating_sub(reserve),
    ];

    for input in inputs {
        let score = profile.priorities.for_category(input.category) * input.relevance;
        let ceiling = ceilings[tier_index(score)];
        let available = budget
            .remaining()
            .min(ceiling.saturating_sub(budget.used()));
        match fit_item(&input, profile, available, model, include_content) {
            Some((content, tokens, degradation)) => {
                if degradation != Degradation::Full {
                    outcome.budget_reached |= include_content;
                }
                budget.consume(tokens);
                outcome.items.push(PackedItem {
                    id: input.id,
                    path: input.path,
                    symbol: input.symbol,
                    content,
                    tokens,
                    degradation,
                    category: input.category,
                    relevance: input.relevance,
                });
            }
            None => {
                // Even the smallest form was blocked. Distinguish "blocked
                // by the reserve" from plain exhaustion.
                let smallest = tokenizer::count_tokens(
                    &capsule_form(&input, profile),
                    model,
                );
                if smallest <= budget_tokens.saturating_sub(budget.used()) {
                    outcome.reached_reserve = true;
                }
                outcome.budget_reached = true;
                tracing::debug!(id = %input.id, "Dropped item: no degraded form fits");
                outcome.dropped.push(DroppedItem {
                    id: input.id,
                    path: input.path,
                    reason: "budget exhausted after full degradation ladder".to_string(),
                });
            }
        }
    }

    outcome.used_tokens = budget.used();
    outcome
}

/// Tier of a `priority × relevance` score.
fn tier_index(score: f32) -> usize {
    if score >= 0.75 {
        0
    } else if score >= 0.5 {
        1
    } else if score >= 0.25 {
        2
    } else {
        3
    }
}

/// Walk the degradation ladder until a form fits `available` tokens, or
/// return `None`.
fn fit_item(
    input: &PackInput,
    profile: &PackingProfile,
    available: u32,
    model: &str,
    include_content: bool,
) -> Option<(String, u32, Degradation)> {
    let prose = matches!(input.category, ItemCategory::Docs | ItemCategory::Memory);
    let ladder: Vec<(String, Degradation)> = if include_content {
        let mut steps = vec![
            (input.content.clone(), Degradation::Full),
            (strip_trailing(&input.content), Degradation::Stripped),
        ];
        // The capsule step collapses code bodies; prose degrades by
        // summarization instead.
        if prose {
            steps.push((
                summarize_docs(&input.content, profile.capsule.min_size as usize),
                Degradation::Summarized,
            ));
        } else if profile.capsule.enabled {
            steps.push((capsule_form(input, profile), Degradation::Capsule));
        }
        steps
    } else if prose {
        // Content disabled by policy: smallest useful form only.
        vec![(
            summarize_docs(&input.content, profile.capsule.min_size as usize),
            Degradation::Summarized,
        )]
    } else {
        vec![(capsule_form(input, profile), Degradation::Capsule)]
    };

    for (content, degradation) in ladder {
        if content.trim().is_empty() {
            continue;
        }
        let tokens = tokenizer::count_tokens(&content, model);
        if tokens <= available {
            return Some((content, tokens, degradation));
        }
    }
    None
}

fn capsule_form(input: &PackInput, profile: &PackingProfile) -> String {
    to_capsule(
        &input.content,
        input.signature.as_deref(),
        profile.capsule.preserve_structure,
    )
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
