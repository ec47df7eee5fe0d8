//! Rule-based intent classification.
//!
//! Each intent carries a list of keyword patterns. Scoring is count-based:
//!
//! ```text
//! base       = matches / total_patterns
//! bonus      = 0.2 if matches >= 1 else 0
//! mult_bonus = 0.1 * matches
//! score      = min(1.0, base + bonus + mult_bonus)
//! ```
//!
//! The intent with the highest score above its threshold wins; otherwise the
//! query falls back to `search`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

/// Query intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Symbol,
    Config,
    Api,
    Incident,
    /// Fallback when nothing else clears its threshold.
    Search,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Symbol => "symbol",
            Intent::Config => "config",
            Intent::Api => "api",
            Intent::Incident => "incident",
            Intent::Search => "search",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "symbol" => Some(Intent::Symbol),
            "config" => Some(Intent::Config),
            "api" => Some(Intent::Api),
            "incident" => Some(Intent::Incident),
            "search" => Some(Intent::Search),
            _ => None,
        }
    }

    /// All classifiable intents, excluding the fallback.
    pub fn scored() -> [Intent; 4] {
        [Intent::Symbol, Intent::Config, Intent::Api, Intent::Incident]
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of entity extracted from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    Class,
    File,
    Config,
    Route,
}

/// One extracted entity with its byte position in the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub text: String,
    pub position: usize,
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Winning score, clamped to [0, 1].
    pub confidence: f32,
    pub entities: Vec<Entity>,
    /// Intent labels ordered by descending score, for policy suggestion.
    pub suggested_policies: Vec<String>,
}

/// Keyword patterns per intent. Multi-word patterns match as substrings,
/// single words match on token boundaries.
fn patterns(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Symbol => &[
            "function",
            "definition",
            "method",
            "class",
            "struct",
            "symbol",
            "declaration",
            "signature",
            "where is",
            "defined",
        ],
        Intent::Config => &[
            "config",
            "configuration",
            "setting",
            "settings",
            "environment variable",
            "env var",
            "option",
            "flag",
            "toml",
            "yaml",
        ],
        Intent::Api => &[
            "api",
            "endpoint",
            "route",
            "request",
            "response",
            "handler",
            "rest",
            "http",
            "graphql",
            "webhook",
        ],
        Intent::Incident => &[
            "error",
            "error handling",
            "exception",
            "crash",
            "panic",
            "bug",
            "incident",
            "failure",
            "failing",
            "broken",
            "stack trace",
            "regression",
        ],
        Intent::Search => &[],
    }
}

/// Rule-based intent classifier.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    /// Per-intent minimum winning score.
    threshold: f32,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self { threshold: 0.2 }
    }

    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Classify a query.
    pub fn classify(&self, query: &str) -> Classification {
        let lowered = query.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
            .filter(|w| !w.is_empty())
            .collect();

        let mut scores: Vec<(Intent, f32)> = Intent::scored()
            .into_iter()
            .map(|intent| (intent, score_intent(intent, &lowered, &words)))
            .collect();
        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.label().cmp(b.0.label()))
        });

        let suggested_policies: Vec<String> = scores
            .iter()
            .filter(|(_, s)| *s > 0.0)
            .map(|(i, _)| i.label().to_string())
            .chain(std::iter::once(Intent::Search.label().to_string()))
            .collect();

        let (intent, confidence) = match scores.first() {
            Some(&(intent, score)) if score > self.threshold => (intent, score),
            _ => (Intent::Search, fallback_confidence(&words)),
        };

        tracing::debug!(
            query = %query,
            intent = %intent,
            confidence,
            "Query classified"
        );

        Classification {
            intent,
            confidence,
            entities: extract_entities(query),
            suggested_policies,
        }
    }
}

/// The count-based scoring formula.
fn score_intent(intent: Intent, lowered_query: &str, words: &[&str]) -> f32 {
    let pats = patterns(intent);
    if pats.is_empty() {
        return 0.0;
    }
    let matches = pats
        .iter()
        .filter(|&&p| {
            if p.contains(' ') {
                lowered_query.contains(p)
            } else {
                words.contains(&p)
            }
        })
        .count();
    if matches == 0 {
        return 0.0;
    }
    let base = matches as f32 / pats.len() as f32;
    let bonus = 0.2;
    let mult_bonus = 0.1 * matches as f32;
    (base + bonus + mult_bonus).min(1.0)
}

/// Confidence reported for the `search` fallback: longer queries give the
/// lexical lanes more to work with.
fn fallback_confidence(words: &[&str]) -> f32 {
    (0.2 + 0.05 * words.len() as f32).min(0.5)
}

// ========== Entity extraction ==========

static RE_FUNCTION_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:fn|func|function|method|def)\s+([A-Za-z_][A-Za-z0-9_]*)").expect("static regex")
});
static RE_CAMEL_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([a-z][a-z0-9]*(?:[A-Z][a-z0-9]*)+)\b").expect("static regex"));
static RE_SNAKE_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([a-z][a-z0-9]*(?:_[a-z0-9]+)+)\b").expect("static regex"));
static RE_CLASS_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:class|struct|trait|interface|enum)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("static regex")
});
static RE_PASCAL_IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)+)\b").expect("static regex")
});
static RE_FILE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([\w./-]+\.(?:rs|py|ts|tsx|js|jsx|go|java|kt|rb|c|h|cpp|md|toml|yaml|yml|json|ini|cfg))\b")
        .expect("static regex")
});
static RE_ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+)\b").expect("static regex"));
static RE_DOTTED_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([a-z][a-z0-9_]*(?:\.[a-z0-9_]+)+)\b").expect("static regex"));
static RE_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(/[A-Za-z0-9_{}:.-]+(?:/[A-Za-z0-9_{}:.-]+)*)").expect("static regex"));

/// Extract entities with their positions. Deduplicated on (kind, position).
pub fn extract_entities(query: &str) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut push = |kind: EntityKind, re: &Regex| {
        for cap in re.captures_iter(query) {
            let m = cap.get(1).expect("regex has one capture group");
            entities.push(Entity {
                kind,
                text: m.as_str().to_string(),
                position: m.start(),
            });
        }
    };

    push(EntityKind::File, &RE_FILE_PATH);
    push(EntityKind::Function, &RE_FUNCTION_KEYWORD);
    push(EntityKind::Function, &RE_CAMEL_IDENT);
    push(EntityKind::Function, &RE_SNAKE_IDENT);
    push(EntityKind::Class, &RE_CLASS_KEYWORD);
    push(EntityKind::Class, &RE_PASCAL_IDENT);
    push(EntityKind::Config, &RE_ENV_VAR);
    push(EntityKind::Config, &RE_DOTTED_KEY);
    push(EntityKind::Route, &RE_ROUTE);

    // A file-path match shadows identifier matches inside it.
    let file_ranges: Vec<(usize, usize)> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::File)
        .map(|e| (e.position, e.position + e.text.len()))
        .collect();
    entities.retain(|e| {
        e.kind == EntityKind::File
            || !file_ranges
                .iter()
                .any(|&(start, end)| e.position >= start && e.position < end)
    });

    entities.sort_by_key(|e| (e.position, e.text.len()));
    entities.dedup_by(|a, b| a.position == b.position && a.kind == b.kind);
    entities
}

#[cfg(test)]
#[path = "intent.test.rs"]
mod tests;
