//! Query preprocessing for the retrieval lanes.
//!
//! Code identifiers and natural language need different handling: an
//! identifier like `getUserById` must keep its exact shape for the symbol
//! lane (no stemming, no stopword removal) while a sentence benefits from
//! both. The lexical lane's porter tokenizer does its own stemming, so the
//! stemmed tokens here only feed ranking heuristics; the memory lane gets
//! unstemmed lowercase terms because memory matching is substring-based.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use rust_stemmers::Algorithm;
use rust_stemmers::Stemmer;

/// Detected query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// Single identifier: camelCase, snake_case or one bare word.
    CodeIdentifier,
    /// Free text.
    NaturalLanguage,
}

/// Preprocessed query, ready for lane dispatch.
#[derive(Debug, Clone)]
pub struct ProcessedQuery {
    pub original: String,
    pub query_type: QueryType,
    /// Cleaned tokens; stemmed for natural-language queries.
    pub tokens: Vec<String>,
    /// Unstemmed lowercase terms for memory search.
    pub memory_terms: Vec<String>,
    /// The symbol-lane needle, when the query names an identifier.
    pub identifier: Option<String>,
}

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "does", "for", "from", "how", "in",
        "is", "it", "of", "on", "or", "that", "the", "this", "to", "what", "when", "where",
        "which", "who", "why", "with",
    ]
    .into_iter()
    .collect()
});

static STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));

/// Query preprocessor. Stateless; construct once and reuse.
#[derive(Debug, Clone, Default)]
pub struct QueryPreprocessor;

impl QueryPreprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Detect the query shape.
    pub fn detect(query: &str) -> QueryType {
        if is_identifier(query.trim()) {
            QueryType::CodeIdentifier
        } else {
            QueryType::NaturalLanguage
        }
    }

    /// Process a query for lane dispatch.
    pub fn process(&self, query: &str) -> ProcessedQuery {
        match Self::detect(query) {
            QueryType::CodeIdentifier => self.process_identifier(query),
            QueryType::NaturalLanguage => self.process_natural_language(query),
        }
    }

    /// Identifier query: preserve the exact needle, split it into terms for
    /// the other lanes, skip stemming entirely.
    fn process_identifier(&self, query: &str) -> ProcessedQuery {
        let needle = query.trim().to_string();
        let parts = split_identifier(&needle);
        ProcessedQuery {
            original: query.to_string(),
            query_type: QueryType::CodeIdentifier,
            memory_terms: parts.clone(),
            tokens: parts,
            identifier: Some(needle),
        }
    }

    /// Natural language: tokenize, drop stopwords, stem. An embedded
    /// identifier-looking word still feeds the symbol lane.
    fn process_natural_language(&self, query: &str) -> ProcessedQuery {
        let raw_tokens: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let filtered: Vec<String> = raw_tokens
            .iter()
            .filter(|t| !STOP_WORDS.contains(t.as_str()))
            .cloned()
            .collect();

        let tokens: Vec<String> = filtered
            .iter()
            .map(|t| STEMMER.stem(t).to_string())
            .collect();

        // First embedded identifier (camelCase or snake_case word) becomes
        // the symbol needle.
        let identifier = query
            .split_whitespace()
            .find(|w| w.contains('_') || has_case_transition(w))
            .map(str::to_string);

        ProcessedQuery {
            original: query.to_string(),
            query_type: QueryType::NaturalLanguage,
            tokens,
            memory_terms: filtered,
            identifier,
        }
    }
}

/// Whether a trimmed query is a bare identifier.
pub fn is_identifier(s: &str) -> bool {
    if s.is_empty() || s.contains(char::is_whitespace) {
        return false;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Split an identifier on snake_case and camelCase boundaries.
///
/// `calculateUserScore` and `calculate_user_score` both yield
/// `["calculate", "user", "score"]`.
pub fn split_identifier(ident: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    for c in ident.chars() {
        if c == '_' {
            if !current.is_empty() {
                terms.push(current.to_lowercase());
                current.clear();
            }
        } else if c.is_uppercase() && !current.is_empty() && !current.ends_with(char::is_uppercase)
        {
            terms.push(current.to_lowercase());
            current.clear();
            current.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        terms.push(current.to_lowercase());
    }
    terms.retain(|t| t.len() >= 2);
    terms
}

fn has_case_transition(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    chars
        .windows(2)
        .any(|w| w[0].is_lowercase() && w[1].is_uppercase())
}

#[cfg(test)]
#[path = "preprocessor.test.rs"]
mod tests;
