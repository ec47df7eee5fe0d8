//! Deterministic content-addressed identifiers.
//!
//! Every persisted id is a hex-encoded SHA-256 over a fixed serialization of
//! its inputs. The exact byte layout is part of the on-disk contract: two
//! implementations hashing the same inputs must produce identical ids, so no
//! whitespace normalization or locale-dependent formatting is applied.
//! Separators are literal `|` bytes; absent fields serialize as `""`.

use sha2::Digest;
use sha2::Sha256;

use crate::types::SpanKind;

/// SHA-256 of raw bytes, hex-encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    format!("{hash:x}")
}

/// Content hash of a file: `sha256(raw_bytes)`.
pub fn file_content_hash(raw: &[u8]) -> String {
    sha256_hex(raw)
}

/// Stable span id.
///
/// `sha256(repo|path|byte_start|byte_end|kind|name|signature|sha256(doc)|sha256(parents_joined))`
/// where `parents_joined` is the enclosing span names joined by `|`.
#[allow(clippy::too_many_arguments)]
pub fn span_id(
    repo: &str,
    path: &str,
    byte_start: u64,
    byte_end: u64,
    kind: SpanKind,
    name: Option<&str>,
    signature: Option<&str>,
    doc: Option<&str>,
    parents: &[String],
) -> String {
    let doc_hash = sha256_hex(doc.unwrap_or("").as_bytes());
    let parents_hash = sha256_hex(parents.join("|").as_bytes());
    let payload = format!(
        "{repo}|{path}|{byte_start}|{byte_end}|{kind}|{name}|{signature}|{doc_hash}|{parents_hash}",
        kind = kind.label(),
        name = name.unwrap_or(""),
        signature = signature.unwrap_or(""),
    );
    sha256_hex(payload.as_bytes())
}

/// Chunk id: `sha256(span_id|sha256(content))`.
pub fn chunk_id(span_id: &str, content: &str) -> String {
    let content_hash = sha256_hex(content.as_bytes());
    sha256_hex(format!("{span_id}|{content_hash}").as_bytes())
}

/// Rerank cache key: `sha256(provider|model|query|ids_sorted_ascending.join("|"))`.
///
/// Candidate ids are sorted so that two calls over the same candidate set
/// collide regardless of input order.
pub fn rerank_cache_key(provider: &str, model: &str, query: &str, candidate_ids: &[String]) -> String {
    let mut sorted: Vec<&str> = candidate_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let payload = format!("{provider}|{model}|{query}|{}", sorted.join("|"));
    sha256_hex(payload.as_bytes())
}

/// Memory id: `sha256(scope|repo|branch|kind|key|sha256(value))`.
///
/// Identical notes in the same scope collapse to one row.
pub fn memory_id(
    scope: &str,
    repo: Option<&str>,
    branch: Option<&str>,
    kind: &str,
    key: Option<&str>,
    value: &str,
) -> String {
    let value_hash = sha256_hex(value.as_bytes());
    let payload = format!(
        "{scope}|{repo}|{branch}|{kind}|{key}|{value_hash}",
        repo = repo.unwrap_or(""),
        branch = branch.unwrap_or(""),
        key = key.unwrap_or(""),
    );
    sha256_hex(payload.as_bytes())
}

/// Bundle signature over the inputs that shaped a bundle.
///
/// Invalidates the bundle cache when candidates, their ranges, the derived
/// policy, the packing profile, or the tokenizer change.
pub fn bundle_signature(
    candidate_ids: &[String],
    ranges: &[(u64, u64)],
    policy_fingerprint: &str,
    profile_fingerprint: &str,
    tokenizer_name: &str,
) -> String {
    let ids = candidate_ids.join("|");
    let ranges: Vec<String> = ranges.iter().map(|(s, e)| format!("{s}-{e}")).collect();
    let payload = format!(
        "{ids}|{ranges}|{policy_fingerprint}|{profile_fingerprint}|{tokenizer_name}",
        ranges = ranges.join("|"),
    );
    sha256_hex(payload.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        // sha256("") — the canonical empty digest
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_span_id_is_pure() {
        let parents = vec!["UserService".to_string()];
        let a = span_id(
            "repo",
            "src/auth.rs",
            10,
            200,
            SpanKind::Function,
            Some("login"),
            Some("fn login(&self) -> Result<()>"),
            Some("Authenticates the user."),
            &parents,
        );
        let b = span_id(
            "repo",
            "src/auth.rs",
            10,
            200,
            SpanKind::Function,
            Some("login"),
            Some("fn login(&self) -> Result<()>"),
            Some("Authenticates the user."),
            &parents,
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_span_id_sensitive_to_every_field() {
        let base = span_id("r", "p", 0, 10, SpanKind::Function, None, None, None, &[]);
        assert_ne!(
            base,
            span_id("r", "p", 0, 11, SpanKind::Function, None, None, None, &[])
        );
        assert_ne!(
            base,
            span_id("r", "p", 0, 10, SpanKind::Method, None, None, None, &[])
        );
        assert_ne!(
            base,
            span_id("r", "p", 0, 10, SpanKind::Function, Some("f"), None, None, &[])
        );
        assert_ne!(
            base,
            span_id(
                "r",
                "p",
                0,
                10,
                SpanKind::Function,
                None,
                None,
                Some("doc"),
                &[]
            )
        );
    }

    #[test]
    fn test_chunk_id_is_pure() {
        let sid = span_id("r", "p", 0, 10, SpanKind::Block, None, None, None, &[]);
        assert_eq!(chunk_id(&sid, "fn x() {}"), chunk_id(&sid, "fn x() {}"));
        assert_ne!(chunk_id(&sid, "fn x() {}"), chunk_id(&sid, "fn y() {}"));
    }

    #[test]
    fn test_rerank_cache_key_order_independent() {
        let a = rerank_cache_key(
            "api",
            "m",
            "q",
            &["b".to_string(), "a".to_string(), "c".to_string()],
        );
        let b = rerank_cache_key(
            "api",
            "m",
            "q",
            &["c".to_string(), "b".to_string(), "a".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_rerank_cache_key_sensitive_to_inputs() {
        let ids = vec!["a".to_string()];
        let base = rerank_cache_key("api", "m", "q", &ids);
        assert_ne!(base, rerank_cache_key("rrf", "m", "q", &ids));
        assert_ne!(base, rerank_cache_key("api", "m2", "q", &ids));
        assert_ne!(base, rerank_cache_key("api", "m", "q2", &ids));
    }

    #[test]
    fn test_bundle_signature_changes_with_policy() {
        let ids = vec!["a".to_string()];
        let ranges = vec![(0u64, 10u64)];
        let a = bundle_signature(&ids, &ranges, "p1", "prof", "cl100k");
        let b = bundle_signature(&ids, &ranges, "p2", "prof", "cl100k");
        assert_ne!(a, b);
    }
}
