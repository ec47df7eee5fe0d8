use super::*;

#[test]
fn test_family_detection() {
    assert_eq!(ModelFamily::detect("gpt-4"), ModelFamily::Gpt4);
    assert_eq!(ModelFamily::detect("gpt-4o-mini"), ModelFamily::Gpt4);
    assert_eq!(ModelFamily::detect("claude-3-sonnet"), ModelFamily::Claude3);
    assert_eq!(ModelFamily::detect("Claude-3-Opus"), ModelFamily::Claude3);
    assert_eq!(ModelFamily::detect("gemini-pro"), ModelFamily::Gemini);
    assert_eq!(ModelFamily::detect("llama-3-70b"), ModelFamily::Llama);
    assert_eq!(ModelFamily::detect("mixtral-8x7b"), ModelFamily::Mistral);
    assert_eq!(ModelFamily::detect("mystery-model"), ModelFamily::Unknown);
}

#[test]
fn test_bpe_counts_are_exact_and_stable() {
    let text = "fn main() { println!(\"hello world\"); }";
    let a = count_tokens(text, "gpt-4");
    let b = count_tokens(text, "gpt-4");
    assert_eq!(a, b);
    assert!(a > 0);
    // BPE count for short code should be far below the char count.
    assert!(a < text.len() as u32);
}

#[test]
fn test_estimate_tracks_bpe_within_tolerance() {
    // The estimating tokenizers must stay within ~2x-band sanity of the BPE
    // count for representative source text (exact parity is not required).
    let text = r#"
        pub async fn fetch_user(&self, id: u64) -> Result<User> {
            let row = self.db.query_one("SELECT * FROM users WHERE id = ?", &[&id]).await?;
            Ok(User::from_row(row))
        }
    "#;
    let bpe = count_tokens(text, "gpt-4") as f32;
    for model in ["claude-3-sonnet", "gemini-pro", "llama-3", "mistral-7b"] {
        let estimate = count_tokens(text, model) as f32;
        assert!(
            estimate > bpe * 0.5 && estimate < bpe * 2.0,
            "{model}: estimate {estimate} vs bpe {bpe}"
        );
    }
}

#[test]
fn test_count_empty() {
    assert_eq!(count_tokens("", "claude-3-sonnet"), 0);
    assert_eq!(count_tokens("", "gpt-4"), 0);
}

#[test]
fn test_count_cache_hit_is_consistent() {
    let text = "a ".repeat(500);
    let first = count_tokens(&text, "claude-3-sonnet");
    for _ in 0..5 {
        assert_eq!(count_tokens(&text, "claude-3-sonnet"), first);
    }
    // Different model, same text: separate cache entry, possibly different count.
    let _ = count_tokens(&text, "gpt-4");
}

#[test]
fn test_fit_to_context_passthrough() {
    let (prefix, truncated) = fit_to_context("short text", "gpt-4", 100);
    assert_eq!(prefix, "short text");
    assert!(!truncated);
}

#[test]
fn test_fit_to_context_truncates_small_window() {
    // llama window is 8192; a reserve just below it leaves room for ~100 tokens.
    let text = "word ".repeat(5_000);
    let (prefix, truncated) = fit_to_context(&text, "llama-3", 8_092);
    assert!(truncated);
    assert!(!prefix.is_empty());
    assert!(count_tokens(&prefix, "llama-3") <= 100);
}

#[test]
fn test_fit_to_context_zero_window() {
    let (prefix, truncated) = fit_to_context("anything", "llama-3", u32::MAX);
    assert!(prefix.is_empty());
    assert!(truncated);
}

#[test]
fn test_fit_to_context_respects_char_boundaries() {
    let text = "héllo wörld ".repeat(2_000);
    let (prefix, truncated) = fit_to_context(&text, "llama-3", 8_150);
    assert!(truncated);
    // Must not panic slicing multibyte chars; prefix is valid UTF-8 by
    // construction, so just confirm it is a prefix.
    assert!(text.starts_with(&prefix));
}

#[test]
fn test_pricing_known_and_unknown() {
    assert!(price_per_1k_tokens("gpt-4").is_some());
    assert!(price_per_1k_tokens("claude-3-sonnet").is_some());
    assert!(price_per_1k_tokens("my-local-model").is_none());
}
