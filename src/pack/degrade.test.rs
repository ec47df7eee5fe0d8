use super::*;

#[test]
fn test_strip_trailing_comments() {
    let input = "let x = 1; // counter\nlet y = 2;\n";
    let stripped = strip_trailing(input);
    assert_eq!(stripped, "let x = 1;\nlet y = 2;");
}

#[test]
fn test_strip_preserves_full_line_comments() {
    let input = "// module header\nfn f() {}\n# shell style\n";
    let stripped = strip_trailing(input);
    assert!(stripped.contains("// module header"));
    assert!(stripped.contains("# shell style"));
}

#[test]
fn test_strip_respects_string_literals() {
    let input = "let url = \"https://example.com\";";
    assert_eq!(strip_trailing(input), input);
}

#[test]
fn test_strip_collapses_blank_runs() {
    let input = "a\n\n\n\nb\n\n";
    assert_eq!(strip_trailing(input), "a\n\nb");
}

#[test]
fn test_capsule_with_signature() {
    let content = "fn login(user: &str) -> Result<()> {\n    verify(user)?;\n    Ok(())\n}";
    let capsule = to_capsule(content, Some("fn login(user: &str) -> Result<()>"), false);
    assert_eq!(capsule, "fn login(user: &str) -> Result<()> { ... }");
}

#[test]
fn test_capsule_preserves_structure() {
    let content = "impl UserService {\nfn login(&self) -> Result<()> {\n    Ok(())\n}\n}";
    let capsule = to_capsule(content, Some("fn login(&self) -> Result<()>"), true);
    assert!(capsule.starts_with("impl UserService {"));
    assert!(capsule.ends_with("fn login(&self) -> Result<()> { ... }"));
}

#[test]
fn test_capsule_without_signature_uses_first_line() {
    let content = "fn helper() {\n    work()\n}";
    let capsule = to_capsule(content, None, false);
    assert_eq!(capsule, "fn helper() { ... }");
}

#[test]
fn test_capsule_empty_content() {
    assert_eq!(to_capsule("", None, true), "");
}

#[test]
fn test_summarize_short_doc_untouched() {
    let doc = "One short paragraph.";
    assert_eq!(summarize_docs(doc, 64), doc);
}

#[test]
fn test_summarize_keeps_headings_and_first_sentences() {
    let doc = "\
# Setup

Install the toolchain first. Then configure the database.

## Running

Start the server with the default flags. Logs go to stderr.
";
    let summary = summarize_docs(doc, 4);
    assert!(summary.contains("# Setup"));
    assert!(summary.contains("## Running"));
    assert!(summary.contains("- Install the toolchain first."));
    assert!(summary.contains("- Start the server with the default flags."));
    assert!(!summary.contains("Logs go to stderr"));
}

#[test]
fn test_summarize_is_shorter() {
    let doc = "Paragraph one has quite a few sentences. More detail. Even more.\n\n".repeat(20);
    let summary = summarize_docs(&doc, 4);
    assert!(summary.len() < doc.len());
}

#[test]
fn test_summarize_deterministic() {
    let doc = "# T\n\nAlpha beta gamma. Delta.\n\nEpsilon zeta. Eta.\n";
    assert_eq!(summarize_docs(doc, 4), summarize_docs(doc, 4));
}
