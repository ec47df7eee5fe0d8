//! Content degradation steps.
//!
//! The ladder, in order: strip trailing comments and blank runs, collapse
//! to a signature-only capsule, summarize prose to bullet points. Each step
//! is pure text transformation; the packer decides which step's output
//! finally fits.

/// Strip trailing `//`-style comments and collapse runs of blank lines.
///
/// Leading comment lines survive (often doc comments); only end-of-line
/// trailers and redundant vertical whitespace go.
pub fn strip_trailing(content: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0usize;
    for line in content.lines() {
        let stripped = strip_eol_comment(line);
        let stripped = stripped.trim_end();
        if stripped.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(stripped.to_string());
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Remove an end-of-line `//` comment, leaving full-line comments intact.
/// String literals containing `//` are respected with a simple quote scan.
fn strip_eol_comment(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") || trimmed.starts_with('#') {
        return line;
    }
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'\\' if in_string => i += 1,
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                return line[..i].trim_end();
            }
            _ => {}
        }
        i += 1;
    }
    line
}

/// Collapse an item to its signature: the capsule form.
///
/// With `preserve_structure`, enclosing declaration lines (those ending in
/// `{` or `:`) before the signature are kept so the capsule still reads as
/// nested code.
pub fn to_capsule(content: &str, signature: Option<&str>, preserve_structure: bool) -> String {
    if let Some(sig) = signature {
        let sig = sig.trim_end().trim_end_matches('{').trim_end();
        if preserve_structure {
            let mut prefix = Vec::new();
            for line in content.lines().take(5) {
                let t = line.trim();
                if t.ends_with('{') && !t.contains(sig) {
                    prefix.push(line.trim_end().to_string());
                } else {
                    break;
                }
            }
            if !prefix.is_empty() {
                let mut out = prefix.join("\n");
                out.push('\n');
                out.push_str(&format!("{sig} {{ ... }}"));
                return out;
            }
        }
        return format!("{sig} {{ ... }}");
    }

    // No signature recorded: first non-empty line stands in for it.
    let first = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim_end()
        .trim_end_matches('{')
        .trim_end();
    if first.is_empty() {
        String::new()
    } else {
        format!("{first} {{ ... }}")
    }
}

/// Summarize prose/markdown into bullet points.
///
/// Headings are kept verbatim; each paragraph contributes its first
/// sentence as a bullet. Output never shrinks below roughly `min_tokens`
/// worth of text (approximated at four chars per token) unless the input
/// itself is smaller.
pub fn summarize_docs(content: &str, min_tokens: usize) -> String {
    let min_chars = min_tokens * 4;
    if content.len() <= min_chars {
        return content.trim().to_string();
    }

    let mut bullets: Vec<String> = Vec::new();
    let mut paragraph = String::new();
    let mut flush = |paragraph: &mut String, bullets: &mut Vec<String>| {
        if paragraph.trim().is_empty() {
            paragraph.clear();
            return;
        }
        let sentence = first_sentence(paragraph.trim());
        if !sentence.is_empty() {
            bullets.push(format!("- {sentence}"));
        }
        paragraph.clear();
    };

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            flush(&mut paragraph, &mut bullets);
            bullets.push(trimmed.to_string());
        } else if trimmed.is_empty() {
            flush(&mut paragraph, &mut bullets);
        } else {
            if !paragraph.is_empty() {
                paragraph.push(' ');
            }
            paragraph.push_str(trimmed);
        }
    }
    flush(&mut paragraph, &mut bullets);

    let summary = bullets.join("\n");
    if summary.len() < min_chars && summary.len() < content.len() {
        // Too aggressive for the floor: fall back to a prefix of the
        // original.
        let mut cut = min_chars.min(content.len());
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        return content[..cut].trim_end().to_string();
    }
    summary
}

fn first_sentence(paragraph: &str) -> String {
    let end = paragraph
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | '!' | '?')
                && paragraph[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .is_none_or(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(paragraph.len());
    paragraph[..end].to_string()
}

#[cfg(test)]
#[path = "degrade.test.rs"]
mod tests;
