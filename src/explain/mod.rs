//! Bundle explainability: deterministic Markdown rendering.
//!
//! The output is a pure function of the bundle and the render options —
//! equal bundles produce byte-identical documents. No timestamps, no map
//! iteration, no locale formatting.

use std::fmt::Write as _;

use crate::assemble::Bundle;
use crate::assemble::StoppingReason;
use crate::config::ExplainConfig;
use crate::tokenizer;

/// Width of the token progress bar, in cells.
const BAR_WIDTH: usize = 20;

/// Render a bundle as Markdown.
pub fn render(bundle: &Bundle, options: &ExplainConfig) -> String {
    let mut out = String::new();

    // Header.
    let _ = writeln!(
        out,
        "# Context bundle for \"{}\" ({} items, {} model)",
        bundle.query,
        bundle.item_count(),
        bundle.model
    );
    out.push('\n');

    render_evidence(&mut out, bundle);
    render_stopping_reasons(&mut out, bundle);
    render_token_report(&mut out, bundle);
    render_sources(&mut out, bundle, options.preview_lines);

    out
}

fn render_evidence(out: &mut String, bundle: &Bundle) {
    out.push_str("## Evidence\n\n");
    if bundle.evidence.is_empty() {
        out.push_str("_No items were included._\n\n");
        return;
    }
    out.push_str("| File | Symbol | Reason | Edge Type | Rank | Cached |\n");
    out.push_str("|------|--------|--------|-----------|------|--------|\n");
    for evidence in &bundle.evidence {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            escape_cell(&evidence.file),
            escape_cell(evidence.symbol.as_deref().unwrap_or("—")),
            escape_cell(&evidence.reason),
            evidence.edge_type.label(),
            evidence.rank,
            if evidence.cached { "yes" } else { "no" },
        );
    }
    out.push('\n');
}

fn render_stopping_reasons(out: &mut String, bundle: &Bundle) {
    out.push_str("## Stopping reasons\n\n");
    for reason in &bundle.stopping_reasons.conditions {
        let marker = if *reason == bundle.stopping_reasons.primary() {
            " (primary)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "### {} [{}]{}\n\n{}\n",
            reason.label(),
            reason.severity(),
            marker,
            describe(*reason),
        );
    }
}

fn render_token_report(out: &mut String, bundle: &Bundle) {
    out.push_str("## Token report\n\n");
    let used = bundle.total_tokens;
    let budget = bundle.budget.max(1);
    let ratio = (used as f64 / budget as f64).min(1.0);
    let filled = (ratio * BAR_WIDTH as f64).round() as usize;
    let bar: String = "#".repeat(filled) + &"-".repeat(BAR_WIDTH - filled);
    let _ = writeln!(
        out,
        "`[{bar}]` {used} / {} tokens ({:.1}%)",
        bundle.budget,
        ratio * 100.0
    );

    if let Some(price) = tokenizer::price_per_1k_tokens(&bundle.model) {
        let cost = used as f64 / 1000.0 * price;
        let _ = writeln!(out, "\nEstimated prompt cost: ${cost:.4}");
    }
    out.push('\n');
}

fn render_sources(out: &mut String, bundle: &Bundle, preview_lines: usize) {
    out.push_str("## Sources\n");
    for group in &bundle.sources {
        let _ = writeln!(
            out,
            "\n### {} ({} items, {} tokens)\n",
            group.source_type,
            group.items.len(),
            group.tokens
        );
        for item in &group.items {
            let symbol = item
                .symbol
                .as_deref()
                .map(|s| format!(" — `{s}`"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "#### {}{} [{}]\n",
                escape_cell(&item.file),
                symbol,
                item.degradation.label()
            );
            out.push_str("```\n");
            let mut lines = item.content.lines();
            for line in lines.by_ref().take(preview_lines) {
                out.push_str(line);
                out.push('\n');
            }
            let rest = lines.count();
            if rest > 0 {
                let _ = writeln!(out, "... ({rest} more lines)");
            }
            out.push_str("```\n");
        }
    }
}

/// Human explanation per stopping reason.
fn describe(reason: StoppingReason) -> &'static str {
    match reason {
        StoppingReason::BudgetReached => {
            "The token budget ran out; lower-priority items were degraded or dropped."
        }
        StoppingReason::EarlyStopThreshold => {
            "Scores fell off sharply after the threshold position; the tail was discarded."
        }
        StoppingReason::NoMoreCandidates => {
            "Every retrieved candidate was considered; nothing further was available."
        }
        StoppingReason::GraphDepthCap => {
            "Graph traversal halted at the configured depth with neighbors still unexplored."
        }
        StoppingReason::ReachedTokenReserve => {
            "Packing stopped at the reserved token margin rather than the hard budget."
        }
        StoppingReason::AllLanesExhausted => {
            "Every retrieval lane returned empty; the bundle may be incomplete."
        }
        StoppingReason::UserLimitReached => {
            "The caller's deadline or cancellation ended assembly early; results are partial."
        }
    }
}

/// Escape pipe characters so table cells cannot break the table.
fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
