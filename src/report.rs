use std::fmt::Write as _;

use crate::evaluator::EvaluationStatus;
use crate::scoring::Scorecard;

/// Render `evaluation_report.md` with a stable section order: Overview →
/// Category Breakdown → Per-item details → Evidence appendix (§6.2).
pub fn render_markdown(scorecard: &Scorecard) -> String {
    let mut out = String::new();

    writeln!(out, "# Evaluation Report").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "## Overview").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "- Repository: {}", scorecard.repository_info.source_url).unwrap();
    writeln!(out, "- Commit: {}", scorecard.repository_info.commit_sha).unwrap();
    writeln!(
        out,
        "- Primary language: {}",
        scorecard.repository_info.primary_language
    )
    .unwrap();
    writeln!(
        out,
        "- Total score: {:.1} / {:.0} ({:.1}%)",
        scorecard.total_score, scorecard.max_possible_score, scorecard.score_percentage
    )
    .unwrap();
    writeln!(out).unwrap();

    writeln!(out, "## Category Breakdown").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "| Dimension | Awarded | Max | Percentage | Grade |").unwrap();
    writeln!(out, "|---|---|---|---|---|").unwrap();
    for (dimension, breakdown) in &scorecard.category_breakdowns {
        writeln!(
            out,
            "| {dimension} | {:.1} | {:.0} | {:.1}% | {} |",
            breakdown.awarded, breakdown.max, breakdown.percentage, breakdown.grade
        )
        .unwrap();
    }
    writeln!(out).unwrap();

    writeln!(out, "## Per-item Details").unwrap();
    writeln!(out).unwrap();
    for item in &scorecard.checklist_items {
        let status = match item.evaluation_status {
            EvaluationStatus::Met => "met",
            EvaluationStatus::Partial => "partial",
            EvaluationStatus::Unmet => "unmet",
        };
        writeln!(
            out,
            "### {} ({})",
            item.name, item.id
        )
        .unwrap();
        writeln!(
            out,
            "- Dimension: {} | Status: {status} | Score: {:.1} / {}",
            item.dimension, item.score, item.max_points
        )
        .unwrap();
        writeln!(out).unwrap();
    }

    writeln!(out, "## Evidence Appendix").unwrap();
    writeln!(out).unwrap();
    if scorecard.evidence_summary.is_empty() {
        writeln!(out, "No evidence recorded.").unwrap();
    } else {
        writeln!(out, "| Dimension | References |").unwrap();
        writeln!(out, "|---|---|").unwrap();
        for entry in &scorecard.evidence_summary {
            writeln!(out, "| {} | {} |", entry.dimension, entry.reference_count).unwrap();
        }
    }
    writeln!(out).unwrap();

    out
}
