use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::evaluator::ScoredItem;
use crate::evidence::EvidenceSummary;
use crate::fetch::RepositoryDescriptor;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBreakdown {
    pub awarded: f64,
    pub max: f64,
    pub percentage: f64,
    pub grade: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationMetadata {
    pub tool_version: String,
    pub rubric_path: String,
    pub evaluation_duration_seconds: f64,
    pub tools_used: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// The final persisted scorecard (§3.8, `score_input.json`).
#[derive(Debug, Clone, Serialize)]
pub struct Scorecard {
    pub repository_info: RepositoryDescriptor,
    pub checklist_items: Vec<ScoredItem>,
    pub total_score: f64,
    pub max_possible_score: f64,
    pub score_percentage: f64,
    pub category_breakdowns: BTreeMap<String, CategoryBreakdown>,
    pub evaluation_metadata: EvaluationMetadata,
    pub evidence_summary: Vec<EvidenceSummary>,
}

/// Fixed numeric thresholds → letter grade, unit-tested at every boundary.
pub fn score_to_grade(percentage: f64) -> &'static str {
    const THRESHOLDS: &[(f64, &str)] = &[(90.0, "A"), (80.0, "B"), (70.0, "C"), (60.0, "D")];
    for (threshold, label) in THRESHOLDS {
        if percentage >= *threshold {
            return label;
        }
    }
    "F"
}

/// Derive the final scorecard from scored items + repository + evidence
/// summary (§4.9). `items` is assumed to be in rubric file order already.
pub fn build_scorecard(
    items: Vec<ScoredItem>,
    repository: RepositoryDescriptor,
    evidence_summary: Vec<EvidenceSummary>,
    rubric_path: String,
    tools_used: Vec<String>,
    evaluation_duration: Duration,
) -> Scorecard {
    let total_score: f64 = items.iter().map(|i| i.score).sum();
    let max_possible_score = 100.0;
    let score_percentage = total_score / max_possible_score * 100.0;

    let mut breakdowns: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for item in &items {
        let entry = breakdowns.entry(item.dimension.clone()).or_insert((0.0, 0.0));
        entry.0 += item.score;
        entry.1 += item.max_points as f64;
    }
    let category_breakdowns = breakdowns
        .into_iter()
        .map(|(dimension, (awarded, max))| {
            let percentage = if max > 0.0 { awarded / max * 100.0 } else { 0.0 };
            (
                dimension,
                CategoryBreakdown {
                    awarded,
                    max,
                    percentage,
                    grade: score_to_grade(percentage).to_string(),
                },
            )
        })
        .collect();

    Scorecard {
        repository_info: repository,
        checklist_items: items,
        total_score,
        max_possible_score,
        score_percentage,
        category_breakdowns,
        evaluation_metadata: EvaluationMetadata {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            rubric_path,
            evaluation_duration_seconds: evaluation_duration.as_secs_f64(),
            tools_used,
            timestamp: Utc::now(),
        },
        evidence_summary,
    }
}
