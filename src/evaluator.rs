use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;

use crate::evidence::{EvidenceReference, EvidenceTracker, SourceType};
use crate::expr::{self, EvalOutcome};
use crate::metrics::{self, MetricsRecord};
use crate::rubric::{ChecklistItem, Rubric};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Met,
    Partial,
    Unmet,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredItem {
    pub id: String,
    pub name: String,
    pub dimension: String,
    pub max_points: u32,
    pub evaluation_status: EvaluationStatus,
    pub score: f64,
    pub evidence_references: Vec<EvidenceReference>,
    pub evaluation_details: BTreeMap<String, String>,
}

/// For each rubric item, in file order: resolve its source subtree,
/// evaluate `met` then `partial` then `unmet`, award points, and hand every
/// expression's evidence off to the tracker (§4.7).
///
/// Never mutates `record`; invariant `sum(scores) <= 100` holds because
/// `Rubric::validate` already enforces `sum(max_points) == 100`.
pub fn evaluate_checklist(
    rubric: &Rubric,
    record: &MetricsRecord,
    tracker: &mut EvidenceTracker,
) -> Vec<ScoredItem> {
    let root = record.to_value();
    rubric
        .checklist_items
        .iter()
        .map(|item| evaluate_item(item, &root, tracker))
        .collect()
}

fn evaluate_item(item: &ChecklistItem, root: &serde_json::Value, tracker: &mut EvidenceTracker) -> ScoredItem {
    let prefix = &item.metrics_mapping.source_path;

    let (met, mut evidence_references) = evaluate_list(&item.id, item.dimension, &item.met, root, prefix, tracker);
    let (status, score) = if met.as_ref().is_ok_and(|o| o.value) {
        (EvaluationStatus::Met, item.max_points as f64)
    } else {
        let (partial, partial_refs) = evaluate_list(&item.id, item.dimension, &item.partial, root, prefix, tracker);
        evidence_references.extend(partial_refs);
        if partial.as_ref().is_ok_and(|o| o.value) {
            (EvaluationStatus::Partial, round_one(item.max_points as f64 * 0.5))
        } else {
            let (_unmet, unmet_refs) = evaluate_list(&item.id, item.dimension, &item.unmet, root, prefix, tracker);
            evidence_references.extend(unmet_refs);
            (EvaluationStatus::Unmet, 0.0)
        }
    };

    let mut details = BTreeMap::new();
    details.insert("status".to_string(), format!("{status:?}"));
    details.insert(
        "source_path".to_string(),
        item.metrics_mapping.source_path.clone(),
    );

    ScoredItem {
        id: item.id.clone(),
        name: item.name.clone(),
        dimension: item.dimension.to_string(),
        max_points: item.max_points,
        evaluation_status: status,
        score,
        evidence_references,
        evaluation_details: details,
    }
}

fn round_one(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Evaluate one status's criterion list, recording one evidence reference
/// per expression (even the ones that evaluated false) before returning
/// whether the list as a whole is satisfied, plus the references recorded
/// so the caller can link them onto the scored item.
fn evaluate_list(
    item_id: &str,
    dimension: crate::rubric::Dimension,
    exprs: &[String],
    root: &serde_json::Value,
    prefix: &str,
    tracker: &mut EvidenceTracker,
) -> (Result<EvalOutcome, expr::ExprError>, Vec<EvidenceReference>) {
    let mut satisfied = false;
    let mut all_reads = Vec::new();
    let mut last_err = None;
    let mut references = Vec::new();

    for expr_str in exprs {
        match expr::evaluate(expr_str, root, prefix) {
            Ok(outcome) => {
                let confidence = confidence_for(&outcome);
                let reference = EvidenceReference {
                    item_id: item_id.to_string(),
                    source_type: SourceType::Calculation,
                    source_path: prefix.to_string(),
                    description: describe(expr_str, &outcome),
                    confidence,
                    raw_data: metrics::render_value(
                        &outcome
                            .reads
                            .first()
                            .map(|r| r.raw.clone())
                            .unwrap_or(serde_json::Value::Null),
                    ),
                    timestamp: Utc::now(),
                };
                tracker.record(dimension, reference.clone());
                references.push(reference);
                satisfied |= outcome.value;
                all_reads.extend(outcome.reads);
            }
            Err(e) => {
                let reference = EvidenceReference {
                    item_id: item_id.to_string(),
                    source_type: SourceType::Calculation,
                    source_path: prefix.to_string(),
                    description: format!("'{expr_str}' failed to parse: {e}"),
                    confidence: 0.3,
                    raw_data: String::new(),
                    timestamp: Utc::now(),
                };
                tracker.record(dimension, reference.clone());
                references.push(reference);
                last_err = Some(e);
            }
        }
    }

    let outcome = if let Some(e) = last_err
        && !satisfied
        && all_reads.is_empty()
    {
        Err(e)
    } else {
        Ok(EvalOutcome {
            value: satisfied,
            reads: all_reads,
        })
    };
    (outcome, references)
}

fn confidence_for(outcome: &EvalOutcome) -> f64 {
    if outcome.reads.iter().any(|r| r.length_type_mismatch) {
        0.5
    } else if outcome.reads.iter().any(|r| r.missing) {
        0.7
    } else {
        1.0
    }
}

fn describe(expr_str: &str, outcome: &EvalOutcome) -> String {
    format!(
        "'{expr_str}' evaluated to {} (observed: {})",
        outcome.value,
        outcome
            .reads
            .iter()
            .map(|r| format!("{}={}", r.path, metrics::render_value(&r.raw)))
            .collect::<Vec<_>>()
            .join(", ")
    )
}
