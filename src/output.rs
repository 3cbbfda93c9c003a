use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::evidence::{EvidenceTracker, source_type_slug};
use crate::metrics::{MetricsRecord, sort_top_two_levels};
use crate::report;
use crate::scoring::Scorecard;

/// Serialize `value` with sorted keys at the top two levels, UNIX
/// newlines, and a trailing newline (§6.2).
fn write_sorted_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)?;
    let sorted = sort_top_two_levels(&value);
    let mut bytes = serde_json::to_vec_pretty(&sorted)?;
    bytes.push(b'\n');
    fs::write(path, bytes)?;
    Ok(())
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    let mut content = content.to_string();
    if !content.ends_with('\n') {
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// Write `submission.json` — always, regardless of `format` or whether the
/// checklist ran — since it is the metrics pipeline's own output, not one
/// of the two human-facing artifacts `--format` gates.
pub fn write_metrics(output_dir: &Path, record: &MetricsRecord) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    record
        .validate_shape()
        .map_err(Error::SchemaMismatch)?;
    write_sorted_json(&output_dir.join("submission.json"), record)
}

/// Write `score_input.json`, `evaluation_report.md`, and the evidence tree,
/// honoring `--format` for which of the two human artifacts are emitted.
pub fn write_checklist_outputs(
    output_dir: &Path,
    scorecard: &Scorecard,
    tracker: &EvidenceTracker,
    format: OutputFormat,
) -> Result<()> {
    fs::create_dir_all(output_dir)?;

    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        write_sorted_json(&output_dir.join("score_input.json"), scorecard)?;
    }
    if matches!(format, OutputFormat::Markdown | OutputFormat::Both) {
        write_text(
            &output_dir.join("evaluation_report.md"),
            &report::render_markdown(scorecard),
        )?;
    }

    write_evidence_tree(output_dir, tracker)?;
    Ok(())
}

fn write_evidence_tree(output_dir: &Path, tracker: &EvidenceTracker) -> Result<()> {
    let evidence_root = output_dir.join("evidence");
    fs::create_dir_all(&evidence_root)?;

    for (dimension, reference) in tracker.by_dimension() {
        let dimension_dir = evidence_root.join(dimension);
        fs::create_dir_all(&dimension_dir)?;
        let file = dimension_dir.join(format!(
            "{}_{}.json",
            reference.item_id,
            source_type_slug(reference.source_type)
        ));
        write_sorted_json(&file, reference)?;
    }

    write_sorted_json(&evidence_root.join("manifest.json"), &tracker.manifest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EvaluationStatus, ScoredItem};
    use crate::evidence::{EvidenceReference, SourceType};
    use crate::fetch::RepositoryDescriptor;
    use crate::rubric::Dimension;
    use crate::scoring::build_scorecard;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn sample_record() -> MetricsRecord {
        crate::metrics::empty(RepositoryDescriptor {
            source_url: "x".to_string(),
            commit_sha: "a".repeat(40),
            primary_language: "python".to_string(),
            cloned_at: Utc::now(),
            size_mb: 1.0,
        })
    }

    #[test]
    fn test_write_metrics_creates_submission_json() {
        let dir = tempfile::tempdir().unwrap();
        write_metrics(dir.path(), &sample_record()).unwrap();
        let content = fs::read_to_string(dir.path().join("submission.json")).unwrap();
        assert!(content.ends_with('\n'));
        assert!(content.contains("\"repository\""));
    }

    #[test]
    fn test_write_checklist_outputs_respects_format_json_only() {
        let dir = tempfile::tempdir().unwrap();
        let scorecard = build_scorecard(
            vec![ScoredItem {
                id: "a".to_string(),
                name: "a".to_string(),
                dimension: "code_quality".to_string(),
                max_points: 100,
                evaluation_status: EvaluationStatus::Met,
                score: 100.0,
                evidence_references: vec![],
                evaluation_details: BTreeMap::new(),
            }],
            RepositoryDescriptor {
                source_url: "x".to_string(),
                commit_sha: "a".repeat(40),
                primary_language: "python".to_string(),
                cloned_at: Utc::now(),
                size_mb: 1.0,
            },
            vec![],
            "rubric/default.toml".to_string(),
            vec![],
            Duration::from_millis(1),
        );
        let mut tracker = EvidenceTracker::new();
        tracker.record(
            Dimension::CodeQuality,
            EvidenceReference {
                item_id: "a".to_string(),
                source_type: SourceType::Calculation,
                source_path: "metrics.code_quality".to_string(),
                description: "d".to_string(),
                confidence: 1.0,
                raw_data: "true".to_string(),
                timestamp: Utc::now(),
            },
        );
        write_checklist_outputs(dir.path(), &scorecard, &tracker, OutputFormat::Json).unwrap();
        assert!(dir.path().join("score_input.json").is_file());
        assert!(!dir.path().join("evaluation_report.md").is_file());
        assert!(dir.path().join("evidence/manifest.json").is_file());
        assert!(dir.path().join("evidence/code_quality/a_calculation.json").is_file());
    }
}
