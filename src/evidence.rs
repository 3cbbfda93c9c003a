use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rubric::Dimension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    FileCheck,
    Calculation,
    Manual,
}

/// Per-criterion evidence (§3.6): which path was read, what was observed
/// versus expected, and a confidence the checklist evaluator assigns based
/// on how cleanly the expression resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceReference {
    pub item_id: String,
    pub source_type: SourceType,
    pub source_path: String,
    pub description: String,
    pub confidence: f64,
    pub raw_data: String,
    pub timestamp: DateTime<Utc>,
}

/// One entry in `evidence/manifest.json`: where a reference was persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub item_id: String,
    pub dimension: String,
    pub source_type: SourceType,
    pub file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceSummary {
    pub dimension: String,
    pub reference_count: usize,
}

/// Accumulates evidence grouped by dimension and produces the flat audit
/// log / manifest the output writer persists (§4.8).
#[derive(Debug, Default)]
pub struct EvidenceTracker {
    by_dimension: std::collections::BTreeMap<String, Vec<EvidenceReference>>,
}

impl EvidenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, dimension: Dimension, reference: EvidenceReference) {
        self.by_dimension
            .entry(dimension.to_string())
            .or_default()
            .push(reference);
    }

    pub fn all(&self) -> Vec<&EvidenceReference> {
        self.by_dimension.values().flatten().collect()
    }

    /// Pairs of (dimension, reference), for writers that need to place each
    /// reference under its `evidence/<dimension>/` directory.
    pub fn by_dimension(&self) -> impl Iterator<Item = (&str, &EvidenceReference)> {
        self.by_dimension
            .iter()
            .flat_map(|(dimension, refs)| refs.iter().map(move |r| (dimension.as_str(), r)))
    }

    pub fn manifest(&self) -> Vec<ManifestEntry> {
        self.by_dimension
            .iter()
            .flat_map(|(dimension, refs)| {
                refs.iter().map(move |r| ManifestEntry {
                    item_id: r.item_id.clone(),
                    dimension: dimension.clone(),
                    source_type: r.source_type,
                    file: format!(
                        "evidence/{dimension}/{}_{}.json",
                        r.item_id,
                        source_type_slug(r.source_type)
                    ),
                })
            })
            .collect()
    }

    pub fn summary(&self) -> Vec<EvidenceSummary> {
        self.by_dimension
            .iter()
            .map(|(dimension, refs)| EvidenceSummary {
                dimension: dimension.clone(),
                reference_count: refs.len(),
            })
            .collect()
    }
}

pub fn source_type_slug(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::FileCheck => "file_check",
        SourceType::Calculation => "calculation",
        SourceType::Manual => "manual",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_reference(item_id: &str) -> EvidenceReference {
        EvidenceReference {
            item_id: item_id.to_string(),
            source_type: SourceType::Calculation,
            source_path: "metrics.code_quality.lint_results.passed".to_string(),
            description: "expected true, observed true".to_string(),
            confidence: 1.0,
            raw_data: "true".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_record_groups_by_dimension() {
        let mut tracker = EvidenceTracker::new();
        tracker.record(Dimension::CodeQuality, sample_reference("a"));
        tracker.record(Dimension::Testing, sample_reference("b"));
        assert_eq!(tracker.all().len(), 2);
        assert_eq!(tracker.summary().len(), 2);
    }

    #[test]
    fn test_manifest_paths() {
        let mut tracker = EvidenceTracker::new();
        tracker.record(Dimension::CodeQuality, sample_reference("lint_clean"));
        let manifest = tracker.manifest();
        assert_eq!(manifest.len(), 1);
        assert_eq!(
            manifest[0].file,
            "evidence/code_quality/lint_clean_calculation.json"
        );
    }

    #[test]
    fn test_summary_counts_per_dimension() {
        let mut tracker = EvidenceTracker::new();
        tracker.record(Dimension::Testing, sample_reference("a"));
        tracker.record(Dimension::Testing, sample_reference("b"));
        let summary = tracker.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].reference_count, 2);
    }
}
