use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::fetch::RepositoryDescriptor;

/// One external-tool invocation record (§3.3). Every dispatched tool
/// produces exactly one of these, even when the binary is absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolExecutionRecord {
    pub tool_used: String,
    pub tool_version: Option<String>,
    pub command_line: Option<String>,
    pub exit_status: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub elapsed_seconds: f64,
    pub state: ToolState,
}

impl ToolExecutionRecord {
    pub fn not_found(tool_name: &str) -> Self {
        Self {
            tool_used: "none".to_string(),
            state: ToolState::NotFound,
            stdout: Some(format!("{tool_name} is not installed; skipping")),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    #[default]
    NotFound,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LintResults {
    pub tool_used: String,
    pub passed: Option<bool>,
    pub issues_count: u64,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityAudit {
    pub tool_used: String,
    pub vulnerabilities_found: u64,
    pub high_severity_count: u64,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DependencyAudit {
    pub tool_used: String,
    pub outdated_count: u64,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CodeQuality {
    pub lint_results: LintResults,
    pub build_success: Option<bool>,
    pub build_details: ToolExecutionRecord,
    pub security_audit: SecurityAudit,
    pub dependency_audit: DependencyAudit,
    pub formatting_compliance: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestExecution {
    pub framework: Option<String>,
    pub tests_run: u64,
    pub tests_passed: u64,
    pub tests_failed: u64,
    pub tool_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoverageReport {
    pub percentage: Option<f64>,
    pub tool_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Testing {
    pub test_execution: TestExecution,
    pub coverage_report: CoverageReport,
    pub test_files_detected: u64,
    pub test_config_detected: bool,
    pub coverage_config_detected: bool,
    pub ci_platform: Option<String>,
    pub calculated_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Documentation {
    pub readme_present: bool,
    pub readme_quality_score: f64,
    pub api_documentation: bool,
    pub setup_instructions: bool,
    pub usage_examples: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub tool: String,
    pub phase: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Execution {
    pub tools_used: Vec<String>,
    pub errors: Vec<ExecutionError>,
    pub duration_seconds: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metrics {
    pub code_quality: CodeQuality,
    pub testing: Testing,
    pub documentation: Documentation,
}

/// The unified, schema-conformant aggregation (§3.4). This is "the" output
/// of the metrics pipeline and the input to the checklist evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub repository: RepositoryDescriptor,
    pub metrics: Metrics,
    pub execution: Execution,
}

impl MetricsRecord {
    /// Convert to the tagged-value tree the expression evaluator walks.
    /// A single conversion point means the evaluator never needs to know
    /// about the typed struct shape above.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Cheap structural sanity check run right before `submission.json` is
    /// written (§7 `schema_mismatch`). The type system already guarantees
    /// shape; this only catches the couple of invariants serde can't express
    /// (percentages in range, non-negative counts already enforced by `u64`).
    pub fn validate_shape(&self) -> Result<(), String> {
        if let Some(pct) = self.metrics.testing.coverage_report.percentage
            && !(0.0..=100.0).contains(&pct)
        {
            return Err(format!("coverage percentage {pct} out of range 0..=100"));
        }
        if !(0.0..=1.0).contains(&self.metrics.documentation.readme_quality_score) {
            return Err(format!(
                "readme_quality_score {} out of range 0..=1",
                self.metrics.documentation.readme_quality_score
            ));
        }
        if self.repository.commit_sha.len() != 40 {
            return Err(format!(
                "commit_sha '{}' is not a 40-hex identifier",
                self.repository.commit_sha
            ));
        }
        Ok(())
    }
}

/// Re-key `value`'s top-level object, and every direct object-valued child,
/// into sorted order (§6.2: "sorted keys at the top two levels"). Leaves
/// everything deeper untouched — the schema doesn't require it and a field
/// like `issues: []` of free-form strings has no "key order" to sort.
pub fn sort_top_two_levels(value: &Value) -> Value {
    let Value::Object(top) = value else {
        return value.clone();
    };
    let mut sorted_top: Map<String, Value> = Map::new();
    let mut keys: Vec<&String> = top.keys().collect();
    keys.sort();
    for key in keys {
        let child = &top[key];
        let sorted_child = if let Value::Object(inner) = child {
            let mut sorted_inner: Map<String, Value> = Map::new();
            let mut inner_keys: Vec<&String> = inner.keys().collect();
            inner_keys.sort();
            for ik in inner_keys {
                sorted_inner.insert(ik.clone(), inner[ik].clone());
            }
            Value::Object(sorted_inner)
        } else {
            child.clone()
        };
        sorted_top.insert(key.clone(), sorted_child);
    }
    Value::Object(sorted_top)
}

/// Build a minimal, empty-but-valid metrics record: used by the no-language
/// runner path and as the orchestrator's starting accumulator before tool
/// runners merge their partial outputs in.
pub fn empty(repository: RepositoryDescriptor) -> MetricsRecord {
    MetricsRecord {
        repository,
        metrics: Metrics::default(),
        execution: Execution::default(),
    }
}

/// Convenience for evidence rendering: stringify any JSON value the way a
/// human reading `raw_data` would expect (`null`, `true`, `[1,2]`, `"x"`).
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => json!(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_repo() -> RepositoryDescriptor {
        RepositoryDescriptor {
            source_url: "https://example.com/repo.git".to_string(),
            commit_sha: "a".repeat(40),
            primary_language: "python".to_string(),
            cloned_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            size_mb: 1.0,
        }
    }

    #[test]
    fn test_empty_record_validates() {
        let record = empty(sample_repo());
        assert!(record.validate_shape().is_ok());
    }

    #[test]
    fn test_invalid_sha_rejected() {
        let mut repo = sample_repo();
        repo.commit_sha = "short".to_string();
        let record = empty(repo);
        assert!(record.validate_shape().is_err());
    }

    #[test]
    fn test_out_of_range_coverage_rejected() {
        let mut record = empty(sample_repo());
        record.metrics.testing.coverage_report.percentage = Some(150.0);
        assert!(record.validate_shape().is_err());
    }

    #[test]
    fn test_to_value_roundtrips_fields() {
        let mut record = empty(sample_repo());
        record.metrics.code_quality.lint_results.passed = Some(true);
        let value = record.to_value();
        assert_eq!(
            value["metrics"]["code_quality"]["lint_results"]["passed"],
            Value::Bool(true)
        );
    }

    #[test]
    fn test_sort_top_two_levels() {
        let value = json!({
            "zeta": 1,
            "alpha": { "z": 1, "a": 2 },
            "beta": [1, 2, 3],
        });
        let sorted = sort_top_two_levels(&value);
        let keys: Vec<&String> = sorted.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["alpha", "beta", "zeta"]);
        let inner_keys: Vec<&String> = sorted["alpha"].as_object().unwrap().keys().collect();
        assert_eq!(inner_keys, vec!["a", "z"]);
    }

    #[test]
    fn test_render_value_string_unquoted() {
        assert_eq!(render_value(&json!("hello")), "hello");
        assert_eq!(render_value(&json!(42)), "42");
        assert_eq!(render_value(&json!(null)), "null");
    }
}
