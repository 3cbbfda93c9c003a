use std::path::Path;
use std::time::Duration;

use super::ToolRunner;
use crate::metrics::{
    CoverageReport, DependencyAudit, LintResults, SecurityAudit, TestExecution,
    ToolExecutionRecord,
};

/// The no-op runner for repositories whose primary language has no
/// implemented tool set yet (or was undetectable). Every operation reports
/// `tool_used = "none"` rather than skipping the dimension silently.
pub struct NoneRunner;

impl ToolRunner for NoneRunner {
    async fn run_linting(&self, _workspace: &Path, _timeout: Duration) -> LintResults {
        LintResults {
            tool_used: "none".to_string(),
            ..Default::default()
        }
    }

    async fn run_build(
        &self,
        _workspace: &Path,
        _timeout: Duration,
    ) -> (Option<bool>, ToolExecutionRecord) {
        (None, ToolExecutionRecord::not_found("no runner for this language"))
    }

    async fn run_tests(
        &self,
        _workspace: &Path,
        _timeout: Duration,
    ) -> (TestExecution, CoverageReport) {
        (TestExecution::default(), CoverageReport::default())
    }

    async fn run_security_audit(
        &self,
        _workspace: &Path,
        _timeout: Duration,
    ) -> (SecurityAudit, DependencyAudit) {
        (SecurityAudit::default(), DependencyAudit::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_none_runner_reports_none() {
        let runner = NoneRunner;
        let lint = runner
            .run_linting(Path::new("."), Duration::from_secs(1))
            .await;
        assert_eq!(lint.tool_used, "none");
    }
}
