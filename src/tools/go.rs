use std::path::Path;
use std::time::Duration;

use regex::Regex;

use super::{find_binary, record_from_output, run_tool, ToolRunner};
use crate::metrics::{
    CoverageReport, DependencyAudit, LintResults, SecurityAudit, TestExecution,
    ToolExecutionRecord,
};

pub struct GoRunner;

impl ToolRunner for GoRunner {
    async fn run_linting(&self, workspace: &Path, timeout: Duration) -> LintResults {
        let Some(linter) = find_binary("golangci-lint") else {
            return LintResults {
                tool_used: "none".to_string(),
                ..Default::default()
            };
        };
        let output = run_tool(
            &linter,
            &["run", "./..."],
            workspace,
            timeout,
            "lint:go",
        )
        .await;
        let Ok(output) = output else {
            return LintResults {
                tool_used: "golangci-lint".to_string(),
                ..Default::default()
            };
        };
        let issues: Vec<String> = output
            .stdout_lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .cloned()
            .collect();
        LintResults {
            tool_used: "golangci-lint".to_string(),
            passed: Some(output.success()),
            issues_count: issues.len() as u64,
            issues,
        }
    }

    async fn run_build(
        &self,
        workspace: &Path,
        timeout: Duration,
    ) -> (Option<bool>, ToolExecutionRecord) {
        let Some(go) = find_binary("go") else {
            return (None, ToolExecutionRecord::not_found("go"));
        };
        let output = run_tool(&go, &["build", "./..."], workspace, timeout, "build:go").await;
        match output {
            Ok(o) => (Some(o.success()), record_from_output("go", &o)),
            Err(e) => (
                None,
                ToolExecutionRecord {
                    tool_used: "go".to_string(),
                    stderr: Some(e.to_string()),
                    ..Default::default()
                },
            ),
        }
    }

    async fn run_tests(
        &self,
        workspace: &Path,
        timeout: Duration,
    ) -> (TestExecution, CoverageReport) {
        let Some(go) = find_binary("go") else {
            return (TestExecution::default(), CoverageReport::default());
        };
        let Ok(output) = run_tool(
            &go,
            &["test", "-cover", "./..."],
            workspace,
            timeout,
            "test:go",
        )
        .await
        else {
            return (TestExecution::default(), CoverageReport::default());
        };

        let (run, passed, failed) = parse_go_test_summary(&output.stdout());
        let execution = TestExecution {
            framework: Some("go test".to_string()),
            tests_run: run,
            tests_passed: passed,
            tests_failed: failed,
            tool_used: "go".to_string(),
        };
        let coverage = CoverageReport {
            percentage: parse_go_coverage(&output.stdout()),
            tool_used: "go test -cover".to_string(),
        };
        (execution, coverage)
    }

    async fn run_security_audit(
        &self,
        workspace: &Path,
        timeout: Duration,
    ) -> (SecurityAudit, DependencyAudit) {
        let Some(govulncheck) = find_binary("govulncheck") else {
            return (SecurityAudit::default(), DependencyAudit::default());
        };
        let Ok(output) = run_tool(
            &govulncheck,
            &["-json", "./..."],
            workspace,
            timeout,
            "audit:go",
        )
        .await
        else {
            return (SecurityAudit::default(), DependencyAudit::default());
        };

        let found = output
            .stdout_lines
            .iter()
            .filter(|l| l.contains("\"finding\""))
            .count() as u64;

        (
            SecurityAudit {
                tool_used: "govulncheck".to_string(),
                vulnerabilities_found: found,
                high_severity_count: 0,
                details: None,
            },
            DependencyAudit::default(),
        )
    }
}

/// Count per-package `ok`/`FAIL` lines; `go test` has no single summary line.
fn parse_go_test_summary(stdout: &str) -> (u64, u64, u64) {
    let mut passed = 0;
    let mut failed = 0;
    for line in stdout.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("ok") {
            passed += 1;
        } else if trimmed.starts_with("FAIL") {
            failed += 1;
        }
    }
    (passed + failed, passed, failed)
}

/// Parse the final `coverage: 72.3% of statements` line. Takes the last
/// match since `go test ./...` prints one such line per package.
fn parse_go_coverage(stdout: &str) -> Option<f64> {
    let re = Regex::new(r"coverage:\s*(\d+(?:\.\d+)?)%").ok()?;
    re.captures_iter(stdout)
        .last()?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_test_summary() {
        let stdout = "ok  \tfoo/bar\t0.01s\nFAIL\tfoo/baz\t0.02s\n";
        assert_eq!(parse_go_test_summary(stdout), (2, 1, 1));
    }

    #[test]
    fn test_parse_go_coverage() {
        let stdout = "ok  \tfoo/bar\tcoverage: 72.3% of statements\n";
        assert_eq!(parse_go_coverage(stdout), Some(72.3));
    }

    #[test]
    fn test_parse_go_coverage_absent() {
        assert_eq!(parse_go_coverage("ok  \tfoo/bar\t0.01s\n"), None);
    }
}
