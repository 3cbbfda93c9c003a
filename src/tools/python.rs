use std::path::Path;
use std::time::Duration;

use regex::Regex;

use super::{find_binary, find_first, record_from_output, run_tool, ToolRunner};
use crate::metrics::{
    CoverageReport, DependencyAudit, LintResults, SecurityAudit, TestExecution,
    ToolExecutionRecord,
};

pub struct PythonRunner;

impl ToolRunner for PythonRunner {
    async fn run_linting(&self, workspace: &Path, timeout: Duration) -> LintResults {
        // ruff preferred: single static binary, no interpreter plugin needed.
        let Some((tool, binary)) = find_first(&["ruff", "flake8"]) else {
            return LintResults {
                tool_used: "none".to_string(),
                ..Default::default()
            };
        };

        let args: &[&str] = if tool == "ruff" {
            &["check", "--output-format", "concise", "."]
        } else {
            &["."]
        };

        let output = match run_tool(&binary, args, workspace, timeout, "lint:python").await {
            Ok(o) => o,
            Err(e) => {
                return LintResults {
                    tool_used: tool,
                    issues: vec![format!("failed to invoke lint tool: {e}")],
                    ..Default::default()
                };
            }
        };

        let issues: Vec<String> = output
            .stdout_lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .cloned()
            .collect();

        LintResults {
            tool_used: tool,
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
        // `uv build` first; fall back to the current interpreter's `build`
        // module rather than a hard-coded `python3`/`python` name.
        if let Some(uv) = find_binary("uv") {
            let output = run_tool(&uv, &["build"], workspace, timeout, "build:python").await;
            return outcome_from(output, "uv");
        }
        if let Some(python) = find_binary("python3").or_else(|| find_binary("python")) {
            let output = run_tool(
                &python,
                &["-m", "build"],
                workspace,
                timeout,
                "build:python",
            )
            .await;
            return outcome_from(output, "python -m build");
        }
        (None, ToolExecutionRecord::not_found("a Python build frontend"))
    }

    async fn run_tests(
        &self,
        workspace: &Path,
        timeout: Duration,
    ) -> (TestExecution, CoverageReport) {
        let Some(pytest) = find_binary("pytest") else {
            return (TestExecution::default(), CoverageReport::default());
        };

        let has_cov = find_binary("coverage").is_some();
        let args: &[&str] = if has_cov {
            &["--cov", "-q"]
        } else {
            &["-q"]
        };
        let output = run_tool(&pytest, args, workspace, timeout, "test:python").await;
        let Ok(output) = output else {
            return (TestExecution::default(), CoverageReport::default());
        };

        let (run, passed, failed) = parse_pytest_summary(&output.stdout());
        let execution = TestExecution {
            framework: Some("pytest".to_string()),
            tests_run: run,
            tests_passed: passed,
            tests_failed: failed,
            tool_used: "pytest".to_string(),
        };

        let coverage = if has_cov {
            CoverageReport {
                percentage: parse_coverage_percent(&output.stdout()),
                tool_used: "coverage".to_string(),
            }
        } else {
            CoverageReport::default()
        };

        (execution, coverage)
    }

    async fn run_security_audit(
        &self,
        workspace: &Path,
        timeout: Duration,
    ) -> (SecurityAudit, DependencyAudit) {
        let Some((tool, binary)) = find_first(&["pip-audit", "safety"]) else {
            return (SecurityAudit::default(), DependencyAudit::default());
        };
        let args: &[&str] = if tool == "pip-audit" {
            &["--format", "json"]
        } else {
            &["check", "--json"]
        };
        let Ok(output) = run_tool(&binary, args, workspace, timeout, "audit:python").await else {
            return (SecurityAudit::default(), DependencyAudit::default());
        };

        let findings = serde_json::from_str::<serde_json::Value>(&output.stdout())
            .ok()
            .and_then(|v| v.as_array().map(|a| a.len() as u64))
            .unwrap_or(0);

        (
            SecurityAudit {
                tool_used: tool,
                vulnerabilities_found: findings,
                high_severity_count: 0,
                details: (!output.success()).then(|| output.stderr()),
            },
            DependencyAudit::default(),
        )
    }
}

fn outcome_from(
    output: crate::error::Result<crate::process::ProcessOutput>,
    tool: &str,
) -> (Option<bool>, ToolExecutionRecord) {
    match output {
        Ok(o) => {
            let success = o.success();
            (Some(success), record_from_output(tool, &o))
        }
        Err(e) => (
            None,
            ToolExecutionRecord {
                tool_used: tool.to_string(),
                stderr: Some(e.to_string()),
                ..Default::default()
            },
        ),
    }
}

/// Parse pytest's trailing summary line, e.g. `3 passed, 1 failed in 0.42s`.
fn parse_pytest_summary(stdout: &str) -> (u64, u64, u64) {
    let mut passed = 0;
    let mut failed = 0;
    for line in stdout.lines() {
        if let Some(n) = extract_count(line, "passed") {
            passed = n;
        }
        if let Some(n) = extract_count(line, "failed") {
            failed = n;
        }
    }
    (passed + failed, passed, failed)
}

/// Extract the integer immediately preceding `keyword`, e.g. `3` from
/// `3 passed, 1 failed in 0.42s`.
fn extract_count(line: &str, keyword: &str) -> Option<u64> {
    let re = Regex::new(&format!(r"(\d+)\s+{keyword}\b")).ok()?;
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Parse coverage.py's `TOTAL ... NN%` line from `--cov` terminal output.
fn parse_coverage_percent(stdout: &str) -> Option<f64> {
    let re = Regex::new(r"(?i)^TOTAL\s.*?(\d+(?:\.\d+)?)%").ok()?;
    stdout
        .lines()
        .find_map(|line| re.captures(line.trim_start())?.get(1)?.as_str().parse().ok())
}
