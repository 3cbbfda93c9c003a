use std::path::Path;
use std::time::Duration;

use regex::Regex;

use super::{find_binary, find_first, record_from_output, run_tool, ToolRunner};
use crate::metrics::{
    CoverageReport, DependencyAudit, LintResults, SecurityAudit, TestExecution,
    ToolExecutionRecord,
};

pub struct JavascriptRunner;

fn package_manager(workspace: &Path) -> &'static str {
    if workspace.join("pnpm-lock.yaml").is_file() {
        "pnpm"
    } else if workspace.join("yarn.lock").is_file() {
        "yarn"
    } else {
        "npm"
    }
}

impl ToolRunner for JavascriptRunner {
    async fn run_linting(&self, workspace: &Path, timeout: Duration) -> LintResults {
        let Some(eslint) = find_binary("eslint") else {
            return LintResults {
                tool_used: "none".to_string(),
                ..Default::default()
            };
        };
        let output = run_tool(
            &eslint,
            &[".", "--format", "unix"],
            workspace,
            timeout,
            "lint:javascript",
        )
        .await;
        let Ok(output) = output else {
            return LintResults {
                tool_used: "eslint".to_string(),
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
            tool_used: "eslint".to_string(),
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
        let pm = package_manager(workspace);
        let Some(binary) = find_binary(pm) else {
            return (None, ToolExecutionRecord::not_found(pm));
        };
        let output = run_tool(&binary, &["run", "build"], workspace, timeout, "build:js").await;
        match output {
            Ok(o) => (Some(o.success()), record_from_output(pm, &o)),
            Err(e) => (
                None,
                ToolExecutionRecord {
                    tool_used: pm.to_string(),
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
        let pm = package_manager(workspace);
        let Some(binary) = find_binary(pm) else {
            return (TestExecution::default(), CoverageReport::default());
        };
        let has_c8 = find_binary("c8").is_some() || find_binary("nyc").is_some();
        let args: &[&str] = if has_c8 {
            &["exec", "c8", "npm", "test"]
        } else {
            &["test"]
        };
        let Ok(output) = run_tool(&binary, args, workspace, timeout, "test:js").await else {
            return (TestExecution::default(), CoverageReport::default());
        };

        let (run, passed, failed) = parse_jest_summary(&output.stdout());
        let execution = TestExecution {
            framework: Some("jest".to_string()),
            tests_run: run,
            tests_passed: passed,
            tests_failed: failed,
            tool_used: pm.to_string(),
        };
        let coverage = CoverageReport {
            percentage: parse_coverage_percent(&output.stdout()),
            tool_used: if has_c8 {
                "c8".to_string()
            } else {
                String::new()
            },
        };
        (execution, coverage)
    }

    async fn run_security_audit(
        &self,
        workspace: &Path,
        timeout: Duration,
    ) -> (SecurityAudit, DependencyAudit) {
        let Some((pm, binary)) = find_first(&["npm", "pnpm"]) else {
            return (SecurityAudit::default(), DependencyAudit::default());
        };
        let args: &[&str] = &["audit", "--json"];
        let Ok(output) = run_tool(&binary, args, workspace, timeout, "audit:js").await else {
            return (SecurityAudit::default(), DependencyAudit::default());
        };
        let parsed = serde_json::from_str::<serde_json::Value>(&output.stdout()).ok();
        let total = parsed
            .as_ref()
            .and_then(|v| v.pointer("/metadata/vulnerabilities/total"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let high = parsed
            .as_ref()
            .and_then(|v| v.pointer("/metadata/vulnerabilities/high"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        (
            SecurityAudit {
                tool_used: format!("{pm} audit"),
                vulnerabilities_found: total,
                high_severity_count: high,
                details: None,
            },
            DependencyAudit::default(),
        )
    }
}

/// Parse jest's `Tests:  1 failed, 3 passed, 4 total` summary line.
fn parse_jest_summary(stdout: &str) -> (u64, u64, u64) {
    let Some(line) = stdout.lines().find(|l| l.trim_start().starts_with("Tests:")) else {
        return (0, 0, 0);
    };
    let passed = extract_count(line, "passed").unwrap_or(0);
    let failed = extract_count(line, "failed").unwrap_or(0);
    let total = extract_count(line, "total").unwrap_or(0);
    (total.max(passed + failed), passed, failed)
}

fn extract_count(line: &str, keyword: &str) -> Option<u64> {
    let re = Regex::new(&format!(r"(\d+)\s+{keyword}\b")).ok()?;
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Parse istanbul/c8's `All files |  85.5 | ...` coverage table row.
fn parse_coverage_percent(stdout: &str) -> Option<f64> {
    let re = Regex::new(r"All files\s*\|\s*(\d+(?:\.\d+)?)").ok()?;
    re.captures(stdout)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jest_summary() {
        let stdout = "Tests:       1 failed, 3 passed, 4 total\n";
        assert_eq!(parse_jest_summary(stdout), (4, 3, 1));
    }

    #[test]
    fn test_parse_jest_summary_missing() {
        assert_eq!(parse_jest_summary("no summary here"), (0, 0, 0));
    }

    #[test]
    fn test_parse_coverage_percent() {
        let stdout = "File      | % Stmts |\nAll files |   85.5  |\n";
        assert_eq!(parse_coverage_percent(stdout), Some(85.5));
    }
}
