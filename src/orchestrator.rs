use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use crate::config::RunOptions;
use crate::error::Result;
use crate::fetch::{RepositoryDescriptor, RepositoryFetcher};
use crate::language::{self, Language};
use crate::metrics::{self, ExecutionError, MetricsRecord};
use crate::tools::{self, ToolRunner};
use crate::workspace::Workspace;

/// Placeholder commit identifier for a partial record written when the
/// global deadline is exceeded before a repository was ever resolved —
/// `validate_shape` still requires a 40-hex `commit_sha`, and there is no
/// real one to report.
const UNRESOLVED_SHA: &str = "0000000000000000000000000000000000000000";

/// Composes the workspace manager, repository fetcher, language detector and
/// tool runners into one metrics-producing pipeline invocation (§4.5).
///
/// A single straight-line async method, collaborators passed in by value at
/// construction — no service locator, no global state — mirroring the
/// teacher's `Orchestrator<S, R, B>::run_once`.
pub struct Orchestrator {
    fetcher: RepositoryFetcher,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(fetcher: RepositoryFetcher, options: RunOptions) -> Self {
        Self { fetcher, options }
    }

    /// Run one pipeline invocation end to end, honoring the global deadline
    /// on top of whatever budget remains for each stage.
    pub async fn run(&self) -> Result<MetricsRecord> {
        let deadline = Instant::now() + Duration::from_secs(self.options.timeout_seconds);
        let workspace = Workspace::acquire()?;

        let result = self.run_inner(workspace.path(), deadline).await;
        // `workspace` drops here regardless of `result`, releasing unconditionally.
        result
    }

    async fn run_inner(&self, workspace_path: &Path, deadline: Instant) -> Result<MetricsRecord> {
        let started = Instant::now();
        let mut errors = Vec::new();

        info!(url = %self.options.repo_url, "fetching repository");
        let remaining_budget = match remaining(deadline) {
            Ok(r) => r,
            Err(_) => {
                let placeholder = RepositoryDescriptor {
                    source_url: self.options.repo_url.clone(),
                    commit_sha: UNRESOLVED_SHA.to_string(),
                    primary_language: "unknown".to_string(),
                    cloned_at: Utc::now(),
                    size_mb: 0.0,
                };
                return Ok(self.timed_out_record(placeholder, "fetch", started, errors));
            }
        };
        let repository = self
            .fetcher
            .fetch(
                &self.options.repo_url,
                self.options.revision.as_deref(),
                workspace_path,
                remaining_budget,
            )
            .await?;

        info!("detecting primary language");
        let detection = language::detect(workspace_path);
        let mut repository = repository;
        repository.primary_language = detection.primary.to_string();

        if detection.primary == Language::Rust {
            errors.push(ExecutionError {
                tool: detection.primary.to_string(),
                phase: "dispatch".to_string(),
                message: "no runner implemented for detected language".to_string(),
            });
        }

        let remaining_budget = match remaining(deadline) {
            Ok(r) => r,
            Err(_) => return Ok(self.timed_out_record(repository, "dispatch", started, errors)),
        };
        let per_tool_timeout =
            remaining_budget.min(Duration::from_secs(self.options.timeout_seconds));

        let mut record = metrics::empty(repository);
        let runner = tools::for_language(detection.primary);

        info!(language = %detection.primary, "dispatching tool runners");
        dispatch(&runner, workspace_path, per_tool_timeout, &mut record, &mut errors).await;

        record.metrics.documentation = tools::analyze_documentation(workspace_path);

        record.execution.tools_used = collect_tools_used(&record);
        record.execution.errors = errors;
        record.execution.duration_seconds = started.elapsed().as_secs_f64();
        record.execution.timestamp = Some(Utc::now());

        info!(duration_s = record.execution.duration_seconds, "metrics pipeline complete");
        Ok(record)
    }

    /// Build the partial record written when the global deadline is hit
    /// mid-pipeline (§7 `global_timeout`): whatever was gathered so far,
    /// plus an explicit `execution.errors` entry marking the cancellation
    /// point, so the caller can still write output and report exit 5
    /// instead of discarding everything.
    fn timed_out_record(
        &self,
        repository: RepositoryDescriptor,
        phase: &str,
        started: Instant,
        mut errors: Vec<ExecutionError>,
    ) -> MetricsRecord {
        errors.push(ExecutionError {
            tool: "global_timeout".to_string(),
            phase: phase.to_string(),
            message: "global pipeline deadline exceeded; outstanding work cancelled".to_string(),
        });
        let mut record = metrics::empty(repository);
        record.execution.errors = errors;
        record.execution.duration_seconds = started.elapsed().as_secs_f64();
        record.execution.timestamp = Some(Utc::now());
        record
    }
}

/// Fan out the four tool-runner operations concurrently. Each owns its own
/// stdout/stderr buffers locally, so running them together never risks
/// interleaving records (§4.5). Four calls is within the CPU-count bound
/// the concurrency model allows for, so `tokio::join!` alone is the bounded
/// fan-out here — no separate semaphore has anything to gate.
async fn dispatch(
    runner: &tools::AnyToolRunner,
    workspace_path: &Path,
    timeout: Duration,
    record: &mut MetricsRecord,
    errors: &mut Vec<ExecutionError>,
) {
    let (lint, (build_success, build_details), (tests, coverage), (security, dependency)) = tokio::join!(
        runner.run_linting(workspace_path, timeout),
        runner.run_build(workspace_path, timeout),
        runner.run_tests(workspace_path, timeout),
        runner.run_security_audit(workspace_path, timeout),
    );

    if lint.tool_used == "none" {
        warn!("no lint tool found on PATH");
    }
    record.metrics.code_quality.lint_results = lint;
    record.metrics.code_quality.build_success = build_success;
    record.metrics.code_quality.build_details = build_details;
    record.metrics.code_quality.security_audit = security;
    record.metrics.code_quality.dependency_audit = dependency;

    record.metrics.testing.test_execution = tests;
    record.metrics.testing.coverage_report = coverage;

    for (tool, record_state) in [
        ("lint", &record.metrics.code_quality.lint_results.tool_used),
        ("build", &record.metrics.code_quality.build_details.tool_used),
    ] {
        if record_state == "none" {
            errors.push(ExecutionError {
                tool: tool.to_string(),
                phase: "dispatch".to_string(),
                message: "tool not found on PATH".to_string(),
            });
        }
    }
}

fn collect_tools_used(record: &MetricsRecord) -> Vec<String> {
    let mut tools = Vec::new();
    let q = &record.metrics.code_quality;
    for name in [
        &q.lint_results.tool_used,
        &q.build_details.tool_used,
        &q.security_audit.tool_used,
        &q.dependency_audit.tool_used,
    ] {
        if !name.is_empty() && name != "none" && !tools.contains(name) {
            tools.push(name.clone());
        }
    }
    let t = &record.metrics.testing;
    if !t.test_execution.tool_used.is_empty() && !tools.contains(&t.test_execution.tool_used) {
        tools.push(t.test_execution.tool_used.clone());
    }
    tools
}

fn remaining(deadline: Instant) -> Result<Duration> {
    let now = Instant::now();
    if now >= deadline {
        return Err(crate::error::Error::GlobalTimeout);
    }
    Ok(deadline - now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_past_deadline_is_timeout() {
        let deadline = Instant::now() - Duration::from_secs(1);
        assert!(matches!(
            remaining(deadline),
            Err(crate::error::Error::GlobalTimeout)
        ));
    }

    #[test]
    fn test_remaining_before_deadline_is_ok() {
        let deadline = Instant::now() + Duration::from_secs(10);
        assert!(remaining(deadline).is_ok());
    }

    #[tokio::test]
    async fn test_global_timeout_yields_partial_record_instead_of_err() {
        let options = RunOptions {
            repo_url: "https://example.invalid/owner/repo.git".to_string(),
            revision: None,
            output_dir: "./unused".to_string(),
            format: crate::cli::OutputFormat::Both,
            timeout_seconds: 0,
            enable_checklist: true,
            checklist_config: None,
            verbose: false,
        };
        let orchestrator = Orchestrator::new(RepositoryFetcher::default(), options);
        let record = orchestrator.run().await.expect("timeout should yield a partial record, not Err");
        assert_eq!(record.repository.commit_sha, UNRESOLVED_SHA);
        assert!(record.execution.errors.iter().any(|e| e.tool == "global_timeout" && e.phase == "fetch"));
    }

    #[test]
    fn test_collect_tools_used_dedupes_and_skips_none() {
        let mut record = metrics::empty(crate::fetch::RepositoryDescriptor {
            source_url: "x".to_string(),
            commit_sha: "a".repeat(40),
            primary_language: "python".to_string(),
            cloned_at: Utc::now(),
            size_mb: 1.0,
        });
        record.metrics.code_quality.lint_results.tool_used = "ruff".to_string();
        record.metrics.code_quality.build_details.tool_used = "none".to_string();
        record.metrics.testing.test_execution.tool_used = "ruff".to_string();
        let tools = collect_tools_used(&record);
        assert_eq!(tools, vec!["ruff".to_string()]);
    }
}
