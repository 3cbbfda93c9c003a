use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::process::{ProcessConfig, ProcessOutcome, spawn_and_stream};

/// Default cap on a cloned repository's on-disk size (§4.2).
pub const DEFAULT_SIZE_CAP_MB: u64 = 100;

/// Snapshot of the repository captured at clone time. Immutable after
/// `RepositoryFetcher::fetch` returns — nothing downstream mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub source_url: String,
    pub commit_sha: String,
    pub primary_language: String,
    pub cloned_at: DateTime<Utc>,
    pub size_mb: f64,
}

/// Narrow collaborator wrapper around the system `git` binary. This is the
/// "Git clone primitive" of §6.4 — `clone(url, revision?, dest) -> sha` — kept
/// deliberately thin: a `git clone` subprocess plus a `git rev-parse` does
/// everything this crate needs, so no git library is linked in.
pub struct RepositoryFetcher {
    size_cap_mb: u64,
}

impl Default for RepositoryFetcher {
    fn default() -> Self {
        Self {
            size_cap_mb: DEFAULT_SIZE_CAP_MB,
        }
    }
}

impl RepositoryFetcher {
    pub fn with_size_cap_mb(size_cap_mb: u64) -> Self {
        Self { size_cap_mb }
    }

    /// Clone `url` at `revision` (or the default branch tip, if `None`) into
    /// `dest`. `dest` must already exist and be empty (the workspace root).
    pub async fn fetch(
        &self,
        url: &str,
        revision: Option<&str>,
        dest: &Path,
        timeout: Duration,
    ) -> Result<RepositoryDescriptor> {
        let mut args = vec!["clone".to_string(), "--quiet".to_string()];
        if revision.is_none() {
            args.push("--depth".to_string());
            args.push("1".to_string());
        }
        args.push(url.to_string());
        args.push(".".to_string());

        let output = spawn_and_stream(ProcessConfig {
            command: "git".to_string(),
            args,
            working_dir: dest.to_path_buf(),
            timeout: Some(timeout),
            log_prefix: "fetch:clone".to_string(),
            env: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            stdin_data: None,
        })
        .await?;

        if output.outcome == ProcessOutcome::TimedOut {
            return Err(Error::FetchFailure(format!("clone of {url} timed out")));
        }
        if !output.success() {
            return Err(Error::FetchFailure(classify_clone_failure(
                url,
                &output.stderr(),
            )));
        }

        if let Some(rev) = revision {
            self.checkout(dest, rev, timeout).await?;
        }

        let commit_sha = self.resolve_sha(dest, timeout).await?;
        let size_mb = directory_size_mb(dest)?;
        if size_mb > self.size_cap_mb as f64 {
            return Err(Error::FetchFailure(format!(
                "repository size {size_mb:.1}MB exceeds cap of {}MB",
                self.size_cap_mb
            )));
        }

        info!(url, commit = %commit_sha, size_mb, "fetched repository");

        Ok(RepositoryDescriptor {
            source_url: url.to_string(),
            commit_sha,
            primary_language: "unknown".to_string(),
            cloned_at: Utc::now(),
            size_mb,
        })
    }

    async fn checkout(&self, dest: &Path, revision: &str, timeout: Duration) -> Result<()> {
        // The shallow clone above only ran when no revision was requested;
        // fetch the specific ref now so `checkout` has something to land on.
        let fetch_output = spawn_and_stream(ProcessConfig {
            command: "git".to_string(),
            args: vec![
                "fetch".to_string(),
                "--quiet".to_string(),
                "--depth".to_string(),
                "1".to_string(),
                "origin".to_string(),
                revision.to_string(),
            ],
            working_dir: dest.to_path_buf(),
            timeout: Some(timeout),
            log_prefix: "fetch:fetch-ref".to_string(),
            env: vec![],
            stdin_data: None,
        })
        .await?;
        if fetch_output.outcome == ProcessOutcome::TimedOut {
            return Err(Error::FetchFailure(format!("fetch of {revision} timed out")));
        }

        let checkout_output = spawn_and_stream(ProcessConfig {
            command: "git".to_string(),
            args: vec!["checkout".to_string(), "--quiet".to_string(), revision.to_string()],
            working_dir: dest.to_path_buf(),
            timeout: Some(timeout),
            log_prefix: "fetch:checkout".to_string(),
            env: vec![],
            stdin_data: None,
        })
        .await?;

        if !checkout_output.success() {
            // Fall back to FETCH_HEAD in case the ref above was a branch on
            // origin rather than a tag or bare SHA.
            let fallback = spawn_and_stream(ProcessConfig {
                command: "git".to_string(),
                args: vec!["checkout".to_string(), "--quiet".to_string(), "FETCH_HEAD".to_string()],
                working_dir: dest.to_path_buf(),
                timeout: Some(timeout),
                log_prefix: "fetch:checkout-fallback".to_string(),
                env: vec![],
                stdin_data: None,
            })
            .await?;
            if !fallback.success() {
                return Err(Error::FetchFailure(format!(
                    "revision '{revision}' not found: {}",
                    checkout_output.stderr()
                )));
            }
        }

        Ok(())
    }

    async fn resolve_sha(&self, dest: &Path, timeout: Duration) -> Result<String> {
        let output = spawn_and_stream(ProcessConfig {
            command: "git".to_string(),
            args: vec!["rev-parse".to_string(), "HEAD".to_string()],
            working_dir: dest.to_path_buf(),
            timeout: Some(timeout),
            log_prefix: "fetch:rev-parse".to_string(),
            env: vec![],
            stdin_data: None,
        })
        .await?;
        if !output.success() {
            return Err(Error::FetchFailure(format!(
                "failed to resolve HEAD: {}",
                output.stderr()
            )));
        }
        output
            .stdout_lines
            .first()
            .map(|s| s.trim().to_string())
            .filter(|s| s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| Error::FetchFailure("git rev-parse did not return a commit sha".into()))
    }
}

fn classify_clone_failure(url: &str, stderr: &str) -> String {
    let lower = stderr.to_lowercase();
    if lower.contains("authentication") || lower.contains("permission denied") {
        format!("authentication required for {url}")
    } else if lower.contains("not found") || lower.contains("does not exist") {
        format!("repository not found: {url}")
    } else if lower.contains("invalid") || lower.contains("unable to access") {
        format!("invalid repository url: {url}")
    } else {
        format!("clone of {url} failed: {stderr}")
    }
}

fn directory_size_mb(root: &Path) -> Result<f64> {
    let mut total: u64 = 0;
    for entry in walkdir_files(root)? {
        total += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }
    Ok(total as f64 / (1024.0 * 1024.0))
}

fn walkdir_files(root: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::Workspace(format!("failed to walk {}: {e}", dir.display())))?;
        for entry in entries {
            let entry = entry
                .map_err(|e| Error::Workspace(format!("failed to read entry: {e}")))?;
            let file_type = entry
                .file_type()
                .map_err(|e| Error::Workspace(format!("failed to stat entry: {e}")))?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else {
                out.push(entry);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_failure() {
        let msg = classify_clone_failure("https://x/y.git", "fatal: Authentication failed");
        assert!(msg.contains("authentication required"));
    }

    #[test]
    fn test_classify_not_found() {
        let msg = classify_clone_failure("https://x/y.git", "remote: Repository not found.");
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_classify_generic_failure() {
        let msg = classify_clone_failure("https://x/y.git", "fatal: something else broke");
        assert!(msg.contains("clone of"));
    }

    #[tokio::test]
    async fn test_fetch_local_bare_repo() {
        let bare = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();

        let init_worktree = tempfile::tempdir().unwrap();
        run(&init_worktree.path().to_path_buf(), &["init", "-q"]);
        run(&init_worktree.path().to_path_buf(), &["config", "user.email", "t@t.com"]);
        run(&init_worktree.path().to_path_buf(), &["config", "user.name", "t"]);
        run(
            &init_worktree.path().to_path_buf(),
            &["commit", "--allow-empty", "-q", "-m", "init"],
        );
        run(&init_worktree.path().to_path_buf(), &["branch", "-M", "main"]);
        run(bare.path(), &["init", "--bare", "-q"]);
        run(bare.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run(
            &init_worktree.path().to_path_buf(),
            &[
                "remote",
                "add",
                "origin",
                bare.path().to_str().unwrap(),
            ],
        );
        run(
            &init_worktree.path().to_path_buf(),
            &["push", "-q", "-u", "origin", "main"],
        );

        let fetcher = RepositoryFetcher::default();
        let descriptor = fetcher
            .fetch(
                bare.path().to_str().unwrap(),
                None,
                work.path(),
                Duration::from_secs(30),
            )
            .await
            .unwrap();
        assert_eq!(descriptor.commit_sha.len(), 40);
        assert_eq!(descriptor.source_url, bare.path().to_str().unwrap());
    }

    fn run(dir: &std::path::Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed in {dir:?}");
    }
}
