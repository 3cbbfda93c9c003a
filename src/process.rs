use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Configuration for spawning a child process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Option<Duration>,
    pub log_prefix: String,
    pub env: Vec<(String, String)>,
    pub stdin_data: Option<String>,
}

/// Final disposition of a spawned process. `TimedOut` is a soft outcome —
/// tool runners fold it into a `ToolExecutionRecord`, never an `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    TimedOut,
}

/// Output from a process run to completion or to its timeout deadline.
#[derive(Debug)]
pub struct ProcessOutput {
    pub outcome: ProcessOutcome,
    pub exit_code: i32,
    pub signal: Option<i32>,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.outcome == ProcessOutcome::Completed && self.exit_code == 0 && self.signal.is_none()
    }

    pub fn stdout(&self) -> String {
        self.stdout_lines.join("\n")
    }

    pub fn stderr(&self) -> String {
        self.stderr_lines.join("\n")
    }
}

/// Spawn a child process, stream its output line-by-line, and enforce the
/// configured timeout. The child is placed in its own process group on Unix
/// so a timeout kills the whole subtree, not just the direct child.
///
/// Returns `Ok` with `outcome = TimedOut` when the deadline elapses — this is
/// never an `Err`, since a slow external tool is a soft failure (§7), not a
/// pipeline error. `Err` is reserved for the process failing to spawn at all
/// or the plumbing around it breaking.
pub async fn spawn_and_stream(config: ProcessConfig) -> Result<ProcessOutput> {
    let started = Instant::now();
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args)
        .current_dir(&config.working_dir)
        .stdin(if config.stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &config.env {
        cmd.env(key, value);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::Process(format!("failed to spawn '{}': {e}", config.command)))?;

    let pid = child
        .id()
        .ok_or_else(|| Error::Process("child has no pid".into()))?;

    if let Some(data) = config.stdin_data {
        let mut stdin = child.stdin.take().expect("stdin is piped");
        tokio::spawn(async move {
            let _ = stdin.write_all(data.as_bytes()).await;
        });
    }

    let stdout = child.stdout.take().expect("stdout is piped");
    let stderr = child.stderr.take().expect("stderr is piped");

    let prefix_out = config.log_prefix.clone();
    let prefix_err = config.log_prefix;

    let stdout_task = tokio::spawn(async move {
        let mut lines = Vec::new();
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            info!("[{prefix_out}] {line}");
            lines.push(line);
        }
        lines
    });

    let stderr_task = tokio::spawn(async move {
        let mut lines = Vec::new();
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            warn!("[{prefix_err}] {line}");
            lines.push(line);
        }
        lines
    });

    let (outcome, status) = if let Some(dur) = config.timeout {
        match tokio::time::timeout(dur, child.wait()).await {
            Ok(r) => (
                ProcessOutcome::Completed,
                Some(r.map_err(|e| Error::Process(format!("wait error: {e}")))?),
            ),
            Err(_) => {
                kill_process_group(pid as i32).await;
                stdout_task.abort();
                stderr_task.abort();
                (ProcessOutcome::TimedOut, None)
            }
        }
    } else {
        (
            ProcessOutcome::Completed,
            Some(
                child
                    .wait()
                    .await
                    .map_err(|e| Error::Process(format!("wait error: {e}")))?,
            ),
        )
    };

    let (stdout_lines, stderr_lines) = if outcome == ProcessOutcome::TimedOut {
        (Vec::new(), Vec::new())
    } else {
        (
            stdout_task
                .await
                .map_err(|e| Error::Process(format!("stdout reader failed: {e}")))?,
            stderr_task
                .await
                .map_err(|e| Error::Process(format!("stderr reader failed: {e}")))?,
        )
    };

    let (exit_code, signal) = match &status {
        Some(status) => extract_exit_info(status),
        None => (-1, None),
    };

    Ok(ProcessOutput {
        outcome,
        exit_code,
        signal,
        stdout_lines,
        stderr_lines,
        elapsed: started.elapsed(),
    })
}

#[cfg(unix)]
async fn kill_process_group(pid: i32) {
    unsafe {
        libc::killpg(pid, libc::SIGTERM);
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    unsafe {
        libc::killpg(pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: i32) {}

fn extract_exit_info(status: &std::process::ExitStatus) -> (i32, Option<i32>) {
    if let Some(code) = status.code() {
        return (code, None);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return (128 + sig, Some(sig));
        }
    }
    (-1, None)
}
