use std::path::PathBuf;
use std::time::Duration;

use codescore::process::{ProcessConfig, ProcessOutcome, spawn_and_stream};

fn make_config(command: &str, args: &[&str]) -> ProcessConfig {
    ProcessConfig {
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        working_dir: PathBuf::from("."),
        timeout: None,
        log_prefix: "test".to_string(),
        env: vec![],
        stdin_data: None,
    }
}

#[tokio::test]
async fn test_mixed_stdout_stderr() {
    let config = make_config(
        "sh",
        &["-c", "echo out1; echo err1 >&2; echo out2; echo err2 >&2"],
    );
    let output = spawn_and_stream(config).await.unwrap();
    assert!(output.success());
    assert_eq!(output.stdout_lines, vec!["out1", "out2"]);
    assert_eq!(output.stderr_lines, vec!["err1", "err2"]);
}

#[tokio::test]
#[cfg(unix)]
async fn test_signal_killed() {
    let config = make_config("sh", &["-c", "kill -9 $$"]);
    let output = spawn_and_stream(config).await.unwrap();
    assert!(!output.success());
    assert_eq!(output.signal, Some(9));
}

#[tokio::test]
async fn test_timeout_kills_process_group() {
    let mut config = make_config("sleep", &["30"]);
    config.timeout = Some(Duration::from_millis(200));
    let output = spawn_and_stream(config).await.unwrap();
    assert_eq!(output.outcome, ProcessOutcome::TimedOut);
    assert!(!output.success());
}

#[tokio::test]
async fn test_spawn_failure() {
    let config = make_config("nonexistent_binary_xyz_123", &[]);
    let result = spawn_and_stream(config).await;
    assert!(result.is_err());
    let err = result.unwrap_err().to_string();
    assert!(err.contains("failed to spawn"));
}

#[tokio::test]
async fn test_stdout_with_output_before_failure() {
    let config = make_config("sh", &["-c", "echo before_fail; exit 1"]);
    let output = spawn_and_stream(config).await.unwrap();
    assert!(!output.success());
    assert_eq!(output.exit_code, 1);
    assert_eq!(output.stdout_lines, vec!["before_fail"]);
}

#[tokio::test]
async fn test_stdin_data_multiline() {
    let config = ProcessConfig {
        command: "cat".to_string(),
        args: vec![],
        working_dir: PathBuf::from("."),
        timeout: None,
        log_prefix: "test:stdin-multi".to_string(),
        env: vec![],
        stdin_data: Some("line1\nline2\nline3".to_string()),
    };
    let output = spawn_and_stream(config).await.unwrap();
    assert!(output.success());
    assert_eq!(output.stdout_lines, vec!["line1", "line2", "line3"]);
}
