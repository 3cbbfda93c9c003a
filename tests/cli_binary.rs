use assert_cmd::Command;
use predicates::prelude::*;

fn integration_enabled() -> bool {
    std::env::var("CODESCORE_INTEGRATION").is_ok()
}

#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin("codescore").unwrap()
}

#[test]
fn help_flag() {
    if !integration_enabled() {
        return;
    }
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scorecard"));
}

#[test]
fn version_flag() {
    if !integration_enabled() {
        return;
    }
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("codescore"));
}

#[test]
fn missing_repo_url_rejected() {
    if !integration_enabled() {
        return;
    }
    cmd().assert().failure().code(2);
}

#[test]
fn unrecognized_scheme_exits_invalid_input() {
    if !integration_enabled() {
        return;
    }
    cmd()
        .arg("ftp://example.com/repo")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized repo_url scheme"));
}

#[test]
fn zero_timeout_exits_invalid_input() {
    if !integration_enabled() {
        return;
    }
    cmd()
        .args(["https://example.com/repo.git", "--timeout-seconds", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn unreachable_host_exits_fetch_failure() {
    if !integration_enabled() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    cmd()
        .args([
            "https://nonexistent.invalid/owner/repo.git",
            "--output-dir",
            tmp.path().to_str().unwrap(),
            "--timeout-seconds",
            "5",
        ])
        .assert()
        .failure()
        .code(3);
}
