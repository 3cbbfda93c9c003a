#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} in {} failed: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Create a bare remote seeded with one commit, ready to be fetched.
pub fn setup_bare_repo_with_file(filename: &str, content: &str) -> tempfile::TempDir {
    let bare_dir = tempfile::TempDir::new().unwrap();
    run_git(bare_dir.path(), &["init", "--bare", "-q"]);
    run_git(bare_dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);

    let seed_dir = tempfile::TempDir::new().unwrap();
    run_git(seed_dir.path(), &["init", "-q"]);
    run_git(seed_dir.path(), &["config", "user.email", "test@test.com"]);
    run_git(seed_dir.path(), &["config", "user.name", "Test"]);
    std::fs::write(seed_dir.path().join(filename), content).unwrap();
    run_git(seed_dir.path(), &["add", "."]);
    run_git(seed_dir.path(), &["commit", "-q", "-m", "init"]);
    run_git(seed_dir.path(), &["branch", "-M", "main"]);
    run_git(
        seed_dir.path(),
        &["remote", "add", "origin", bare_dir.path().to_str().unwrap()],
    );
    run_git(seed_dir.path(), &["push", "-q", "-u", "origin", "main"]);

    bare_dir
}
