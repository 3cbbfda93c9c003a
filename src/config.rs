use crate::cli::{Cli, OutputFormat};
use crate::error::{Error, Result};

/// Fully-resolved configuration for one pipeline invocation.
///
/// Unlike the CLI struct, every field here is non-optional (defaults have
/// already been applied) and validated. Flows through the pipeline by value;
/// nothing reads from a global.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub repo_url: String,
    pub revision: Option<String>,
    pub output_dir: String,
    pub format: OutputFormat,
    pub timeout_seconds: u64,
    pub enable_checklist: bool,
    pub checklist_config: Option<String>,
    pub verbose: bool,
}

impl RunOptions {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let options = Self {
            repo_url: cli.repo_url.clone(),
            revision: cli.revision.clone(),
            output_dir: cli.output_dir.clone(),
            format: cli.format,
            timeout_seconds: cli.timeout_seconds,
            enable_checklist: !cli.no_checklist,
            checklist_config: cli.checklist_config.clone(),
            verbose: cli.verbose,
        };
        validate(&options)?;
        Ok(options)
    }
}

fn validate(options: &RunOptions) -> Result<()> {
    if options.repo_url.trim().is_empty() {
        return Err(Error::InvalidInput("repo_url must not be empty".into()));
    }
    if !(options.repo_url.starts_with("http://")
        || options.repo_url.starts_with("https://")
        || options.repo_url.starts_with("git@")
        || options.repo_url.starts_with("ssh://")
        || options.repo_url.starts_with('/')
        || options.repo_url.starts_with("file://"))
    {
        return Err(Error::InvalidInput(format!(
            "unrecognized repo_url scheme: {}",
            options.repo_url
        )));
    }
    if options.timeout_seconds == 0 {
        return Err(Error::InvalidInput(
            "timeout_seconds must be > 0".to_string(),
        ));
    }
    if options.output_dir.trim().is_empty() {
        return Err(Error::InvalidInput("output_dir must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli_with(args: &[&str]) -> Cli {
        let mut full = vec!["codescore"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_defaults_applied() {
        let cli = cli_with(&["https://example.com/repo.git"]);
        let options = RunOptions::from_cli(&cli).unwrap();
        assert_eq!(options.repo_url, "https://example.com/repo.git");
        assert!(options.enable_checklist);
        assert_eq!(options.timeout_seconds, 300);
        assert_eq!(options.format, OutputFormat::Both);
    }

    #[test]
    fn test_no_checklist_flips_enable_checklist() {
        let cli = cli_with(&["https://example.com/repo.git", "--no-checklist"]);
        let options = RunOptions::from_cli(&cli).unwrap();
        assert!(!options.enable_checklist);
    }

    #[test]
    fn test_empty_url_rejected() {
        let cli = cli_with(&[""]);
        let err = RunOptions::from_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_unrecognized_scheme_rejected() {
        let cli = cli_with(&["ftp://example.com/repo"]);
        let err = RunOptions::from_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("unrecognized repo_url scheme"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cli = cli_with(&["https://example.com/repo.git", "--timeout-seconds", "0"]);
        let err = RunOptions::from_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("timeout_seconds must be > 0"));
    }

    #[test]
    fn test_ssh_url_accepted() {
        let cli = cli_with(&["git@github.com:owner/repo.git"]);
        assert!(RunOptions::from_cli(&cli).is_ok());
    }
}
