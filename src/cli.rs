use clap::{Parser, ValueEnum};

/// codescore — fetches a repository at a revision and emits an evidence-backed quality scorecard
#[derive(Parser, Debug)]
#[command(name = "codescore", version, about)]
pub struct Cli {
    /// Repository URL to clone
    pub repo_url: String,

    /// Revision (branch, tag, or commit) to check out. Defaults to the remote's default branch.
    #[arg(long)]
    pub revision: Option<String>,

    /// Directory where submission.json, score_input.json, evaluation_report.md and evidence/ are written
    #[arg(long, default_value = "./codescore-output")]
    pub output_dir: String,

    /// Which human-facing artifacts to emit
    #[arg(long, value_enum, default_value_t = OutputFormat::Both)]
    pub format: OutputFormat,

    /// Global pipeline deadline in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout_seconds: u64,

    /// Skip the checklist evaluator and only write metrics
    #[arg(long)]
    pub no_checklist: bool,

    /// Path override for the rubric file
    #[arg(long)]
    pub checklist_config: Option<String>,

    /// Enable detailed progress logging
    #[arg(long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Markdown,
    Both,
}
