use std::path::PathBuf;

/// Error taxonomy for the pipeline. Each fatal variant maps to one process
/// exit code in `run::exit_code_for`; soft failures (tool-missing,
/// tool-timeout, criterion parse errors) never construct an `Error` at all —
/// they are folded into `execution.errors` or an evidence confidence instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("fetch failed: {0}")]
    FetchFailure(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("rubric parse error: {0}")]
    RubricParse(String),

    #[error("metrics record failed schema validation: {0}")]
    SchemaMismatch(String),

    #[error("global pipeline deadline exceeded")]
    GlobalTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
