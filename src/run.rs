use std::path::Path;
use std::time::Instant;

use tracing::{error, info};

use crate::config::RunOptions;
use crate::error::Error;
use crate::evaluator;
use crate::evidence::EvidenceTracker;
use crate::fetch::RepositoryFetcher;
use crate::orchestrator::Orchestrator;
use crate::output;
use crate::rubric::{self, Rubric};
use crate::scoring::build_scorecard;

/// Map a fatal `Error` to the process exit code it belongs to (§7).
pub fn exit_code_for(error: &Error) -> i32 {
    match error {
        Error::InvalidInput(_)
        | Error::ConfigNotFound(_)
        | Error::ConfigParse(_)
        | Error::ConfigValidation(_) => 2,
        Error::FetchFailure(_) => 3,
        Error::GlobalTimeout => 5,
        Error::Workspace(_)
        | Error::Io(_)
        | Error::Json(_)
        | Error::Process(_)
        | Error::RubricParse(_)
        | Error::SchemaMismatch(_)
        | Error::Internal(_) => 4,
    }
}

fn load_rubric(options: &RunOptions) -> Result<(Rubric, String), Error> {
    match &options.checklist_config {
        Some(path) => {
            let rubric = Rubric::load(Path::new(path))?;
            Ok((rubric, path.clone()))
        }
        None => Ok((rubric::load_default()?, "bundled:rubric/default.toml".to_string())),
    }
}

/// Run one pipeline invocation end to end and return the process exit code
/// (§6.1): fetch + metrics, then — unless `enable_checklist` is false — the
/// checklist evaluator, evidence tracker, scoring mapper, and output writer.
pub async fn run(options: &RunOptions) -> i32 {
    let fetcher = RepositoryFetcher::default();
    let orchestrator = Orchestrator::new(fetcher, options.clone());

    let record = match orchestrator.run().await {
        Ok(record) => record,
        Err(e) => {
            error!(error = %e, "pipeline failed");
            return exit_code_for(&e);
        }
    };

    let output_dir = Path::new(&options.output_dir);
    if let Err(e) = output::write_metrics(output_dir, &record) {
        error!(error = %e, "failed to write metrics output");
        return exit_code_for(&e);
    }

    if record.execution.errors.iter().any(|e| e.tool == "global_timeout") {
        error!("global pipeline deadline exceeded; wrote partial metrics output");
        return exit_code_for(&Error::GlobalTimeout);
    }

    if !options.enable_checklist {
        info!("checklist disabled, metrics-only run complete");
        return 0;
    }

    let (rubric, rubric_path) = match load_rubric(options) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "failed to load rubric");
            return exit_code_for(&e);
        }
    };

    let started = Instant::now();
    let mut tracker = EvidenceTracker::new();
    let items = evaluator::evaluate_checklist(&rubric, &record, &mut tracker);
    let evaluation_duration = started.elapsed();

    let scorecard = build_scorecard(
        items,
        record.repository.clone(),
        tracker.summary(),
        rubric_path,
        record.execution.tools_used.clone(),
        evaluation_duration,
    );

    if let Err(e) = output::write_checklist_outputs(output_dir, &scorecard, &tracker, options.format) {
        error!(error = %e, "failed to write checklist outputs");
        return exit_code_for(&e);
    }

    info!(score = scorecard.total_score, "evaluation complete");
    0
}
