use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use codescore::cli::Cli;
use codescore::config::RunOptions;
use codescore::run;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = match RunOptions::from_cli(&cli) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    info!(repo = %options.repo_url, "codescore starting");
    let exit_code = run::run(&options).await;
    std::process::exit(exit_code);
}
