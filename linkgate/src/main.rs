mod config;
mod observability;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError};
use observability::ObservabilityError;
use redirector::RedirectorError;
use redirector::classify::{Destination, classify};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "linkgate", version, about = "Short link redirect and conversion tracking gateway")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve redirects
    Run {
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Print how a destination would be classified
    Classify { destination: String },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Observability(#[from] ObservabilityError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Redirector(#[from] RedirectorError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Run { config } => match run(config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "linkgate stopped");
                eprintln!("linkgate: {e}");
                ExitCode::FAILURE
            }
        },
        CliCommand::Classify { destination } => match classify(Some(&destination)) {
            Ok(Destination::Absolute(url)) => {
                println!("absolute {url}");
                ExitCode::SUCCESS
            }
            Ok(Destination::Relative(path)) => {
                println!("relative {path}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("rejected: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run(path: PathBuf) -> Result<(), CliError> {
    let config = Config::from_file(&path)?.with_env_overrides(|name| std::env::var(name).ok())?;

    let _sentry = observability::init_logging(config.common.logging.as_ref())?;
    observability::init_metrics(config.common.metrics.as_ref())?;
    tracing::info!(config = %path.display(), "Starting linkgate");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(redirector::run(config.redirector))?;

    Ok(())
}
