use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use spm::error::SpmError;
use spm::fetcher::{Fetcher, DEFAULT_REGISTRY};

/// Minimal dependency resolver and linker for npm-registry-shaped packages.
#[derive(Parser, Debug)]
#[command(name = "installer", version, about)]
struct Cli {
    /// Directory containing `spm-package.json`. Defaults to the current
    /// working directory.
    project_dir: Option<PathBuf>,

    /// Directory to install `spm_node_modules` into. Defaults to `project-dir`.
    install_dir: Option<PathBuf>,

    /// Override the registry host (useful for testing against a mock registry).
    #[arg(long)]
    registry: Option<String>,

    /// Raise log verbosity.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> spm::error::Result<()> {
    let project_dir = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| SpmError::io(".", e))?,
    };
    let install_dir = cli.install_dir.unwrap_or_else(|| project_dir.clone());

    let fetcher = Fetcher::with_registry(cli.registry.unwrap_or_else(|| DEFAULT_REGISTRY.to_string()));

    spm::install(&project_dir, &install_dir, &fetcher).await
}

fn print_error_chain(err: &SpmError) {
    println!("error: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        println!("caused by: {cause}");
        source = cause.source();
    }
}
