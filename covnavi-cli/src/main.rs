use std::path::PathBuf;

use clap::Parser;
use covnavi_core::error::{CatalogueError, ConfigError, CoverageError, CovnaviError, QueryError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "covnavi",
    version,
    about = "Aggregate branch coverage per conditional and triage the weak spots"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: ./covnavi.toml when present)
    #[arg(long, global = true, env = "COVNAVI_CONFIG")]
    config: Option<PathBuf>,
}

/// Map an error to the process exit code.
///
///   0: success (including an interrupted review)
///   1: anything else
///   2: configuration or usage error
///   3: graph engine failure
///   4: coverage database or catalogue persistence failure
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CovnaviError>() {
            return match e {
                CovnaviError::Query(_) => 3,
                CovnaviError::Coverage(_) | CovnaviError::Catalogue(_) => 4,
                CovnaviError::Config(_) => 2,
            };
        }
        if cause.is::<QueryError>() {
            return 3;
        }
        if cause.is::<CoverageError>() || cause.is::<CatalogueError>() {
            return 4;
        }
        if cause.is::<ConfigError>() {
            return 2;
        }
    }
    1
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let globals = commands::Globals {
        config: cli.config,
        quiet: cli.quiet,
    };
    match runtime.block_on(commands::run(cli.command, globals)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
