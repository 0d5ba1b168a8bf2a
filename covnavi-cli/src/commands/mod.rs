pub mod build;
pub mod import;
pub mod review;

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use covnavi_core::config::CovnaviConfig;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a catalogue of conditionals with per-branch coverage
    Build(build::BuildArgs),
    /// Walk a catalogue and annotate conditionals
    Review(review::ReviewArgs),
    /// Load a line coverage listing into a coverage database
    Import(import::ImportArgs),
}

/// Flags shared by every subcommand.
#[derive(Debug)]
pub struct Globals {
    pub config: Option<PathBuf>,
    pub quiet: bool,
}

impl Globals {
    /// Explicit `--config`, else `covnavi.toml` in the working directory, else defaults.
    pub fn load_config(&self) -> anyhow::Result<CovnaviConfig> {
        let cwd = std::env::current_dir().context("Cannot read current directory")?;
        CovnaviConfig::discover(self.config.as_deref(), &cwd).context("Cannot load config")
    }
}

pub async fn run(cmd: Command, globals: Globals) -> anyhow::Result<()> {
    match cmd {
        Command::Build(args) => build::run(args, &globals).await,
        Command::Review(args) => review::run(args, &globals).await,
        Command::Import(args) => import::run(args, &globals),
    }
}
