use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use covnavi_core::coverage::CoverageKey;
use covnavi_core::coverage::sqlite::SqliteCoverage;

use super::Globals;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Tab-separated `filename line count` listing (gcov markers `#####` and `-` read as 0)
    pub listing: PathBuf,

    /// Coverage database to create or extend
    pub coverage_db: PathBuf,
}

pub fn run(args: ImportArgs, globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;
    let file = File::open(&args.listing)
        .with_context(|| format!("Cannot open listing: {}", args.listing.display()))?;

    let store = SqliteCoverage::create(&args.coverage_db, CoverageKey::from_config(&config.coverage))
        .with_context(|| format!("Cannot open database: {}", args.coverage_db.display()))?;
    let stats = store
        .import_listing(BufReader::new(file))
        .with_context(|| format!("Cannot import {}", args.listing.display()))?;

    if !globals.quiet {
        println!(
            "Imported {} line record(s) ({} executed) into {}",
            stats.records,
            stats.executed,
            args.coverage_db.display()
        );
    }
    Ok(())
}
