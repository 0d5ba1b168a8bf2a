use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use covnavi_core::aggregate::Aggregator;
use covnavi_core::coverage::CoverageKey;
use covnavi_core::coverage::sqlite::SqliteCoverage;
use covnavi_core::graph::gremlin::GremlinClient;
use covnavi_core::progress::IndicatifReporter;

use super::Globals;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Line coverage database (see `covnavi import`)
    pub coverage_db: PathBuf,

    /// Where to write the catalogue JSON
    pub output: PathBuf,

    /// Graph database root (overrides `graph.endpoint`)
    pub graph_endpoint: Option<String>,
}

pub async fn run(args: BuildArgs, globals: &Globals) -> anyhow::Result<()> {
    let mut config = globals.load_config()?;
    if let Some(endpoint) = args.graph_endpoint {
        config.graph.endpoint = endpoint;
    }

    let coverage = SqliteCoverage::open(&args.coverage_db, CoverageKey::from_config(&config.coverage))
        .with_context(|| format!("Cannot open database: {}", args.coverage_db.display()))?;

    let mut graph = GremlinClient::new(&config.graph.endpoint);
    if let Some(path) = &config.graph.step_library {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read step library: {}", path.display()))?;
        graph = graph.with_step_library(source);
    }
    graph
        .ping()
        .await
        .with_context(|| format!("Cannot reach graph engine at {}", graph.endpoint()))?;

    let progress = if globals.quiet {
        IndicatifReporter::hidden()
    } else {
        IndicatifReporter::new()
    };
    let report = Aggregator::new(&graph, &coverage, &config.graph)
        .build(&progress)
        .await
        .context("Catalogue build failed")?;
    drop(coverage);

    let saved = report
        .catalogue
        .save(&args.output)
        .with_context(|| format!("Cannot save catalogue: {}", args.output.display()))?;

    if !globals.quiet {
        for (node_type, count) in &report.enumerated {
            println!("  {node_type:<20} {count:>6}");
        }
        println!(
            "Built {} conditional(s), skipped {}",
            report.catalogue.len(),
            report.skipped.len()
        );
        println!("  Catalogue: {}", saved.path.display());
        if let Some(backup) = &saved.backup {
            println!("  Previous:  {}", backup.display());
        }
    }
    Ok(())
}
