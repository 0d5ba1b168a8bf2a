//! Catalogue building: one normalized record per if/switch statement.

use tracing::{info, warn};

use crate::branches::{BranchExtractor, normalize_degenerate};
use crate::catalogue::Catalogue;
use crate::config::GraphSection;
use crate::coverage::CoverageLookup;
use crate::error::{QueryError, Result};
use crate::graph::{GraphClient, parse_combined_location};
use crate::progress::ProgressReporter;
use crate::types::{Conditional, Importance, NodeId};

/// A conditional that could not be built, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedConditional {
    pub id: NodeId,
    pub reason: String,
}

/// Per-conditional result of the build loop.
#[derive(Debug)]
pub enum ConditionalOutcome {
    Built(Conditional),
    Skipped(SkippedConditional),
}

/// Result of building a catalogue.
#[derive(Debug)]
pub struct BuildReport {
    pub catalogue: Catalogue,
    pub skipped: Vec<SkippedConditional>,
    /// Enumerated statements per node type, in query order.
    pub enumerated: Vec<(String, usize)>,
}

impl BuildReport {
    pub fn total_enumerated(&self) -> usize {
        self.enumerated.iter().map(|(_, n)| n).sum()
    }
}

/// Builds conditional records from the graph and the coverage store.
#[derive(Debug)]
pub struct Aggregator<'a> {
    extractor: BranchExtractor<'a>,
    conditional_types: &'a [String],
}

impl<'a> Aggregator<'a> {
    pub fn new(
        graph: &'a dyn GraphClient,
        coverage: &'a dyn CoverageLookup,
        settings: &'a GraphSection,
    ) -> Self {
        Self {
            extractor: BranchExtractor::new(graph, coverage, &settings.source_prefix),
            conditional_types: &settings.conditional_types,
        }
    }

    /// Enumerate all conditionals, build each, and assemble the sorted catalogue.
    ///
    /// Failing to enumerate is fatal; failing to build one conditional skips it.
    pub async fn build(&self, progress: &dyn ProgressReporter) -> Result<BuildReport> {
        let graph = self.extractor.graph();
        let mut worklist = Vec::new();
        let mut enumerated = Vec::new();
        for node_type in self.conditional_types {
            let ids = graph.nodes_of_type(node_type).await?;
            info!(node_type = %node_type, count = ids.len(), "Enumerated conditionals");
            progress.enumerated(node_type, ids.len());
            enumerated.push((node_type.clone(), ids.len()));
            worklist.extend(ids);
        }

        progress.begin(worklist.len());
        let mut built = Vec::with_capacity(worklist.len());
        let mut skipped = Vec::new();
        for id in worklist {
            match self.outcome(id, built.len()).await {
                ConditionalOutcome::Built(conditional) => {
                    built.push(conditional);
                    progress.processed(id, true);
                }
                ConditionalOutcome::Skipped(skip) => {
                    warn!(conditional = %skip.id, reason = %skip.reason, "Skipping conditional");
                    skipped.push(skip);
                    progress.processed(id, false);
                }
            }
        }
        progress.finish();

        info!(
            built = built.len(),
            skipped = skipped.len(),
            "Catalogue assembled"
        );
        Ok(BuildReport {
            catalogue: Catalogue::grouped(built),
            skipped,
            enumerated,
        })
    }

    /// Build one conditional, turning any failure into a skip.
    pub async fn outcome(&self, id: NodeId, index: usize) -> ConditionalOutcome {
        match self.build_conditional(id, index).await {
            Ok(conditional) => ConditionalOutcome::Built(conditional),
            Err(e) => ConditionalOutcome::Skipped(SkippedConditional {
                id,
                reason: e.to_string(),
            }),
        }
    }

    /// Build the record for one if/switch statement.
    pub async fn build_conditional(&self, id: NodeId, index: usize) -> Result<Conditional> {
        let graph = self.extractor.graph();
        let node = graph.node(id).await?;
        let condition = self.extractor.condition_of(id).await?;
        let location = condition
            .location
            .as_deref()
            .ok_or_else(|| QueryError::MissingNode(format!("location of condition {}", condition.id)))?;
        let file = graph.enclosing_file(condition.id).await?;
        let (filename, line) =
            parse_combined_location(&format!("{file}+{location}"), self.extractor.source_prefix())?;

        let mut branches = self.extractor.extract(id, &condition).await?;
        if branches.is_empty() {
            return Err(QueryError::MissingNode(format!("branches of conditional {id}")).into());
        }
        normalize_degenerate(&mut branches);

        let mut conditional = Conditional {
            id,
            index,
            code: node.code,
            filename,
            line,
            branches,
            branch_true: None,
            branch_false: None,
            importance: Importance::Show,
        };
        conditional.assign_branch_roles();
        Ok(conditional)
    }
}
