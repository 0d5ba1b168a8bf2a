// Branch extraction: from a conditional's Condition node to coverage-annotated branch records.

use std::collections::HashSet;

use tracing::debug;

use crate::coverage::CoverageLookup;
use crate::error::{QueryError, Result};
use crate::graph::{GraphClient, NodeFilter, NodeHandle, Relation, strip_source_prefix};
use crate::types::{Branch, LABEL_FALSE, LABEL_TRUE, NodeId};

/// Resolves the branches of one conditional and merges their line coverage.
#[derive(Clone, Copy)]
pub struct BranchExtractor<'a> {
    graph: &'a dyn GraphClient,
    coverage: &'a dyn CoverageLookup,
    source_prefix: &'a str,
}

impl std::fmt::Debug for BranchExtractor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchExtractor")
            .field("source_prefix", &self.source_prefix)
            .finish_non_exhaustive()
    }
}

impl<'a> BranchExtractor<'a> {
    pub fn new(
        graph: &'a dyn GraphClient,
        coverage: &'a dyn CoverageLookup,
        source_prefix: &'a str,
    ) -> Self {
        Self {
            graph,
            coverage,
            source_prefix,
        }
    }

    pub fn graph(&self) -> &'a dyn GraphClient {
        self.graph
    }

    pub fn source_prefix(&self) -> &'a str {
        self.source_prefix
    }

    /// The CFG `Condition` child of an if/switch statement.
    pub async fn condition_of(&self, conditional: NodeId) -> Result<NodeHandle> {
        let hops = self
            .graph
            .traverse_outgoing(conditional, Relation::Ast, &NodeFilter::condition())
            .await?;
        hops.into_iter()
            .next()
            .map(|hop| hop.target)
            .ok_or_else(|| QueryError::MissingNode(format!("condition of {conditional}")).into())
    }

    /// Branches of `conditional`, sorted by line, with execution counts attached.
    pub async fn extract(&self, conditional: NodeId, condition: &NodeHandle) -> Result<Vec<Branch>> {
        let hops = self
            .graph
            .traverse_outgoing(condition.id, Relation::FlowsTo, &NodeFilter::any())
            .await?;

        let mut branches = Vec::with_capacity(hops.len());
        for hop in hops {
            let target_id = hop.target.id;
            let file = self.graph.enclosing_file(target_id).await?;
            let filename = strip_source_prefix(&file, self.source_prefix)?.to_string();

            // gcov does not attribute counts to labels; use the statement they lead to.
            let resolved = self.resolve_past_labels(hop.target).await?;
            let line = match resolved.line()? {
                Some(line) => line,
                None => {
                    debug!(branch = %target_id, "Branch has no location, using condition line");
                    condition_line(condition)?
                }
            };

            let mut branch = Branch {
                parent_id: conditional,
                id: target_id,
                filename,
                line,
                code: resolved.code,
                cfg_label: hop.label.unwrap_or_default(),
                num_executions: 0,
                is_covered: false,
            };
            let count = self.coverage.lookup(&branch.filename, branch.line)?;
            branch.set_executions(count);
            branches.push(branch);
        }

        branches.sort_by_key(|b| b.line);
        Ok(branches)
    }

    /// Follow single control-flow successors until a non-`Label` node is reached.
    async fn resolve_past_labels(&self, start: NodeHandle) -> Result<NodeHandle> {
        let origin = start.id;
        let mut seen = HashSet::new();
        let mut node = start;
        while node.is_label() {
            if !seen.insert(node.id) {
                return Err(QueryError::Dangling(origin).into());
            }
            node = self
                .graph
                .traverse_outgoing(node.id, Relation::FlowsTo, &NodeFilter::any())
                .await?
                .into_iter()
                .next()
                .map(|hop| hop.target)
                .ok_or(QueryError::Dangling(origin))?;
        }
        Ok(node)
    }
}

/// Line of a Condition node; its absence means the graph is unusable for this conditional.
pub fn condition_line(condition: &NodeHandle) -> Result<u32> {
    condition
        .line()?
        .ok_or_else(|| QueryError::MissingNode(format!("location of condition {}", condition.id)).into())
}

/// Ensure a true/false pair exists when every edge reaches the same node.
///
/// Edges converging on one node (an empty `if` body) are coverage-equivalent,
/// so relabelling the first one changes only what is displayed.
pub fn normalize_degenerate(branches: &mut [Branch]) {
    let distinct: HashSet<NodeId> = branches.iter().map(|b| b.id).collect();
    if distinct.len() > 1 {
        return;
    }
    let has_pair = branches.iter().any(|b| b.cfg_label == LABEL_TRUE)
        && branches.iter().any(|b| b.cfg_label == LABEL_FALSE);
    if has_pair {
        return;
    }
    if let Some(first) = branches.first_mut() {
        first.cfg_label = if first.cfg_label == LABEL_TRUE {
            LABEL_FALSE.to_string()
        } else {
            LABEL_TRUE.to_string()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageKey;
    use crate::coverage::sqlite::SqliteCoverage;
    use crate::error::CovnaviError;
    use crate::graph::memory::MemoryGraph;

    const FILE: &str = "/a/src/io.c";

    /// `if (fd < 0) return -1; write(fd);` with the condition at line 10.
    fn simple_if(graph: &mut MemoryGraph) -> (NodeId, NodeId) {
        let stmt = graph.add_node(1, "IfStatement", "if (fd < 0)", Some("10:4:100:120"));
        let cond = graph.add_cfg_node(2, "Condition", "fd < 0", Some("10:8:104:109"));
        let ret = graph.add_cfg_node(3, "ReturnStatement", "return -1;", Some("11:8:120:130"));
        let write = graph.add_cfg_node(4, "ExpressionStatement", "write(fd);", Some("13:4:140:150"));
        graph.add_ast_edge(stmt, cond);
        graph.add_flow_edge(cond, write, Some("False"));
        graph.add_flow_edge(cond, ret, Some("True"));
        for id in [stmt, cond, ret, write] {
            graph.set_file(id, FILE);
        }
        (stmt, cond)
    }

    fn coverage(entries: &[(&str, u32, u64)]) -> SqliteCoverage {
        let store = SqliteCoverage::in_memory(CoverageKey::default()).unwrap();
        for (file, line, count) in entries {
            store.insert(file, *line, *count).unwrap();
        }
        store
    }

    fn branch(id: u64, label: &str) -> Branch {
        Branch {
            parent_id: NodeId(1),
            id: NodeId(id),
            filename: "src/io.c".into(),
            line: 5,
            code: String::new(),
            cfg_label: label.into(),
            num_executions: 0,
            is_covered: false,
        }
    }

    #[tokio::test]
    async fn branches_sorted_with_coverage() {
        let mut graph = MemoryGraph::new();
        let (stmt, cond_id) = simple_if(&mut graph);
        let cov = coverage(&[("src/io.c", 11, 0), ("src/io.c", 13, 25)]);
        let extractor = BranchExtractor::new(&graph, &cov, "/a");
        let cond = graph.node(cond_id).await.unwrap();

        let found = extractor.condition_of(stmt).await.unwrap();
        assert_eq!(found.id, cond.id);

        let branches = extractor.extract(stmt, &cond).await.unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].line, 11);
        assert_eq!(branches[0].cfg_label, "True");
        assert_eq!(branches[0].num_executions, 0);
        assert!(!branches[0].is_covered);
        assert_eq!(branches[1].line, 13);
        assert_eq!(branches[1].cfg_label, "False");
        assert_eq!(branches[1].num_executions, 25);
        assert!(branches[1].is_covered);
        assert!(branches.iter().all(|b| b.filename == "src/io.c" && b.parent_id == stmt));
    }

    #[tokio::test]
    async fn labels_are_skipped_but_keep_edge_identity() {
        let mut graph = MemoryGraph::new();
        let stmt = graph.add_node(1, "IfStatement", "if (err)", Some("20:4:0:0"));
        let cond = graph.add_cfg_node(2, "Condition", "err", Some("20:8:0:0"));
        let label = graph.add_cfg_node(3, "Label", "out:", Some("30:0:0:0"));
        let label2 = graph.add_cfg_node(4, "Label", "cleanup:", Some("31:0:0:0"));
        let free = graph.add_cfg_node(5, "ExpressionStatement", "free(p);", Some("32:4:0:0"));
        let next = graph.add_cfg_node(6, "ExpressionStatement", "use(p);", Some("22:4:0:0"));
        graph.add_ast_edge(stmt, cond);
        graph.add_flow_edge(cond, label, Some("True"));
        graph.add_flow_edge(cond, next, Some("False"));
        graph.add_flow_edge(label, label2, None);
        graph.add_flow_edge(label2, free, None);
        for id in [stmt, cond, label, label2, free, next] {
            graph.set_file(id, FILE);
        }
        let cov = coverage(&[("src/io.c", 32, 4), ("src/io.c", 30, 99)]);
        let extractor = BranchExtractor::new(&graph, &cov, "/a");
        let cond_handle = graph.node(cond).await.unwrap();

        let branches = extractor.extract(stmt, &cond_handle).await.unwrap();
        let skipped = branches.iter().find(|b| b.cfg_label == "True").unwrap();
        assert_eq!(skipped.id, label, "edge target id is kept");
        assert_eq!(skipped.line, 32);
        assert_eq!(skipped.code, "free(p);");
        assert_eq!(skipped.num_executions, 4);
    }

    #[tokio::test]
    async fn missing_location_falls_back_to_condition() {
        let mut graph = MemoryGraph::new();
        let stmt = graph.add_node(1, "IfStatement", "if (x)", Some("40:4:0:0"));
        let cond = graph.add_cfg_node(2, "Condition", "x", Some("40:8:0:0"));
        let exit = graph.add_cfg_node(3, "CFGExitNode", "EXIT", None);
        let body = graph.add_cfg_node(4, "ExpressionStatement", "y();", Some("41:8:0:0"));
        graph.add_ast_edge(stmt, cond);
        graph.add_flow_edge(cond, body, Some("True"));
        graph.add_flow_edge(cond, exit, Some("False"));
        for id in [stmt, cond, exit, body] {
            graph.set_file(id, FILE);
        }
        let cov = coverage(&[("src/io.c", 40, 8), ("src/io.c", 41, 3)]);
        let extractor = BranchExtractor::new(&graph, &cov, "/a");
        let cond_handle = graph.node(cond).await.unwrap();

        let branches = extractor.extract(stmt, &cond_handle).await.unwrap();
        assert_eq!(branches[0].line, 40);
        assert_eq!(branches[0].cfg_label, "False");
        assert_eq!(branches[0].num_executions, 8);
        assert_eq!(branches[1].line, 41);
    }

    #[tokio::test]
    async fn label_cycle_is_an_error() {
        let mut graph = MemoryGraph::new();
        let stmt = graph.add_node(1, "IfStatement", "if (x)", Some("1:0:0:0"));
        let cond = graph.add_cfg_node(2, "Condition", "x", Some("1:4:0:0"));
        let a = graph.add_cfg_node(3, "Label", "a:", Some("2:0:0:0"));
        let b = graph.add_cfg_node(4, "Label", "b:", Some("3:0:0:0"));
        graph.add_ast_edge(stmt, cond);
        graph.add_flow_edge(cond, a, Some("True"));
        graph.add_flow_edge(a, b, None);
        graph.add_flow_edge(b, a, None);
        for id in [stmt, cond, a, b] {
            graph.set_file(id, FILE);
        }
        let cov = coverage(&[]);
        let extractor = BranchExtractor::new(&graph, &cov, "/a");
        let cond_handle = graph.node(cond).await.unwrap();

        let err = extractor.extract(stmt, &cond_handle).await.unwrap_err();
        assert!(matches!(err, CovnaviError::Query(QueryError::Dangling(id)) if id == a));
    }

    #[tokio::test]
    async fn missing_condition_is_an_error() {
        let mut graph = MemoryGraph::new();
        let stmt = graph.add_node(1, "IfStatement", "if (x)", Some("1:0:0:0"));
        let cov = coverage(&[]);
        let extractor = BranchExtractor::new(&graph, &cov, "/a");
        assert!(matches!(
            extractor.condition_of(stmt).await,
            Err(CovnaviError::Query(QueryError::MissingNode(_)))
        ));
    }

    #[test]
    fn degenerate_pair_gets_both_labels() {
        let mut branches = vec![branch(9, "True"), branch(9, "True")];
        normalize_degenerate(&mut branches);
        let labels: HashSet<&str> = branches.iter().map(|b| b.cfg_label.as_str()).collect();
        assert_eq!(labels, HashSet::from(["True", "False"]));

        let mut branches = vec![branch(9, "False"), branch(9, "False")];
        normalize_degenerate(&mut branches);
        let labels: HashSet<&str> = branches.iter().map(|b| b.cfg_label.as_str()).collect();
        assert_eq!(labels, HashSet::from(["True", "False"]));
    }

    #[test]
    fn degenerate_pair_already_labelled_is_untouched() {
        let mut branches = vec![branch(9, "True"), branch(9, "False")];
        normalize_degenerate(&mut branches);
        assert_eq!(branches[0].cfg_label, "True");
        assert_eq!(branches[1].cfg_label, "False");
    }

    #[test]
    fn distinct_targets_are_untouched() {
        let mut branches = vec![branch(3, "True"), branch(4, "True")];
        normalize_degenerate(&mut branches);
        assert!(branches.iter().all(|b| b.cfg_label == "True"));
    }

    #[test]
    fn single_branch_is_flipped() {
        let mut branches = vec![branch(3, "True")];
        normalize_degenerate(&mut branches);
        assert_eq!(branches[0].cfg_label, "False");
        normalize_degenerate(&mut []);
    }
}
