// Integration test utilities and fixtures for covnavi.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use covnavi_core::coverage::CoverageKey;
use covnavi_core::coverage::sqlite::SqliteCoverage;
use covnavi_core::graph::memory::MemoryGraph;
use covnavi_core::review::{Decision, Operator};
use covnavi_core::types::NodeId;

/// Graph paths carry this prefix; the default `graph.source_prefix` strips it.
pub const SOURCE_PREFIX: &str = "/a";

/// A control-flow graph of a small C project, built one statement at a time.
#[derive(Debug, Default)]
pub struct Scenario {
    pub graph: MemoryGraph,
    next_id: u64,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    fn id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn cfg(&mut self, node_type: &str, code: &str, line: u32) -> NodeId {
        let id = self.id();
        self.graph
            .add_cfg_node(id, node_type, code, Some(&format!("{line}:4:0:0")))
    }

    /// `if (cond)` at `line` in `file` (source-relative), true body at
    /// `line + 1`, false successor at `false_line`.
    pub fn if_statement(&mut self, file: &str, line: u32, false_line: u32) -> NodeId {
        let path = format!("{SOURCE_PREFIX}/{file}");
        let id = self.id();
        let stmt = self
            .graph
            .add_node(id, "IfStatement", &format!("if (c{id})"), Some(&format!("{line}:0:0:0")));
        let cond = self.cfg("Condition", &format!("c{id}"), line);
        let yes = self.cfg("ExpressionStatement", "then();", line + 1);
        let no = self.cfg("ExpressionStatement", "after();", false_line);
        self.graph.add_ast_edge(stmt, cond);
        self.graph.add_flow_edge(cond, yes, Some("True"));
        self.graph.add_flow_edge(cond, no, Some("False"));
        for node in [stmt, cond, yes, no] {
            self.graph.set_file(node, &path);
        }
        stmt
    }

    /// `switch` at `line` with one case per entry of `cases`, `(label, line)`.
    /// Each case body is reached through a `Label` node.
    pub fn switch_statement(&mut self, file: &str, line: u32, cases: &[(&str, u32)]) -> NodeId {
        let path = format!("{SOURCE_PREFIX}/{file}");
        let id = self.id();
        let stmt = self
            .graph
            .add_node(id, "SwitchStatement", "switch (op)", Some(&format!("{line}:0:0:0")));
        let cond = self.cfg("Condition", "op", line);
        self.graph.add_ast_edge(stmt, cond);
        self.graph.set_file(stmt, &path);
        self.graph.set_file(cond, &path);
        for (label, case_line) in cases {
            let case_label = self.cfg("Label", &format!("case {label}:"), *case_line - 1);
            let body = self.cfg("ExpressionStatement", &format!("run_{label}();"), *case_line);
            self.graph.add_flow_edge(cond, case_label, Some(*label));
            self.graph.add_flow_edge(case_label, body, None);
            self.graph.set_file(case_label, &path);
            self.graph.set_file(body, &path);
        }
        stmt
    }
}

/// A coverage database on disk.
#[derive(Debug)]
pub struct CoverageFixture {
    pub dir: tempfile::TempDir,
    pub path: PathBuf,
}

impl CoverageFixture {
    /// Create a store holding `(filename, line, count)` rows.
    pub fn with_counts(counts: &[(&str, u32, u64)]) -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("coverage.db");
        let store = SqliteCoverage::create(&path, CoverageKey::default()).expect("create store");
        for (filename, line, count) in counts {
            store.insert(filename, *line, *count).expect("insert count");
        }
        Self { dir, path }
    }

    /// Open the store read-only, as the build phase does.
    pub fn open(&self) -> SqliteCoverage {
        SqliteCoverage::open(&self.path, CoverageKey::default()).expect("open store")
    }

    pub fn catalogue_path(&self) -> PathBuf {
        self.dir.path().join("catalogue.json")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Answers prompts from a fixed script; `^C` stands for an interrupt.
/// Running out of script behaves like end of input.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    script: VecDeque<Decision>,
    pub prompts: Vec<String>,
}

impl ScriptedOperator {
    pub fn new(script: &[&str]) -> Self {
        Self {
            script: script
                .iter()
                .map(|entry| match *entry {
                    "^C" => Decision::Interrupt,
                    input => Decision::Input(input.to_string()),
                })
                .collect(),
            prompts: Vec::new(),
        }
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn decide(&mut self, summary: &str) -> Decision {
        self.prompts.push(summary.to_string());
        self.script.pop_front().unwrap_or(Decision::Interrupt)
    }
}
