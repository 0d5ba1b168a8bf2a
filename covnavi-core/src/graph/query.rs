// Gremlin script builder. Only integers and validated identifiers reach the script text.

use std::fmt::Write as _;

use crate::error::QueryError;
use crate::types::NodeId;

use super::{NodeFilter, Relation};

/// A validated identifier (node type, edge label) safe to embed in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(String);

impl Ident {
    pub fn new(raw: &str) -> Result<Self, QueryError> {
        let valid = !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(QueryError::Parse(format!(
                "{raw:?} is not a valid graph identifier"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A Gremlin traversal under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    script: String,
}

impl Traversal {
    /// Start at a single vertex.
    pub fn vertex(id: NodeId) -> Self {
        Self {
            script: format!("g.v({})", id.0),
        }
    }

    /// Start at every node of the given type, via the node index.
    pub fn node_index(node_type: &Ident) -> Self {
        Self {
            script: format!("queryNodeIndex(\"type:{}\")", node_type.as_str()),
        }
    }

    /// Follow outgoing edges of `relation` to their target vertices.
    #[must_use]
    pub fn out(mut self, relation: Relation) -> Self {
        let _ = write!(self.script, ".out('{}')", relation.edge_label());
        self
    }

    /// Keep vertices matching `filter`.
    pub fn filter(mut self, filter: &NodeFilter) -> Result<Self, QueryError> {
        let mut clauses = Vec::new();
        if filter.cfg_only {
            clauses.push("it.isCFGNode == 'True'".to_string());
        }
        if let Some(node_type) = &filter.node_type {
            let ident = Ident::new(node_type)?;
            clauses.push(format!("it.type == '{}'", ident.as_str()));
        }
        if !clauses.is_empty() {
            let _ = write!(self.script, ".filter{{{}}}", clauses.join(" && "));
        }
        Ok(self)
    }

    /// Follow outgoing edges of `relation`, yielding `[flowLabel, target]` pairs.
    #[must_use]
    pub fn out_edges_with_targets(mut self, relation: Relation) -> Self {
        let _ = write!(
            self.script,
            ".outE('{}').transform{{[it.flowLabel, it.inV.next()]}}",
            relation.edge_label()
        );
        self
    }

    /// File path of the function owning the current vertex.
    #[must_use]
    pub fn enclosing_file_path(mut self) -> Self {
        self.script.push_str(".functions().functionToFile().filepath");
        self
    }

    /// Emit vertex ids instead of vertices.
    #[must_use]
    pub fn ids(mut self) -> Self {
        self.script.push_str(".id");
        self
    }

    pub fn render(&self) -> &str {
        &self.script
    }
}
