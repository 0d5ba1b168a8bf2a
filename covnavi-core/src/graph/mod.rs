//! Typed access to the control-flow graph engine.
//!
//! Pipeline code only talks to [`GraphClient`]. [`gremlin::GremlinClient`]
//! speaks to a Joern database over HTTP, [`memory::MemoryGraph`] serves
//! fixtures and tests.

pub mod gremlin;
pub mod memory;
pub mod query;

use serde_json::{Map, Value};

use crate::error::QueryError;
use crate::types::NodeId;

/// Node type of the evaluated expression under an if/switch statement.
pub const CONDITION_TYPE: &str = "Condition";

/// Node type of a jump target; carries no useful source location.
pub const LABEL_TYPE: &str = "Label";

/// Property marking nodes that take part in the control-flow graph.
pub const CFG_NODE_PROPERTY: &str = "isCFGNode";

/// Edge relations the pipeline traverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Syntax-tree parent to child.
    Ast,
    /// Control-flow successor; edges carry a flow label.
    FlowsTo,
}

impl Relation {
    /// Edge label used by the graph database.
    pub fn edge_label(self) -> &'static str {
        match self {
            Self::Ast => "IS_AST_PARENT",
            Self::FlowsTo => "FLOWS_TO",
        }
    }
}

/// Restricts traversal targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub node_type: Option<String>,
    pub cfg_only: bool,
}

impl NodeFilter {
    /// Any node.
    pub fn any() -> Self {
        Self::default()
    }

    /// The CFG `Condition` child of an if/switch statement.
    pub fn condition() -> Self {
        Self {
            node_type: Some(CONDITION_TYPE.to_string()),
            cfg_only: true,
        }
    }

    pub fn matches(&self, node: &NodeHandle) -> bool {
        if self.cfg_only && !node.is_cfg_node() {
            return false;
        }
        self.node_type
            .as_deref()
            .is_none_or(|wanted| node.node_type == wanted)
    }
}

/// A node as returned by the graph engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeHandle {
    pub id: NodeId,
    pub node_type: String,
    pub code: String,
    /// Raw `line:column:offset:end` string; `None` when the node has no location.
    pub location: Option<String>,
    pub properties: Map<String, Value>,
}

impl NodeHandle {
    /// Build a handle from a node's property map.
    pub fn from_properties(id: NodeId, properties: Map<String, Value>) -> Self {
        let text = |key: &str| properties.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            id,
            node_type: text("type").unwrap_or_default(),
            code: text("code").unwrap_or_default(),
            location: text("location").filter(|l| !l.is_empty()),
            properties,
        }
    }

    pub fn get_property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn is_cfg_node(&self) -> bool {
        self.get_property(CFG_NODE_PROPERTY)
            .is_some_and(|v| v.as_str() == Some("True") || v.as_bool() == Some(true))
    }

    pub fn is_label(&self) -> bool {
        self.node_type == LABEL_TYPE
    }

    /// Source line from the location string, if the node has one.
    pub fn line(&self) -> Result<Option<u32>, QueryError> {
        self.location.as_deref().map(parse_location_line).transpose()
    }
}

/// One traversed edge and the node it leads to.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    /// Flow label for `FlowsTo` edges (`"True"`, `"False"`, case value).
    pub label: Option<String>,
    pub target: NodeHandle,
}

/// Read-only traversal interface over the control-flow graph.
#[async_trait::async_trait]
pub trait GraphClient: Send + Sync {
    /// All nodes whose `type` equals `node_type`, in engine order.
    async fn nodes_of_type(&self, node_type: &str) -> Result<Vec<NodeId>, QueryError>;

    /// Fetch a single node.
    async fn node(&self, id: NodeId) -> Result<NodeHandle, QueryError>;

    /// Follow outgoing edges of `relation` from `id`, keeping targets that match `filter`.
    async fn traverse_outgoing(
        &self,
        id: NodeId,
        relation: Relation,
        filter: &NodeFilter,
    ) -> Result<Vec<Hop>, QueryError>;

    /// Path of the file containing the function that owns `id`.
    async fn enclosing_file(&self, id: NodeId) -> Result<String, QueryError>;
}

/// Line number from a `line:column:...` location string.
pub fn parse_location_line(location: &str) -> Result<u32, QueryError> {
    let head = location.split(':').next().unwrap_or_default().trim();
    head.parse().map_err(|_| QueryError::MalformedLocation {
        raw: location.to_string(),
        message: "expected a line number before the first ':'".into(),
    })
}

/// Strip the fixed-length source prefix and anything from the first `:` on.
///
/// The result has no leading `/`, so it can be joined onto a source root.
pub fn strip_source_prefix<'a>(raw: &'a str, prefix: &str) -> Result<&'a str, QueryError> {
    let rest = raw
        .get(prefix.len()..)
        .ok_or_else(|| QueryError::MalformedLocation {
            raw: raw.to_string(),
            message: format!("shorter than the {}-byte source prefix", prefix.len()),
        })?;
    let rest = rest.split(':').next().unwrap_or_default();
    Ok(rest.trim_start_matches('/'))
}

/// Split a combined `filepath+location` string into a relative filename and line.
pub fn parse_combined_location(raw: &str, prefix: &str) -> Result<(String, u32), QueryError> {
    let stripped = strip_source_prefix(raw, prefix)?;
    let (file, line) = stripped
        .rsplit_once('+')
        .ok_or_else(|| QueryError::MalformedLocation {
            raw: raw.to_string(),
            message: "missing '+' between file path and location".into(),
        })?;
    let line = line.trim().parse().map_err(|_| QueryError::MalformedLocation {
        raw: raw.to_string(),
        message: format!("{line:?} is not a line number"),
    })?;
    Ok((file.to_string(), line))
}
