use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::error::QueryError;
use crate::types::NodeId;

use super::{CFG_NODE_PROPERTY, GraphClient, Hop, NodeFilter, NodeHandle, Relation};

#[derive(Debug, Clone)]
struct MemoryEdge {
    from: NodeId,
    to: NodeId,
    relation: Relation,
    label: Option<String>,
}

/// In-process graph used by fixtures and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    nodes: BTreeMap<NodeId, NodeHandle>,
    edges: Vec<MemoryEdge>,
    files: HashMap<NodeId, String>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a non-CFG node (statement containers, functions).
    pub fn add_node(&mut self, id: u64, node_type: &str, code: &str, location: Option<&str>) -> NodeId {
        self.insert(id, node_type, code, location, false)
    }

    /// Add a node that takes part in the control-flow graph.
    pub fn add_cfg_node(
        &mut self,
        id: u64,
        node_type: &str,
        code: &str,
        location: Option<&str>,
    ) -> NodeId {
        self.insert(id, node_type, code, location, true)
    }

    fn insert(
        &mut self,
        id: u64,
        node_type: &str,
        code: &str,
        location: Option<&str>,
        cfg: bool,
    ) -> NodeId {
        let mut props = Map::new();
        props.insert("type".into(), Value::from(node_type));
        props.insert("code".into(), Value::from(code));
        if let Some(location) = location {
            props.insert("location".into(), Value::from(location));
        }
        if cfg {
            props.insert(CFG_NODE_PROPERTY.into(), Value::from("True"));
        }
        let id = NodeId(id);
        self.nodes.insert(id, NodeHandle::from_properties(id, props));
        id
    }

    pub fn add_ast_edge(&mut self, from: NodeId, to: NodeId) {
        self.edges.push(MemoryEdge {
            from,
            to,
            relation: Relation::Ast,
            label: None,
        });
    }

    pub fn add_flow_edge(&mut self, from: NodeId, to: NodeId, label: Option<&str>) {
        self.edges.push(MemoryEdge {
            from,
            to,
            relation: Relation::FlowsTo,
            label: label.map(str::to_string),
        });
    }

    /// Record the file path (as the engine reports it) of the function owning `id`.
    pub fn set_file(&mut self, id: NodeId, path: &str) {
        self.files.insert(id, path.to_string());
    }
}

#[async_trait::async_trait]
impl GraphClient for MemoryGraph {
    async fn nodes_of_type(&self, node_type: &str) -> Result<Vec<NodeId>, QueryError> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.node_type == node_type)
            .map(|n| n.id)
            .collect())
    }

    async fn node(&self, id: NodeId) -> Result<NodeHandle, QueryError> {
        self.nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| QueryError::MissingNode(format!("node {id}")))
    }

    async fn traverse_outgoing(
        &self,
        id: NodeId,
        relation: Relation,
        filter: &NodeFilter,
    ) -> Result<Vec<Hop>, QueryError> {
        let mut hops = Vec::new();
        for edge in self
            .edges
            .iter()
            .filter(|e| e.from == id && e.relation == relation)
        {
            let target = self.node(edge.to).await?;
            if filter.matches(&target) {
                hops.push(Hop {
                    label: edge.label.clone(),
                    target,
                });
            }
        }
        Ok(hops)
    }

    async fn enclosing_file(&self, id: NodeId) -> Result<String, QueryError> {
        self.files
            .get(&id)
            .cloned()
            .ok_or_else(|| QueryError::MissingNode(format!("file of node {id}")))
    }
}
