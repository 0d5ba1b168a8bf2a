// HTTP client for a Joern graph database exposing the Neo4j Gremlin plugin.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::QueryError;
use crate::types::NodeId;

use super::query::{Ident, Traversal};
use super::{GraphClient, Hop, NodeFilter, NodeHandle, Relation};

const SCRIPT_PATH: &str = "ext/GremlinPlugin/graphdb/execute_script";

#[derive(Debug)]
pub struct GremlinClient {
    client: Client,
    endpoint: String,
    step_library: Option<String>,
}

impl GremlinClient {
    /// `endpoint` is the database root, e.g. `http://localhost:7474/db/data/`.
    pub fn new(endpoint: &str) -> Self {
        let mut endpoint = endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        // reqwest is built without a bundled crypto provider.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        Self {
            client: Client::new(),
            endpoint,
            step_library: None,
        }
    }

    /// Prepend Gremlin step definitions (Joern's `functions()`, `queryNodeIndex`, ...) to every script.
    #[must_use]
    pub fn with_step_library(mut self, source: String) -> Self {
        self.step_library = Some(source);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check the database root answers before any traversal is issued.
    pub async fn ping(&self) -> Result<(), QueryError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(QueryError::Api { status, body })
        }
    }

    async fn run(&self, traversal: &Traversal) -> Result<Value, QueryError> {
        let script = match &self.step_library {
            Some(steps) => format!("{steps}\n{}", traversal.render()),
            None => traversal.render().to_string(),
        };
        debug!(script = traversal.render(), "Running Gremlin traversal");

        let resp = self
            .client
            .post(format!("{}{SCRIPT_PATH}", self.endpoint))
            .header("accept", "application/json")
            .json(&ScriptRequest { script: &script })
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(QueryError::Api { status, body });
        }

        resp.json()
            .await
            .map_err(|e| QueryError::Parse(e.to_string()))
    }
}

#[derive(Serialize)]
struct ScriptRequest<'a> {
    script: &'a str,
}

/// Node representation returned by the Neo4j REST API.
#[derive(Deserialize)]
struct RawNode {
    #[serde(rename = "self")]
    self_url: String,
    #[serde(default)]
    data: Map<String, Value>,
}

impl RawNode {
    fn into_handle(self) -> Result<NodeHandle, QueryError> {
        let id = node_id_from_url(&self.self_url)?;
        Ok(NodeHandle::from_properties(id, self.data))
    }
}

fn node_id_from_url(url: &str) -> Result<NodeId, QueryError> {
    url.rsplit('/')
        .next()
        .and_then(|tail| tail.parse().ok())
        .map(NodeId)
        .ok_or_else(|| QueryError::Parse(format!("no node id in {url:?}")))
}

/// Scripts yield either a list or, for single results, a bare value.
fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn parse_node(value: Value) -> Result<NodeHandle, QueryError> {
    serde_json::from_value::<RawNode>(value)
        .map_err(|e| QueryError::Parse(format!("expected a node: {e}")))?
        .into_handle()
}

fn parse_hop(value: Value) -> Result<Hop, QueryError> {
    let mut pair = into_list(value).into_iter();
    let (Some(label), Some(node), None) = (pair.next(), pair.next(), pair.next()) else {
        return Err(QueryError::Parse("expected a [label, node] pair".into()));
    };
    let label = match label {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    };
    Ok(Hop {
        label,
        target: parse_node(node)?,
    })
}

#[async_trait::async_trait]
impl GraphClient for GremlinClient {
    async fn nodes_of_type(&self, node_type: &str) -> Result<Vec<NodeId>, QueryError> {
        let traversal = Traversal::node_index(&Ident::new(node_type)?).ids();
        into_list(self.run(&traversal).await?)
            .into_iter()
            .map(|v| {
                v.as_u64()
                    .map(NodeId)
                    .ok_or_else(|| QueryError::Parse(format!("expected a node id, got {v}")))
            })
            .collect()
    }

    async fn node(&self, id: NodeId) -> Result<NodeHandle, QueryError> {
        into_list(self.run(&Traversal::vertex(id)).await?)
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::MissingNode(format!("node {id}")))
            .and_then(parse_node)
    }

    async fn traverse_outgoing(
        &self,
        id: NodeId,
        relation: Relation,
        filter: &NodeFilter,
    ) -> Result<Vec<Hop>, QueryError> {
        match relation {
            Relation::Ast => {
                let traversal = Traversal::vertex(id).out(relation).filter(filter)?;
                into_list(self.run(&traversal).await?)
                    .into_iter()
                    .map(|v| parse_node(v).map(|target| Hop { label: None, target }))
                    .collect()
            }
            Relation::FlowsTo => {
                let traversal = Traversal::vertex(id).out_edges_with_targets(relation);
                let hops = into_list(self.run(&traversal).await?)
                    .into_iter()
                    .map(parse_hop)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(hops
                    .into_iter()
                    .filter(|hop| filter.matches(&hop.target))
                    .collect())
            }
        }
    }

    async fn enclosing_file(&self, id: NodeId) -> Result<String, QueryError> {
        let traversal = Traversal::vertex(id).enclosing_file_path();
        into_list(self.run(&traversal).await?)
            .into_iter()
            .find_map(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| QueryError::MissingNode(format!("file of node {id}")))
    }
}
