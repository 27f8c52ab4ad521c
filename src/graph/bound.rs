//! The frozen result of negotiation.
//!
//! A [`BoundGraph`] is a plain, owned snapshot: every reachable node with the
//! edges attached to it, and every reachable edge with its downward, upward
//! and resolved parameters. It has no ties to the engine and serializes to
//! JSON for whatever elaboration stage consumes it.

use crate::error::{DiplomacyError, Result};
use crate::graph::builder::Graph;
use crate::graph::id::{EdgeId, NodeId, PortRef};
use crate::graph::param::Parameter;
use crate::graph::validate::Reachability;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundEdge {
    pub id: EdgeId,
    pub output: PortRef,
    pub input: PortRef,
    pub protocol: String,
    /// `D(e)`, after the edge adapter.
    pub downward: Parameter,
    /// `U(e)`, after the edge adapter.
    pub upward: Parameter,
    pub resolved: Parameter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundNode {
    pub id: NodeId,
    pub name: String,
    /// Inward edges, port by port in bind order.
    pub inward: Vec<EdgeId>,
    /// Outward edges, port by port in bind order.
    pub outward: Vec<EdgeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundGraph {
    nodes: Vec<BoundNode>,
    edges: Vec<BoundEdge>,
}

impl BoundGraph {
    /// Snapshot the reachable part of a fully resolved graph. Edges the
    /// engine has no value for are left out.
    pub(crate) fn elaborate(graph: &Graph, reach: &Reachability) -> Self {
        let mut edges = Vec::new();
        for id in reach.edges() {
            let (Ok(edge), Some(resolved), Some((downward, upward))) =
                (graph.edge(id), graph.resolved(id), graph.edge_flows(id))
            else {
                continue;
            };
            edges.push(BoundEdge {
                id,
                output: edge.output,
                input: edge.input,
                protocol: edge.protocol.name().to_string(),
                downward,
                upward,
                resolved: resolved.clone(),
            });
        }

        let nodes = graph
            .node_ids()
            .zip(&graph.nodes)
            .filter(|(id, _)| reach.node(*id))
            .map(|(id, slot)| BoundNode {
                id,
                name: slot.name().to_string(),
                inward: slot.inward().filter(|e| reach.edge(*e)).collect(),
                outward: slot.outward().filter(|e| reach.edge(*e)).collect(),
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn nodes(&self) -> &[BoundNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[BoundEdge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&BoundNode> {
        self.nodes
            .binary_search_by_key(&id, |n| n.id)
            .ok()
            .map(|i| &self.nodes[i])
    }

    pub fn node_by_name(&self, name: &str) -> Option<&BoundNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&BoundEdge> {
        self.edges
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| &self.edges[i])
    }

    /// Resolved parameters on a node's inward edges.
    pub fn inward(&self, node: NodeId) -> Vec<&Parameter> {
        self.node(node)
            .map(|n| n.inward.iter().filter_map(|e| self.edge(*e)).map(|e| &e.resolved).collect())
            .unwrap_or_default()
    }

    /// Resolved parameters on a node's outward edges.
    pub fn outward(&self, node: NodeId) -> Vec<&Parameter> {
        self.node(node)
            .map(|n| n.outward.iter().filter_map(|e| self.edge(*e)).map(|e| &e.resolved).collect())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiplomacyError::Serialization(e.to_string()))
    }
}
