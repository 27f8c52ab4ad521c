//! Graph-specific error types.

use crate::graph::engine::FlowKey;
use crate::graph::id::{EdgeId, NodeId, PortRef};
use crate::graph::port::Cardinality;
use thiserror::Error;

/// A merge, adapter or node function rejected the values it was given.
///
/// `edge` names the edge the failure belongs to. For an edge merge that is the
/// edge itself; for a node function it is the edge whose value could not be
/// produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parameter mismatch at {at}{}: {reason}", located(.at, .edge))]
pub struct MismatchError {
    pub at: FlowKey,
    pub edge: Option<EdgeId>,
    pub reason: String,
}

impl MismatchError {
    pub fn new(at: FlowKey, reason: impl Into<String>) -> Self {
        let edge = match at {
            FlowKey::Edge(e) => Some(e),
            _ => None,
        };
        Self {
            at,
            edge,
            reason: reason.into(),
        }
    }

    /// Attribute a node-level failure to `edge`. Edge-level failures keep
    /// their own edge.
    pub fn on_edge(mut self, edge: Option<EdgeId>) -> Self {
        if self.edge.is_none() {
            self.edge = edge;
        }
        self
    }

    /// The edge this mismatch is attributed to.
    pub fn edge(&self) -> Option<EdgeId> {
        self.edge
    }
}

fn located(at: &FlowKey, edge: &Option<EdgeId>) -> String {
    match (at, edge) {
        (FlowKey::Edge(_), _) | (_, None) => String::new(),
        (_, Some(e)) => format!(" (on {})", e),
    }
}

/// Parameter flow loops back on itself. `chain` lists the keys in dependency
/// order, starting and ending at the key that was re-entered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Dependency cycle in parameter flow: {}", join_keys(.chain))]
pub struct CycleError {
    pub chain: Vec<FlowKey>,
}

impl CycleError {
    pub fn involves(&self, key: FlowKey) -> bool {
        self.chain.contains(&key)
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.chain.iter().filter_map(|k| k.node()).collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }
}

fn join_keys(chain: &[FlowKey]) -> String {
    let keys: Vec<String> = chain.iter().map(|k| k.to_string()).collect();
    keys.join(" -> ")
}

/// Errors raised while resolving parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(transparent)]
    Mismatch(#[from] MismatchError),

    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// Errors that can occur while building or querying the graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Cardinality error: {port} already has {count} connection(s), allowed {cardinality}")]
    Cardinality {
        port: PortRef,
        count: usize,
        cardinality: Cardinality,
    },

    #[error("Capability error: cannot bind {output} to {input}: {reason}")]
    Capability {
        output: PortRef,
        input: PortRef,
        reason: String,
    },

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Unknown port {0}")]
    UnknownPort(PortRef),

    #[error("Unknown edge {0}")]
    UnknownEdge(EdgeId),

    #[error("Graph is sealed: resolution has started")]
    Sealed,

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
