//! Identity types for the negotiation graph.
//!
//! Node and edge IDs are newtypes over `u32` that serve as direct array indices
//! into their respective storage vectors, providing O(1) lookup. IDs are never
//! reused: the graph is append-only.

use crate::graph::port::PortDirection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into `Graph::nodes`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Reference to this node's `index`-th input port.
    pub fn input(self, index: u16) -> PortRef {
        PortRef {
            node: self,
            direction: PortDirection::Input,
            index,
        }
    }

    /// Reference to this node's `index`-th output port.
    pub fn output(self, index: u16) -> PortRef {
        PortRef {
            node: self,
            direction: PortDirection::Output,
            index,
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Index into `Graph::edges`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A port on a specific node. Input and output ports are numbered separately,
/// in the order the node declares them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub direction: PortDirection,
    pub index: u16,
}

impl PortRef {
    #[inline]
    pub fn port_index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PortRef(node={}, {:?}[{}])",
            self.node.0, self.direction, self.index
        )
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.direction {
            PortDirection::Input => "in",
            PortDirection::Output => "out",
        };
        write!(f, "{}.{}{}", self.node, side, self.index)
    }
}
