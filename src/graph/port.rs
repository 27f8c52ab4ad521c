//! Port descriptors for the node system.
//!
//! Each node declares its ports (inputs/outputs) when it is constructed. A port
//! carries a [`Protocol`], which is both its capability signature and the edge
//! type that supplies the merge function, and a [`Cardinality`] bounding how
//! many edges may attach to it. The graph uses these to validate bindings.

use crate::graph::merge::{DefaultValue, Merge, MergePolicy};
use crate::graph::param::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// Allowed number of connections on a port, `min..=max` (`max = None` is unbounded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cardinality {
    pub min: usize,
    pub max: Option<usize>,
}

impl Cardinality {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn at_most(max: usize) -> Self {
        Self::range(0, max)
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    /// Zero or one connection.
    pub const fn optional() -> Self {
        Self::range(0, 1)
    }

    /// Any number of connections.
    pub const fn star() -> Self {
        Self::at_least(0)
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Whether one more connection would exceed the maximum.
    pub fn is_full(&self, count: usize) -> bool {
        self.max.is_some_and(|max| count >= max)
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::exactly(1)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{}..={}", self.min, max),
            None => write!(f, "{}..", self.min),
        }
    }
}

/// The statically comparable part of a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub down: Schema,
    pub up: Schema,
}

/// An edge type: the parameter shapes flowing each way, how they merge, and
/// what an unconnected port observes.
#[derive(Clone)]
pub struct Protocol {
    signature: Signature,
    merge: Arc<dyn Merge>,
    down_default: DefaultValue,
    up_default: DefaultValue,
}

impl Protocol {
    pub fn builder(name: impl Into<String>) -> ProtocolBuilder {
        ProtocolBuilder {
            signature: Signature {
                name: name.into(),
                down: Schema::new(),
                up: Schema::new(),
            },
            merge: Arc::new(MergePolicy::Intersect),
            down_default: DefaultValue::Absent,
            up_default: DefaultValue::Absent,
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn down_schema(&self) -> &Schema {
        &self.signature.down
    }

    pub fn up_schema(&self) -> &Schema {
        &self.signature.up
    }

    pub fn merger(&self) -> &dyn Merge {
        self.merge.as_ref()
    }

    pub fn down_default(&self) -> &DefaultValue {
        &self.down_default
    }

    pub fn up_default(&self) -> &DefaultValue {
        &self.up_default
    }

    /// Two ports may be bound only if their signatures agree exactly.
    pub fn is_compatible(&self, other: &Protocol) -> bool {
        self.signature == other.signature
    }

    /// Whether both sides would settle an edge the same way: same merge and
    /// same unconnected-port defaults.
    pub fn same_policy(&self, other: &Protocol) -> bool {
        let same_merge = match (self.merge.policy(), other.merge.policy()) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.merge, &other.merge),
        };
        same_merge && self.down_default == other.down_default && self.up_default == other.up_default
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("signature", &self.signature)
            .field("down_default", &self.down_default)
            .field("up_default", &self.up_default)
            .finish_non_exhaustive()
    }
}

pub struct ProtocolBuilder {
    signature: Signature,
    merge: Arc<dyn Merge>,
    down_default: DefaultValue,
    up_default: DefaultValue,
}

impl ProtocolBuilder {
    pub fn down(mut self, schema: Schema) -> Self {
        self.signature.down = schema;
        self
    }

    pub fn up(mut self, schema: Schema) -> Self {
        self.signature.up = schema;
        self
    }

    pub fn merge(mut self, merge: impl Merge + 'static) -> Self {
        self.merge = Arc::new(merge);
        self
    }

    /// Value seen by a node whose input port has no connections.
    pub fn down_default(mut self, default: DefaultValue) -> Self {
        self.down_default = default;
        self
    }

    /// Value seen by a node whose output port has no connections.
    pub fn up_default(mut self, default: DefaultValue) -> Self {
        self.up_default = default;
        self
    }

    pub fn build(self) -> Arc<Protocol> {
        Arc::new(Protocol {
            signature: self.signature,
            merge: self.merge,
            down_default: self.down_default,
            up_default: self.up_default,
        })
    }
}

/// Descriptor for a node's port.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: String,
    pub direction: PortDirection,
    pub protocol: Arc<Protocol>,
    pub cardinality: Cardinality,
}

impl PortDescriptor {
    pub fn input(name: impl Into<String>, protocol: Arc<Protocol>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            protocol,
            cardinality,
        }
    }

    pub fn output(
        name: impl Into<String>,
        protocol: Arc<Protocol>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            protocol,
            cardinality,
        }
    }

    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
}
