//! SinkNode: a block that terminates a connection.
//!
//! Models a slave device such as a memory or peripheral: it states its
//! requirements as a fixed upward parameter on its single input port.

use crate::graph::node::{FlowDeps, NodeIo, NodeRole};
use crate::graph::param::Parameter;
use crate::graph::port::{Cardinality, PortDescriptor, Protocol};
use std::sync::Arc;

#[derive(Debug)]
pub struct SinkNode {
    name: String,
    ports: [PortDescriptor; 1],
    demand: Parameter,
}

impl SinkNode {
    /// A sink whose input port accepts exactly one edge.
    pub fn new(name: impl Into<String>, protocol: Arc<Protocol>, demand: Parameter) -> Self {
        Self::with_cardinality(name, protocol, Cardinality::exactly(1), demand)
    }

    pub fn with_cardinality(
        name: impl Into<String>,
        protocol: Arc<Protocol>,
        cardinality: Cardinality,
        demand: Parameter,
    ) -> Self {
        Self {
            name: name.into(),
            ports: [PortDescriptor::input("in", protocol, cardinality)],
            demand,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    pub fn flow(&self) -> FlowDeps {
        FlowDeps::default()
    }

    pub fn role(&self) -> NodeRole {
        NodeRole::SinkOnly
    }

    pub fn downward(&self, _io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(Vec::new())
    }

    pub fn upward(&self, _io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(vec![self.demand.clone()])
    }
}
