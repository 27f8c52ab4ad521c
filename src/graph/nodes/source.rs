//! SourceNode: a block that originates downward parameters.
//!
//! Models a bus master such as a core or DMA engine: it offers a fixed
//! downward parameter on its single output port and has no inputs, so it is a
//! natural root of the graph.

use crate::graph::node::{FlowDeps, NodeIo, NodeRole};
use crate::graph::param::Parameter;
use crate::graph::port::{Cardinality, PortDescriptor, Protocol};
use std::sync::Arc;

#[derive(Debug)]
pub struct SourceNode {
    name: String,
    ports: [PortDescriptor; 1],
    offer: Parameter,
}

impl SourceNode {
    /// A source whose output port accepts exactly one edge.
    pub fn new(name: impl Into<String>, protocol: Arc<Protocol>, offer: Parameter) -> Self {
        Self::with_cardinality(name, protocol, Cardinality::exactly(1), offer)
    }

    pub fn with_cardinality(
        name: impl Into<String>,
        protocol: Arc<Protocol>,
        cardinality: Cardinality,
        offer: Parameter,
    ) -> Self {
        Self {
            name: name.into(),
            ports: [PortDescriptor::output("out", protocol, cardinality)],
            offer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    pub fn flow(&self) -> FlowDeps {
        FlowDeps::detached_downward()
    }

    pub fn role(&self) -> NodeRole {
        NodeRole::Root
    }

    pub fn downward(&self, _io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(vec![self.offer.clone()])
    }

    pub fn upward(&self, _io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(Vec::new())
    }
}
