//! IdentityNode: passes parameters through unchanged in both directions.

use crate::graph::node::{FlowDeps, NodeIo, NodeRole};
use crate::graph::param::Parameter;
use crate::graph::port::{Cardinality, PortDescriptor, Protocol};
use std::sync::Arc;

#[derive(Debug)]
pub struct IdentityNode {
    name: String,
    ports: [PortDescriptor; 2],
}

impl IdentityNode {
    pub fn new(name: impl Into<String>, protocol: Arc<Protocol>) -> Self {
        Self {
            name: name.into(),
            ports: [
                PortDescriptor::input("in", protocol.clone(), Cardinality::exactly(1)),
                PortDescriptor::output("out", protocol, Cardinality::exactly(1)),
            ],
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
        NodeRole::Interior
    }

    pub fn downward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(vec![io.single(0)?.clone()])
    }

    pub fn upward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(vec![io.single(0)?.clone()])
    }
}
