//! AdapterNode: a block that converts parameters between two buses.
//!
//! The input and output ports may speak different protocols (for example a
//! 64-bit to 32-bit width converter). Downward values are transformed on the
//! way out, upward values on the way back in.
//!
//! A detached adapter ignores the values arriving on its ports and emits a
//! fixed offer downstream and a fixed demand upstream. That is the cycle
//! breaker for physical loops: the loop still exists in the topology, but
//! parameters no longer chase each other around it.

use crate::graph::merge::EdgeAdapter;
use crate::graph::node::{FlowDeps, NodeIo, NodeRole};
use crate::graph::param::{Direction, Parameter};
use crate::graph::port::{Cardinality, PortDescriptor, Protocol};
use std::sync::Arc;

#[derive(Debug)]
pub struct AdapterNode {
    name: String,
    ports: [PortDescriptor; 2],
    transform: EdgeAdapter,
    detached: Option<(Parameter, Parameter)>,
}

impl AdapterNode {
    pub fn new(
        name: impl Into<String>,
        inner: Arc<Protocol>,
        outer: Arc<Protocol>,
        transform: EdgeAdapter,
    ) -> Self {
        Self {
            name: name.into(),
            ports: [
                PortDescriptor::input("in", inner, Cardinality::exactly(1)),
                PortDescriptor::output("out", outer, Cardinality::exactly(1)),
            ],
            transform,
            detached: None,
        }
    }

    /// Emit `offer` downstream and `demand` upstream regardless of what
    /// arrives on the ports.
    pub fn detached(mut self, offer: Parameter, demand: Parameter) -> Self {
        self.detached = Some((offer, demand));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    pub fn flow(&self) -> FlowDeps {
        if self.detached.is_some() {
            FlowDeps::detached()
        } else {
            FlowDeps::default()
        }
    }

    pub fn role(&self) -> NodeRole {
        NodeRole::Interior
    }

    pub fn downward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        let out = match &self.detached {
            Some((offer, _)) => offer.clone(),
            None => self.transform.apply(Direction::Down, io.single(0)?)?,
        };
        Ok(vec![out])
    }

    pub fn upward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        let out = match &self.detached {
            Some((_, demand)) => demand.clone(),
            None => self.transform.apply(Direction::Up, io.single(0)?)?,
        };
        Ok(vec![out])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::merge::scale_field;
    use crate::graph::param::{FieldKind, Schema};

    fn bus(name: &str) -> Arc<Protocol> {
        let schema = Schema::new().field("width", FieldKind::Number);
        Protocol::builder(name).down(schema.clone()).up(schema).build()
    }

    #[test]
    fn test_width_conversion() {
        let node = AdapterNode::new(
            "narrow",
            bus("wide"),
            bus("narrow"),
            EdgeAdapter::new()
                .on_down(scale_field("width", 1, 2))
                .on_up(scale_field("width", 2, 1)),
        );
        let inward = vec![vec![Parameter::new().with("width", 64u64)]];
        let down = node.downward(&NodeIo::new(&inward, &[])).unwrap();
        assert_eq!(down[0].num("width"), Some(32));

        let outward = vec![vec![Parameter::new().with("width", 16u64)]];
        let up = node.upward(&NodeIo::new(&outward, &[])).unwrap();
        assert_eq!(up[0].num("width"), Some(32));
    }

    #[test]
    fn test_detached_ignores_inputs() {
        let offer = Parameter::new().with("width", 8u64);
        let demand = Parameter::new().with("width", 16u64);
        let node = AdapterNode::new("breaker", bus("b"), bus("b"), EdgeAdapter::identity())
            .detached(offer.clone(), demand.clone());
        assert!(!node.flow().down_reads_inward);
        assert!(!node.flow().up_reads_outward);
        assert_eq!(node.downward(&NodeIo::new(&[], &[])).unwrap(), vec![offer]);
        assert_eq!(node.upward(&NodeIo::new(&[], &[])).unwrap(), vec![demand]);
    }
}
