//! Author-defined nodes used by the integration tests

use super::builders::bus;
use diplomacy_rs::graph::{
    Cardinality, FlowDeps, NodeBehavior, NodeIo, NodeRole, PortDescriptor,
};
use diplomacy_rs::{Parameter, Protocol};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A pass-through stage that counts how often its functions run.
pub struct CountingNode {
    name: String,
    ports: Vec<PortDescriptor>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingNode {
    pub fn new(name: &str, protocol: Arc<Protocol>) -> Self {
        Self {
            name: name.to_string(),
            ports: vec![
                PortDescriptor::input("in", protocol.clone(), Cardinality::exactly(1)),
                PortDescriptor::output("out", protocol, Cardinality::exactly(1)),
            ],
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl NodeBehavior for CountingNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    fn downward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![io.single(0)?.clone()])
    }

    fn upward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![io.single(0)?.clone()])
    }
}

/// A stage whose downward value depends on the upward value it receives
/// and whose upward value depends on the downward value it receives.
pub struct EchoNode {
    name: String,
    ports: Vec<PortDescriptor>,
}

impl EchoNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ports: vec![
                PortDescriptor::input("in", bus(), Cardinality::exactly(1)),
                PortDescriptor::output("out", bus(), Cardinality::exactly(1)),
            ],
        }
    }
}

impl NodeBehavior for EchoNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    fn flow(&self) -> FlowDeps {
        FlowDeps {
            down_reads_outward_up: true,
            up_reads_inward_down: true,
            ..FlowDeps::default()
        }
    }

    fn downward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        io.single(0)?.intersect(io.feedback(0).first().ok_or("no feedback")?).map(|p| vec![p])
    }

    fn upward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(vec![io.single(0)?.clone()])
    }
}

/// A bus bridge root that offers a fixed value and accepts any number of
/// downstream connections on one port.
pub struct BridgeRoot {
    ports: Vec<PortDescriptor>,
    offer: Parameter,
}

impl BridgeRoot {
    pub fn new(protocol: Arc<Protocol>, offer: Parameter) -> Self {
        Self {
            ports: vec![PortDescriptor::output("out", protocol, Cardinality::star())],
            offer,
        }
    }
}

impl NodeBehavior for BridgeRoot {
    fn name(&self) -> &str {
        "bridge"
    }

    fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    fn role(&self) -> NodeRole {
        NodeRole::Root
    }

    fn downward(&self, _io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(vec![self.offer.clone()])
    }

    fn upward(&self, _io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(Vec::new())
    }
}

/// An interior tap point whose single input port may stay unconnected.
pub struct TapNode {
    ports: Vec<PortDescriptor>,
    demand: Parameter,
}

impl TapNode {
    pub fn new(protocol: Arc<Protocol>, demand: Parameter) -> Self {
        Self {
            ports: vec![PortDescriptor::input("in", protocol, Cardinality::optional())],
            demand,
        }
    }
}

impl NodeBehavior for TapNode {
    fn name(&self) -> &str {
        "tap"
    }

    fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    fn downward(&self, _io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(Vec::new())
    }

    fn upward(&self, _io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        Ok(vec![self.demand.clone()])
    }
}
