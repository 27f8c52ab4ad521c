//! NexusNode: the implicit aggregation point behind fan-out and fan-in.
//!
//! A fan-out nexus has one input and a many-edge output port: it broadcasts
//! the single downward value to every branch and reduces the branches' upward
//! values into one. A fan-in nexus is the mirror image. Either way, every
//! edge touching the nexus still resolves pairwise.

use crate::graph::merge::MergePolicy;
use crate::graph::node::{FlowDeps, NodeIo, NodeRole};
use crate::graph::param::Parameter;
use crate::graph::port::{Cardinality, PortDescriptor, Protocol};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NexusMode {
    /// One source, many sinks.
    FanOut,
    /// Many sources, one sink.
    FanIn,
}

#[derive(Debug)]
pub struct NexusNode {
    name: String,
    mode: NexusMode,
    policy: MergePolicy,
    ports: [PortDescriptor; 2],
}

impl NexusNode {
    pub fn new(
        name: impl Into<String>,
        mode: NexusMode,
        protocol: Arc<Protocol>,
        branches: usize,
        policy: MergePolicy,
    ) -> Self {
        let (inward, outward) = match mode {
            NexusMode::FanOut => (Cardinality::exactly(1), Cardinality::exactly(branches)),
            NexusMode::FanIn => (Cardinality::exactly(branches), Cardinality::exactly(1)),
        };
        Self {
            name: name.into(),
            mode,
            policy,
            ports: [
                PortDescriptor::input("in", protocol.clone(), inward),
                PortDescriptor::output("out", protocol, outward),
            ],
        }
    }

    pub fn mode(&self) -> NexusMode {
        self.mode
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    /// The single-side edge is settled before the group value is handed on:
    /// a fan-out broadcasts the resolved trunk, a fan-in returns it upward.
    pub fn flow(&self) -> FlowDeps {
        match self.mode {
            NexusMode::FanOut => FlowDeps {
                down_reads_resolved: true,
                ..FlowDeps::default()
            },
            NexusMode::FanIn => FlowDeps {
                up_reads_resolved: true,
                ..FlowDeps::default()
            },
        }
    }

    pub fn role(&self) -> NodeRole {
        NodeRole::Interior
    }

    pub fn downward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        let value = match self.mode {
            NexusMode::FanOut => io.single(0)?.clone(),
            NexusMode::FanIn => self.reduce(io.port(0))?,
        };
        Ok(vec![value])
    }

    pub fn upward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        let value = match self.mode {
            NexusMode::FanOut => self.reduce(io.port(0))?,
            NexusMode::FanIn => io.single(0)?.clone(),
        };
        Ok(vec![value])
    }

    fn reduce(&self, values: &[Parameter]) -> Result<Parameter, String> {
        self.policy
            .reduce(values)
            .map_err(|e| format!("{} aggregation failed: {}", self.policy, e))
    }
}
