//! The negotiation graph and its build phase.
//!
//! Nodes and bindings accumulate in an append-only [`Graph`]. Binding is the
//! only mutating operation, and every binding is checked when it is made:
//! direction, capability signature, then cardinality. A rejected binding
//! leaves the graph exactly as it was.
//!
//! The first resolution request seals the graph. From then on `add_node` and
//! `bind` fail with [`GraphError::Sealed`].

use crate::config::NegotiationConfig;
use crate::graph::bound::BoundGraph;
use crate::graph::engine::Negotiator;
use crate::graph::error::{GraphError, GraphResult};
use crate::graph::id::{EdgeId, NodeId, PortRef};
use crate::graph::merge::{EdgeAdapter, MergePolicy};
use crate::graph::node::{AnyNode, FlowDeps, NodeRole};
use crate::graph::nodes::{NexusMode, NexusNode};
use crate::graph::port::{PortDescriptor, PortDirection, Protocol};
use std::collections::HashMap;
use std::sync::Arc;

/// A binding from an output port to an input port.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub output: PortRef,
    pub input: PortRef,
    pub protocol: Arc<Protocol>,
    pub adapter: EdgeAdapter,
    /// Overrides the protocol's merge. Set on the branches of a fan group so
    /// they settle with the group's policy.
    pub merge: Option<MergePolicy>,
}

/// A node plus its port layout and the edges attached to each port.
pub struct NodeSlot {
    pub node: AnyNode,
    pub inputs: Vec<PortDescriptor>,
    pub outputs: Vec<PortDescriptor>,
    /// Edges per input port, in bind order.
    pub in_edges: Vec<Vec<EdgeId>>,
    /// Edges per output port, in bind order.
    pub out_edges: Vec<Vec<EdgeId>>,
    /// Snapshot of `node.flow()` taken at insertion.
    pub flow: FlowDeps,
    pub role: NodeRole,
}

impl NodeSlot {
    fn new(node: AnyNode) -> GraphResult<Self> {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for port in node.ports() {
            if port.cardinality.max.is_some_and(|max| max < port.cardinality.min) {
                return Err(GraphError::InvalidNode(format!(
                    "{}: port '{}' has an empty cardinality range",
                    node.name(),
                    port.name
                )));
            }
            match port.direction {
                PortDirection::Input => inputs.push(port.clone()),
                PortDirection::Output => outputs.push(port.clone()),
            }
        }
        if inputs.len() > u16::MAX as usize || outputs.len() > u16::MAX as usize {
            return Err(GraphError::InvalidNode(format!(
                "{}: too many ports",
                node.name()
            )));
        }

        Ok(Self {
            in_edges: vec![Vec::new(); inputs.len()],
            out_edges: vec![Vec::new(); outputs.len()],
            flow: node.flow(),
            role: node.role(),
            inputs,
            outputs,
            node,
        })
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn port(&self, direction: PortDirection, index: usize) -> Option<&PortDescriptor> {
        match direction {
            PortDirection::Input => self.inputs.get(index),
            PortDirection::Output => self.outputs.get(index),
        }
    }

    pub fn port_edges(&self, direction: PortDirection, index: usize) -> &[EdgeId] {
        let table = match direction {
            PortDirection::Input => &self.in_edges,
            PortDirection::Output => &self.out_edges,
        };
        table.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All inward edges, port by port.
    pub fn inward(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.in_edges.iter().flatten().copied()
    }

    /// All outward edges, port by port.
    pub fn outward(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.out_edges.iter().flatten().copied()
    }

    pub fn connection_count(&self) -> usize {
        self.inward().count() + self.outward().count()
    }
}

/// One source bound to many sinks through an implicit aggregation node.
#[derive(Debug, Clone)]
pub struct FanOut {
    pub source: PortRef,
    pub sinks: Vec<PortRef>,
    pub policy: MergePolicy,
    /// Applied on the edge into the nexus.
    pub pre: EdgeAdapter,
    /// Applied on every edge out of the nexus.
    pub post: EdgeAdapter,
}

impl FanOut {
    pub fn new(source: PortRef, sinks: impl IntoIterator<Item = PortRef>) -> Self {
        Self {
            source,
            sinks: sinks.into_iter().collect(),
            policy: MergePolicy::default(),
            pre: EdgeAdapter::identity(),
            post: EdgeAdapter::identity(),
        }
    }

    pub fn policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pre(mut self, adapter: EdgeAdapter) -> Self {
        self.pre = adapter;
        self
    }

    pub fn post(mut self, adapter: EdgeAdapter) -> Self {
        self.post = adapter;
        self
    }
}

/// Many sources bound to one sink through an implicit aggregation node.
#[derive(Debug, Clone)]
pub struct FanIn {
    pub sources: Vec<PortRef>,
    pub sink: PortRef,
    pub policy: MergePolicy,
    /// Applied on every edge into the nexus.
    pub pre: EdgeAdapter,
    /// Applied on the edge out of the nexus.
    pub post: EdgeAdapter,
}

impl FanIn {
    pub fn new(sources: impl IntoIterator<Item = PortRef>, sink: PortRef) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            sink,
            policy: MergePolicy::default(),
            pre: EdgeAdapter::identity(),
            post: EdgeAdapter::identity(),
        }
    }

    pub fn policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pre(mut self, adapter: EdgeAdapter) -> Self {
        self.pre = adapter;
        self
    }

    pub fn post(mut self, adapter: EdgeAdapter) -> Self {
        self.post = adapter;
        self
    }
}

/// A fan-out or fan-in group.
#[derive(Debug, Clone)]
pub enum Fan {
    Out(FanOut),
    In(FanIn),
}

impl From<FanOut> for Fan {
    fn from(fan: FanOut) -> Self {
        Fan::Out(fan)
    }
}

impl From<FanIn> for Fan {
    fn from(fan: FanIn) -> Self {
        Fan::In(fan)
    }
}

/// The edges created by `bind_many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeGroup {
    pub nexus: NodeId,
    /// The edge on the single side of the nexus.
    pub trunk: EdgeId,
    /// The edges on the many side, in the order the ports were given.
    pub branches: Vec<EdgeId>,
}

/// The negotiation graph.
pub struct Graph {
    pub(crate) nodes: Vec<NodeSlot>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) marked_roots: Vec<NodeId>,
    pub(crate) config: NegotiationConfig,
    /// Created when the graph is sealed.
    pub(crate) engine: Option<Negotiator>,
    /// Cached result of the first successful `freeze`.
    pub(crate) frozen: Option<BoundGraph>,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(NegotiationConfig::default())
    }

    pub fn with_config(config: NegotiationConfig) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            marked_roots: Vec::new(),
            config,
            engine: None,
            frozen: None,
        }
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    // ── Graph building ──

    /// Add a node to the graph. Returns its NodeId.
    pub fn add_node(&mut self, node: impl Into<AnyNode>) -> GraphResult<NodeId> {
        self.ensure_open()?;
        let slot = NodeSlot::new(node.into())?;
        let id = NodeId(self.nodes.len() as u32);
        tracing::debug!(
            "Added node {} '{}' ({} in, {} out)",
            id,
            slot.name(),
            slot.inputs.len(),
            slot.outputs.len()
        );
        self.nodes.push(slot);
        Ok(id)
    }

    /// Designate `node` as a root for reachability, in addition to nodes
    /// whose role is already `Root`.
    pub fn mark_root(&mut self, node: NodeId) -> GraphResult<()> {
        self.ensure_open()?;
        self.slot(node)?;
        if !self.marked_roots.contains(&node) {
            self.marked_roots.push(node);
        }
        Ok(())
    }

    /// Bind an output port to an input port.
    pub fn bind(&mut self, output: PortRef, input: PortRef) -> GraphResult<EdgeId> {
        self.bind_with(output, input, EdgeAdapter::identity())
    }

    /// Bind an output port to an input port through an edge-local adapter.
    pub fn bind_with(
        &mut self,
        output: PortRef,
        input: PortRef,
        adapter: EdgeAdapter,
    ) -> GraphResult<EdgeId> {
        self.ensure_open()?;
        let protocol = self
            .check_binding(output, input)
            .inspect_err(|e| tracing::warn!("Rejected binding: {}", e))?;
        Ok(self.push_edge(output, input, protocol, adapter, None))
    }

    /// Bind a fan-out or fan-in group. An implicit [`NexusNode`] is inserted
    /// so that every edge still resolves pairwise. The whole group is checked
    /// before anything is recorded.
    pub fn bind_many(&mut self, fan: impl Into<Fan>) -> GraphResult<EdgeGroup> {
        self.ensure_open()?;
        match fan.into() {
            Fan::Out(fan) => self.bind_fan_out(fan),
            Fan::In(fan) => self.bind_fan_in(fan),
        }
        .inspect_err(|e| tracing::warn!("Rejected group binding: {}", e))
    }

    fn bind_fan_out(&mut self, fan: FanOut) -> GraphResult<EdgeGroup> {
        let protocol = self.group_protocol(fan.source, PortDirection::Output, &fan.sinks)?;

        // The nexus does not exist yet, so only the far ends need checking.
        let mut pending = HashMap::new();
        self.check_capacity(fan.source, 0)?;
        for &sink in &fan.sinks {
            self.check_pair(fan.source, sink)?;
            let extra = pending.entry(sink).or_insert(0);
            self.check_capacity(sink, *extra)?;
            *extra += 1;
        }

        let name = format!("{}-fanout", self.nodes[fan.source.node.index()].name());
        let nexus = self.push_nexus(name, NexusMode::FanOut, &protocol, fan.sinks.len(), fan.policy)?;
        let trunk = self.push_edge(fan.source, nexus.input(0), protocol.clone(), fan.pre, None);
        let branches = fan
            .sinks
            .iter()
            .map(|&sink| {
                let post = fan.post.clone();
                self.push_edge(nexus.output(0), sink, protocol.clone(), post, Some(fan.policy))
            })
            .collect();

        Ok(EdgeGroup {
            nexus,
            trunk,
            branches,
        })
    }

    fn bind_fan_in(&mut self, fan: FanIn) -> GraphResult<EdgeGroup> {
        let protocol = self.group_protocol(fan.sink, PortDirection::Input, &fan.sources)?;

        let mut pending = HashMap::new();
        self.check_capacity(fan.sink, 0)?;
        for &source in &fan.sources {
            self.check_pair(source, fan.sink)?;
            let extra = pending.entry(source).or_insert(0);
            self.check_capacity(source, *extra)?;
            *extra += 1;
        }

        let name = format!("{}-fanin", self.nodes[fan.sink.node.index()].name());
        let nexus = self.push_nexus(name, NexusMode::FanIn, &protocol, fan.sources.len(), fan.policy)?;
        let branches = fan
            .sources
            .iter()
            .map(|&source| {
                let pre = fan.pre.clone();
                self.push_edge(source, nexus.input(0), protocol.clone(), pre, Some(fan.policy))
            })
            .collect();
        let trunk = self.push_edge(nexus.output(0), fan.sink, protocol.clone(), fan.post, None);

        Ok(EdgeGroup {
            nexus,
            trunk,
            branches,
        })
    }

    /// The protocol shared by a group, taken from its single-side port.
    fn group_protocol(
        &self,
        port: PortRef,
        expected: PortDirection,
        many: &[PortRef],
    ) -> GraphResult<Arc<Protocol>> {
        if many.is_empty() {
            return Err(GraphError::InvalidNode(format!(
                "group on {} needs at least one counterpart",
                port
            )));
        }
        let descriptor = self.descriptor(port)?;
        if port.direction != expected {
            let (output, input, side) = match expected {
                PortDirection::Output => (port, many[0], "output"),
                PortDirection::Input => (many[0], port, "input"),
            };
            return Err(GraphError::Capability {
                output,
                input,
                reason: format!("{} is not an {} port", port, side),
            });
        }
        Ok(descriptor.protocol.clone())
    }

    fn push_nexus(
        &mut self,
        name: String,
        mode: NexusMode,
        protocol: &Arc<Protocol>,
        branches: usize,
        policy: MergePolicy,
    ) -> GraphResult<NodeId> {
        let nexus = NexusNode::new(name, mode, protocol.clone(), branches, policy);
        self.add_node(nexus)
    }

    fn push_edge(
        &mut self,
        output: PortRef,
        input: PortRef,
        protocol: Arc<Protocol>,
        adapter: EdgeAdapter,
        merge: Option<MergePolicy>,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.nodes[output.node.index()].out_edges[output.port_index()].push(id);
        self.nodes[input.node.index()].in_edges[input.port_index()].push(id);
        tracing::debug!(
            "Bound {} -> {} as {} ({})",
            output,
            input,
            id,
            protocol.name()
        );
        self.edges.push(Edge {
            id,
            output,
            input,
            protocol,
            adapter,
            merge,
        });
        id
    }

    // ── Binding checks ──

    fn ensure_open(&self) -> GraphResult<()> {
        if self.is_sealed() {
            Err(GraphError::Sealed)
        } else {
            Ok(())
        }
    }

    fn check_binding(&self, output: PortRef, input: PortRef) -> GraphResult<Arc<Protocol>> {
        self.check_pair(output, input)?;
        self.check_capacity(output, 0)?;
        self.check_capacity(input, 0)?;
        Ok(self.descriptor(output)?.protocol.clone())
    }

    /// Directions and capability signatures.
    fn check_pair(&self, output: PortRef, input: PortRef) -> GraphResult<()> {
        let out_desc = self.descriptor(output)?;
        let in_desc = self.descriptor(input)?;
        let reject = |reason: String| GraphError::Capability {
            output,
            input,
            reason,
        };

        if output.direction != PortDirection::Output {
            return Err(reject(format!("{} is not an output port", output)));
        }
        if input.direction != PortDirection::Input {
            return Err(reject(format!("{} is not an input port", input)));
        }
        if output.node == input.node {
            return Err(reject("a node cannot bind to itself".to_string()));
        }
        let (a, b) = (out_desc.protocol.signature(), in_desc.protocol.signature());
        if a.name != b.name {
            return Err(reject(format!(
                "protocol '{}' does not match '{}'",
                a.name, b.name
            )));
        }
        if !out_desc.protocol.is_compatible(&in_desc.protocol) {
            return Err(reject(format!(
                "protocol '{}' is declared with different parameter schemas",
                a.name
            )));
        }
        if !out_desc.protocol.same_policy(&in_desc.protocol) {
            return Err(reject(format!(
                "protocol '{}' is declared with a different merge or default policy",
                a.name
            )));
        }
        Ok(())
    }

    /// Whether `port` can take one more edge, counting `extra` edges that are
    /// about to be added by the same group.
    fn check_capacity(&self, port: PortRef, extra: usize) -> GraphResult<()> {
        let descriptor = self.descriptor(port)?;
        let count = self.connection_count(port) + extra;
        if descriptor.cardinality.is_full(count) {
            return Err(GraphError::Cardinality {
                port,
                count,
                cardinality: descriptor.cardinality,
            });
        }
        Ok(())
    }

    // ── Queries ──

    pub(crate) fn slot(&self, node: NodeId) -> GraphResult<&NodeSlot> {
        self.nodes
            .get(node.index())
            .ok_or(GraphError::UnknownNode(node))
    }

    pub fn descriptor(&self, port: PortRef) -> GraphResult<&PortDescriptor> {
        self.slot(port.node)?
            .port(port.direction, port.port_index())
            .ok_or(GraphError::UnknownPort(port))
    }

    /// Number of edges currently bound to `port` (0 for unknown ports).
    pub fn connection_count(&self, port: PortRef) -> usize {
        self.nodes
            .get(port.node.index())
            .map_or(0, |slot| slot.port_edges(port.direction, port.port_index()).len())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.index()).map(NodeSlot::name)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len() as u32).map(EdgeId)
    }

    pub fn edge(&self, edge: EdgeId) -> GraphResult<&Edge> {
        self.edges
            .get(edge.index())
            .ok_or(GraphError::UnknownEdge(edge))
    }

    pub fn is_sealed(&self) -> bool {
        self.engine.is_some()
    }

    /// Roots for reachability: marked nodes and `Root`-role nodes. When none
    /// exist and `implicit_roots` is on, every node without input ports.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self
            .node_ids()
            .filter(|id| {
                self.marked_roots.contains(id) || self.nodes[id.index()].role == NodeRole::Root
            })
            .collect();
        if roots.is_empty() && self.config.implicit_roots {
            roots = self
                .node_ids()
                .filter(|id| self.nodes[id.index()].inputs.is_empty())
                .collect();
        }
        roots
    }

    pub(crate) fn is_marked_root(&self, node: NodeId) -> bool {
        self.marked_roots.contains(&node)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::nodes::{IdentityNode, SinkNode, SourceNode};
    use crate::graph::param::{FieldKind, Parameter, Schema};
    use crate::graph::port::Cardinality;

    fn bus(name: &str) -> Arc<Protocol> {
        let schema = Schema::new().field("width", FieldKind::Number);
        Protocol::builder(name).down(schema.clone()).up(schema).build()
    }

    fn width(w: u64) -> Parameter {
        Parameter::new().with("width", w)
    }

    #[test]
    fn test_bind_linear() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let mid = graph.add_node(IdentityNode::new("buf", bus("axi"))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus("axi"), width(32))).unwrap();

        let e0 = graph.bind(src.output(0), mid.input(0)).unwrap();
        let e1 = graph.bind(mid.output(0), dst.input(0)).unwrap();

        assert_eq!(e0, EdgeId(0));
        assert_eq!(e1, EdgeId(1));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.connection_count(src.output(0)), 1);
        assert_eq!(graph.connection_count(mid.input(0)), 1);
        assert_eq!(graph.edge(e1).unwrap().output, mid.output(0));
    }

    #[test]
    fn test_bind_rejects_over_cardinality() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let a = graph.add_node(SinkNode::new("a", bus("axi"), width(32))).unwrap();
        let b = graph.add_node(SinkNode::new("b", bus("axi"), width(32))).unwrap();

        graph.bind(src.output(0), a.input(0)).unwrap();
        let err = graph.bind(src.output(0), b.input(0)).unwrap_err();

        assert!(matches!(err, GraphError::Cardinality { port, count: 1, .. } if port == src.output(0)));
        assert_eq!(graph.connection_count(src.output(0)), 1);
        assert_eq!(graph.connection_count(b.input(0)), 0);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_bind_rejects_incompatible_protocols() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus("tilelink"), width(32))).unwrap();

        let err = graph.bind(src.output(0), dst.input(0)).unwrap_err();
        assert!(matches!(err, GraphError::Capability { .. }));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_bind_rejects_schema_drift() {
        let other = Protocol::builder("axi")
            .down(Schema::new().field("width", FieldKind::Number))
            .up(Schema::new().field("width", FieldKind::Number).field("cached", FieldKind::Flag))
            .build();
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", other, width(32))).unwrap();

        let err = graph.bind(src.output(0), dst.input(0)).unwrap_err();
        assert!(err.to_string().contains("different parameter schemas"));
    }

    #[test]
    fn test_bind_rejects_policy_drift() {
        let schema = Schema::new().field("width", FieldKind::Number);
        let widest = Protocol::builder("axi")
            .down(schema.clone())
            .up(schema.clone())
            .merge(MergePolicy::Maximum)
            .build();
        let zeroed = Protocol::builder("axi")
            .down(schema.clone())
            .up(schema)
            .up_default(crate::graph::merge::DefaultValue::Zeroed)
            .build();
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let wide = graph.add_node(SinkNode::new("wide", widest, width(32))).unwrap();
        let zero = graph.add_node(SinkNode::new("zero", zeroed, width(32))).unwrap();

        for sink in [wide, zero] {
            let err = graph.bind(src.output(0), sink.input(0)).unwrap_err();
            assert!(matches!(err, GraphError::Capability { .. }));
            assert!(err.to_string().contains("different merge or default policy"));
        }
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_bind_rejects_wrong_direction_and_unknown_port() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let mid = graph.add_node(IdentityNode::new("buf", bus("axi"))).unwrap();

        let err = graph.bind(mid.input(0), mid.output(0)).unwrap_err();
        assert!(matches!(err, GraphError::Capability { .. }));

        let err = graph.bind(src.output(3), mid.input(0)).unwrap_err();
        assert_eq!(err, GraphError::UnknownPort(src.output(3)));

        let err = graph.bind(src.output(0), NodeId(99).input(0)).unwrap_err();
        assert_eq!(err, GraphError::UnknownNode(NodeId(99)));
    }

    #[test]
    fn test_fan_out_inserts_nexus() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let sinks: Vec<NodeId> = (0..3)
            .map(|i| {
                graph
                    .add_node(SinkNode::new(format!("dev{}", i), bus("axi"), width(32)))
                    .unwrap()
            })
            .collect();

        let group = graph
            .bind_many(FanOut::new(src.output(0), sinks.iter().map(|s| s.input(0))))
            .unwrap();

        assert_eq!(group.branches.len(), 3);
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.node_name(group.nexus), Some("cpu-fanout"));
        assert_eq!(graph.edge(group.trunk).unwrap().output, src.output(0));
        assert_eq!(graph.connection_count(group.nexus.output(0)), 3);
        for (branch, sink) in group.branches.iter().zip(&sinks) {
            assert_eq!(graph.edge(*branch).unwrap().input, sink.input(0));
        }
    }

    #[test]
    fn test_fan_out_checks_whole_group_first() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let ok = graph.add_node(SinkNode::new("ok", bus("axi"), width(32))).unwrap();
        let bad = graph.add_node(SinkNode::new("bad", bus("tilelink"), width(32))).unwrap();

        let err = graph
            .bind_many(FanOut::new(src.output(0), [ok.input(0), bad.input(0)]))
            .unwrap_err();
        assert!(matches!(err, GraphError::Capability { .. }));
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_fan_out_counts_repeated_sink() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus("axi"), width(32))).unwrap();

        let err = graph
            .bind_many(FanOut::new(src.output(0), [dst.input(0), dst.input(0)]))
            .unwrap_err();
        assert!(matches!(err, GraphError::Cardinality { .. }));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_fan_in() {
        let mut graph = Graph::new();
        let a = graph.add_node(SourceNode::new("a", bus("axi"), width(32))).unwrap();
        let b = graph.add_node(SourceNode::new("b", bus("axi"), width(64))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus("axi"), width(64))).unwrap();

        let group = graph
            .bind_many(FanIn::new([a.output(0), b.output(0)], dst.input(0)).policy(MergePolicy::Maximum))
            .unwrap();
        assert_eq!(graph.node_name(group.nexus), Some("mem-fanin"));
        assert_eq!(graph.connection_count(group.nexus.input(0)), 2);
        assert_eq!(graph.edge(group.trunk).unwrap().input, dst.input(0));
        assert_eq!(graph.edge(group.trunk).unwrap().merge, None);
        for branch in &group.branches {
            assert_eq!(graph.edge(*branch).unwrap().merge, Some(MergePolicy::Maximum));
        }
    }

    #[test]
    fn test_group_on_wrong_direction_is_capability_error() {
        let mut graph = Graph::new();
        let mid = graph.add_node(IdentityNode::new("buf", bus("axi"))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus("axi"), width(32))).unwrap();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();

        let err = graph
            .bind_many(FanOut::new(mid.input(0), [dst.input(0)]))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::Capability {
                output: mid.input(0),
                input: dst.input(0),
                reason: format!("{} is not an output port", mid.input(0)),
            }
        );

        let err = graph
            .bind_many(FanIn::new([src.output(0)], mid.output(0)))
            .unwrap_err();
        assert!(matches!(err, GraphError::Capability { input, .. } if input == mid.output(0)));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_empty_group_rejected() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        assert!(graph.bind_many(FanOut::new(src.output(0), [])).is_err());
    }

    #[test]
    fn test_invalid_cardinality_rejected() {
        let mut graph = Graph::new();
        let node = SinkNode::with_cardinality("bad", bus("axi"), Cardinality { min: 2, max: Some(1) }, width(8));
        assert!(matches!(graph.add_node(node), Err(GraphError::InvalidNode(_))));
    }

    #[test]
    fn test_roots() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus("axi"), width(32))).unwrap();
        let mid = graph.add_node(IdentityNode::new("buf", bus("axi"))).unwrap();
        assert_eq!(graph.roots(), vec![src]);

        graph.mark_root(mid).unwrap();
        assert_eq!(graph.roots(), vec![src, mid]);
        assert!(graph.mark_root(NodeId(7)).is_err());
    }
}
