//! Demand-driven parameter resolution.
//!
//! Every quantity the engine computes is addressed by a [`FlowKey`]:
//!
//! - `Down(n)`: the downward values node `n` emits, one per output port.
//! - `Up(n)`: the upward values node `n` emits, one per input port.
//! - `Edge(e)`: the resolved parameter of edge `e`, `merge(D(e), U(e))`.
//!
//! Nodes normally read the raw values their neighbours emit. A node that opts
//! into resolved reads (see [`FlowDeps`](crate::graph::node::FlowDeps)) sees the
//! settled edge values instead, which is how a fan-out hands the negotiated
//! trunk value to every branch.
//!
//! A key is computed the first time it is demanded and memoized for the life
//! of the graph. Demand walks an explicit work-list instead of recursing, so
//! chain depth is bounded by memory rather than by the call stack. A key seen
//! again while it is still being computed is a cycle; the error carries the
//! chain of keys that led back to it.
//!
//! Once a key is `Resolved` or `Failed` it never changes state.

use crate::graph::builder::{Edge, Graph, NodeSlot};
use crate::graph::error::{CycleError, GraphError, GraphResult, MismatchError, ResolveError};
use crate::graph::id::{EdgeId, NodeId};
use crate::graph::merge::Merge;
use crate::graph::node::NodeIo;
use crate::graph::param::{Direction, Parameter};
use crate::graph::port::PortDescriptor;
use serde::Serialize;
use std::fmt;

/// Address of one memoized quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FlowKey {
    Down(NodeId),
    Up(NodeId),
    Edge(EdgeId),
}

impl FlowKey {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            FlowKey::Down(n) | FlowKey::Up(n) => Some(*n),
            FlowKey::Edge(_) => None,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKey::Down(n) => write!(f, "down({})", n),
            FlowKey::Up(n) => write!(f, "up({})", n),
            FlowKey::Edge(e) => write!(f, "edge({})", e),
        }
    }
}

/// Observable state of a memoized key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionState::Unresolved => "unresolved",
            ResolutionState::Resolving => "resolving",
            ResolutionState::Resolved => "resolved",
            ResolutionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Default)]
enum Slot<T> {
    #[default]
    Unresolved,
    Resolving,
    Resolved(T),
    Failed(ResolveError),
}

impl<T> Slot<T> {
    fn state(&self) -> ResolutionState {
        match self {
            Slot::Unresolved => ResolutionState::Unresolved,
            Slot::Resolving => ResolutionState::Resolving,
            Slot::Resolved(_) => ResolutionState::Resolved,
            Slot::Failed(_) => ResolutionState::Failed,
        }
    }

    fn value(&self) -> Option<&T> {
        match self {
            Slot::Resolved(v) => Some(v),
            _ => None,
        }
    }
}

/// Read-only view of the graph handed to the engine.
#[derive(Clone, Copy)]
pub(crate) struct Topology<'a> {
    pub nodes: &'a [NodeSlot],
    pub edges: &'a [Edge],
}

impl<'a> Topology<'a> {
    fn src(&self, edge: EdgeId) -> NodeId {
        self.edges[edge.index()].output.node
    }

    fn sink(&self, edge: EdgeId) -> NodeId {
        self.edges[edge.index()].input.node
    }

    /// Keys that must be resolved before `key` can be evaluated, in a fixed
    /// order derived from port and bind order.
    fn dependencies(&self, key: FlowKey) -> Vec<FlowKey> {
        let mut deps = Vec::new();
        match key {
            FlowKey::Edge(e) => {
                deps.push(FlowKey::Down(self.src(e)));
                deps.push(FlowKey::Up(self.sink(e)));
            }
            FlowKey::Down(n) => {
                let slot = &self.nodes[n.index()];
                if slot.flow.down_reads_inward {
                    if slot.flow.down_reads_resolved {
                        deps.extend(slot.inward().map(FlowKey::Edge));
                    } else {
                        deps.extend(slot.inward().map(|e| FlowKey::Down(self.src(e))));
                    }
                }
                if slot.flow.down_reads_outward_up {
                    deps.extend(slot.outward().map(|e| FlowKey::Up(self.sink(e))));
                }
            }
            FlowKey::Up(n) => {
                let slot = &self.nodes[n.index()];
                if slot.flow.up_reads_outward {
                    if slot.flow.up_reads_resolved {
                        deps.extend(slot.outward().map(FlowKey::Edge));
                    } else {
                        deps.extend(slot.outward().map(|e| FlowKey::Up(self.sink(e))));
                    }
                }
                if slot.flow.up_reads_inward_down {
                    deps.extend(slot.inward().map(|e| FlowKey::Down(self.src(e))));
                }
            }
        }
        deps
    }

    /// The edge a failure at `key` is reported against: the edge itself, the
    /// first inward edge of a node's upward values, or the first outward edge
    /// of its downward values.
    fn locate(&self, key: FlowKey) -> Option<EdgeId> {
        match key {
            FlowKey::Edge(e) => Some(e),
            FlowKey::Down(n) => self.nodes[n.index()].outward().next(),
            FlowKey::Up(n) => self.nodes[n.index()].inward().next(),
        }
    }
}

/// The first dependency of a key that is not yet resolved.
enum Blocker {
    Fresh(FlowKey),
    InProgress(FlowKey),
    Failed(FlowKey),
}

/// Memo table and work-list evaluator.
pub(crate) struct Negotiator {
    down: Vec<Slot<Vec<Parameter>>>,
    up: Vec<Slot<Vec<Parameter>>>,
    edges: Vec<Slot<Parameter>>,
    evaluations: usize,
    trace: bool,
}

impl Negotiator {
    pub fn new(nodes: usize, edges: usize, trace: bool) -> Self {
        Self {
            down: vec![Slot::Unresolved; nodes],
            up: vec![Slot::Unresolved; nodes],
            edges: vec![Slot::Unresolved; edges],
            evaluations: 0,
            trace,
        }
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn state(&self, key: FlowKey) -> ResolutionState {
        match key {
            FlowKey::Down(n) => self.down[n.index()].state(),
            FlowKey::Up(n) => self.up[n.index()].state(),
            FlowKey::Edge(e) => self.edges[e.index()].state(),
        }
    }

    pub fn edge_value(&self, edge: EdgeId) -> Option<&Parameter> {
        self.edges.get(edge.index()).and_then(Slot::value)
    }

    pub fn down_values(&self, node: NodeId) -> Option<&[Parameter]> {
        self.down.get(node.index()).and_then(Slot::value).map(Vec::as_slice)
    }

    pub fn up_values(&self, node: NodeId) -> Option<&[Parameter]> {
        self.up.get(node.index()).and_then(Slot::value).map(Vec::as_slice)
    }

    fn failure(&self, key: FlowKey) -> Option<&ResolveError> {
        match key {
            FlowKey::Down(n) => match &self.down[n.index()] {
                Slot::Failed(err) => Some(err),
                _ => None,
            },
            FlowKey::Up(n) => match &self.up[n.index()] {
                Slot::Failed(err) => Some(err),
                _ => None,
            },
            FlowKey::Edge(e) => match &self.edges[e.index()] {
                Slot::Failed(err) => Some(err),
                _ => None,
            },
        }
    }

    fn failure_or_lost(&self, key: FlowKey) -> ResolveError {
        self.failure(key).cloned().unwrap_or_else(|| {
            MismatchError::new(key, "failed without a recorded error").into()
        })
    }

    fn mark_resolving(&mut self, key: FlowKey) {
        match key {
            FlowKey::Down(n) => self.down[n.index()] = Slot::Resolving,
            FlowKey::Up(n) => self.up[n.index()] = Slot::Resolving,
            FlowKey::Edge(e) => self.edges[e.index()] = Slot::Resolving,
        }
    }

    fn mark_failed(&mut self, key: FlowKey, err: &ResolveError) {
        match key {
            FlowKey::Down(n) => self.down[n.index()] = Slot::Failed(err.clone()),
            FlowKey::Up(n) => self.up[n.index()] = Slot::Failed(err.clone()),
            FlowKey::Edge(e) => self.edges[e.index()] = Slot::Failed(err.clone()),
        }
    }

    /// Every key on the work-list depends on the one that failed.
    fn fail_stack(&mut self, stack: &[FlowKey], err: &ResolveError) {
        for &key in stack {
            self.mark_failed(key, err);
        }
        tracing::debug!("Resolution failed, {} key(s) poisoned: {}", stack.len(), err);
    }

    fn blocker(&self, topo: &Topology<'_>, key: FlowKey) -> Option<Blocker> {
        topo.dependencies(key)
            .into_iter()
            .find_map(|dep| match self.state(dep) {
                ResolutionState::Resolved => None,
                ResolutionState::Unresolved => Some(Blocker::Fresh(dep)),
                ResolutionState::Resolving => Some(Blocker::InProgress(dep)),
                ResolutionState::Failed => Some(Blocker::Failed(dep)),
            })
    }

    /// Resolve `target` and everything it transitively depends on.
    pub fn demand(&mut self, topo: &Topology<'_>, target: FlowKey) -> Result<(), ResolveError> {
        match self.state(target) {
            ResolutionState::Resolved => return Ok(()),
            ResolutionState::Failed => return Err(self.failure_or_lost(target)),
            _ => {}
        }

        let mut stack = vec![target];
        self.mark_resolving(target);

        while let Some(&key) = stack.last() {
            match self.blocker(topo, key) {
                Some(Blocker::Fresh(dep)) => {
                    self.mark_resolving(dep);
                    stack.push(dep);
                }
                Some(Blocker::InProgress(dep)) => {
                    let start = stack.iter().position(|k| *k == dep).unwrap_or(0);
                    let mut chain = stack[start..].to_vec();
                    chain.push(dep);
                    let err = ResolveError::from(CycleError { chain });
                    self.fail_stack(&stack, &err);
                    return Err(err);
                }
                Some(Blocker::Failed(dep)) => {
                    let err = self.failure_or_lost(dep);
                    self.fail_stack(&stack, &err);
                    return Err(err);
                }
                None => match self.evaluate(topo, key) {
                    Ok(()) => {
                        stack.pop();
                    }
                    Err(err) => {
                        self.fail_stack(&stack, &err);
                        return Err(err);
                    }
                },
            }
        }
        Ok(())
    }

    /// Evaluate `key`, whose dependencies are all resolved. A mismatch is
    /// attributed to the edge it prevents from resolving.
    fn evaluate(&mut self, topo: &Topology<'_>, key: FlowKey) -> Result<(), ResolveError> {
        self.evaluate_key(topo, key).map_err(|err| match err {
            ResolveError::Mismatch(m) => m.on_edge(topo.locate(key)).into(),
            other => other,
        })
    }

    fn evaluate_key(&mut self, topo: &Topology<'_>, key: FlowKey) -> Result<(), ResolveError> {
        if self.trace {
            tracing::trace!("Evaluating {}", key);
        }
        self.evaluations += 1;
        match key {
            FlowKey::Down(n) => {
                let values = self.eval_down(topo, n)?;
                self.down[n.index()] = Slot::Resolved(values);
            }
            FlowKey::Up(n) => {
                let values = self.eval_up(topo, n)?;
                self.up[n.index()] = Slot::Resolved(values);
            }
            FlowKey::Edge(e) => {
                let (down, up) = self.edge_flows(topo, e)?;
                let edge = &topo.edges[e.index()];
                let merged = match &edge.merge {
                    Some(policy) => policy.merge(&down, &up),
                    None => edge.protocol.merger().merge(&down, &up),
                }
                .map_err(|reason| MismatchError::new(key, reason))?;
                if self.trace {
                    tracing::trace!("{} resolved to {}", e, merged);
                }
                self.edges[e.index()] = Slot::Resolved(merged);
            }
        }
        Ok(())
    }

    /// `D(e)` and `U(e)` after the edge adapter, checked against the
    /// protocol's schemas. Both endpoints must already be resolved.
    pub fn edge_flows(
        &self,
        topo: &Topology<'_>,
        edge: EdgeId,
    ) -> Result<(Parameter, Parameter), MismatchError> {
        Ok((
            self.edge_value_in(topo, edge, Direction::Down)?,
            self.edge_value_in(topo, edge, Direction::Up)?,
        ))
    }

    fn edge_value_in(
        &self,
        topo: &Topology<'_>,
        edge: EdgeId,
        direction: Direction,
    ) -> Result<Parameter, MismatchError> {
        let at = FlowKey::Edge(edge);
        let mismatch = |reason: String| MismatchError::new(at, reason);
        let e = &topo.edges[edge.index()];

        let (emitted, port, schema) = match direction {
            Direction::Down => (
                self.down_values(e.output.node),
                e.output.port_index(),
                e.protocol.down_schema(),
            ),
            Direction::Up => (
                self.up_values(e.input.node),
                e.input.port_index(),
                e.protocol.up_schema(),
            ),
        };
        let raw = emitted
            .and_then(|values| values.get(port))
            .ok_or_else(|| mismatch(format!("no {} value was computed", direction)))?;
        let value = e.adapter.apply(direction, raw).map_err(|reason| {
            mismatch(format!("{} adapter failed: {}", direction, reason))
        })?;
        schema
            .check(&value)
            .map_err(|reason| mismatch(format!("{} value {}: {}", direction, value, reason)))?;
        Ok(value)
    }

    /// Values arriving on each port, or the protocol default for ports with no
    /// connections. With `resolved` set, connected ports read the settled edge
    /// values rather than what the neighbour emitted.
    fn gather(
        &self,
        topo: &Topology<'_>,
        ports: &[PortDescriptor],
        edges: &[Vec<EdgeId>],
        direction: Direction,
        resolved: bool,
    ) -> Result<Vec<Vec<Parameter>>, MismatchError> {
        ports
            .iter()
            .zip(edges)
            .map(|(port, attached)| {
                if attached.is_empty() {
                    let default = match direction {
                        Direction::Down => port
                            .protocol
                            .down_default()
                            .materialize(port.protocol.down_schema()),
                        Direction::Up => port
                            .protocol
                            .up_default()
                            .materialize(port.protocol.up_schema()),
                    };
                    return Ok(default.into_iter().collect());
                }
                attached
                    .iter()
                    .map(|&e| {
                        if resolved {
                            self.edge_value(e).cloned().ok_or_else(|| {
                                MismatchError::new(FlowKey::Edge(e), "edge was not resolved")
                            })
                        } else {
                            self.edge_value_in(topo, e, direction)
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn eval_down(&self, topo: &Topology<'_>, node: NodeId) -> Result<Vec<Parameter>, ResolveError> {
        let slot = &topo.nodes[node.index()];
        let values = if slot.flow.down_reads_inward {
            let resolved = slot.flow.down_reads_resolved;
            self.gather(topo, &slot.inputs, &slot.in_edges, Direction::Down, resolved)?
        } else {
            vec![Vec::new(); slot.inputs.len()]
        };
        let feedback = if slot.flow.down_reads_outward_up {
            self.gather(topo, &slot.outputs, &slot.out_edges, Direction::Up, false)?
        } else {
            vec![Vec::new(); slot.outputs.len()]
        };

        let at = FlowKey::Down(node);
        let out = slot
            .node
            .downward(&NodeIo::new(&values, &feedback))
            .map_err(|reason| MismatchError::new(at, reason))?;
        check_outputs(at, &out, &slot.outputs, Direction::Down)?;
        Ok(out)
    }

    fn eval_up(&self, topo: &Topology<'_>, node: NodeId) -> Result<Vec<Parameter>, ResolveError> {
        let slot = &topo.nodes[node.index()];
        let values = if slot.flow.up_reads_outward {
            let resolved = slot.flow.up_reads_resolved;
            self.gather(topo, &slot.outputs, &slot.out_edges, Direction::Up, resolved)?
        } else {
            vec![Vec::new(); slot.outputs.len()]
        };
        let feedback = if slot.flow.up_reads_inward_down {
            self.gather(topo, &slot.inputs, &slot.in_edges, Direction::Down, false)?
        } else {
            vec![Vec::new(); slot.inputs.len()]
        };

        let at = FlowKey::Up(node);
        let out = slot
            .node
            .upward(&NodeIo::new(&values, &feedback))
            .map_err(|reason| MismatchError::new(at, reason))?;
        check_outputs(at, &out, &slot.inputs, Direction::Up)?;
        Ok(out)
    }
}

/// One value per port, each conforming to its port's protocol.
fn check_outputs(
    at: FlowKey,
    values: &[Parameter],
    ports: &[PortDescriptor],
    direction: Direction,
) -> Result<(), MismatchError> {
    if values.len() != ports.len() {
        return Err(MismatchError::new(
            at,
            format!(
                "emitted {} {} value(s) for {} port(s)",
                values.len(),
                direction,
                ports.len()
            ),
        ));
    }
    for (value, port) in values.iter().zip(ports) {
        let schema = match direction {
            Direction::Down => port.protocol.down_schema(),
            Direction::Up => port.protocol.up_schema(),
        };
        schema
            .check(value)
            .map_err(|reason| MismatchError::new(at, format!("port '{}': {}", port.name, reason)))?;
    }
    Ok(())
}

// ── Resolution API on the graph ──

impl Graph {
    /// Seal the graph. Later calls are no-ops.
    pub fn seal(&mut self) {
        if self.engine.is_none() {
            tracing::debug!(
                "Sealing graph: {} nodes, {} edges",
                self.nodes.len(),
                self.edges.len()
            );
            self.engine = Some(Negotiator::new(
                self.nodes.len(),
                self.edges.len(),
                self.config.trace_evaluations,
            ));
        }
    }

    pub(crate) fn demand(&mut self, key: FlowKey) -> Result<(), ResolveError> {
        self.seal();
        let topo = Topology {
            nodes: &self.nodes,
            edges: &self.edges,
        };
        match self.engine.as_mut() {
            Some(engine) => engine.demand(&topo, key),
            None => Ok(()),
        }
    }

    /// Resolve one edge, computing whatever it depends on. Seals the graph.
    pub fn resolve(&mut self, edge: EdgeId) -> GraphResult<&Parameter> {
        self.edge(edge)?;
        self.demand(FlowKey::Edge(edge))?;
        self.resolved(edge).ok_or(GraphError::UnknownEdge(edge))
    }

    /// Resolve every edge in id order, returning the distinct errors met.
    pub fn resolve_all(&mut self) -> Vec<ResolveError> {
        let mut errors: Vec<ResolveError> = Vec::new();
        for edge in self.edge_ids().collect::<Vec<_>>() {
            if let Err(err) = self.demand(FlowKey::Edge(edge)) {
                if !errors.contains(&err) {
                    errors.push(err);
                }
            }
        }
        errors
    }

    /// The resolved parameter of `edge`, without triggering resolution.
    pub fn resolved(&self, edge: EdgeId) -> Option<&Parameter> {
        self.engine.as_ref()?.edge_value(edge)
    }

    pub fn state(&self, edge: EdgeId) -> ResolutionState {
        self.key_state(FlowKey::Edge(edge))
    }

    pub fn key_state(&self, key: FlowKey) -> ResolutionState {
        let in_range = match key {
            FlowKey::Down(n) | FlowKey::Up(n) => n.index() < self.nodes.len(),
            FlowKey::Edge(e) => e.index() < self.edges.len(),
        };
        match &self.engine {
            Some(engine) if in_range => engine.state(key),
            _ => ResolutionState::Unresolved,
        }
    }

    /// The error that left `edge` failed, if any.
    pub fn failure(&self, edge: EdgeId) -> Option<&ResolveError> {
        if edge.index() >= self.edges.len() {
            return None;
        }
        self.engine.as_ref()?.failure(FlowKey::Edge(edge))
    }

    /// Number of node-function and merge evaluations performed so far.
    pub fn evaluations(&self) -> usize {
        self.engine.as_ref().map_or(0, Negotiator::evaluations)
    }

    /// `D(e)` and `U(e)` of a resolved edge.
    pub(crate) fn edge_flows(&self, edge: EdgeId) -> Option<(Parameter, Parameter)> {
        let topo = Topology {
            nodes: &self.nodes,
            edges: &self.edges,
        };
        self.engine.as_ref()?.edge_flows(&topo, edge).ok()
    }
}
