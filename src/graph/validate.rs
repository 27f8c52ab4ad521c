//! Freeze: resolve every edge and collect every violation.
//!
//! Reachability is bidirectional from the roots. Walking forward finds what
//! the roots drive, walking backward finds what feeds a root placed in the
//! middle of the graph. An edge is reachable when either walk crosses it.
//! Reachability decides what the bound graph contains and, under strict
//! reachability, flags stray edges. It never exempts an edge from resolution:
//! a cycle or mismatch in a rootless component still fails the freeze.
//!
//! Violations are collected rather than returned on the first failure, so a
//! caller sees every unmet invariant from a single `freeze`.

use crate::config::OrphanPolicy;
use crate::graph::bound::BoundGraph;
use crate::graph::builder::{Edge, Graph, NodeSlot};
use crate::graph::engine::{FlowKey, ResolutionState};
use crate::graph::error::{CycleError, MismatchError, ResolveError};
use crate::graph::id::{EdgeId, NodeId, PortRef};
use crate::graph::node::NodeRole;
use crate::graph::port::Cardinality;
use std::fmt;
use thiserror::Error;

/// Nodes and edges reachable from a set of roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachability {
    forward: Vec<bool>,
    backward: Vec<bool>,
    edges: Vec<bool>,
}

impl Reachability {
    pub(crate) fn compute(nodes: &[NodeSlot], edges: &[Edge], roots: &[NodeId]) -> Self {
        let n = nodes.len();
        let (fwd_adj, bwd_adj) = Self::build_adjacency(n, edges);
        let forward = Self::walk(roots, &fwd_adj, n);
        let backward = Self::walk(roots, &bwd_adj, n);
        let edges = edges
            .iter()
            .map(|e| forward[e.output.node.index()] || backward[e.input.node.index()])
            .collect();

        Self {
            forward,
            backward,
            edges,
        }
    }

    fn build_adjacency(n: usize, edges: &[Edge]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let mut fwd_adj = vec![Vec::new(); n];
        let mut bwd_adj = vec![Vec::new(); n];
        for edge in edges {
            let from = edge.output.node.index();
            let to = edge.input.node.index();
            fwd_adj[from].push(to);
            bwd_adj[to].push(from);
        }
        (fwd_adj, bwd_adj)
    }

    /// DFS over `adj` from every root.
    fn walk(roots: &[NodeId], adj: &[Vec<usize>], n: usize) -> Vec<bool> {
        let mut reachable = vec![false; n];
        let mut stack = Vec::new();

        for root in roots {
            let i = root.index();
            if i < n && !reachable[i] {
                reachable[i] = true;
                stack.push(i);
            }
        }

        while let Some(node) = stack.pop() {
            for &neighbor in &adj[node] {
                if !reachable[neighbor] {
                    reachable[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }

        reachable
    }

    pub fn node(&self, node: NodeId) -> bool {
        let i = node.index();
        self.forward.get(i).copied().unwrap_or(false) || self.backward.get(i).copied().unwrap_or(false)
    }

    pub fn edge(&self, edge: EdgeId) -> bool {
        self.edges.get(edge.index()).copied().unwrap_or(false)
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, reachable)| **reachable)
            .map(|(i, _)| EdgeId(i as u32))
    }
}

/// One unmet invariant found by `freeze`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("{port} ('{name}') has {count} connection(s), requires {cardinality}")]
    Cardinality {
        port: PortRef,
        name: String,
        count: usize,
        cardinality: Cardinality,
    },

    #[error(transparent)]
    Resolution(ResolveError),

    #[error("{edge} is {state}")]
    Unresolved {
        edge: EdgeId,
        state: ResolutionState,
    },

    #[error("node {node} ('{name}') has no connections")]
    Orphan { node: NodeId, name: String },

    #[error("{edge} is not reachable from any root")]
    Unreachable { edge: EdgeId },
}

/// Every violation found by one `freeze` call, in a stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn cycles(&self) -> impl Iterator<Item = &CycleError> {
        self.violations.iter().filter_map(|v| match v {
            Violation::Resolution(ResolveError::Cycle(c)) => Some(c),
            _ => None,
        })
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &MismatchError> {
        self.violations.iter().filter_map(|v| match v {
            Violation::Resolution(ResolveError::Mismatch(m)) => Some(m),
            _ => None,
        })
    }

    /// Edges left unresolved, whatever the root cause.
    pub fn unresolved_edges(&self) -> Vec<EdgeId> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                Violation::Unresolved { edge, .. } => Some(*edge),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl Graph {
    /// Nodes and edges reachable from the current roots.
    pub fn reachability(&self) -> Reachability {
        Reachability::compute(&self.nodes, &self.edges, &self.roots())
    }

    /// Seal the graph, resolve every edge and check the result.
    ///
    /// On success the bound graph is cached; further calls return a clone of
    /// it without touching the engine.
    pub fn freeze(&mut self) -> Result<BoundGraph, ValidationErrors> {
        if let Some(bound) = &self.frozen {
            return Ok(bound.clone());
        }
        self.seal();

        let reach = self.reachability();
        let mut violations = Vec::new();

        let all: Vec<EdgeId> = self.edge_ids().collect();
        for &edge in &all {
            if let Err(err) = self.demand(FlowKey::Edge(edge)) {
                let violation = Violation::Resolution(err);
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            }
        }
        for &edge in &all {
            let state = self.state(edge);
            if state != ResolutionState::Resolved {
                violations.push(Violation::Unresolved { edge, state });
            }
        }

        self.check_cardinality(&mut violations);
        self.check_orphans(&mut violations);

        for edge in self.edge_ids().filter(|e| !reach.edge(*e)) {
            if self.config.strict_reachability {
                violations.push(Violation::Unreachable { edge });
            } else {
                tracing::warn!("{} is not reachable from any root, left out of the bound graph", edge);
            }
        }

        if !violations.is_empty() {
            tracing::info!("Freeze failed with {} violation(s)", violations.len());
            return Err(ValidationErrors { violations });
        }

        let bound = BoundGraph::elaborate(self, &reach);
        tracing::info!(
            "Froze graph: {} nodes, {} edges resolved in {} evaluations",
            bound.nodes().len(),
            bound.edges().len(),
            self.evaluations()
        );
        self.frozen = Some(bound.clone());
        Ok(bound)
    }

    fn check_cardinality(&self, violations: &mut Vec<Violation>) {
        for (id, slot) in self.node_ids().zip(&self.nodes) {
            let inputs = slot.inputs.iter().zip(&slot.in_edges).enumerate();
            let outputs = slot.outputs.iter().zip(&slot.out_edges).enumerate();
            let ports = inputs
                .map(|(i, p)| (id.input(i as u16), p))
                .chain(outputs.map(|(i, p)| (id.output(i as u16), p)));
            for (port, (descriptor, edges)) in ports {
                if !descriptor.cardinality.contains(edges.len()) {
                    violations.push(Violation::Cardinality {
                        port,
                        name: descriptor.name.clone(),
                        count: edges.len(),
                        cardinality: descriptor.cardinality,
                    });
                }
            }
        }
    }

    fn check_orphans(&self, violations: &mut Vec<Violation>) {
        for (id, slot) in self.node_ids().zip(&self.nodes) {
            let exempt = slot.role != NodeRole::Interior || self.is_marked_root(id);
            if exempt || slot.connection_count() > 0 {
                continue;
            }
            match self.config.orphans {
                OrphanPolicy::Error => violations.push(Violation::Orphan {
                    node: id,
                    name: slot.name().to_string(),
                }),
                OrphanPolicy::Warn => {
                    tracing::warn!("Node {} '{}' has no connections", id, slot.name())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NegotiationConfig;
    use crate::graph::nodes::{IdentityNode, SinkNode, SourceNode};
    use crate::graph::param::{FieldKind, Parameter, Schema};
    use crate::graph::port::Protocol;
    use std::sync::Arc;

    fn bus() -> Arc<Protocol> {
        let schema = Schema::new().field("width", FieldKind::Number);
        Protocol::builder("axi").down(schema.clone()).up(schema).build()
    }

    fn width(w: u64) -> Parameter {
        Parameter::new().with("width", w)
    }

    #[test]
    fn test_reachability_forward_and_backward() {
        let mut graph = Graph::new();
        let a = graph.add_node(IdentityNode::new("a", bus())).unwrap();
        let b = graph.add_node(IdentityNode::new("b", bus())).unwrap();
        let c = graph.add_node(IdentityNode::new("c", bus())).unwrap();
        let d = graph.add_node(IdentityNode::new("d", bus())).unwrap();
        let ab = graph.bind(a.output(0), b.input(0)).unwrap();
        let bc = graph.bind(b.output(0), c.input(0)).unwrap();
        let cd = graph.bind(c.output(0), d.input(0)).unwrap();

        // Nothing lacks inputs, so there are no implicit roots.
        let reach = graph.reachability();
        assert_eq!(reach.edges().count(), 0);

        graph.mark_root(b).unwrap();
        let reach = graph.reachability();
        assert!(reach.node(a) && reach.node(d));
        assert!(reach.edge(ab) && reach.edge(bc) && reach.edge(cd));
    }

    #[test]
    fn test_implicit_roots_can_be_disabled() {
        let config = NegotiationConfig {
            implicit_roots: false,
            ..NegotiationConfig::default()
        };
        let mut graph = Graph::with_config(config);
        let mid = graph.add_node(IdentityNode::new("buf", bus())).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus(), width(8))).unwrap();
        graph.bind(mid.output(0), dst.input(0)).unwrap();
        assert!(graph.roots().is_empty());
    }

    #[test]
    fn test_freeze_reports_orphan_and_cardinality() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus(), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus(), width(32))).unwrap();
        let lost = graph.add_node(IdentityNode::new("lost", bus())).unwrap();
        graph.bind(src.output(0), dst.input(0)).unwrap();

        let errors = graph.freeze().unwrap_err();
        assert!(errors
            .violations()
            .contains(&Violation::Orphan { node: lost, name: "lost".into() }));
        let cardinality: Vec<PortRef> = errors
            .violations()
            .iter()
            .filter_map(|v| match v {
                Violation::Cardinality { port, .. } => Some(*port),
                _ => None,
            })
            .collect();
        assert_eq!(cardinality, vec![lost.input(0), lost.output(0)]);
        assert!(errors.to_string().starts_with("3 validation error(s)"));
    }

    #[test]
    fn test_orphans_can_warn() {
        let config = NegotiationConfig {
            orphans: OrphanPolicy::Warn,
            ..NegotiationConfig::default()
        };
        let mut graph = Graph::with_config(config);
        let src = graph.add_node(SourceNode::new("cpu", bus(), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus(), width(32))).unwrap();
        graph.bind(src.output(0), dst.input(0)).unwrap();
        graph.add_node(IdentityNode::new("lost", bus())).unwrap();

        // The unconnected required ports are still reported.
        let errors = graph.freeze().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .violations()
            .iter()
            .all(|v| matches!(v, Violation::Cardinality { count: 0, .. })));
    }

    #[test]
    fn test_lone_sink_is_not_an_orphan() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus(), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus(), width(32))).unwrap();
        graph.bind(src.output(0), dst.input(0)).unwrap();
        let spare = graph.add_node(SinkNode::new("spare", bus(), width(32))).unwrap();

        let errors = graph.freeze().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors.violations()[0],
            Violation::Cardinality { port, count: 0, .. } if port == spare.input(0)
        ));
    }

    #[test]
    fn test_strict_reachability() {
        let config = NegotiationConfig {
            strict_reachability: true,
            ..NegotiationConfig::default()
        };
        let mut graph = Graph::with_config(config);
        let src = graph.add_node(SourceNode::new("cpu", bus(), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus(), width(32))).unwrap();
        graph.bind(src.output(0), dst.input(0)).unwrap();

        // A closed loop of identities has no root.
        let a = graph.add_node(IdentityNode::new("a", bus())).unwrap();
        let b = graph.add_node(IdentityNode::new("b", bus())).unwrap();
        let ab = graph.bind(a.output(0), b.input(0)).unwrap();
        let ba = graph.bind(b.output(0), a.input(0)).unwrap();

        let errors = graph.freeze().unwrap_err();
        assert!(errors.cycles().next().is_some());
        assert_eq!(errors.unresolved_edges(), vec![ab, ba]);
        let unreachable: Vec<&Violation> = errors
            .violations()
            .iter()
            .filter(|v| matches!(v, Violation::Unreachable { .. }))
            .collect();
        assert_eq!(
            unreachable,
            vec![&Violation::Unreachable { edge: ab }, &Violation::Unreachable { edge: ba }]
        );
    }

    #[test]
    fn test_rootless_cycle_fails_without_strict_reachability() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus(), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus(), width(32))).unwrap();
        graph.bind(src.output(0), dst.input(0)).unwrap();
        let a = graph.add_node(IdentityNode::new("a", bus())).unwrap();
        let b = graph.add_node(IdentityNode::new("b", bus())).unwrap();
        graph.bind(a.output(0), b.input(0)).unwrap();
        graph.bind(b.output(0), a.input(0)).unwrap();

        let errors = graph.freeze().unwrap_err();
        assert_eq!(errors.cycles().count(), 1);
        assert!(!errors
            .violations()
            .iter()
            .any(|v| matches!(v, Violation::Unreachable { .. })));
    }

    #[test]
    fn test_freeze_is_idempotent() {
        let mut graph = Graph::new();
        let src = graph.add_node(SourceNode::new("cpu", bus(), width(32))).unwrap();
        let dst = graph.add_node(SinkNode::new("mem", bus(), width(32))).unwrap();
        graph.bind(src.output(0), dst.input(0)).unwrap();

        let first = graph.freeze().unwrap();
        let evaluations = graph.evaluations();
        let second = graph.freeze().unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.evaluations(), evaluations);
    }
}
