//! Two-phase parameter negotiation over a graph of hardware blocks.
//!
//! ## Model
//!
//! Nodes declare typed ports. Binding an output port to an input port creates
//! an edge. Each edge carries two parameter flows:
//!
//! - **downward**, from the source side: what the upstream node offers;
//! - **upward**, from the sink side: what the downstream node demands.
//!
//! The edge's [`Protocol`] merges the two into the resolved parameter. Node
//! functions compute their outgoing values from the values arriving on their
//! ports, so a single demand can ripple across the whole graph.
//!
//! ## Phases
//!
//! 1. **Build**: `add_node`, `bind`, `bind_many`. Bind-time checks reject bad
//!    connections immediately and leave the graph untouched.
//! 2. **Resolve**: `resolve`, `resolve_all`. The first request seals the graph.
//!    Every value is computed at most once.
//! 3. **Freeze**: resolve everything reachable, collect all violations, and
//!    produce an immutable [`BoundGraph`].
//!
//! ```ignore
//! let bus = Protocol::builder("axi")
//!     .down(Schema::new().field("width", FieldKind::Number))
//!     .up(Schema::new().field("width", FieldKind::Number))
//!     .build();
//!
//! let mut graph = Graph::new();
//! let cpu = graph.add_node(SourceNode::new("cpu", bus.clone(), offer))?;
//! let mem = graph.add_node(SinkNode::new("mem", bus, demand))?;
//! graph.bind(cpu.output(0), mem.input(0))?;
//!
//! let bound = graph.freeze()?;
//! ```

pub mod bound;
pub mod builder;
pub mod engine;
pub mod error;
pub mod id;
pub mod merge;
pub mod node;
pub mod nodes;
pub mod param;
pub mod port;
pub mod validate;

pub use bound::{BoundEdge, BoundGraph, BoundNode};
pub use builder::{Edge, EdgeGroup, Fan, FanIn, FanOut, Graph};
pub use engine::{FlowKey, ResolutionState};
pub use error::{CycleError, GraphError, GraphResult, MismatchError, ResolveError};
pub use id::{EdgeId, NodeId, PortRef};
pub use merge::{scale_field, DefaultValue, EdgeAdapter, Merge, MergePolicy};
pub use node::{AnyNode, BuiltinNode, FlowDeps, NodeBehavior, NodeIo, NodeRole};
pub use nodes::{AdapterNode, IdentityNode, NexusMode, NexusNode, SinkNode, SourceNode};
pub use param::{AddressRange, AddressSet, Direction, FieldKind, Parameter, Schema, Value};
pub use port::{Cardinality, PortDescriptor, PortDirection, Protocol, ProtocolBuilder, Signature};
pub use validate::{Reachability, ValidationErrors, Violation};
