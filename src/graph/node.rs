//! Node abstraction for the negotiation graph.
//!
//! Two-layer design:
//! - **`NodeBehavior` trait**: for library authors wiring their own hardware
//!   blocks into the graph.
//! - **`BuiltinNode` enum**: for the nodes this crate ships. The compiler can
//!   inline match arms, eliminating dynamic dispatch for the common cases.
//!
//! `AnyNode` wraps either variant so the graph can handle both uniformly.
//!
//! Node functions take `&self` and must be deterministic: the engine calls each
//! of them at most once per graph, but nothing stops a caller from building a
//! second graph from the same node values.

use crate::graph::nodes::{AdapterNode, IdentityNode, NexusNode, SinkNode, SourceNode};
use crate::graph::param::Parameter;
use crate::graph::port::PortDescriptor;

/// Which values a node body reads when computing each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowDeps {
    /// `downward` reads the downward values arriving on input ports.
    pub down_reads_inward: bool,
    /// `downward` reads the upward values arriving on output ports.
    pub down_reads_outward_up: bool,
    /// `upward` reads the upward values arriving on output ports.
    pub up_reads_outward: bool,
    /// `upward` reads the downward values arriving on input ports.
    pub up_reads_inward_down: bool,
    /// `downward` sees the settled values of its inward edges instead of the
    /// raw values upstream nodes emitted.
    pub down_reads_resolved: bool,
    /// `upward` sees the settled values of its outward edges instead of the
    /// raw values downstream nodes emitted.
    pub up_reads_resolved: bool,
}

impl Default for FlowDeps {
    fn default() -> Self {
        Self {
            down_reads_inward: true,
            down_reads_outward_up: false,
            up_reads_outward: true,
            up_reads_inward_down: false,
            down_reads_resolved: false,
            up_reads_resolved: false,
        }
    }
}

impl FlowDeps {
    /// A node whose downward values do not depend on anything upstream.
    pub fn detached_downward() -> Self {
        Self {
            down_reads_inward: false,
            ..Self::default()
        }
    }

    /// A node that reads nothing at all. Placing one inside a physical loop
    /// breaks the parameter-flow cycle in both directions.
    pub fn detached() -> Self {
        Self {
            down_reads_inward: false,
            down_reads_outward_up: false,
            up_reads_outward: false,
            up_reads_inward_down: false,
            down_reads_resolved: false,
            up_reads_resolved: false,
        }
    }
}

/// How a node participates in reachability and orphan checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeRole {
    #[default]
    Interior,
    /// Seeds reachability; exempt from orphan detection.
    Root,
    /// A terminal consumer; exempt from orphan detection.
    SinkOnly,
}

/// Values handed to a node function, grouped by port.
///
/// For `downward`, `port(i)` holds the downward values arriving on input port
/// `i` and `feedback(i)` the upward values arriving on output port `i`. For
/// `upward` the roles swap. Ports a node does not read (see [`FlowDeps`]) are
/// empty.
#[derive(Debug, Clone, Copy)]
pub struct NodeIo<'a> {
    values: &'a [Vec<Parameter>],
    feedback: &'a [Vec<Parameter>],
}

impl<'a> NodeIo<'a> {
    pub fn new(values: &'a [Vec<Parameter>], feedback: &'a [Vec<Parameter>]) -> Self {
        Self { values, feedback }
    }

    pub fn port_count(&self) -> usize {
        self.values.len()
    }

    pub fn port(&self, index: usize) -> &'a [Parameter] {
        self.values.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The one value on `index`, or a reason why there is not exactly one.
    pub fn single(&self, index: usize) -> Result<&'a Parameter, String> {
        match self.port(index) {
            [value] => Ok(value),
            [] => Err(format!("port {} has no value", index)),
            many => Err(format!("port {} has {} values, expected one", index, many.len())),
        }
    }

    pub fn feedback(&self, index: usize) -> &'a [Parameter] {
        self.feedback.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Trait for author-defined nodes.
pub trait NodeBehavior: Send + Sync {
    /// Human-readable name of this node.
    fn name(&self) -> &str;

    /// Port descriptors, inputs and outputs in declaration order.
    fn ports(&self) -> &[PortDescriptor];

    fn flow(&self) -> FlowDeps {
        FlowDeps::default()
    }

    fn role(&self) -> NodeRole {
        NodeRole::Interior
    }

    /// Compute one downward value per output port.
    fn downward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String>;

    /// Compute one upward value per input port.
    fn upward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String>;
}

/// Enum dispatch for built-in nodes.
#[derive(Debug)]
pub enum BuiltinNode {
    Source(SourceNode),
    Sink(SinkNode),
    Identity(IdentityNode),
    Adapter(AdapterNode),
    Nexus(NexusNode),
}

impl BuiltinNode {
    pub fn name(&self) -> &str {
        match self {
            BuiltinNode::Source(n) => n.name(),
            BuiltinNode::Sink(n) => n.name(),
            BuiltinNode::Identity(n) => n.name(),
            BuiltinNode::Adapter(n) => n.name(),
            BuiltinNode::Nexus(n) => n.name(),
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            BuiltinNode::Source(n) => n.ports(),
            BuiltinNode::Sink(n) => n.ports(),
            BuiltinNode::Identity(n) => n.ports(),
            BuiltinNode::Adapter(n) => n.ports(),
            BuiltinNode::Nexus(n) => n.ports(),
        }
    }

    pub fn flow(&self) -> FlowDeps {
        match self {
            BuiltinNode::Source(n) => n.flow(),
            BuiltinNode::Sink(n) => n.flow(),
            BuiltinNode::Identity(n) => n.flow(),
            BuiltinNode::Adapter(n) => n.flow(),
            BuiltinNode::Nexus(n) => n.flow(),
        }
    }

    pub fn role(&self) -> NodeRole {
        match self {
            BuiltinNode::Source(n) => n.role(),
            BuiltinNode::Sink(n) => n.role(),
            BuiltinNode::Identity(n) => n.role(),
            BuiltinNode::Adapter(n) => n.role(),
            BuiltinNode::Nexus(n) => n.role(),
        }
    }

    pub fn downward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        match self {
            BuiltinNode::Source(n) => n.downward(io),
            BuiltinNode::Sink(n) => n.downward(io),
            BuiltinNode::Identity(n) => n.downward(io),
            BuiltinNode::Adapter(n) => n.downward(io),
            BuiltinNode::Nexus(n) => n.downward(io),
        }
    }

    pub fn upward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        match self {
            BuiltinNode::Source(n) => n.upward(io),
            BuiltinNode::Sink(n) => n.upward(io),
            BuiltinNode::Identity(n) => n.upward(io),
            BuiltinNode::Adapter(n) => n.upward(io),
            BuiltinNode::Nexus(n) => n.upward(io),
        }
    }
}

/// Wrapper that holds either a built-in node (enum dispatch) or an
/// author-defined node (trait object).
pub enum AnyNode {
    Builtin(BuiltinNode),
    Plugin(Box<dyn NodeBehavior>),
}

impl AnyNode {
    pub fn plugin(node: impl NodeBehavior + 'static) -> Self {
        AnyNode::Plugin(Box::new(node))
    }

    pub fn name(&self) -> &str {
        match self {
            AnyNode::Builtin(n) => n.name(),
            AnyNode::Plugin(n) => n.name(),
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            AnyNode::Builtin(n) => n.ports(),
            AnyNode::Plugin(n) => n.ports(),
        }
    }

    pub fn flow(&self) -> FlowDeps {
        match self {
            AnyNode::Builtin(n) => n.flow(),
            AnyNode::Plugin(n) => n.flow(),
        }
    }

    pub fn role(&self) -> NodeRole {
        match self {
            AnyNode::Builtin(n) => n.role(),
            AnyNode::Plugin(n) => n.role(),
        }
    }

    pub fn downward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        match self {
            AnyNode::Builtin(n) => n.downward(io),
            AnyNode::Plugin(n) => n.downward(io),
        }
    }

    pub fn upward(&self, io: &NodeIo<'_>) -> Result<Vec<Parameter>, String> {
        match self {
            AnyNode::Builtin(n) => n.upward(io),
            AnyNode::Plugin(n) => n.upward(io),
        }
    }
}

impl std::fmt::Debug for AnyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyNode::Builtin(n) => f.debug_tuple("Builtin").field(n).finish(),
            AnyNode::Plugin(n) => f.debug_tuple("Plugin").field(&n.name()).finish(),
        }
    }
}

impl From<BuiltinNode> for AnyNode {
    fn from(node: BuiltinNode) -> Self {
        AnyNode::Builtin(node)
    }
}

macro_rules! builtin_from {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for AnyNode {
                fn from(node: $ty) -> Self {
                    AnyNode::Builtin(BuiltinNode::$variant(node))
                }
            }
        )*
    };
}

builtin_from! {
    SourceNode => Source,
    SinkNode => Sink,
    IdentityNode => Identity,
    AdapterNode => Adapter,
    NexusNode => Nexus,
}
