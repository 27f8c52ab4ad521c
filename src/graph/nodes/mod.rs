//! Built-in node implementations.

pub mod adapter;
pub mod identity;
pub mod nexus;
pub mod sink;
pub mod source;

pub use adapter::AdapterNode;
pub use identity::IdentityNode;
pub use nexus::{NexusMode, NexusNode};
pub use sink::SinkNode;
pub use source::SourceNode;
