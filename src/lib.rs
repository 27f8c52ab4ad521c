//! # diplomacy-rs: interconnect parameter negotiation
//!
//! Hardware generators describe a system as blocks joined by buses, and each
//! bus has parameters (widths, address windows, protocol options) that both
//! ends must agree on. This crate resolves those parameters before anything is
//! generated: masters push what they offer down the graph, slaves push what
//! they accept back up, and every edge settles on the merge of the two.
//!
//! ## Architecture
//!
//! - **Graph**: append-only node and edge store with bind-time capability and
//!   cardinality checks
//! - **Engine**: demand-driven, memoized evaluation over an explicit work-list
//!   with cycle detection
//! - **Validation**: reachability from roots, orphan and cardinality checks,
//!   and the frozen [`BoundGraph`](graph::BoundGraph) handed to later stages
//!
//! ## Configuration
//!
//! Negotiation policy lives in [`config::NegotiationConfig`], loadable from a
//! TOML file. Logging goes through `tracing`; [`logging::init`] installs a
//! subscriber for binaries and tests.

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;

// Re-export commonly used types
pub use config::{NegotiationConfig, OrphanPolicy};
pub use error::{DiplomacyError, Result, ResultExt};
pub use graph::{
    BoundGraph, EdgeAdapter, EdgeId, FanIn, FanOut, FieldKind, Graph, GraphError, MergePolicy,
    NodeId, Parameter, Protocol, Schema, Value,
};
