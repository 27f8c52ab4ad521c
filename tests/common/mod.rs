//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use diplomacy_rs::graph::{Graph, GraphError, ResolveError};
use diplomacy_rs::{EdgeId, Parameter, Value};

/// A parameter with a single `width` field.
pub fn width(w: impl Into<Value>) -> Parameter {
    Parameter::new().with("width", w)
}

/// Resolve `edge` and return its settled width, panicking on failure.
pub fn resolved_width(graph: &mut Graph, edge: EdgeId) -> u64 {
    match graph.resolve(edge) {
        Ok(param) => param
            .num("width")
            .unwrap_or_else(|| panic!("{} has no width: {}", edge, param)),
        Err(e) => panic!("{} failed to resolve: {}", edge, e),
    }
}

/// Unwrap the resolve error inside a `GraphError`.
pub fn resolve_error(err: GraphError) -> ResolveError {
    match err {
        GraphError::Resolve(e) => e,
        other => panic!("expected a resolve error, got {:?}", other),
    }
}
