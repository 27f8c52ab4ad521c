//! Test data builders for protocols and graphs

use super::width;
use diplomacy_rs::graph::{IdentityNode, NodeId, SinkNode, SourceNode};
use diplomacy_rs::{EdgeId, FieldKind, Graph, MergePolicy, Parameter, Protocol, Schema};
use std::sync::Arc;

/// Builder for test protocols. Defaults to a `width`-only bus merged by
/// intersection.
pub struct BusBuilder {
    name: String,
    schema: Schema,
    merge: MergePolicy,
}

impl BusBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: Schema::new().field("width", FieldKind::Number),
            merge: MergePolicy::Intersect,
        }
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.schema = self.schema.field(name, kind);
        self
    }

    pub fn merge(mut self, merge: MergePolicy) -> Self {
        self.merge = merge;
        self
    }

    pub fn build(self) -> Arc<Protocol> {
        Protocol::builder(self.name)
            .down(self.schema.clone())
            .up(self.schema)
            .merge(self.merge)
            .build()
    }
}

/// The default test bus.
pub fn bus() -> Arc<Protocol> {
    BusBuilder::new("axi").build()
}

/// A source, `length` identity stages and a sink, bound in a line.
pub struct Chain {
    pub graph: Graph,
    pub source: NodeId,
    pub sink: NodeId,
    /// Edges from source to sink.
    pub edges: Vec<EdgeId>,
}

pub struct ChainBuilder {
    length: usize,
    offer: Parameter,
    demand: Parameter,
    protocol: Arc<Protocol>,
}

impl ChainBuilder {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            offer: width(32u64),
            demand: width(32u64),
            protocol: bus(),
        }
    }

    pub fn offer(mut self, offer: Parameter) -> Self {
        self.offer = offer;
        self
    }

    pub fn demand(mut self, demand: Parameter) -> Self {
        self.demand = demand;
        self
    }

    pub fn protocol(mut self, protocol: Arc<Protocol>) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn build(self) -> Chain {
        let mut graph = Graph::new();
        let source = graph
            .add_node(SourceNode::new("src", self.protocol.clone(), self.offer))
            .unwrap();
        let mut edges = Vec::new();
        let mut prev = source;
        for i in 0..self.length {
            let stage = graph
                .add_node(IdentityNode::new(format!("stage{}", i), self.protocol.clone()))
                .unwrap();
            edges.push(graph.bind(prev.output(0), stage.input(0)).unwrap());
            prev = stage;
        }
        let sink = graph
            .add_node(SinkNode::new("dst", self.protocol, self.demand))
            .unwrap();
        edges.push(graph.bind(prev.output(0), sink.input(0)).unwrap());

        Chain {
            graph,
            source,
            sink,
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_builder() {
        let chain = ChainBuilder::new(3).build();
        assert_eq!(chain.graph.node_count(), 5);
        assert_eq!(chain.edges.len(), 4);
        assert_eq!(chain.graph.edge(chain.edges[3]).unwrap().input, chain.sink.input(0));
    }
}
