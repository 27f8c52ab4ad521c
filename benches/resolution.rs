//! Benchmarks for graph resolution
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use diplomacy_rs::graph::{IdentityNode, SinkNode, SourceNode};
use diplomacy_rs::{FanOut, FieldKind, Graph, MergePolicy, Parameter, Protocol, Schema, Value};
use std::sync::Arc;

fn bus() -> Arc<Protocol> {
    let schema = Schema::new()
        .field("width", FieldKind::Number)
        .field("cached", FieldKind::Flag);
    Protocol::builder("axi").down(schema.clone()).up(schema).build()
}

fn offer() -> Parameter {
    Parameter::new()
        .with("width", Value::span(8, 128))
        .with("cached", true)
}

fn demand(width: u64) -> Parameter {
    Parameter::new().with("width", width).with("cached", true)
}

fn chain(length: usize) -> Graph {
    let proto = bus();
    let mut graph = Graph::new();
    let mut prev = graph
        .add_node(SourceNode::new("src", proto.clone(), offer()))
        .unwrap();
    for i in 0..length {
        let stage = graph
            .add_node(IdentityNode::new(format!("stage{}", i), proto.clone()))
            .unwrap();
        graph.bind(prev.output(0), stage.input(0)).unwrap();
        prev = stage;
    }
    let sink = graph.add_node(SinkNode::new("dst", proto, demand(64))).unwrap();
    graph.bind(prev.output(0), sink.input(0)).unwrap();
    graph
}

fn fan_out(width: usize) -> Graph {
    let proto = bus();
    let mut graph = Graph::new();
    let src = graph
        .add_node(SourceNode::new("src", proto.clone(), offer()))
        .unwrap();
    let sinks: Vec<_> = (0..width)
        .map(|i| {
            let w = [8u64, 16, 32, 64][i % 4];
            graph
                .add_node(SinkNode::new(format!("dev{}", i), proto.clone(), demand(w)))
                .unwrap()
        })
        .collect();
    graph
        .bind_many(
            FanOut::new(src.output(0), sinks.iter().map(|s| s.input(0)))
                .policy(MergePolicy::Maximum),
        )
        .unwrap();
    graph
}

fn bench_chain_freeze(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_freeze");

    for length in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*length as u64 + 1));
        group.bench_with_input(BenchmarkId::new("freeze", length), length, |b, &length| {
            b.iter_batched(
                || chain(length),
                |mut graph| black_box(graph.freeze().unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_fan_out_freeze(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_freeze");

    for width in [4, 64, 512].iter() {
        group.throughput(Throughput::Elements(*width as u64));
        group.bench_with_input(BenchmarkId::new("freeze", width), width, |b, &width| {
            b.iter_batched(
                || fan_out(width),
                |mut graph| black_box(graph.freeze().unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_memoized_resolve(c: &mut Criterion) {
    let mut graph = chain(100);
    let last = graph.edge_ids().last().unwrap();
    graph.resolve(last).unwrap();

    c.bench_function("memoized_resolve", |b| {
        b.iter(|| black_box(graph.resolve(black_box(last)).unwrap().clone()));
    });
}

fn bench_json_emission(c: &mut Criterion) {
    let bound = fan_out(64).freeze().unwrap();

    c.bench_function("bound_graph_to_json", |b| {
        b.iter(|| black_box(bound.to_json().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_chain_freeze,
    bench_fan_out_freeze,
    bench_memoized_resolve,
    bench_json_emission,
);

criterion_main!(benches);
