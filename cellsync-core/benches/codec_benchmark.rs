use cellsync_core::codec::{decode_graph, encode_graph};
use cellsync_core::{Cell, CellId, Geometry, GraphModel, StyleData};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

fn build_graph(vertices: usize) -> GraphModel {
    let mut model = GraphModel::with_default_layer();
    let layer = CellId::from("1");
    for i in 0..vertices {
        let mut cell = Cell::vertex(Geometry::new(i as f64 * 50.0, 0.0, 40.0, 30.0))
            .with_style("rounded;whiteSpace=wrap;fillColor=#dae8fc;strokeColor=#6c8ebf");
        cell.id = Some(CellId::new(format!("v{i}")));
        model.add_cell(cell, &layer).unwrap();
        if i > 0 {
            let mut edge = Cell::edge_between(
                CellId::new(format!("v{}", i - 1)),
                CellId::new(format!("v{i}")),
            );
            edge.id = Some(CellId::new(format!("e{i}")));
            model.add_cell(edge, &layer).unwrap();
        }
    }
    model.drain_events();
    model
}

fn bench_style(c: &mut Criterion) {
    let mut group = c.benchmark_group("Style");
    group.throughput(Throughput::Elements(1));

    let old = StyleData::parse("rounded;whiteSpace=wrap;fillColor=#dae8fc;strokeColor=#6c8ebf");
    let new = StyleData::parse("dashed;whiteSpace=wrap;fillColor=#f8cecc;strokeColor=#6c8ebf");

    group.bench_function("parse", |b| {
        b.iter(|| StyleData::parse(black_box("rounded;whiteSpace=wrap;fillColor=#dae8fc")))
    });
    group.bench_function("diff", |b| b.iter(|| black_box(&old).diff(black_box(&new))));

    group.finish();
}

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("Graph codec");
    let model = build_graph(500);
    let record = encode_graph(&model).unwrap();
    group.throughput(Throughput::Elements(record.cells.len() as u64));

    group.bench_function("encode_graph_1000", |b| {
        b.iter(|| encode_graph(black_box(&model)).unwrap())
    });
    group.bench_function("decode_graph_1000", |b| {
        b.iter(|| decode_graph(black_box(&record)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_style, bench_graph);
criterion_main!(benches);
