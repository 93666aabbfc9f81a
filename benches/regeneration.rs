//! Benchmarks for install, matching and persistence.
//!
//! Measures:
//! - Install of a fresh shape (enumeration, table and graph build)
//! - A full regeneration with the default plan against an upstream feature
//! - Snapshot encode and reload
//!
//! Models are compounds of `n` reference boxes, so sizes scale linearly.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use seershape::prelude::*;
use seershape::reference::{box_topology, BoxTopology, ReferenceGeometry, ReferenceHistory, ReferenceShape};
use std::sync::Arc;

fn boxes(n: usize, height: f64) -> Vec<BoxTopology> {
    (0..n).map(|_| box_topology(1.0, 1.0, height)).collect()
}

fn compound(topos: &[BoxTopology]) -> ReferenceShape {
    ReferenceShape::compound(topos.iter().map(|t| t.solid.clone()).collect())
}

fn upstream(topos: &[BoxTopology]) -> SeerShape<ReferenceShape> {
    let mut seer = SeerShape::with_id_source(Arc::new(SequentialIds::new(1)));
    seer.set_shape(compound(topos));
    seer.ensure_no_nils();
    seer
}

fn bench_install(c: &mut Criterion) {
    let mut group = c.benchmark_group("install");
    for &n in &[1usize, 10, 100] {
        let shape = compound(&boxes(n, 1.0));
        group.bench_with_input(BenchmarkId::from_parameter(n), &shape, |b, shape| {
            b.iter(|| {
                let mut seer = SeerShape::with_id_source(Arc::new(SequentialIds::new(2)));
                seer.set_shape(black_box(shape.clone()));
                black_box(seer.all_nil_shapes().len())
            });
        });
    }
    group.finish();
}

fn bench_regenerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("regenerate");
    for &n in &[1usize, 10, 100] {
        let old = boxes(n, 1.0);
        let source = upstream(&old);
        let new = boxes(n, 2.0);
        let mut history = ReferenceHistory::new();
        for (a, b) in old.iter().zip(&new) {
            for (fa, fb) in a.faces.iter().zip(&b.faces) {
                history.record(fa, fb);
            }
        }
        let shape = compound(&new);
        let plan = MatchPlan::default();
        group.bench_with_input(BenchmarkId::from_parameter(n), &shape, |b, shape| {
            b.iter(|| {
                let ctx = MatchContext::<ReferenceShape>::new()
                    .with_oracle(&history)
                    .with_geometry(&ReferenceGeometry);
                let mut feature = SeerShape::with_id_source(Arc::new(SequentialIds::new(3)));
                let report = feature.regenerate(shape.clone(), &source, &plan, &ctx);
                black_box(report.total_resolved())
            });
        });
    }
    group.finish();
}

fn bench_persist(c: &mut Criterion) {
    let topos = boxes(100, 1.0);
    let seer = upstream(&topos);
    let shape = compound(&topos);
    let bytes = seer.serial_out().to_cbor().unwrap();

    c.bench_function("persist/encode", |b| {
        b.iter(|| black_box(seer.serial_out().to_cbor().unwrap().len()));
    });
    c.bench_function("persist/reload", |b| {
        b.iter(|| {
            let mut back = SeerShape::with_id_source(Arc::new(SequentialIds::new(4)));
            back.set_shape(shape.clone());
            let snapshot = Snapshot::from_cbor(black_box(&bytes)).unwrap();
            black_box(back.serial_in(&snapshot).unwrap())
        });
    });
}

criterion_group!(benches, bench_install, bench_regenerate, bench_persist);
criterion_main!(benches);
