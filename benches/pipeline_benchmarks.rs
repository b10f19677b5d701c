//! Benchmarks for the scheduling and storage pipeline.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polystream::analysis::ModelSummary;
use polystream::ir::{Model, ModelBuilder};
use polystream::polyhedral::{IntegerSet, Space, Tuple};
use polystream::transform::scheduler::{AffineScheduler, SchedulingPrimitive};
use polystream::{compile, CompilerOptions};

/// A three-stage stream: source, two-tap filter, sink.
fn filter_chain() -> Model {
    let mut b = ModelBuilder::new();
    let x = b.array("x", &[(0, None)]).unwrap();
    let y = b.array("y", &[(0, None)]).unwrap();
    let src = b.statement("src", &[(0, None)]).unwrap();
    b.write(src, x, &[vec![1, 0]]).unwrap();
    let fir = b.statement("fir", &[(1, None)]).unwrap();
    b.read(fir, x, &[vec![1, 0]]).unwrap();
    b.read(fir, x, &[vec![1, -1]]).unwrap();
    b.write(fir, y, &[vec![1, 0]]).unwrap();
    let sink = b.statement("sink", &[(1, None)]).unwrap();
    b.read(sink, y, &[vec![1, 0]]).unwrap();
    b.build().unwrap()
}

/// Benchmark integer set queries.
fn bench_set_ops(c: &mut Criterion) {
    let space = Space::set(Tuple::time(3));
    let set = IntegerSet::boxed(space, &[(0, Some(31)), (0, Some(31)), (0, Some(7))]);
    c.bench_function("set_extrema", |b| {
        b.iter(|| {
            let s = black_box(&set);
            (s.min_dim(2).unwrap(), s.max_dim(0).unwrap())
        })
    });
}

/// Benchmark the model summary.
fn bench_summary(c: &mut Criterion) {
    let model = filter_chain();
    c.bench_function("summary_filter_chain", |b| {
        b.iter(|| ModelSummary::new(black_box(&model)).unwrap())
    });
}

/// Benchmark the scheduler alone.
fn bench_scheduler(c: &mut Criterion) {
    let model = filter_chain();
    let summary = ModelSummary::new(&model).unwrap();
    c.bench_function("schedule_filter_chain", |b| {
        b.iter(|| AffineScheduler::new().schedule(black_box(&model), &summary).unwrap())
    });
}

/// Benchmark the whole pipeline.
fn bench_compile(c: &mut Criterion) {
    let model = filter_chain();
    let options = CompilerOptions::new().with_parallel(true);
    c.bench_function("compile_filter_chain", |b| {
        b.iter(|| {
            let mut m = model.clone();
            compile(black_box(&mut m), &options).unwrap()
        })
    });
}

criterion_group!(benches, bench_set_ops, bench_summary, bench_scheduler, bench_compile);
criterion_main!(benches);
