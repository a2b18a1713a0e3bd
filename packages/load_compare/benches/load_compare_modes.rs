//! Compares the two harness modes on a reduced synthetic workload, and measures the cost of a
//! single synthetic task invocation.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use load_compare::{Harness, RunConfig, SyntheticTask, TaskRunner, WorkloadProfile};
use testing::ScratchDir;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let scratch = ScratchDir::new();
    let task = SyntheticTask::new(WorkloadProfile::REFERENCE.with_matrix_size(32), scratch.path());

    let mut group = c.benchmark_group("synthetic_task");

    group.bench_function("single_invocation", |b| {
        b.iter(|| task.run(black_box(0)));
    });

    group.finish();

    let mut group = c.benchmark_group("harness_modes");
    group.sample_size(10);

    let harness = Harness::new(RunConfig::new(4, 8), &task);

    group.bench_function("sequential", |b| {
        b.iter(|| black_box(harness.run_sequential()));
    });

    group.bench_function("concurrent", |b| {
        b.iter(|| black_box(harness.run_concurrent()));
    });

    group.finish();
}
