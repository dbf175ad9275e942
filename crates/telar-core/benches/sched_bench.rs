//! Criterion benchmarks for the scheduling core (`telar-core::sched`).
//!
//! Measures scheduling overhead on synthetic statement graphs. Two axes:
//!
//! - **Schedule** — initial grouped topological pass at varying graph sizes
//! - **Repair** — replaying a two-pass schedule with and without invalidation
//!
//! Run with: `cargo bench -p telar-core -- sched/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use telar_core::{
    EdgeKind, GroupLayout, InvalidationState, KindSet, Schedule, StatementGraph, StatementId,
    repair_schedule, schedule,
};

const GRAPH_SIZES: &[usize] = &[16, 64, 256];

// ---------------------------------------------------------------------------
// Graph constructors
// ---------------------------------------------------------------------------

fn s(i: usize) -> StatementId {
    StatementId::new(i as u32)
}

/// Linear chain of fresh dependencies: 0 → 1 → … → n-1.
fn chain(n: usize) -> StatementGraph {
    let mut graph = StatementGraph::new(n);
    for i in 1..n {
        graph
            .add_edge(s(i - 1), s(i), KindSet::of(EdgeKind::Fresh))
            .unwrap();
    }
    graph
}

/// Layered DAG: each statement consumes fresh values from two statements of
/// the previous layer, with a requirement edge every fourth statement.
fn layered(n: usize) -> StatementGraph {
    let mut graph = StatementGraph::new(n);
    let width = 4;
    for i in width..n {
        graph
            .add_edge(s(i - width), s(i), KindSet::of(EdgeKind::Fresh))
            .unwrap();
        graph
            .add_edge(s(i - width + 1), s(i), KindSet::of(EdgeKind::Fresh))
            .unwrap();
        if i % 4 == 0 {
            graph
                .add_edge(s(i - width), s(i), KindSet::of(EdgeKind::Requirement))
                .unwrap();
        }
    }
    graph
}

/// The initial schedule executed twice, as an iteration loop would.
fn two_passes(initial: &Schedule) -> Schedule {
    Schedule::new(
        initial
            .steps()
            .iter()
            .chain(initial.steps())
            .copied()
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("sched/schedule");
    for &n in GRAPH_SIZES {
        let graph = chain(n);
        let groups = GroupLayout::new(n);
        group.bench_with_input(BenchmarkId::new("chain", n), &n, |b, _| {
            b.iter(|| schedule(black_box(&graph), black_box(&groups)).unwrap());
        });

        let graph = layered(n);
        group.bench_with_input(BenchmarkId::new("layered", n), &n, |b, _| {
            b.iter(|| schedule(black_box(&graph), black_box(&groups)).unwrap());
        });
    }
    group.finish();
}

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("sched/repair");
    for &n in GRAPH_SIZES {
        let graph = layered(n);
        let groups = GroupLayout::new(n);
        let prior = two_passes(&schedule(&graph, &groups).unwrap());

        group.bench_with_input(BenchmarkId::new("clean", n), &n, |b, _| {
            b.iter(|| {
                repair_schedule(
                    black_box(&graph),
                    black_box(&groups),
                    black_box(&prior),
                    &InvalidationState::new(),
                )
                .unwrap()
            });
        });

        let mut invalidation = InvalidationState::new();
        for i in (0..n).step_by(3) {
            invalidation.invalidate(s(i));
        }
        group.bench_with_input(BenchmarkId::new("invalidated", n), &n, |b, _| {
            b.iter(|| {
                repair_schedule(
                    black_box(&graph),
                    black_box(&groups),
                    black_box(&prior),
                    black_box(&invalidation),
                )
                .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_schedule, bench_repair);
criterion_main!(benches);
