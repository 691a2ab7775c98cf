//! Benchmarks for the position tracker.
//!
//! Performance-critical paths:
//! - `spans`: runs after every applied op to re-derive blocks
//! - `apply_external_edit`: runs on every host keystroke during review
//! - `to_view_line`: coordinate mapping used by every edit

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vdiff_kernel::diff::PositionTracker;

/// Builds a tracker with `blocks` blocks of one ghost row and two added rows,
/// separated by one live row.
fn tracker_with_blocks(blocks: usize) -> PositionTracker {
    let mut tracker = PositionTracker::new();
    for i in 0..blocks {
        let row = i * 4;
        tracker.add_removed(row, &[format!("old {i}")]);
        tracker.add_added(row + 1, 2);
    }
    tracker
}

fn bench_spans(c: &mut Criterion) {
    let mut group = c.benchmark_group("position_tracker/spans");

    for blocks in [10usize, 100, 1000] {
        let tracker = tracker_with_blocks(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &tracker, |b, t| {
            b.iter(|| black_box(t).spans());
        });
    }

    group.finish();
}

fn bench_external_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("position_tracker/external_edit");

    for blocks in [10usize, 100, 1000] {
        let tracker = tracker_with_blocks(blocks);
        group.bench_with_input(
            BenchmarkId::new("insert_top", blocks),
            &tracker,
            |b, t| {
                b.iter_batched(
                    || t.clone(),
                    |mut t| t.apply_external_edit(black_box(0), black_box(1)),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
        group.bench_with_input(
            BenchmarkId::new("delete_middle", blocks),
            &tracker,
            |b, t| {
                b.iter_batched(
                    || t.clone(),
                    |mut t| t.apply_external_edit(black_box(blocks), black_box(-2)),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_to_view_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("position_tracker/to_view_line");

    for blocks in [10usize, 100, 1000] {
        let tracker = tracker_with_blocks(blocks);
        let last_line = blocks * 3;
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &tracker, |b, t| {
            b.iter(|| t.to_view_line(black_box(last_line)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_spans, bench_external_edit, bench_to_view_line);
criterion_main!(benches);
