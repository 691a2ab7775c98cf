//! Benchmarks for applying diff streams.
//!
//! Performance-critical paths:
//! - `DiffSession::apply_line`: buffer edit, tracker update and block sync
//! - `SessionManager::run`: the same through the async pull loop

#![allow(missing_docs)]

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures_util::stream;
use std::sync::Arc;
use vdiff_kernel::buffer::{BufferId, LineBuffer};
use vdiff_kernel::diff::DiffLine;
use vdiff_kernel::events::NoopObserver;
use vdiff_kernel::infrastructure::config::DiffSettings;
use vdiff_kernel::session::{DiffSession, LineRange, SessionManager};

/// A region of `lines` lines and a stream rewriting every third line.
fn workload(lines: usize) -> (LineBuffer, Vec<DiffLine>) {
    let original: Vec<String> = (0..lines).map(|i| format!("line {i}")).collect();
    let mut ops = Vec::with_capacity(lines + lines / 3);
    for (i, line) in original.iter().enumerate() {
        if i % 3 == 0 {
            ops.push(DiffLine::removed(line.clone()));
            ops.push(DiffLine::added(format!("{line} changed")));
        } else {
            ops.push(DiffLine::same(line.clone()));
        }
    }
    (LineBuffer::from_lines(original), ops)
}

fn bench_session_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_apply/session");

    for lines in [100usize, 1000] {
        let (buffer, ops) = workload(lines);
        group.throughput(Throughput::Elements(ops.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &ops, |b, ops| {
            b.iter_batched(
                || {
                    DiffSession::start(
                        BufferId::new("bench.rs"),
                        buffer.clone().shared(),
                        LineRange::new(0, lines - 1),
                        Arc::new(NoopObserver),
                    )
                    .unwrap()
                },
                |mut session| {
                    session.begin_run().unwrap();
                    for op in ops {
                        session.apply_line(op).unwrap();
                    }
                    session.finish_streaming();
                    session
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_manager_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_apply/manager");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    for lines in [100usize, 1000] {
        let (buffer, ops) = workload(lines);
        group.throughput(Throughput::Elements(ops.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &ops, |b, ops| {
            b.to_async(&runtime).iter(|| async {
                let manager = SessionManager::new(DiffSettings::default(), Arc::new(NoopObserver));
                let handle = manager
                    .start_session(
                        BufferId::new("bench.rs"),
                        buffer.clone().shared(),
                        LineRange::new(0, lines - 1),
                    )
                    .unwrap();
                let source = stream::iter(ops.iter().cloned().map(Ok::<_, std::io::Error>));
                manager.run(&handle, source).await.unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_session_apply, bench_manager_run);
criterion_main!(benches);
