//! Benchmarks for submit-to-completion throughput of the priority executor

use autochain::executor::TaskExecutor;
use autochain::{Config, Priority, TaskError};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

fn executor(workers: usize) -> TaskExecutor {
    let config = Config::builder()
        .num_workers(workers)
        .pop_timeout(Duration::from_millis(10))
        .build()
        .unwrap();
    let exec = TaskExecutor::new(config).unwrap();
    exec.start().unwrap();
    exec
}

fn bench_submit_and_wait(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_and_wait");

    for workers in [1usize, 2, 4] {
        let exec = executor(workers);
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| {
                let handles: Vec<_> = (0..1_000u64)
                    .map(|i| exec.submit(move || Ok::<_, TaskError>(black_box(i * i))))
                    .collect();
                for handle in &handles {
                    handle.wait(None);
                }
            });
        });
        exec.stop();
    }

    group.finish();
}

fn bench_mixed_priorities(c: &mut Criterion) {
    let exec = executor(2);

    c.bench_function("mixed_priorities", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..1_000u32)
                .map(|i| {
                    let priority = Priority::new((i % 10 + 1) as u8).unwrap();
                    exec.submit_with_priority(move || Ok::<_, TaskError>(black_box(i)), priority)
                })
                .collect();
            for handle in &handles {
                handle.wait(None);
            }
        });
    });

    exec.stop();
}

fn bench_cancel_queued(c: &mut Criterion) {
    // never started: everything stays queued
    let config = Config::builder().num_workers(1).build().unwrap();
    let exec = TaskExecutor::new(config).unwrap();

    c.bench_function("cancel_queued", |b| {
        b.iter(|| {
            let ids: Vec<_> = (0..200)
                .map(|_| exec.submit(|| Ok::<_, TaskError>(())).id())
                .collect();
            for id in ids {
                black_box(exec.cancel_task(id));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_submit_and_wait,
    bench_mixed_priorities,
    bench_cancel_queued
);
criterion_main!(benches);
