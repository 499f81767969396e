//! Monitor and footman throughput benchmark.
//!
//! Measures uncontended request/release on the bare monitor and contended
//! rounds where every philosopher sits and stands repeatedly behind the
//! footman, using Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dining_core::{DiningMonitor, Footman};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn bench_uncontended(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let monitor = DiningMonitor::new(5).unwrap();
    let cancel = CancellationToken::new();

    c.bench_function("monitor_request_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                monitor
                    .request_resources(black_box(2), &cancel)
                    .await
                    .unwrap();
                monitor.release_resources(2).unwrap();
            })
        });
    });
}

fn bench_contended_footman(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();
    let seat_counts: &[usize] = &[3, 5, 16];

    let mut group = c.benchmark_group("footman_rounds");
    for &seats in seat_counts {
        group.bench_with_input(BenchmarkId::from_parameter(seats), &seats, |b, &seats| {
            b.iter(|| {
                rt.block_on(async {
                    let monitor = Arc::new(DiningMonitor::new(seats).unwrap());
                    let footman = Arc::new(Footman::with_default_capacity(monitor).unwrap());
                    let cancel = CancellationToken::new();

                    let workers: Vec<_> = (0..seats)
                        .map(|id| {
                            let footman = footman.clone();
                            let cancel = cancel.clone();
                            tokio::spawn(async move {
                                for _ in 0..50 {
                                    footman.sit(id, &cancel).await.unwrap();
                                    footman.stand_up(id).unwrap();
                                }
                            })
                        })
                        .collect();
                    for worker in workers {
                        worker.await.unwrap();
                    }
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_contended_footman);
criterion_main!(benches);
