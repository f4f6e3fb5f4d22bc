//! Benchmarks for PulseHive graph lifecycle operations.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, Criterion};
use pulsehive_graph::{Config, PulseHive};
use tempfile::tempdir;

/// Benchmark opening a new database.
fn bench_open_new(c: &mut Criterion) {
    c.bench_function("open_new_database", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;

            for _ in 0..iters {
                let dir = tempdir().unwrap();
                let path = dir.path().join("test.db");

                let start = std::time::Instant::now();
                let graph = PulseHive::open(&path, Config::default()).unwrap();
                total += start.elapsed();

                graph.close().unwrap();
            }

            total
        });
    });
}

/// Benchmark opening an existing database.
fn bench_open_existing(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let graph = PulseHive::open(&path, Config::default()).unwrap();
    graph.close().unwrap();

    c.bench_function("open_existing_database", |b| {
        b.iter(|| {
            let graph = PulseHive::open(&path, Config::default()).unwrap();
            graph.close().unwrap();
        });
    });
}

/// Benchmark closing a database.
fn bench_close(c: &mut Criterion) {
    c.bench_function("close_database", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;

            for _ in 0..iters {
                let dir = tempdir().unwrap();
                let path = dir.path().join("test.db");

                let graph = PulseHive::open(&path, Config::default()).unwrap();

                let start = std::time::Instant::now();
                graph.close().unwrap();
                total += start.elapsed();
            }

            total
        });
    });
}

criterion_group!(benches, bench_open_new, bench_open_existing, bench_close);
criterion_main!(benches);
