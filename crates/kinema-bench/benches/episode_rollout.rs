//! Criterion benchmarks for episode reset, stepping, and rollouts.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kinema_bench::{balance_profile, slider_profile, reach_profile};
use kinema_engine::{parallel_rollouts, LoadOptions};
use kinema_task::TimeLimit;

/// Benchmark: one control step (five sub-steps) through the full hook
/// sequence.
fn bench_step_slider(c: &mut Criterion) {
    let mut env = slider_profile(f64::INFINITY);
    env.reset().unwrap();
    c.bench_function("step_slider_5_substeps", |b| {
        b.iter(|| {
            let ts = env.step(&[0.1]).unwrap();
            std::hint::black_box(&ts);
        });
    });
}

/// Benchmark: reset with physics reuse against reset with recompile.
fn bench_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset");
    let mut balance = balance_profile(0, 10.0);
    group.bench_function("balance_reuse", |b| {
        b.iter(|| std::hint::black_box(balance.reset().unwrap()));
    });
    let mut reach = reach_profile(0, 20.0);
    group.bench_function("reach_recompile", |b| {
        b.iter(|| std::hint::black_box(reach.reset().unwrap()));
    });
    group.finish();
}

/// Benchmark: a full 1 s balance episode (50 control steps).
fn bench_balance_episode(c: &mut Criterion) {
    let mut env = balance_profile(0, 1.0);
    c.bench_function("balance_episode_1s", |b| {
        b.iter(|| {
            let mut ts = env.reset().unwrap();
            while !ts.is_last() {
                ts = env.step(&[0.0]).unwrap();
            }
            std::hint::black_box(&ts);
        });
    });
}

/// Benchmark: 16 random reach episodes across worker counts.
fn bench_parallel_rollouts(c: &mut Criterion) {
    let registry = kinema_suite::registry();
    let seeds: Vec<u64> = (0..16).collect();
    let options = LoadOptions {
        seed: None,
        time_limit: Some(TimeLimit::Seconds(1.0)),
    };
    let mut group = c.benchmark_group("parallel_reach_16");
    group.sample_size(10);
    for workers in [1, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| {
                let out = parallel_rollouts(&registry, "reach/target", &options, &seeds, w, None)
                    .unwrap();
                std::hint::black_box(out);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_step_slider,
    bench_reset,
    bench_balance_episode,
    bench_parallel_rollouts
);
criterion_main!(benches);
