//! Benchmark for noise generation performance.
//!
//! TARGET: 1,000,000 samples per second
//!
//! Run with: cargo bench --package glyphworld_procedural --bench noise_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use glyphworld_procedural::noise::{ValueNoise, WorldSeed};

fn benchmark_single_sample(c: &mut Criterion) {
    let noise = ValueNoise::new(WorldSeed::new(42));

    c.bench_function("single_noise_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.sample(black_box(x), black_box(x * 0.7), 0.05))
        });
    });
}

fn benchmark_million_samples(c: &mut Criterion) {
    let noise = ValueNoise::new(WorldSeed::new(42));

    let mut group = c.benchmark_group("million_samples");
    group.throughput(Throughput::Elements(1_000_000));
    group.sample_size(10);

    group.bench_function("1M_noise_samples", |b| {
        b.iter(|| {
            for i in 0..1_000_000u32 {
                let x = f64::from(i % 1000) * 0.1;
                let y = f64::from(i / 1000) * 0.1;
                black_box(noise.sample(x, y, 0.05));
            }
        });
    });

    group.finish();
}

fn benchmark_fbm(c: &mut Criterion) {
    let plain = ValueNoise::new(WorldSeed::new(42));
    let memo = ValueNoise::with_memo(WorldSeed::new(42));

    let mut group = c.benchmark_group("fbm_4_octaves");
    group.bench_function("plain", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(plain.fbm(black_box(x), black_box(x * 0.7), 4, 2.0, 0.5))
        });
    });
    group.bench_function("memoised", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(memo.fbm(black_box(x), black_box(x * 0.7), 4, 2.0, 0.5))
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_single_sample, benchmark_million_samples, benchmark_fbm);
criterion_main!(benches);
