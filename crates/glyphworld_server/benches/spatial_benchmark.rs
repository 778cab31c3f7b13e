//! Benchmark for spatial index updates and viewport queries.
//!
//! TARGET: 1,000 moves plus one viewport query per player inside a 50ms tick
//!
//! Run with: cargo bench --package glyphworld_server --bench spatial_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glyphworld_procedural::splitmix64;
use glyphworld_server::SpatialIndex;

fn populated(count: usize, spread: i32) -> SpatialIndex {
    let mut index = SpatialIndex::new(64);
    let mut state = 7u64;
    for n in 0..count {
        state = splitmix64(state);
        let x = (state % spread as u64) as i32 - spread / 2;
        let y = ((state >> 24) % spread as u64) as i32 - spread / 2;
        index.update_player(&format!("p{n}"), x, y);
    }
    index
}

fn benchmark_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_update");
    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut index = populated(count, 4_096);
            let ids: Vec<String> = (0..count).map(|n| format!("p{n}")).collect();
            let mut step = 0i32;
            b.iter(|| {
                step += 1;
                for (n, id) in ids.iter().enumerate() {
                    let p = n as i32;
                    black_box(index.update_player(id, p + step, p - step));
                }
            });
        });
    }
    group.finish();
}

fn benchmark_queries(c: &mut Criterion) {
    let index = populated(10_000, 4_096);

    c.bench_function("viewport_80x46", |b| {
        b.iter(|| black_box(index.players_in_viewport(black_box(-40), black_box(-23), 80, 46, None)));
    });

    c.bench_function("neighborhood", |b| {
        let center = index.cell_of(0, 0);
        b.iter(|| black_box(index.players_in_neighborhood(black_box(center), None)));
    });
}

criterion_group!(benches, benchmark_updates, benchmark_queries);
criterion_main!(benches);
