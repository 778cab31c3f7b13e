//! # Determinism Integration Tests
//!
//! Proves the world is a pure function of (seed, coordinate), no matter
//! which cache, which order, or how much eviction happened in between.

use glyphworld_procedural::{ChunkCache, ChunkCoord, ChunkGenerator, TerrainWorld, WorldSeed};

/// Test: seed 42, chunk (0, 0) generated twice is byte-identical.
#[test]
fn test_seed_42_chunk_origin_twice() {
    let generator = ChunkGenerator::new(WorldSeed::new(42), 32);

    let first = generator.generate(ChunkCoord::new(0, 0));
    let second = generator.generate(ChunkCoord::new(0, 0));

    assert_eq!(first.size(), 32);
    assert_eq!(first.tiles().len(), 32 * 32);
    assert_eq!(first.as_bytes(), second.as_bytes());
}

/// Test: A thrashing cache hands out the same tiles as a roomy one.
#[test]
fn test_cache_pressure_never_changes_content() {
    let seed = WorldSeed::new(2024);
    let mut tiny = ChunkCache::new(ChunkGenerator::new(seed, 32), 2);
    let mut roomy = ChunkCache::new(ChunkGenerator::new(seed, 32), 512);

    // Walk a spiral-ish path so the tiny cache evicts constantly.
    let path: Vec<(i32, i32)> = (0..200).map(|i| ((i % 13) - 6, (i % 7) - 3)).collect();

    for &(cx, cy) in &path {
        let a = tiny.get(cx, cy);
        let b = roomy.get(cx, cy);
        assert_eq!(a.as_bytes(), b.as_bytes(), "chunk ({cx}, {cy}) differs");
    }

    assert!(tiny.stats().evictions > 0);
    assert!(tiny.len() <= 2);
}

/// Test: Different seeds give different worlds.
#[test]
fn test_seeds_differ() {
    let a = ChunkGenerator::new(WorldSeed::new(1), 32).generate(ChunkCoord::new(0, 0));
    let b = ChunkGenerator::new(WorldSeed::new(2), 32).generate(ChunkCoord::new(0, 0));
    assert_ne!(a.as_bytes(), b.as_bytes());
}

/// Test: Walking far away keeps memory bounded by the cache capacity.
#[test]
fn test_long_walk_is_bounded() {
    let mut world = TerrainWorld::new(WorldSeed::new(42), 32, 16);

    for step in 0..5_000 {
        let x = step * 3;
        let _ = world.tile_at(x, step);
        if step % 100 == 0 {
            world.preload_around(x, step, 1);
        }
    }

    let stats = world.cache_stats();
    assert!(stats.size <= 16, "cache grew past capacity: {stats:?}");
    assert!(stats.hit_rate() > 0.5, "walking should mostly hit: {stats:?}");
}
