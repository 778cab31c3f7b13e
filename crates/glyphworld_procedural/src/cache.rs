//! # Chunk Cache
//!
//! Bounded, true-LRU residency in front of the [`ChunkGenerator`].
//!
//! ## Design
//!
//! - `HashMap` for O(1) lookup
//! - A monotonic access stamp per entry, mirrored in a `BTreeMap`
//!   (stamp → coord), so the least-recently-used entry is the first key
//! - Exactly one eviction per over-capacity insertion
//!
//! Chunks are handed out as `Arc<Chunk>` so a renderer can hold a
//! viewport's worth of chunks even if some of them get evicted meanwhile.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::chunk::{Chunk, ChunkCoord, ChunkGenerator};

/// One resident chunk.
#[derive(Clone, Debug)]
struct CacheEntry {
    /// The generated chunk.
    chunk: Arc<Chunk>,
    /// Access stamp of the most recent hit (or the insertion).
    last_access: u64,
    /// Number of times this entry was requested.
    access_count: u64,
}

/// Diagnostic cache counters. Non-authoritative.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStats {
    /// Resident chunks.
    pub size: usize,
    /// Maximum resident chunks.
    pub capacity: usize,
    /// Requests served from the cache.
    pub hits: u64,
    /// Requests that had to generate.
    pub misses: u64,
    /// Entries evicted so far.
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of requests served from the cache (0 when idle).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU chunk cache.
pub struct ChunkCache {
    /// The pure generator behind the cache.
    generator: ChunkGenerator,
    /// Maximum resident chunks.
    capacity: usize,
    /// Resident entries.
    entries: HashMap<ChunkCoord, CacheEntry>,
    /// Access order: oldest stamp first.
    order: BTreeMap<u64, ChunkCoord>,
    /// Next access stamp.
    clock: u64,
    /// Counters.
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ChunkCache {
    /// Creates an empty cache in front of `generator`.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(generator: ChunkGenerator, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            generator,
            capacity,
            entries: HashMap::with_capacity(capacity + 1),
            order: BTreeMap::new(),
            clock: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// The generator behind this cache.
    #[inline]
    #[must_use]
    pub const fn generator(&self) -> &ChunkGenerator {
        &self.generator
    }

    /// Tiles per chunk edge.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.generator.chunk_size()
    }

    #[inline]
    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Returns the chunk at `(cx, cy)`, generating it on a miss.
    pub fn get(&mut self, cx: i32, cy: i32) -> Arc<Chunk> {
        let coord = ChunkCoord::new(cx, cy);
        let stamp = self.next_stamp();

        if let Some(entry) = self.entries.get_mut(&coord) {
            self.order.remove(&entry.last_access);
            entry.last_access = stamp;
            entry.access_count += 1;
            self.order.insert(stamp, coord);
            self.hits += 1;
            return Arc::clone(&entry.chunk);
        }

        self.misses += 1;
        let chunk = Arc::new(self.generator.generate(coord));
        self.entries.insert(
            coord,
            CacheEntry {
                chunk: Arc::clone(&chunk),
                last_access: stamp,
                access_count: 1,
            },
        );
        self.order.insert(stamp, coord);

        if self.entries.len() > self.capacity {
            self.evict_oldest();
        }

        chunk
    }

    /// Removes the single least-recently-accessed entry.
    fn evict_oldest(&mut self) {
        let Some((_, coord)) = self.order.pop_first() else {
            return;
        };
        if let Some(entry) = self.entries.remove(&coord) {
            self.evictions += 1;
            tracing::trace!(
                cx = coord.x,
                cy = coord.y,
                accesses = entry.access_count,
                "evicted chunk"
            );
        }
    }

    /// Returns every chunk overlapping the tile rectangle `(x, y, w, h)`,
    /// partially covered chunks included. Row-major order.
    pub fn chunks_for_viewport(&mut self, x: i32, y: i32, w: i32, h: i32) -> Vec<Arc<Chunk>> {
        if w <= 0 || h <= 0 {
            return Vec::new();
        }
        let size = self.chunk_size();
        let min = ChunkCoord::from_tile_pos(x, y, size);
        let max = ChunkCoord::from_tile_pos(x.saturating_add(w - 1), y.saturating_add(h - 1), size);

        let span = (i64::from(max.x) - i64::from(min.x) + 1) * (i64::from(max.y) - i64::from(min.y) + 1);
        let mut chunks = Vec::with_capacity(usize::try_from(span).unwrap_or(0).min(self.capacity));
        for cy in min.y..=max.y {
            for cx in min.x..=max.x {
                chunks.push(self.get(cx, cy));
            }
        }
        chunks
    }

    /// Populates the cache with the chunks within `radius` chunks of the
    /// chunk containing tile `(x, y)`.
    pub fn preload_around(&mut self, x: i32, y: i32, radius: i32) {
        let center = ChunkCoord::from_tile_pos(x, y, self.chunk_size());
        let radius = radius.max(0);
        for cy in center.y.saturating_sub(radius)..=center.y.saturating_add(radius) {
            for cx in center.x.saturating_sub(radius)..=center.x.saturating_add(radius) {
                let _ = self.get(cx, cy);
            }
        }
    }

    /// True if the chunk is resident. Does not count as an access.
    #[inline]
    #[must_use]
    pub fn contains(&self, cx: i32, cy: i32) -> bool {
        self.entries.contains_key(&ChunkCoord::new(cx, cy))
    }

    /// Number of times a resident chunk was requested.
    #[must_use]
    pub fn access_count(&self, cx: i32, cy: i32) -> Option<u64> {
        self.entries
            .get(&ChunkCoord::new(cx, cy))
            .map(|entry| entry.access_count)
    }

    /// Resident chunk count.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is resident.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every resident chunk. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::WorldSeed;

    fn cache(capacity: usize) -> ChunkCache {
        ChunkCache::new(ChunkGenerator::new(WorldSeed::new(42), 32), capacity)
    }

    #[test]
    fn test_capacity_two_evicts_oldest() {
        let mut cache = cache(2);

        let _ = cache.get(0, 0); // A
        let _ = cache.get(1, 0); // B
        let _ = cache.get(2, 0); // C

        assert!(!cache.contains(0, 0), "A should be evicted");
        assert!(cache.contains(1, 0));
        assert!(cache.contains(2, 0));

        // Touching B is a hit and evicts nothing.
        let _ = cache.get(1, 0);
        assert!(cache.contains(2, 0));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reaccess_prevents_eviction() {
        let mut cache = cache(3);

        let _ = cache.get(0, 0);
        let _ = cache.get(0, 1);
        let _ = cache.get(0, 2);
        let _ = cache.get(0, 0); // refresh the oldest
        let _ = cache.get(0, 3); // K+1th distinct chunk

        assert!(cache.contains(0, 0), "refreshed entry must survive");
        assert!(!cache.contains(0, 1), "least recently used must go");
        assert_eq!(cache.access_count(0, 0), Some(2));
    }

    #[test]
    fn test_hit_returns_same_chunk() {
        let mut cache = cache(4);
        let first = cache.get(3, -2);
        let second = cache.get(3, -2);

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_regenerated_chunk_is_identical() {
        let mut cache = cache(1);
        let before = cache.get(0, 0);
        let _ = cache.get(5, 5); // evicts (0, 0)
        let after = cache.get(0, 0);

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.as_bytes(), after.as_bytes());
    }

    #[test]
    fn test_viewport_chunk_range() {
        let mut cache = cache(64);

        // Exactly one chunk.
        assert_eq!(cache.chunks_for_viewport(0, 0, 32, 32).len(), 1);
        // One tile over the edge pulls in the neighbour.
        assert_eq!(cache.chunks_for_viewport(0, 0, 33, 32).len(), 2);
        // Straddling the origin touches four chunks.
        let chunks = cache.chunks_for_viewport(-1, -1, 2, 2);
        let coords: Vec<_> = chunks.iter().map(|c| c.coord).collect();
        assert_eq!(
            coords,
            vec![
                ChunkCoord::new(-1, -1),
                ChunkCoord::new(0, -1),
                ChunkCoord::new(-1, 0),
                ChunkCoord::new(0, 0),
            ]
        );
        assert!(cache.chunks_for_viewport(0, 0, 0, 10).is_empty());
    }

    #[test]
    fn test_viewport_at_the_edge_of_the_plane() {
        let mut cache = cache(8);
        let chunks = cache.chunks_for_viewport(i32::MAX - 5, 0, 80, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].coord, ChunkCoord::from_tile_pos(i32::MAX, 0, 32));
    }

    #[test]
    fn test_preload_populates_only() {
        let mut cache = cache(64);
        cache.preload_around(40, 40, 1);

        assert_eq!(cache.len(), 9);
        assert!(cache.contains(0, 0));
        assert!(cache.contains(2, 2));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = cache(0);
        let _ = cache.get(0, 0);
        let _ = cache.get(1, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(1, 1));
    }
}
