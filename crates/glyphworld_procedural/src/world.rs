//! # Terrain World
//!
//! The tile lookup every other system uses: placed overrides first,
//! cached generated terrain second.

use std::sync::Arc;

use crate::cache::{CacheStats, ChunkCache};
use crate::chunk::{Chunk, ChunkCoord, ChunkGenerator, Tile};
use crate::noise::WorldSeed;
use crate::overrides::TileOverrides;
use crate::terrain::Terrain;

/// Generated terrain plus the placed-delta layer.
pub struct TerrainWorld {
    /// LRU cache in front of the generator.
    cache: ChunkCache,
    /// Placed tiles.
    overrides: TileOverrides,
}

impl TerrainWorld {
    /// Creates a world for `seed` with the given chunk size and cache capacity.
    #[must_use]
    pub fn new(seed: WorldSeed, chunk_size: usize, cache_capacity: usize) -> Self {
        Self {
            cache: ChunkCache::new(ChunkGenerator::new(seed, chunk_size), cache_capacity),
            overrides: TileOverrides::new(),
        }
    }

    /// Replaces the override layer (e.g. after loading a snapshot).
    #[must_use]
    pub fn with_overrides(mut self, overrides: TileOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// The tile at world coordinates.
    pub fn tile_at(&mut self, x: i32, y: i32) -> Tile {
        if let Some(tile) = self.overrides.get(x, y) {
            return tile;
        }
        let size = self.cache.chunk_size();
        let coord = ChunkCoord::from_tile_pos(x, y, size);
        let chunk = self.cache.get(coord.x, coord.y);
        let local_x = (x - coord.world_x(size)) as usize;
        let local_y = (y - coord.world_y(size)) as usize;
        chunk.get_tile(local_x, local_y).unwrap_or_default()
    }

    /// True if an entity may stand at world coordinates.
    pub fn is_walkable(&mut self, x: i32, y: i32) -> bool {
        self.tile_at(x, y).is_walkable()
    }

    /// Places a tile of `terrain` at world coordinates.
    pub fn place(&mut self, x: i32, y: i32, terrain: Terrain, variant: u8) {
        tracing::debug!(x, y, ?terrain, "placed tile");
        self.overrides.set(x, y, Tile::new(terrain, variant));
    }

    /// Removes a placed tile, restoring generated terrain.
    pub fn clear_placed(&mut self, x: i32, y: i32) -> bool {
        self.overrides.remove(x, y).is_some()
    }

    /// Chunks overlapping a tile rectangle.
    pub fn chunks_for_viewport(&mut self, x: i32, y: i32, w: i32, h: i32) -> Vec<Arc<Chunk>> {
        self.cache.chunks_for_viewport(x, y, w, h)
    }

    /// Warms the cache around a tile position.
    pub fn preload_around(&mut self, x: i32, y: i32, radius: i32) {
        self.cache.preload_around(x, y, radius);
    }

    /// The override layer.
    #[inline]
    #[must_use]
    pub const fn overrides(&self) -> &TileOverrides {
        &self.overrides
    }

    /// The chunk cache.
    #[inline]
    #[must_use]
    pub const fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
