//! # Chunk System
//!
//! World data is organized into fixed-size square chunks for:
//! - Memory efficiency (only chunks near somebody stay resident)
//! - Fast streaming (generate/discard on demand)
//! - Determinism checks (a chunk is comparable byte-for-byte)
//!
//! ## Chunk Format
//!
//! Chunks are N x N tiles (N configured, 32 by default).
//! Each tile is 4 bytes: terrain, variant, flags, reserved.

use bytemuck::{Pod, Zeroable};

use crate::noise::{ValueNoise, WorldSeed};
use crate::terrain::{Terrain, TerrainThresholds};

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not tiles).
    pub x: i32,
    /// Y coordinate (in chunks, not tiles).
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts world tile coordinates to the chunk containing them.
    #[inline]
    #[must_use]
    pub const fn from_tile_pos(tile_x: i32, tile_y: i32, chunk_size: usize) -> Self {
        let size = chunk_size as i32;
        Self {
            x: tile_x.div_euclid(size),
            y: tile_y.div_euclid(size),
        }
    }

    /// Returns the world X coordinate of the chunk's origin (corner).
    #[inline]
    #[must_use]
    pub const fn world_x(self, chunk_size: usize) -> i32 {
        self.x * chunk_size as i32
    }

    /// Returns the world Y coordinate of the chunk's origin.
    #[inline]
    #[must_use]
    pub const fn world_y(self, chunk_size: usize) -> i32 {
        self.y * chunk_size as i32
    }
}

/// A single tile in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Tile {
    /// Terrain type ID (see [`Terrain`]).
    pub terrain: u8,
    /// Visual variant (0..[`Terrain::VARIANTS`]).
    pub variant: u8,
    /// Bit flags (bit 0 = walkable).
    pub flags: u8,
    /// Reserved, always zero.
    pub reserved: u8,
}

impl Tile {
    /// Walkable flag bit.
    pub const WALKABLE: u8 = 0b0000_0001;

    /// Creates a tile, deriving walkability from the terrain.
    #[inline]
    #[must_use]
    pub const fn new(terrain: Terrain, variant: u8) -> Self {
        Self {
            terrain: terrain as u8,
            variant: variant % Terrain::VARIANTS,
            flags: if terrain.is_walkable() { Self::WALKABLE } else { 0 },
            reserved: 0,
        }
    }

    /// Returns the terrain type.
    #[inline]
    #[must_use]
    pub const fn terrain(self) -> Terrain {
        Terrain::from_u8(self.terrain)
    }

    /// Returns true if entities may stand here.
    #[inline]
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        self.flags & Self::WALKABLE != 0
    }

    /// Legacy character for this tile.
    #[inline]
    #[must_use]
    pub const fn glyph(self) -> char {
        self.terrain().glyph(self.variant)
    }
}

/// A chunk of world data.
///
/// Contains an N x N grid of tiles indexed as `[y * N + x]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk position in the world.
    pub coord: ChunkCoord,
    /// Tiles per edge.
    size: usize,
    /// Tile data, row-major.
    tiles: Box<[Tile]>,
}

impl Chunk {
    /// Creates a chunk filled with the default tile.
    #[must_use]
    pub fn new(coord: ChunkCoord, size: usize) -> Self {
        Self {
            coord,
            size,
            tiles: vec![Tile::default(); size * size].into_boxed_slice(),
        }
    }

    /// Tiles per edge.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Gets a tile at local coordinates, or `None` outside the chunk.
    #[inline]
    #[must_use]
    pub fn get_tile(&self, x: usize, y: usize) -> Option<Tile> {
        if x < self.size && y < self.size {
            Some(self.tiles[y * self.size + x])
        } else {
            None
        }
    }

    /// Sets a tile at local coordinates. Out-of-range writes are ignored.
    #[inline]
    pub fn set_tile(&mut self, x: usize, y: usize, tile: Tile) {
        if x < self.size && y < self.size {
            self.tiles[y * self.size + x] = tile;
        }
    }

    /// All tiles, row-major.
    #[inline]
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Raw tile bytes, for byte-for-byte comparison.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.tiles)
    }

    /// Counts tiles of the given terrain.
    #[must_use]
    pub fn count(&self, terrain: Terrain) -> usize {
        self.tiles.iter().filter(|t| t.terrain() == terrain).count()
    }
}

/// Chunk generator using procedural noise.
///
/// Holds no mutable state: every call is a pure function of the seed
/// and the coordinate.
pub struct ChunkGenerator {
    /// Tiles per chunk edge.
    chunk_size: usize,
    /// Elevation field.
    elevation: ValueNoise,
    /// Moisture field.
    moisture: ValueNoise,
    /// High-frequency detail for visual variants.
    detail: ValueNoise,
    /// Classification thresholds.
    thresholds: TerrainThresholds,
    /// World seed.
    seed: WorldSeed,
}

impl ChunkGenerator {
    /// Spatial frequency of the elevation and moisture fields.
    pub const FIELD_FREQUENCY: f64 = 0.02;
    /// Spatial frequency of the detail field.
    pub const DETAIL_FREQUENCY: f64 = 0.9;
    /// Octaves for the elevation/moisture fBm.
    const OCTAVES: u32 = 4;

    /// Creates a new chunk generator.
    #[must_use]
    pub fn new(seed: WorldSeed, chunk_size: usize) -> Self {
        Self {
            chunk_size,
            elevation: ValueNoise::new(seed.derive(1)),
            moisture: ValueNoise::new(seed.derive(2)),
            detail: ValueNoise::new(seed.derive(3)),
            thresholds: TerrainThresholds::default(),
            seed,
        }
    }

    /// Overrides the classification thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: TerrainThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Tiles per chunk edge.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The world seed.
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Generates the tile at world coordinates.
    #[must_use]
    pub fn tile_at(&self, world_x: i32, world_y: i32) -> Tile {
        let fx = f64::from(world_x) * Self::FIELD_FREQUENCY;
        let fy = f64::from(world_y) * Self::FIELD_FREQUENCY;

        let elevation = self.elevation.fbm(fx, fy, Self::OCTAVES, 2.0, 0.5);
        let moisture = self.moisture.fbm(fx, fy, Self::OCTAVES, 2.0, 0.5);
        let terrain = self.thresholds.classify(elevation, moisture);

        let variant = self.detail.sample_discrete(
            f64::from(world_x),
            f64::from(world_y),
            Self::DETAIL_FREQUENCY,
            u32::from(Terrain::VARIANTS),
        ) as u8;

        Tile::new(terrain, variant)
    }

    /// Generates a chunk at the given coordinates.
    #[must_use]
    pub fn generate(&self, coord: ChunkCoord) -> Chunk {
        let mut chunk = Chunk::new(coord, self.chunk_size);

        let world_x = coord.world_x(self.chunk_size);
        let world_y = coord.world_y(self.chunk_size);

        for local_y in 0..self.chunk_size {
            for local_x in 0..self.chunk_size {
                let tile = self.tile_at(world_x + local_x as i32, world_y + local_y as i32);
                chunk.set_tile(local_x, local_y, tile);
            }
        }

        chunk
    }
}
