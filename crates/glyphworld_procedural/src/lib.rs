//! # Glyphworld Procedural Generation
//!
//! Deterministic world generation for infinite, reproducible worlds.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same world
//! 2. **Chunked**: World is generated in fixed-size square chunks
//! 3. **Bounded**: Resident chunks are capped by a true-LRU cache
//! 4. **Layered**: Placed tiles override generated ones
//!
//! ## Core Components
//!
//! - `ValueNoise`: splitmix-hashed smooth noise and fBm
//! - `ChunkGenerator`: Produces chunks from noise
//! - `TerrainThresholds`: Classifies elevation/moisture into terrain
//! - `ChunkCache`: LRU residency with hit/miss statistics
//! - `TerrainWorld`: Override-aware tile lookup
//!
//! ## Example
//!
//! ```rust,ignore
//! use glyphworld_procedural::{TerrainWorld, WorldSeed};
//!
//! let mut world = TerrainWorld::new(WorldSeed::new(42), 32, 256);
//! world.preload_around(0, 0, 2);
//! let tile = world.tile_at(5, 5);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

pub mod cache;
pub mod chunk;
pub mod noise;
pub mod overrides;
pub mod terrain;
pub mod world;

pub use cache::{CacheStats, ChunkCache};
pub use chunk::{Chunk, ChunkCoord, ChunkGenerator, Tile};
pub use noise::{hash_coords, splitmix64, unit_from_hash, ValueNoise, WorldSeed};
pub use overrides::{SnapshotError, TileOverrides};
pub use terrain::{Terrain, TerrainThresholds};
pub use world::TerrainWorld;
