//! # Tile Art
//!
//! Procedural pixel art for terrain. Every tile is its terrain's base
//! colour with per-pixel speckle derived from the variant, so the same
//! tile always draws the same way. Water shimmers with the animation
//! frame.

use std::collections::HashMap;
use std::sync::Arc;

use glyphworld_procedural::{hash_coords, Terrain, Tile};

use crate::pixel::{PixelGrid, Rgb};

/// Key for cached tile art.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ArtKey {
    terrain: u8,
    variant: u8,
    size: usize,
    frame: u8,
}

/// Cache of rendered tile art.
#[derive(Debug, Default)]
pub struct TileAtlas {
    art: HashMap<ArtKey, Arc<PixelGrid>>,
}

impl TileAtlas {
    /// Creates an empty atlas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Art for `tile` at `size` x `size` pixels.
    pub fn art(&mut self, tile: Tile, size: usize, animation_frame: u8) -> Arc<PixelGrid> {
        let terrain = tile.terrain();
        // Only water animates; everything else shares frame 0.
        let frame = if terrain == Terrain::Water {
            animation_frame % 4
        } else {
            0
        };
        let key = ArtKey {
            terrain: terrain as u8,
            variant: tile.variant,
            size,
            frame,
        };
        Arc::clone(
            self.art
                .entry(key)
                .or_insert_with(|| Arc::new(paint(terrain, tile.variant, size, frame))),
        )
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.art.len()
    }

    /// Whether nothing has been painted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.art.is_empty()
    }
}

/// Flat colour for a tile, used when a tile is a single pixel.
#[must_use]
pub fn tile_color(tile: Tile) -> Rgb {
    let base = Rgb::from_array(tile.terrain().base_color());
    base.scaled(0.9 + 0.05 * f32::from(tile.variant % 4))
}

fn paint(terrain: Terrain, variant: u8, size: usize, frame: u8) -> PixelGrid {
    let base = tile_color(Tile::new(terrain, variant));
    if size <= 1 {
        return PixelGrid::filled(1, 1, base);
    }
    let mut grid = PixelGrid::filled(size, size, base);
    let salt = (u64::from(terrain as u8) << 8) | u64::from(variant);
    grid.map_opaque(|x, y, color| {
        let h = hash_coords(salt, x as i64 + i64::from(frame), y as i64);
        match terrain {
            Terrain::Water => {
                if h % 7 == 0 {
                    color.mix(Rgb::WHITE, 0.35)
                } else {
                    color
                }
            }
            Terrain::Building => {
                // Mortar lines.
                if y % 2 == 1 || (x + y / 2) % 3 == 0 {
                    color.scaled(0.75)
                } else {
                    color
                }
            }
            _ => {
                let shade = 0.85 + 0.3 * ((h % 100) as f32 / 100.0);
                color.scaled(shade)
            }
        }
    });
    grid
}
