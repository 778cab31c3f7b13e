//! # Terrain Classification
//!
//! Determines terrain type from two noise fields:
//! - Elevation (low ground floods, high ground is rock)
//! - Moisture (decides between water, grass and bare dirt)

/// Terrain types in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Terrain {
    /// Standing water. Not walkable.
    Water = 0,
    /// Bare dirt.
    #[default]
    Dirt = 1,
    /// Grassland.
    Grass = 2,
    /// Rock on high ground.
    Stone = 3,
    /// Player-placed road (never generated).
    Road = 4,
    /// Player-placed building floor (never generated).
    Building = 5,
}

impl Terrain {
    /// Number of visual variants per terrain type.
    pub const VARIANTS: u8 = 4;

    /// Returns whether entities may stand on this terrain.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        !matches!(self, Self::Water)
    }

    /// Legacy single-character representation, indexed by variant.
    #[must_use]
    pub const fn glyph(self, variant: u8) -> char {
        let glyphs: [char; 4] = match self {
            Self::Water => ['~', '≈', '~', '∼'],
            Self::Dirt => ['.', ',', '.', '`'],
            Self::Grass => ['"', '\'', ',', '"'],
            Self::Stone => ['^', '▲', '^', '∆'],
            Self::Road => ['=', '=', '-', '='],
            Self::Building => ['#', '#', '▓', '#'],
        };
        glyphs[(variant % Self::VARIANTS) as usize]
    }

    /// Base RGB colour of this terrain.
    #[must_use]
    pub const fn base_color(self) -> [u8; 3] {
        match self {
            Self::Water => [38, 92, 168],
            Self::Dirt => [134, 96, 67],
            Self::Grass => [72, 148, 62],
            Self::Stone => [128, 128, 136],
            Self::Road => [160, 150, 130],
            Self::Building => [110, 70, 50],
        }
    }

    /// Converts from u8.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Water,
            2 => Self::Grass,
            3 => Self::Stone,
            4 => Self::Road,
            5 => Self::Building,
            _ => Self::Dirt,
        }
    }
}

/// Elevation/moisture thresholds used by the classifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainThresholds {
    /// Below this elevation the ground is lowland (water or dirt).
    pub lowland: f64,
    /// At or above this elevation the ground is stone.
    pub highland: f64,
    /// Lowland with moisture above this is water.
    pub flood_moisture: f64,
    /// Midland with moisture above this is grass.
    pub grass_moisture: f64,
}

impl Default for TerrainThresholds {
    fn default() -> Self {
        Self {
            lowland: 0.35,
            highland: 0.70,
            flood_moisture: 0.50,
            grass_moisture: 0.35,
        }
    }
}

impl TerrainThresholds {
    /// Classifies a sample into a terrain type.
    ///
    /// - low elevation + high moisture → water
    /// - low elevation + low moisture → dirt
    /// - mid elevation + sufficient moisture → grass, otherwise dirt
    /// - high elevation → stone
    #[must_use]
    pub fn classify(&self, elevation: f64, moisture: f64) -> Terrain {
        if elevation < self.lowland {
            if moisture > self.flood_moisture {
                Terrain::Water
            } else {
                Terrain::Dirt
            }
        } else if elevation < self.highland {
            if moisture > self.grass_moisture {
                Terrain::Grass
            } else {
                Terrain::Dirt
            }
        } else {
            Terrain::Stone
        }
    }
}
