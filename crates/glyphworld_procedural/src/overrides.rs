//! # Tile Overrides
//!
//! Placed deltas (roads, buildings, tile edits) layered over generated
//! terrain. An override always wins over the generated tile.
//!
//! Overrides are owned by the persistence collaborator between sessions.
//! They travel as an LZ4-compressed snapshot of fixed 12-byte records.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use thiserror::Error;

use crate::chunk::Tile;

/// Errors raised while importing an override snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// LZ4 payload could not be decompressed.
    #[error("corrupt override snapshot: {0}")]
    Corrupt(String),

    /// Decompressed payload is not a whole number of records.
    #[error("override snapshot length {0} is not a whole number of records")]
    Truncated(usize),
}

/// Snapshot record size in bytes.
pub const RECORD_SIZE: usize = std::mem::size_of::<OverrideRecord>();

/// One override as stored in a snapshot (host byte order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
struct OverrideRecord {
    x: i32,
    y: i32,
    tile: Tile,
}

/// Sparse map of placed tiles keyed by world coordinate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileOverrides {
    tiles: HashMap<(i32, i32), Tile>,
}

impl TileOverrides {
    /// Creates an empty override layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a tile, replacing any previous override at that spot.
    pub fn set(&mut self, x: i32, y: i32, tile: Tile) {
        self.tiles.insert((x, y), tile);
    }

    /// Removes an override, restoring generated terrain.
    pub fn remove(&mut self, x: i32, y: i32) -> Option<Tile> {
        self.tiles.remove(&(x, y))
    }

    /// The override at a coordinate, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> Option<Tile> {
        self.tiles.get(&(x, y)).copied()
    }

    /// Number of overrides.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// True when no tile is overridden.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Exports every override, sorted by coordinate, LZ4-compressed.
    #[must_use]
    pub fn to_snapshot(&self) -> Vec<u8> {
        let mut records: Vec<OverrideRecord> = self
            .tiles
            .iter()
            .map(|(&(x, y), &tile)| OverrideRecord { x, y, tile })
            .collect();
        records.sort_unstable_by_key(|r| (r.y, r.x));
        compress_prepend_size(bytemuck::cast_slice(&records))
    }

    /// Imports a snapshot produced by [`Self::to_snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the payload is corrupt or truncated.
    pub fn from_snapshot(data: &[u8]) -> Result<Self, SnapshotError> {
        let raw = decompress_size_prepended(data)
            .map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
        if raw.len() % RECORD_SIZE != 0 {
            return Err(SnapshotError::Truncated(raw.len()));
        }

        let tiles = raw
            .chunks_exact(RECORD_SIZE)
            .map(|bytes| {
                let record: OverrideRecord = bytemuck::pod_read_unaligned(bytes);
                ((record.x, record.y), record.tile)
            })
            .collect();
        Ok(Self { tiles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Terrain;

    #[test]
    fn test_set_replace_remove() {
        let mut overrides = TileOverrides::new();
        overrides.set(3, 4, Tile::new(Terrain::Road, 0));
        overrides.set(3, 4, Tile::new(Terrain::Building, 1));

        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get(3, 4).map(Tile::terrain), Some(Terrain::Building));
        assert!(overrides.remove(3, 4).is_some());
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_snapshot_restores_layer() {
        let mut overrides = TileOverrides::new();
        for i in -20..20 {
            overrides.set(i, i * 2, Tile::new(Terrain::Road, (i & 3) as u8));
        }

        let snapshot = overrides.to_snapshot();
        let restored = TileOverrides::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, overrides);
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        assert!(TileOverrides::from_snapshot(&[1, 2, 3]).is_err());

        let bad = compress_prepend_size(&[0u8; RECORD_SIZE + 1]);
        assert_eq!(
            TileOverrides::from_snapshot(&bad),
            Err(SnapshotError::Truncated(RECORD_SIZE + 1))
        );
    }
}
