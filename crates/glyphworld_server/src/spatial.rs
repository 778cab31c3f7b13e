//! # Spatial Index
//!
//! Uniform grid hash over entity positions. Queries touch only the cells
//! overlapping the query, so cost scales with the area asked about, not
//! with the number of entities in the world.
//!
//! ## Invariant
//!
//! Every tracked id is a member of exactly one cell, and that cell is the
//! floor-division of its last position by the cell size. Empty cells are
//! removed so memory follows the population.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Grid cell coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Cell X.
    pub x: i32,
    /// Cell Y.
    pub y: i32,
}

impl CellCoord {
    /// Creates a cell coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell containing a tile position.
    #[inline]
    #[must_use]
    pub const fn containing(x: i32, y: i32, cell_size: i32) -> Self {
        Self {
            x: x.div_euclid(cell_size),
            y: y.div_euclid(cell_size),
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Result of moving an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellMove {
    /// Cell before the move, `None` for a newly tracked entity.
    pub old_cell: Option<CellCoord>,
    /// Cell after the move.
    pub new_cell: CellCoord,
}

impl CellMove {
    /// Whether the entity changed cells.
    #[must_use]
    pub fn crossed(&self) -> bool {
        self.old_cell != Some(self.new_cell)
    }
}

/// An entity returned by a query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexedEntity {
    /// Entity id.
    pub id: String,
    /// Tile X.
    pub x: i32,
    /// Tile Y.
    pub y: i32,
}

/// Uniform grid index keyed by entity id.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: i32,
    positions: HashMap<String, (i32, i32)>,
    cells: HashMap<CellCoord, HashSet<String>>,
}

impl SpatialIndex {
    /// Creates an empty index. Cell sizes below 1 are raised to 1.
    #[must_use]
    pub fn new(cell_size: i32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            positions: HashMap::new(),
            cells: HashMap::new(),
        }
    }

    /// Side length of a cell in tiles.
    #[must_use]
    pub const fn cell_size(&self) -> i32 {
        self.cell_size
    }

    /// Cell containing a position.
    #[must_use]
    pub const fn cell_of(&self, x: i32, y: i32) -> CellCoord {
        CellCoord::containing(x, y, self.cell_size)
    }

    /// Tracks `id` at `(x, y)`, replacing any previous position.
    ///
    /// Calling twice with the same position changes nothing.
    pub fn update_player(&mut self, id: &str, x: i32, y: i32) -> CellMove {
        let new_cell = self.cell_of(x, y);
        let old_cell = self.positions.get(id).map(|&(ox, oy)| self.cell_of(ox, oy));

        if let Some(old) = old_cell {
            if old != new_cell {
                self.leave_cell(old, id);
            }
        }
        if old_cell != Some(new_cell) {
            self.cells.entry(new_cell).or_default().insert(id.to_owned());
        }

        match self.positions.get_mut(id) {
            Some(pos) => *pos = (x, y),
            None => {
                self.positions.insert(id.to_owned(), (x, y));
            }
        }

        CellMove { old_cell, new_cell }
    }

    /// Stops tracking `id`. Returns whether it was tracked.
    pub fn remove_player(&mut self, id: &str) -> bool {
        match self.positions.remove(id) {
            Some((x, y)) => {
                let cell = self.cell_of(x, y);
                self.leave_cell(cell, id);
                true
            }
            None => false,
        }
    }

    fn leave_cell(&mut self, cell: CellCoord, id: &str) {
        if let Some(members) = self.cells.get_mut(&cell) {
            members.remove(id);
            if members.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Last position of `id`.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<(i32, i32)> {
        self.positions.get(id).copied()
    }

    /// Entities with `x <= px < x + w` and `y <= py < y + h`, sorted by id.
    #[must_use]
    pub fn players_in_viewport(
        &self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        exclude: Option<&str>,
    ) -> Vec<IndexedEntity> {
        if w <= 0 || h <= 0 {
            return Vec::new();
        }
        let min = self.cell_of(x, y);
        let max = self.cell_of(x.saturating_add(w - 1), y.saturating_add(h - 1));
        let (x_end, y_end) = (i64::from(x) + i64::from(w), i64::from(y) + i64::from(h));

        let mut found = Vec::new();
        for cy in min.y..=max.y {
            for cx in min.x..=max.x {
                let Some(members) = self.cells.get(&CellCoord::new(cx, cy)) else {
                    continue;
                };
                for id in members {
                    if exclude == Some(id.as_str()) {
                        continue;
                    }
                    let Some(&(px, py)) = self.positions.get(id) else {
                        continue;
                    };
                    if px >= x && i64::from(px) < x_end && py >= y && i64::from(py) < y_end {
                        found.push(IndexedEntity {
                            id: id.clone(),
                            x: px,
                            y: py,
                        });
                    }
                }
            }
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Everyone in the 3x3 block of cells around `center`, sorted by id.
    ///
    /// Approximate proximity: no distance filter is applied.
    #[must_use]
    pub fn players_in_neighborhood(
        &self,
        center: CellCoord,
        exclude: Option<&str>,
    ) -> Vec<IndexedEntity> {
        let mut found = Vec::new();
        for cy in center.y.saturating_sub(1)..=center.y.saturating_add(1) {
            for cx in center.x.saturating_sub(1)..=center.x.saturating_add(1) {
                let Some(members) = self.cells.get(&CellCoord::new(cx, cy)) else {
                    continue;
                };
                found.extend(
                    members
                        .iter()
                        .filter(|id| exclude != Some(id.as_str()))
                        .filter_map(|id| {
                            self.positions.get(id).map(|&(x, y)| IndexedEntity {
                                id: id.clone(),
                                x,
                                y,
                            })
                        }),
                );
            }
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Verifies the one-id-one-cell invariant.
    ///
    /// # Errors
    ///
    /// Describes the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = 0usize;
        for (cell, members) in &self.cells {
            if members.is_empty() {
                return Err(format!("cell {cell} is empty but retained"));
            }
            for id in members {
                let Some(&(x, y)) = self.positions.get(id) else {
                    return Err(format!("{id} is in cell {cell} but has no position"));
                };
                let expected = self.cell_of(x, y);
                if expected != *cell {
                    return Err(format!("{id} is in cell {cell}, expected {expected}"));
                }
                seen += 1;
            }
        }
        if seen != self.positions.len() {
            return Err(format!(
                "{} tracked ids but {seen} cell memberships",
                self.positions.len()
            ));
        }
        Ok(())
    }
}
