//! # Facing Direction
//!
//! Shared by the simulation (which infers it from movement) and the
//! renderer (which picks sprite rows by it).

use serde::{Deserialize, Serialize};

/// Direction an entity faces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Facing up the screen (negative y).
    Up = 0,
    /// Facing down the screen (positive y).
    #[default]
    Down = 1,
    /// Facing left (negative x).
    Left = 2,
    /// Facing right (positive x).
    Right = 3,
}

impl Direction {
    /// Infers a facing from a movement delta.
    ///
    /// The vertical axis is checked first, so a diagonal move faces up or
    /// down. Returns `None` for a zero delta.
    #[must_use]
    pub const fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        if dy < 0 {
            Some(Self::Up)
        } else if dy > 0 {
            Some(Self::Down)
        } else if dx < 0 {
            Some(Self::Left)
        } else if dx > 0 {
            Some(Self::Right)
        } else {
            None
        }
    }

    /// Unit delta for this direction.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_wins_on_diagonal() {
        assert_eq!(Direction::from_delta(1, -1), Some(Direction::Up));
        assert_eq!(Direction::from_delta(-1, 1), Some(Direction::Down));
        assert_eq!(Direction::from_delta(-3, 0), Some(Direction::Left));
        assert_eq!(Direction::from_delta(2, 0), Some(Direction::Right));
        assert_eq!(Direction::from_delta(0, 0), None);
    }
}
