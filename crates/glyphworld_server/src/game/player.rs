//! Player records.

use glyphworld_shared::Direction;

/// Everything the simulation knows about one player.
///
/// Records outlive connections: a disconnected player keeps their record
/// with `online == false` so a reconnect resumes where they left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerState {
    /// Stable player id.
    pub id: String,
    /// Display name.
    pub username: String,
    /// Tile X.
    pub x: i32,
    /// Tile Y.
    pub y: i32,
    /// Facing.
    pub direction: Direction,
    /// Walk cycle frame, 0..=3.
    pub animation_frame: u8,
    /// Whether a session is attached.
    pub online: bool,
    /// Session currently attached, if any.
    pub session_id: Option<u64>,
}

impl PlayerState {
    /// Creates an online player at `(x, y)`.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            x,
            y,
            direction: Direction::Down,
            animation_frame: 0,
            online: true,
            session_id: None,
        }
    }

    /// Position as a tuple.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}
