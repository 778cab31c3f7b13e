//! # Persistence
//!
//! The simulation is authoritative while a session is live; the store
//! only sees snapshots at session boundaries and on shutdown.

use std::collections::HashMap;

use glyphworld_shared::{Direction, WorldConfig};
use parking_lot::Mutex;

use crate::error::ServerResult;

/// Saved player state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerSnapshot {
    /// Player id.
    pub player_id: String,
    /// Tile X.
    pub x: i32,
    /// Tile Y.
    pub y: i32,
    /// Facing.
    pub direction: Direction,
    /// Online flag at save time.
    pub online: bool,
}

/// Storage for player snapshots, world config and placed tiles.
pub trait PlayerStore: Send + Sync {
    /// Loads a player.
    ///
    /// # Errors
    ///
    /// [`crate::ServerError::Store`] if the backend fails.
    fn load_player(&self, player_id: &str) -> ServerResult<Option<PlayerSnapshot>>;

    /// Saves a player, replacing any earlier snapshot.
    ///
    /// # Errors
    ///
    /// [`crate::ServerError::Store`] if the backend fails.
    fn save_player(&self, snapshot: PlayerSnapshot) -> ServerResult<()>;

    /// Loads stored world configuration.
    ///
    /// # Errors
    ///
    /// [`crate::ServerError::Store`] if the backend fails.
    fn load_world_config(&self) -> ServerResult<Option<WorldConfig>>;

    /// Loads the compressed tile override snapshot.
    ///
    /// # Errors
    ///
    /// [`crate::ServerError::Store`] if the backend fails.
    fn load_overrides(&self) -> ServerResult<Option<Vec<u8>>>;

    /// Saves the compressed tile override snapshot.
    ///
    /// # Errors
    ///
    /// [`crate::ServerError::Store`] if the backend fails.
    fn save_overrides(&self, snapshot: Vec<u8>) -> ServerResult<()>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    players: HashMap<String, PlayerSnapshot>,
    config: Option<WorldConfig>,
    overrides: Option<Vec<u8>>,
}

/// In-process store. Everything is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that hands out `config`.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        let store = Self::default();
        store.inner.lock().config = Some(config);
        store
    }

    /// Number of saved players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.inner.lock().players.len()
    }
}

impl PlayerStore for MemoryStore {
    fn load_player(&self, player_id: &str) -> ServerResult<Option<PlayerSnapshot>> {
        Ok(self.inner.lock().players.get(player_id).cloned())
    }

    fn save_player(&self, snapshot: PlayerSnapshot) -> ServerResult<()> {
        self.inner
            .lock()
            .players
            .insert(snapshot.player_id.clone(), snapshot);
        Ok(())
    }

    fn load_world_config(&self) -> ServerResult<Option<WorldConfig>> {
        Ok(self.inner.lock().config.clone())
    }

    fn load_overrides(&self) -> ServerResult<Option<Vec<u8>>> {
        Ok(self.inner.lock().overrides.clone())
    }

    fn save_overrides(&self, snapshot: Vec<u8>) -> ServerResult<()> {
        self.inner.lock().overrides = Some(snapshot);
        Ok(())
    }
}
