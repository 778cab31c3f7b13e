//! # World Configuration
//!
//! A world is described by one TOML file, loaded once at startup:
//!
//! ```toml
//! seed = 42
//! tick_rate = 20
//! chunk_size = 32
//! cache_capacity = 256
//! render_mode = "half_block"
//! ```
//!
//! Missing keys fall back to the defaults in [`crate::constants`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    ART_TIMEOUT_SECS, CHAT_HISTORY, DEFAULT_CACHE_CAPACITY, DEFAULT_CELL_SIZE, DEFAULT_CHUNK_SIZE,
    DEFAULT_SPAWN, MAX_CATCHUP_TICKS, MAX_FRAME_MS, PUMP_CEILING_BYTES, SERVER_BIND,
    SOCKET_HIGH_WATER_MARK, TICK_RATE, VIEWPORT_COLS, VIEWPORT_ROWS,
};

/// Errors raised while loading or validating a world configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML or has wrong field types.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value the server cannot run with.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Terminal encoding selected for new sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderModeName {
    /// One pixel per two full-block characters.
    Block,
    /// Two vertical pixels per character.
    #[default]
    HalfBlock,
    /// Eight pixels per character (2x4 dot matrix).
    Braille,
}

/// Everything needed to stand up one world instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed. Immutable for the world's lifetime.
    pub seed: u64,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Largest wall-clock gap (ms) one frame step accounts for.
    pub max_frame_ms: u64,
    /// Ticks one frame step may run before surplus time is dropped.
    pub max_catchup_ticks: u32,
    /// Tiles per chunk edge.
    pub chunk_size: usize,
    /// Chunks kept by the LRU cache.
    pub cache_capacity: usize,
    /// Spatial index cell edge in tiles.
    pub cell_size: i32,
    /// Spawn X for new players.
    pub spawn_x: i32,
    /// Spawn Y for new players.
    pub spawn_y: i32,
    /// Chat messages kept in the recent-history ring.
    pub chat_history: usize,
    /// Wandering NPCs spawned at startup.
    pub npc_count: usize,
    /// Queued output bytes per connection before old frames are dropped.
    pub pump_ceiling_bytes: usize,
    /// Socket buffer size at which the transport reports backpressure.
    pub socket_high_water_mark: usize,
    /// Terminal encoding for new sessions.
    pub render_mode: RenderModeName,
    /// Viewport width in terminal columns.
    pub viewport_cols: u16,
    /// Viewport height in terminal rows.
    pub viewport_rows: u16,
    /// Seconds before an art generation request is abandoned.
    pub art_timeout_secs: u64,
    /// Address the TCP listener binds to.
    pub bind: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate: TICK_RATE,
            max_frame_ms: MAX_FRAME_MS,
            max_catchup_ticks: MAX_CATCHUP_TICKS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cell_size: DEFAULT_CELL_SIZE,
            spawn_x: DEFAULT_SPAWN.0,
            spawn_y: DEFAULT_SPAWN.1,
            chat_history: CHAT_HISTORY,
            npc_count: 8,
            pump_ceiling_bytes: PUMP_CEILING_BYTES,
            socket_high_water_mark: SOCKET_HIGH_WATER_MARK,
            render_mode: RenderModeName::default(),
            viewport_cols: VIEWPORT_COLS,
            viewport_rows: VIEWPORT_ROWS,
            art_timeout_secs: ART_TIMEOUT_SECS,
            bind: SERVER_BIND.to_string(),
        }
    }
}

impl WorldConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for values that fail validation.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks that every size and rate is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.max_catchup_ticks == 0 {
            return Err(ConfigError::Invalid("max_catchup_ticks must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be positive".into()));
        }
        if self.cell_size <= 0 {
            return Err(ConfigError::Invalid("cell_size must be positive".into()));
        }
        if self.pump_ceiling_bytes == 0 {
            return Err(ConfigError::Invalid("pump_ceiling_bytes must be positive".into()));
        }
        if self.viewport_cols == 0 || self.viewport_rows == 0 {
            return Err(ConfigError::Invalid("viewport must be at least 1x1".into()));
        }
        Ok(())
    }

    /// Duration of one simulation tick in microseconds.
    #[inline]
    #[must_use]
    pub fn tick_micros(&self) -> u64 {
        1_000_000 / u64::from(self.tick_rate.max(1))
    }

    /// How long custom art generation may take.
    #[must_use]
    pub const fn art_timeout(&self) -> Duration {
        Duration::from_secs(self.art_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 32);
        assert_eq!(config.tick_micros(), 50_000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = WorldConfig::from_toml_str(
            r#"
            seed = 7
            tick_rate = 30
            render_mode = "braille"
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.render_mode, RenderModeName::Braille);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_rejects_zero_tick_rate() {
        let err = WorldConfig::from_toml_str("tick_rate = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = WorldConfig::from_toml_str("seed = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = WorldConfig {
            seed: 99,
            npc_count: 3,
            ..WorldConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(WorldConfig::from_toml_str(&text).unwrap(), config);
    }
}
