//! # World & Network Constants
//!
//! Defaults for a Glyphworld instance.
//!
//! Every value here can be overridden from `world.toml`; these are the
//! numbers a fresh server starts with.

// =============================================================================
// NETWORK CONFIGURATION
// =============================================================================

/// Server bind address (accepts connections from all interfaces)
pub const SERVER_BIND: &str = "0.0.0.0:2323";

/// Tick rate (updates per second)
pub const TICK_RATE: u32 = 20;

/// Longest wall-clock gap a single frame step will account for.
pub const MAX_FRAME_MS: u64 = 250;

/// Ticks a single frame step may run before surplus time is discarded.
pub const MAX_CATCHUP_TICKS: u32 = 5;

// =============================================================================
// WORLD CONFIGURATION
// =============================================================================

/// Chunk width/height in tiles.
pub const DEFAULT_CHUNK_SIZE: usize = 32;

/// Chunks kept resident by the LRU cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Spatial index cell width/height in tiles.
pub const DEFAULT_CELL_SIZE: i32 = 64;

/// Where brand new players appear.
pub const DEFAULT_SPAWN: (i32, i32) = (0, 0);

// =============================================================================
// SESSION CONFIGURATION
// =============================================================================

/// Recent chat messages retained for late joiners.
pub const CHAT_HISTORY: usize = 50;

/// Queued output bytes a connection may hold before old frames are dropped.
pub const PUMP_CEILING_BYTES: usize = 256 * 1024;

/// Buffered socket bytes above which the transport reports itself full.
pub const SOCKET_HIGH_WATER_MARK: usize = 64 * 1024;

/// Viewport width in terminal columns.
pub const VIEWPORT_COLS: u16 = 80;

/// Viewport height in terminal rows (status line excluded).
pub const VIEWPORT_ROWS: u16 = 23;

/// Seconds an art generation request may run before it is abandoned.
pub const ART_TIMEOUT_SECS: u64 = 120;
