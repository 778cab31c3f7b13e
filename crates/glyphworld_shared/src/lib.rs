//! # Glyphworld Shared
//!
//! Common types used by the generator, the renderer and the server.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - `tokio`
//! - `crossterm`
//! - Anything that performs I/O beyond reading a config file
//!
//! If you need runtime types, put them in `glyphworld_server`.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod direction;

pub use config::{ConfigError, RenderModeName, WorldConfig};
pub use constants::{
    CHAT_HISTORY, DEFAULT_CACHE_CAPACITY, DEFAULT_CELL_SIZE, DEFAULT_CHUNK_SIZE, MAX_CATCHUP_TICKS,
    SERVER_BIND, TICK_RATE,
};
pub use direction::Direction;
