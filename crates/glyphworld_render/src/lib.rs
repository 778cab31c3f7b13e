//! # Glyphworld Render
//!
//! Pixel art in a terminal. Frames are composed as pixel grids, packed
//! into character cells with one of three encodings, and diffed against
//! the previous frame so only changed cells are sent.
//!
//! ## Pipeline
//!
//! ```text
//! WorldView ──► ViewportComposer ──► PixelGrid ──► encode_cells ──► CellGrid
//!                                                                     │
//!                                     bytes ◄── TerminalRenderer ◄────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use glyphworld_render::{PixelGrid, RenderMode, Rgb, TerminalRenderer};
//!
//! let mut renderer = TerminalRenderer::new(RenderMode::HalfBlock);
//! let frame = PixelGrid::filled(80, 46, Rgb::new(20, 40, 80));
//! let bytes = renderer.render(&frame)?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions
)]

pub mod encode;
pub mod pixel;
pub mod sprite;
pub mod terminal;
pub mod tiles;
pub mod viewport;

pub use encode::{encode_cells, encode_full, Cell, CellGrid, RenderMode};
pub use pixel::{composite, PixelGrid, Rgb};
pub use sprite::{Sprite, SpriteSheet, SpriteStore};
pub use terminal::{FrameStats, TerminalRenderer};
pub use tiles::{tile_color, TileAtlas};
pub use viewport::{
    Lighting, NpcLayer, TileRect, ViewportComposer, VisibleEntity, WorldView, FALLBACK_LIMIT,
};
