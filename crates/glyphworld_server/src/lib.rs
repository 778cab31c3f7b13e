//! # Glyphworld Server - The Authoritative World
//!
//! Hosts a shared world for terminal players.
//!
//! ## Architecture
//!
//! - **Tick loop**: fixed timestep with bounded catch-up and lag signals
//! - **Game state**: players, terrain, NPCs and chat, owned by one task
//! - **Spatial index**: grid hash answering viewport and proximity queries
//! - **Sessions**: one task per connection, talking to the world by channel
//! - **Output pump**: drop-oldest backpressure in front of each socket
//!
//! ## Ownership
//!
//! ```text
//! session ──HostCommand / InputEvent──► WorldHost (tick loop, GameState)
//! session ◄────────SessionEvent──────── WorldHost
//! session ──bytes──► OutputPump ──► SocketBuffer ──► TcpStream
//! ```
//!
//! Only the world host writes simulation state. A slow client loses
//! frames; it never slows the world or the other clients.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use glyphworld_server::{MemoryStore, WorldHost};
//! use glyphworld_shared::WorldConfig;
//!
//! let host = WorldHost::spawn(&WorldConfig::default(), Arc::new(MemoryStore::new()))?;
//! let handle = host.handle();
//! // hand `handle` to each session task
//! ```

#![deny(missing_docs)]
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

pub mod art;
pub mod auth;
pub mod error;
pub mod game;
pub mod host;
pub mod keys;
pub mod protocol;
pub mod pump;
pub mod session;
pub mod spatial;
pub mod store;
pub mod tick;
pub mod transport;

pub use art::{ArtGenerator, ForgeOutcome, ProceduralArtist, SpriteForge};
pub use auth::{Authenticator, GuestAuthenticator, Identity};
pub use error::{ArtError, ServerError, ServerResult, TickError, TransportError};
pub use game::{
    ChatMessage, GameServer, GameState, InputEvent, InputKind, InputSender, PlayerState,
};
pub use host::{HostHandle, WorldHost};
pub use keys::{KeyAction, KeyDecoder};
pub use protocol::{session_channel, Frame, HostCommand, SessionEvent, ViewerSettings};
pub use pump::{OutputPump, PumpMetrics};
pub use session::{run_session, SessionConfig, SessionSummary};
pub use spatial::{CellCoord, CellMove, IndexedEntity, SpatialIndex};
pub use store::{MemoryStore, PlayerSnapshot, PlayerStore};
pub use tick::{
    run_tick_loop, FrameReport, TickContext, TickHandler, TickLoop, TickPhase, TickSignal,
    TickStats,
};
pub use transport::{SocketBuffer, Transport, WriteStatus};
