//! # Host Protocol
//!
//! Messages between connection tasks and the world host. Sessions never
//! touch simulation state; they send [`HostCommand`]s in and receive
//! [`SessionEvent`]s out.
//!
//! ```text
//! Session ──HostCommand──► WorldHost (pre-tick drain)
//! Session ◄─SessionEvent── WorldHost (post-tick render, chat fan-out)
//! ```

use std::sync::Arc;

use glyphworld_render::{PixelGrid, RenderMode};
use tokio::sync::mpsc;

use crate::auth::Identity;
use crate::game::ChatMessage;

/// Capacity of a session's event channel. Frames past it are dropped.
pub const SESSION_EVENT_CAPACITY: usize = 4;

/// Event channel for a new session.
#[must_use]
pub fn session_channel() -> (mpsc::Sender<SessionEvent>, mpsc::Receiver<SessionEvent>) {
    mpsc::channel(SESSION_EVENT_CAPACITY)
}

/// A composed frame for one viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Tick the frame shows.
    pub tick: u64,
    /// Viewport pixels.
    pub pixels: PixelGrid,
    /// Text for the line under the viewport.
    pub status: String,
}

/// Simulation to session.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A new frame to draw.
    Frame(Arc<Frame>),
    /// Someone else said something.
    Chat(ChatMessage),
    /// A one-off message for this player.
    Notice(String),
}

/// How a viewer wants frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewerSettings {
    /// Terminal columns.
    pub cols: u16,
    /// Terminal rows, status line included.
    pub rows: u16,
    /// Cell encoding.
    pub mode: RenderMode,
}

/// Session to simulation.
#[derive(Debug)]
pub enum HostCommand {
    /// A player's session started.
    Connect {
        /// Who connected.
        identity: Identity,
        /// Session id.
        session_id: u64,
        /// Viewport wanted.
        settings: ViewerSettings,
        /// Where to deliver frames and chat.
        events: mpsc::Sender<SessionEvent>,
    },
    /// A player's session ended.
    Disconnect {
        /// Player id.
        player_id: String,
        /// Session that ended; ignored if the player has since reconnected.
        session_id: u64,
    },
    /// Chat from a player.
    Chat {
        /// Player id.
        player_id: String,
        /// Text.
        text: String,
    },
    /// Viewport change.
    Resize {
        /// Player id.
        player_id: String,
        /// New settings.
        settings: ViewerSettings,
    },
}
