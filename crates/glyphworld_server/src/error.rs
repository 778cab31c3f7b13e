//! # Server Errors
//!
//! One enum per failure domain. Only [`ServerError`] ever reaches the
//! process boundary; tick faults are reported as signals, transport
//! faults end one session, art faults become placeholder sprites.

use std::time::Duration;

use glyphworld_procedural::SnapshotError;
use glyphworld_shared::ConfigError;
use thiserror::Error;

/// Failure inside a tick handler.
///
/// Caught by the tick loop and reported, never propagated.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TickError {
    /// A handler failed.
    #[error("{handler} failed: {message}")]
    Handler {
        /// Handler name.
        handler: String,
        /// What went wrong.
        message: String,
    },

    /// Simulation state was not what the handler expected.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl TickError {
    /// Shorthand for [`TickError::Handler`].
    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            message: message.into(),
        }
    }
}

/// Failure writing to a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away.
    #[error("connection closed")]
    Closed,

    /// The pump was detached from this transport.
    #[error("transport detached")]
    Detached,

    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure producing custom art.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArtError {
    /// The generator did not answer in time.
    #[error("art generation timed out after {0:?}")]
    Timeout(Duration),

    /// The generator refused or crashed.
    #[error("art generation failed: {0}")]
    Generator(String),

    /// The description was unusable.
    #[error("invalid description: {0}")]
    InvalidDescription(String),
}

/// Errors surfaced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A session's transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Saved world state was unreadable.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The world host has stopped.
    #[error("world host is not running")]
    HostGone,

    /// Identity lookup failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Persistence failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
