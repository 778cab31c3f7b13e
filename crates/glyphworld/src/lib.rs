//! # GLYPHWORLD
//!
//! The main crate, wiring the world together behind a TCP listener.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                            GLYPHWORLD                             │
//! ├───────────────────────────────────────────────────────────────────┤
//! │                                                                   │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐         │
//! │  │  shared      │───>│  procedural  │───>│  render      │         │
//! │  │              │    │              │    │              │         │
//! │  │  • config    │    │  • noise     │    │  • sprites   │         │
//! │  │  • constants │    │  • chunks    │    │  • compose   │         │
//! │  │  • direction │    │  • LRU cache │    │  • ANSI      │         │
//! │  └──────────────┘    └──────┬───────┘    └──────┬───────┘         │
//! │                             │                   │                 │
//! │                             v                   v                 │
//! │                      ┌─────────────────────────────────┐          │
//! │                      │  server                         │          │
//! │                      │  • tick loop   • world host     │          │
//! │                      │  • spatial     • sessions       │          │
//! │                      │  • game state  • output pump    │          │
//! │                      └─────────────────────────────────┘          │
//! │                                                                   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each accepted connection becomes one session task. The peer address is
//! the guest fingerprint, so a reconnect from a new port is a new guest.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

// Re-export the crates
pub use glyphworld_procedural as procedural;
pub use glyphworld_render as render;
pub use glyphworld_server as server;
pub use glyphworld_shared as shared;

// Re-export commonly used types
pub use glyphworld_server::{
    GameServer, GuestAuthenticator, MemoryStore, PlayerStore, ServerError, ServerResult,
    WorldHost,
};
pub use glyphworld_shared::WorldConfig;

use glyphworld_server::{run_session, ProceduralArtist, SessionConfig, SpriteForge};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "glyphworld=info";

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]. Calling this twice is
/// harmless; the second call does nothing.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // Err only means a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Hosts one world on `listener` until `shutdown` flips to `true`.
///
/// Open sessions are cut when the listener stops; the world then saves
/// every player and returns its final state.
///
/// # Errors
///
/// The store could not be read at startup, or the world host died.
pub async fn serve(
    config: &WorldConfig,
    store: Arc<dyn PlayerStore>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) -> ServerResult<GameServer> {
    let host = WorldHost::spawn(config, store)?;
    let handle = host.handle();
    let session_config = SessionConfig::from_config(config);
    let art_timeout = config.art_timeout();
    let mut sessions = JoinSet::new();

    info!(addr = ?listener.local_addr().ok(), "Listening");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(%peer, error = %e, "Could not disable Nagle");
                }

                let handle = handle.clone();
                let forge = SpriteForge::new(ProceduralArtist, handle.sprites(), art_timeout);
                sessions.spawn(async move {
                    let fingerprint = peer.to_string();
                    match run_session(
                        stream,
                        &fingerprint,
                        "",
                        handle,
                        &GuestAuthenticator,
                        forge,
                        session_config,
                    )
                    .await
                    {
                        Ok(summary) => debug!(
                            %peer,
                            player = %summary.identity.user_id,
                            dropped = summary.metrics.frames_dropped,
                            "Connection closed"
                        ),
                        Err(e) => warn!(%peer, error = %e, "Connection failed"),
                    }
                });
            }
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Session task panicked");
                }
            }
        }
    }

    info!(open = sessions.len(), "Stopping listener");
    sessions.shutdown().await;
    host.shutdown().await
}
