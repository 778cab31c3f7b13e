//! # World Host
//!
//! Runs one [`GameServer`] on its own task. The host is the only writer
//! of simulation state: sessions reach it through a [`HostHandle`], whose
//! commands are drained by a pre-tick handler, and hear back through
//! their own bounded event channels.
//!
//! Player positions are restored from the [`PlayerStore`] on first
//! connect and saved on disconnect. Placed tiles are loaded at spawn and
//! saved at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use glyphworld_procedural::TileOverrides;
use glyphworld_render::SpriteStore;
use glyphworld_shared::WorldConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult, TickError};
use crate::game::{ChatMessage, GameServer, GameState, InputSender, Viewer};
use crate::protocol::{HostCommand, SessionEvent};
use crate::store::PlayerStore;
use crate::tick::TickContext;

/// Cloneable access to a running world.
#[derive(Clone, Debug)]
pub struct HostHandle {
    commands: Sender<HostCommand>,
    inputs: InputSender,
    sprites: Arc<SpriteStore>,
    next_session: Arc<AtomicU64>,
}

impl HostHandle {
    /// Sends a command to the world.
    ///
    /// # Errors
    ///
    /// [`ServerError::HostGone`] if the world has shut down.
    pub fn send(&self, command: HostCommand) -> ServerResult<()> {
        self.commands.send(command).map_err(|_| ServerError::HostGone)
    }

    /// Input queue.
    #[must_use]
    pub const fn inputs(&self) -> &InputSender {
        &self.inputs
    }

    /// Sprite store shared with the renderer.
    #[must_use]
    pub fn sprites(&self) -> Arc<SpriteStore> {
        Arc::clone(&self.sprites)
    }

    /// A fresh session id.
    #[must_use]
    pub fn next_session_id(&self) -> u64 {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }
}

/// A world running on a tokio task.
pub struct WorldHost {
    handle: HostHandle,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<GameServer>,
}

impl WorldHost {
    /// Builds the world for `config` and starts its tick loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// The store failed or held an unreadable tile snapshot.
    pub fn spawn(config: &WorldConfig, store: Arc<dyn PlayerStore>) -> ServerResult<Self> {
        let overrides = match store.load_overrides()? {
            Some(bytes) => TileOverrides::from_snapshot(&bytes)?,
            None => TileOverrides::new(),
        };
        info!(placed = overrides.len(), "Restored placed tiles");

        let (commands, command_rx) = crossbeam_channel::unbounded();
        let handler_store = Arc::clone(&store);
        let mut server = GameServer::with_commands(
            config,
            GameState::with_overrides(config, overrides),
            move |_ctx: &TickContext, state: &mut GameState| -> Result<(), TickError> {
                apply_commands(&command_rx, handler_store.as_ref(), state)
            },
        );

        let handle = HostHandle {
            commands,
            inputs: server.input_sender(),
            sprites: server.state.sprites(),
            next_session: Arc::new(AtomicU64::new(1)),
        };
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            server.run(shutdown_rx).await;
            persist(&mut server.state, store.as_ref());
            server
        });
        info!(tick_rate = config.tick_rate, "World host started");

        Ok(Self {
            handle,
            shutdown,
            task,
        })
    }

    /// Handle for sessions.
    #[must_use]
    pub fn handle(&self) -> HostHandle {
        self.handle.clone()
    }

    /// Stops the loop, saves state and returns the server.
    ///
    /// # Errors
    ///
    /// [`ServerError::HostGone`] if the host task panicked.
    pub async fn shutdown(self) -> ServerResult<GameServer> {
        // Ignore send failure: the task may already be gone.
        let _ = self.shutdown.send(true);
        let server = self.task.await.map_err(|_| ServerError::HostGone)?;
        info!(ticks = server.tick_loop.tick_count(), "World host stopped");
        Ok(server)
    }
}

fn apply_commands(
    rx: &Receiver<HostCommand>,
    store: &dyn PlayerStore,
    state: &mut GameState,
) -> Result<(), TickError> {
    let mut failure = None;
    for command in rx.try_iter() {
        if let Err(e) = apply_command(command, store, state) {
            warn!(error = %e, "Host command failed");
            failure = Some(e.to_string());
        }
    }
    match failure {
        Some(message) => Err(TickError::handler("commands", message)),
        None => Ok(()),
    }
}

fn apply_command(command: HostCommand, store: &dyn PlayerStore, state: &mut GameState) -> ServerResult<()> {
    match command {
        HostCommand::Connect {
            identity,
            session_id,
            settings,
            events,
        } => {
            let id = identity.user_id;
            if state.player(&id).is_none() {
                if let Some(snapshot) = store.load_player(&id)? {
                    state.restore_player(&snapshot, &identity.username);
                }
            }
            let player = state.player_connect(&id, &identity.username);
            let welcome = format!("Welcome, {}! You are at ({}, {}).", player.username, player.x, player.y);

            let chat_events = events.clone();
            state.register_chat_callback(&id, Box::new(move |message: &ChatMessage| {
                // A full channel loses the line; chat is best effort.
                let _ = chat_events.try_send(SessionEvent::Chat(message.clone()));
            }));
            let _ = events.try_send(SessionEvent::Notice(welcome));
            state.attach_viewer(&id, Viewer::new(session_id, settings, events));
            info!(player = %id, session_id, online = state.online_count(), "Player connected");
        }
        HostCommand::Disconnect {
            player_id,
            session_id,
        } => {
            match state.session_of(&player_id) {
                Some(current) if current == session_id => {
                    state.player_disconnect(&player_id);
                }
                // A newer session owns the player.
                Some(_) => return Ok(()),
                // Already offline, e.g. the render pass found the channel closed.
                None => {}
            }
            if let Some(snapshot) = state.snapshot(&player_id) {
                store.save_player(snapshot)?;
            }
        }
        HostCommand::Chat { player_id, text } => {
            state.broadcast_chat(&player_id, &text);
        }
        HostCommand::Resize {
            player_id,
            settings,
        } => {
            if let Some(viewer) = state.viewer_mut(&player_id) {
                viewer.resize(settings);
            }
        }
    }
    Ok(())
}

fn persist(state: &mut GameState, store: &dyn PlayerStore) {
    let online: Vec<String> = state.players().filter(|p| p.online).map(|p| p.id.clone()).collect();
    for id in &online {
        state.player_disconnect(id);
    }
    let snapshots: Vec<_> = state.players().filter_map(|p| state.snapshot(&p.id)).collect();
    for snapshot in snapshots {
        if let Err(e) = store.save_player(snapshot) {
            warn!(error = %e, "Failed to save player");
        }
    }
    let tiles = state.world_mut().overrides().to_snapshot();
    if let Err(e) = store.save_overrides(tiles) {
        warn!(error = %e, "Failed to save placed tiles");
    }
}
