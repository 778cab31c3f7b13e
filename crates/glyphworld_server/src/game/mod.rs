//! # Game Server
//!
//! The authoritative simulation. [`GameState`] owns every piece of world
//! state; [`GameServer`] pairs it with the tick loop and registers the
//! standard handlers:
//!
//! | Phase     | Handler     | Work                                   |
//! |-----------|-------------|----------------------------------------|
//! | pre-tick  | `clock`     | record the tick number                 |
//! | pre-tick  | `commands`  | host commands (only with a host)       |
//! | pre-tick  | `inputs`    | drain, sort and apply queued moves     |
//! | tick      | `animation` | `animation_frame = tick % 4`           |
//! | tick      | `npcs`      | wander NPCs                            |
//! | post-tick | `render`    | compose and offer a frame per viewer   |
//!
//! Nothing outside the tick loop mutates the state.

mod chat;
mod input;
mod npc;
mod player;
mod view;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use glyphworld_procedural::{TerrainWorld, Tile, TileOverrides, WorldSeed};
use glyphworld_render::SpriteStore;
use glyphworld_shared::{Direction, WorldConfig};
use tokio::sync::watch;
use tracing::{debug, info};

pub use chat::{ChatCallback, ChatLog, ChatMessage};
pub use input::{InputEvent, InputKind, InputSender, INPUT_QUEUE_CAPACITY};
pub use npc::{Npc, NpcRoster, NPC_LEASH, NPC_STEP_INTERVAL};
pub use player::PlayerState;
pub use view::{status_line, DayCycle, Delivery, Viewer, DAY_LENGTH_TICKS};

use crate::error::TickError;
use crate::spatial::SpatialIndex;
use crate::store::PlayerSnapshot;
use crate::tick::{run_tick_loop, FrameReport, TickContext, TickHandler, TickLoop};
use view::StateView;

/// All simulation state of one world.
pub struct GameState {
    players: HashMap<String, PlayerState>,
    spatial: SpatialIndex,
    world: TerrainWorld,
    npcs: NpcRoster,
    chat: ChatLog,
    chat_callbacks: HashMap<String, ChatCallback>,
    input_tx: Sender<InputEvent>,
    input_rx: Receiver<InputEvent>,
    sprites: Arc<SpriteStore>,
    viewers: HashMap<String, Viewer>,
    spawn: (i32, i32),
    tick: u64,
}

impl GameState {
    /// Builds the world described by `config`, NPCs included.
    #[must_use]
    pub fn new(config: &WorldConfig) -> Self {
        Self::with_overrides(config, TileOverrides::new())
    }

    /// Builds the world with previously placed tiles restored.
    #[must_use]
    pub fn with_overrides(config: &WorldConfig, overrides: TileOverrides) -> Self {
        let seed = WorldSeed::new(config.seed);
        let mut world = TerrainWorld::new(seed, config.chunk_size, config.cache_capacity)
            .with_overrides(overrides);
        let spawn = (config.spawn_x, config.spawn_y);

        let mut npcs = NpcRoster::new(config.cell_size);
        npcs.populate(seed, config.npc_count, spawn.0, spawn.1, &mut world);

        let (input_tx, input_rx) = crossbeam_channel::bounded(INPUT_QUEUE_CAPACITY);
        info!(
            seed = config.seed,
            npcs = npcs.len(),
            spawn_x = spawn.0,
            spawn_y = spawn.1,
            "World created"
        );

        Self {
            players: HashMap::new(),
            spatial: SpatialIndex::new(config.cell_size),
            world,
            npcs,
            chat: ChatLog::new(config.chat_history),
            chat_callbacks: HashMap::new(),
            input_tx,
            input_rx,
            sprites: Arc::new(SpriteStore::new()),
            viewers: HashMap::new(),
            spawn,
            tick: 0,
        }
    }

    /// Handle for queueing inputs from other threads.
    #[must_use]
    pub fn input_sender(&self) -> InputSender {
        InputSender::new(self.input_tx.clone())
    }

    /// Brings `id` online. New ids appear at the spawn point; known ids
    /// resume where they left. Connecting an online player changes only
    /// the username.
    pub fn player_connect(&mut self, id: &str, username: &str) -> &PlayerState {
        let spawn = self.spawn;
        let player = self
            .players
            .entry(id.to_owned())
            .or_insert_with(|| PlayerState::new(id, username, spawn.0, spawn.1));
        if !player.online {
            info!(player = id, x = player.x, y = player.y, "Player reconnected");
        }
        player.online = true;
        player.username = username.to_owned();
        self.spatial.update_player(id, player.x, player.y);
        player
    }

    /// Seeds an offline record from a stored snapshot. Known ids are left
    /// alone.
    pub fn restore_player(&mut self, snapshot: &PlayerSnapshot, username: &str) -> bool {
        if self.players.contains_key(&snapshot.player_id) {
            return false;
        }
        let mut player = PlayerState::new(&*snapshot.player_id, username, snapshot.x, snapshot.y);
        player.direction = snapshot.direction;
        player.online = false;
        self.players.insert(snapshot.player_id.clone(), player);
        true
    }

    /// Takes `id` offline. The record stays; the index entry, viewer and
    /// chat callback go.
    pub fn player_disconnect(&mut self, id: &str) -> bool {
        let Some(player) = self.players.get_mut(id) else {
            return false;
        };
        player.online = false;
        player.session_id = None;
        self.spatial.remove_player(id);
        self.viewers.remove(id);
        self.chat_callbacks.remove(id);
        info!(player = id, "Player disconnected");
        true
    }

    /// Registers where chat for `player_id` is delivered.
    pub fn register_chat_callback(&mut self, player_id: &str, callback: ChatCallback) {
        self.chat_callbacks.insert(player_id.to_owned(), callback);
    }

    /// Appends to the history and delivers to everyone but the sender.
    ///
    /// Returns the stored message, or `None` for an unknown sender or
    /// blank text.
    pub fn broadcast_chat(&mut self, from: &str, text: &str) -> Option<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let username = self.players.get(from)?.username.clone();
        let message = ChatMessage {
            from: from.to_owned(),
            username,
            text: text.to_owned(),
            tick: self.tick,
        };
        self.chat.push(message.clone());
        for (id, callback) in &mut self.chat_callbacks {
            if id != from {
                callback(&message);
            }
        }
        Some(message)
    }

    /// Applies every queued input in submission order. Returns how many
    /// were applied.
    pub fn process_inputs(&mut self) -> usize {
        let mut applied = 0;
        for event in input::drain_sorted(&self.input_rx) {
            if self.apply_input(&event) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_input(&mut self, event: &InputEvent) -> bool {
        let Some(player) = self.players.get_mut(&event.player_id) else {
            return false;
        };
        if !player.online {
            return false;
        }
        match event.kind {
            InputKind::Move { dx, dy } => {
                player.x += dx;
                player.y += dy;
                if let Some(direction) = Direction::from_delta(dx, dy) {
                    player.direction = direction;
                }
                let moved = self.spatial.update_player(&player.id, player.x, player.y);
                if moved.crossed() {
                    debug!(player = %player.id, cell = %moved.new_cell, "Player changed cell");
                }
            }
        }
        true
    }

    /// Sets the walk frame of every online player to `tick % 4`.
    pub fn advance_animation(&mut self, tick: u64) {
        let frame = (tick % 4) as u8;
        for player in self.players.values_mut().filter(|p| p.online) {
            player.animation_frame = frame;
        }
    }

    /// Wanders NPCs. Returns how many moved.
    pub fn step_npcs(&mut self, tick: u64) -> usize {
        self.npcs.step(tick, &mut self.world)
    }

    /// Attaches a viewer to an online player, replacing any older one.
    pub fn attach_viewer(&mut self, player_id: &str, viewer: Viewer) -> bool {
        let Some(player) = self.players.get_mut(player_id) else {
            return false;
        };
        player.session_id = Some(viewer.session_id);
        self.viewers.insert(player_id.to_owned(), viewer);
        true
    }

    /// Viewer of `player_id`, if one is attached.
    pub fn viewer_mut(&mut self, player_id: &str) -> Option<&mut Viewer> {
        self.viewers.get_mut(player_id)
    }

    /// Composes and offers one frame per viewer. Viewers whose session is
    /// gone are removed.
    ///
    /// Returns how many frames were delivered.
    pub fn render_viewers(&mut self, tick: u64) -> usize {
        let online = self.online_count();
        let last_chat = self
            .chat
            .last()
            .map(|m| format!("{}: {}", m.username, m.text));
        let light = DayCycle::at(tick);

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (player_id, viewer) in &mut self.viewers {
            let Some(player) = self.players.get(player_id).filter(|p| p.online) else {
                continue;
            };
            let underfoot: Tile = self.world.tile_at(player.x, player.y);
            let status = status_line(player, underfoot, tick, online, last_chat.as_deref());

            let mut view = StateView {
                world: &mut self.world,
                players: &self.players,
                spatial: &self.spatial,
                sprites: &self.sprites,
                npcs: &self.npcs,
                light,
                local: player_id,
                tick,
            };
            let frame = viewer.compose(&mut view, tick, status);
            match viewer.offer(crate::protocol::SessionEvent::Frame(Arc::new(frame))) {
                Delivery::Sent => delivered += 1,
                Delivery::Dropped => {
                    debug!(player = %player_id, dropped = viewer.frames_dropped(), "Viewer behind, frame dropped");
                }
                Delivery::Closed => closed.push(player_id.clone()),
            }
        }
        for player_id in closed {
            self.player_disconnect(&player_id);
        }
        delivered
    }

    /// Snapshot of `id` for persistence.
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<PlayerSnapshot> {
        self.players.get(id).map(|p| PlayerSnapshot {
            player_id: p.id.clone(),
            x: p.x,
            y: p.y,
            direction: p.direction,
            online: p.online,
        })
    }

    /// A player's record.
    #[must_use]
    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.get(id)
    }

    /// Every known player, online or not.
    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    /// Number of players online.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.players.values().filter(|p| p.online).count()
    }

    /// Session currently attached to `id`.
    #[must_use]
    pub fn session_of(&self, id: &str) -> Option<u64> {
        self.players.get(id).and_then(|p| p.session_id)
    }

    /// Index of online player positions.
    #[must_use]
    pub const fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Terrain.
    pub fn world_mut(&mut self) -> &mut TerrainWorld {
        &mut self.world
    }

    /// NPCs.
    #[must_use]
    pub const fn npcs(&self) -> &NpcRoster {
        &self.npcs
    }

    /// Chat history.
    #[must_use]
    pub const fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// Shared sprite store. Art generation writes here from other tasks.
    #[must_use]
    pub fn sprites(&self) -> Arc<SpriteStore> {
        Arc::clone(&self.sprites)
    }

    /// Where new players appear.
    #[must_use]
    pub const fn spawn_point(&self) -> (i32, i32) {
        self.spawn
    }

    /// Last tick that started.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }
}

fn begin_tick(ctx: &TickContext, state: &mut GameState) -> Result<(), TickError> {
    state.tick = ctx.tick;
    Ok(())
}

fn drain_inputs(_ctx: &TickContext, state: &mut GameState) -> Result<(), TickError> {
    state.process_inputs();
    Ok(())
}

fn animate_players(ctx: &TickContext, state: &mut GameState) -> Result<(), TickError> {
    state.advance_animation(ctx.tick);
    Ok(())
}

fn wander_npcs(ctx: &TickContext, state: &mut GameState) -> Result<(), TickError> {
    state.step_npcs(ctx.tick);
    Ok(())
}

fn render_frames(ctx: &TickContext, state: &mut GameState) -> Result<(), TickError> {
    state.render_viewers(ctx.tick);
    Ok(())
}

/// Tick loop plus the state it drives.
pub struct GameServer {
    /// The loop. Extra handlers may be registered before running.
    pub tick_loop: TickLoop<GameState>,
    /// The state.
    pub state: GameState,
}

impl GameServer {
    /// Builds the world and registers the standard handlers.
    #[must_use]
    pub fn new(config: &WorldConfig) -> Self {
        Self::with_state(config, GameState::new(config))
    }

    /// Like [`GameServer::new`] around an already built state.
    #[must_use]
    pub fn with_state(config: &WorldConfig, state: GameState) -> Self {
        let mut tick_loop = Self::timer(config);
        tick_loop.on_pre_tick("clock", begin_tick);
        tick_loop.on_pre_tick("inputs", drain_inputs);
        Self::simulate(tick_loop, state)
    }

    /// Like [`GameServer::with_state`], with `commands` running after the
    /// clock and before inputs, so a player connected by a command can move
    /// in the same tick.
    #[must_use]
    pub fn with_commands<H>(config: &WorldConfig, state: GameState, commands: H) -> Self
    where
        H: TickHandler<GameState> + 'static,
    {
        let mut tick_loop = Self::timer(config);
        tick_loop.on_pre_tick("clock", begin_tick);
        tick_loop.on_pre_tick("commands", commands);
        tick_loop.on_pre_tick("inputs", drain_inputs);
        Self::simulate(tick_loop, state)
    }

    fn timer(config: &WorldConfig) -> TickLoop<GameState> {
        TickLoop::new(
            config.tick_rate,
            Duration::from_millis(config.max_frame_ms),
            config.max_catchup_ticks,
        )
    }

    fn simulate(mut tick_loop: TickLoop<GameState>, state: GameState) -> Self {
        tick_loop.on_tick("animation", animate_players);
        tick_loop.on_tick("npcs", wander_npcs);
        tick_loop.on_post_tick("render", render_frames);
        Self { tick_loop, state }
    }

    /// Handle for queueing inputs.
    #[must_use]
    pub fn input_sender(&self) -> InputSender {
        self.state.input_sender()
    }

    /// Runs one frame at `now`.
    pub fn frame(&mut self, now: Instant) -> FrameReport {
        self.tick_loop.frame(now, &mut self.state)
    }

    /// Drives the loop on the tokio timer until `shutdown` turns true.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        run_tick_loop(&mut self.tick_loop, &mut self.state, shutdown).await;
    }
}
