//! # Viewers
//!
//! Per-session frame composition, run in the post-tick phase. The world
//! is exposed to the composer through [`StateView`], a borrow of the
//! simulation state that implements the renderer's `WorldView`.

use std::collections::HashMap;
use std::sync::Arc;

use glyphworld_procedural::{TerrainWorld, Tile};
use glyphworld_render::{
    Lighting, NpcLayer, SpriteSheet, SpriteStore, TileRect, ViewportComposer, VisibleEntity,
    WorldView,
};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::npc::NpcRoster;
use super::player::PlayerState;
use crate::protocol::{Frame, SessionEvent, ViewerSettings};
use crate::spatial::SpatialIndex;

/// Ticks per full day/night cycle.
pub const DAY_LENGTH_TICKS: u64 = 20 * 60 * 4;

/// What happened when a frame was offered to a viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the session.
    Sent,
    /// The session is behind; this frame was dropped.
    Dropped,
    /// The session is gone.
    Closed,
}

/// A session that wants frames.
#[derive(Debug)]
pub struct Viewer {
    /// Session id.
    pub session_id: u64,
    /// Viewport settings.
    pub settings: ViewerSettings,
    events: mpsc::Sender<SessionEvent>,
    composer: ViewportComposer,
    frames_sent: u64,
    frames_dropped: u64,
}

impl Viewer {
    /// Creates a viewer delivering into `events`.
    #[must_use]
    pub fn new(session_id: u64, settings: ViewerSettings, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            session_id,
            settings,
            events,
            composer: ViewportComposer::for_mode(settings.mode),
            frames_sent: 0,
            frames_dropped: 0,
        }
    }

    /// Applies new settings.
    pub fn resize(&mut self, settings: ViewerSettings) {
        if settings.mode != self.settings.mode {
            self.composer = ViewportComposer::for_mode(settings.mode);
        }
        self.settings = settings;
    }

    /// Pixel size of this viewer's viewport, status row excluded.
    #[must_use]
    pub fn pixel_size(&self) -> (usize, usize) {
        let rows = self.settings.rows.saturating_sub(1).max(1);
        self.settings.mode.pixel_size(self.settings.cols, rows)
    }

    /// Sender for events other than frames.
    #[must_use]
    pub fn events(&self) -> &mpsc::Sender<SessionEvent> {
        &self.events
    }

    /// Offers an event without waiting.
    pub fn offer(&mut self, event: SessionEvent) -> Delivery {
        let is_frame = matches!(event, SessionEvent::Frame(_));
        match self.events.try_send(event) {
            Ok(()) => {
                if is_frame {
                    self.frames_sent += 1;
                }
                Delivery::Sent
            }
            Err(TrySendError::Full(_)) => {
                if is_frame {
                    self.frames_dropped += 1;
                }
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Frames queued so far.
    #[must_use]
    pub const fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Frames dropped because the session was behind.
    #[must_use]
    pub const fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Composes the frame for `local` from `view`.
    pub(crate) fn compose(&mut self, view: &mut StateView<'_>, tick: u64, status: String) -> Frame {
        let (w, h) = self.pixel_size();
        let (cx, cy) = view.centre();
        let pixels = self.composer.compose(view, cx, cy, w, h);
        Frame {
            tick,
            pixels,
            status,
        }
    }
}

/// Day/night light level.
#[derive(Clone, Copy, Debug)]
pub struct DayCycle {
    level: f32,
}

impl DayCycle {
    /// Light level for `tick`. Never darker than 0.45.
    #[must_use]
    pub fn at(tick: u64) -> Self {
        let phase = (tick % DAY_LENGTH_TICKS) as f32 / DAY_LENGTH_TICKS as f32;
        let daylight = 0.5 - 0.5 * (phase * std::f32::consts::TAU).cos();
        Self {
            level: 0.45 + 0.55 * (1.0 - daylight),
        }
    }

    /// The light level.
    #[must_use]
    pub const fn level(self) -> f32 {
        self.level
    }
}

impl Lighting for DayCycle {
    fn light_at(&self, _x: i32, _y: i32) -> f32 {
        self.level
    }
}

/// Read-only borrow of simulation state for one viewer.
pub(crate) struct StateView<'a> {
    pub(crate) world: &'a mut TerrainWorld,
    pub(crate) players: &'a HashMap<String, PlayerState>,
    pub(crate) spatial: &'a SpatialIndex,
    pub(crate) sprites: &'a SpriteStore,
    pub(crate) npcs: &'a NpcRoster,
    pub(crate) light: DayCycle,
    pub(crate) local: &'a str,
    pub(crate) tick: u64,
}

impl StateView<'_> {
    fn centre(&self) -> (i32, i32) {
        self.players
            .get(self.local)
            .map_or((0, 0), PlayerState::position)
    }
}

impl WorldView for StateView<'_> {
    fn tile_at(&mut self, x: i32, y: i32) -> Tile {
        self.world.tile_at(x, y)
    }

    fn players(&self, area: TileRect) -> Vec<VisibleEntity> {
        self.spatial
            .players_in_viewport(area.x, area.y, area.w, area.h, None)
            .into_iter()
            .filter_map(|e| {
                let player = self.players.get(&e.id)?;
                Some(VisibleEntity {
                    id: e.id,
                    x: e.x,
                    y: e.y,
                    direction: player.direction,
                    animation_frame: player.animation_frame,
                })
            })
            .collect()
    }

    fn player_sprite(&self, id: &str) -> Option<Arc<SpriteSheet>> {
        self.sprites.get(id)
    }

    fn local_player_id(&self) -> Option<&str> {
        Some(self.local)
    }

    fn animation_frame(&self) -> u8 {
        (self.tick % 4) as u8
    }

    fn npcs(&self) -> Option<&dyn NpcLayer> {
        Some(self.npcs as &dyn NpcLayer)
    }

    fn lighting(&self) -> Option<&dyn Lighting> {
        Some(&self.light as &dyn Lighting)
    }
}

/// Text for the line under the viewport.
#[must_use]
pub fn status_line(player: &PlayerState, standing_on: Tile, tick: u64, online: usize, last_chat: Option<&str>) -> String {
    let mut line = format!(
        " {} ({},{}) {}  tick {}  online {}",
        player.username,
        player.x,
        player.y,
        standing_on.glyph(),
        tick,
        online
    );
    if let Some(chat) = last_chat {
        line.push_str("  | ");
        line.push_str(chat);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyphworld_procedural::Terrain;

    #[test]
    fn test_day_cycle_bounds() {
        for tick in (0..DAY_LENGTH_TICKS).step_by(97) {
            let level = DayCycle::at(tick).level();
            assert!((0.45..=1.0).contains(&level), "tick {tick}: {level}");
        }
        assert!((DayCycle::at(0).level() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_status_line_mentions_essentials() {
        let player = PlayerState::new("p1", "alice", 3, -4);
        let line = status_line(&player, Tile::new(Terrain::Grass, 0), 120, 2, Some("bob: hi"));

        assert!(line.contains("alice"));
        assert!(line.contains("(3,-4)"));
        assert!(line.contains("online 2"));
        assert!(line.ends_with("bob: hi"));
    }

    #[tokio::test]
    async fn test_full_channel_drops_frames() {
        let (tx, mut rx) = mpsc::channel(1);
        let settings = ViewerSettings {
            cols: 20,
            rows: 6,
            mode: glyphworld_render::RenderMode::HalfBlock,
        };
        let mut viewer = Viewer::new(1, settings, tx);
        let frame = || {
            SessionEvent::Frame(Arc::new(Frame {
                tick: 0,
                pixels: glyphworld_render::PixelGrid::new(1, 1),
                status: String::new(),
            }))
        };

        assert_eq!(viewer.offer(frame()), Delivery::Sent);
        assert_eq!(viewer.offer(frame()), Delivery::Dropped);
        assert_eq!(viewer.frames_dropped(), 1);

        let _ = rx.recv().await;
        assert_eq!(viewer.offer(frame()), Delivery::Sent);

        drop(rx);
        assert_eq!(viewer.offer(frame()), Delivery::Closed);
    }
}
