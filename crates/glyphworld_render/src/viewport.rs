//! # Viewport Composition
//!
//! Builds the pixel frame for one viewer from a read-only view of the
//! world. Layers, bottom to top:
//!
//! 1. Terrain tiles (optionally lit)
//! 2. NPCs, if the view exposes them
//! 3. Remote players
//! 4. The local player
//!
//! The composer never touches simulation state. Anything it needs comes
//! through [`WorldView`], whose optional capabilities default to absent.

use std::sync::Arc;

use glyphworld_procedural::Tile;
use glyphworld_shared::Direction;

use crate::encode::RenderMode;
use crate::pixel::PixelGrid;
use crate::sprite::{SpriteSheet, SpriteStore};
use crate::tiles::TileAtlas;

/// A rectangle of world tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
    /// Left edge (inclusive).
    pub x: i32,
    /// Top edge (inclusive).
    pub y: i32,
    /// Width in tiles.
    pub w: i32,
    /// Height in tiles.
    pub h: i32,
}

impl TileRect {
    /// Whether `(x, y)` lies inside.
    #[inline]
    #[must_use]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }
}

/// Something drawn on top of the terrain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleEntity {
    /// Player or NPC id.
    pub id: String,
    /// Tile x.
    pub x: i32,
    /// Tile y.
    pub y: i32,
    /// Facing.
    pub direction: Direction,
    /// Animation counter.
    pub animation_frame: u8,
}

/// Optional capability: non-player characters.
pub trait NpcLayer {
    /// NPCs inside `area`.
    fn npcs_in(&self, area: TileRect) -> Vec<VisibleEntity>;
}

/// Optional capability: light levels.
pub trait Lighting {
    /// Brightness multiplier at a tile, 1.0 is unlit.
    fn light_at(&self, x: i32, y: i32) -> f32;
}

/// Read-only view of the world for one viewer.
pub trait WorldView {
    /// Tile at a world position. Mutable because lookups may fill caches.
    fn tile_at(&mut self, x: i32, y: i32) -> Tile;

    /// Online players inside `area`, the local player included.
    fn players(&self, area: TileRect) -> Vec<VisibleEntity>;

    /// Custom art for a player, if they have any.
    fn player_sprite(&self, id: &str) -> Option<Arc<SpriteSheet>>;

    /// Id of the player this frame is for.
    fn local_player_id(&self) -> Option<&str>;

    /// World animation counter, drives water shimmer.
    fn animation_frame(&self) -> u8 {
        0
    }

    /// NPC capability.
    fn npcs(&self) -> Option<&dyn NpcLayer> {
        None
    }

    /// Lighting capability.
    fn lighting(&self) -> Option<&dyn Lighting> {
        None
    }
}

/// Placeholder sprites kept before the cache starts over.
pub const FALLBACK_LIMIT: usize = 256;

/// Composes viewport frames.
///
/// Keeps tile art and fallback sprites between frames. Placeholders are
/// derived from the entity id, so dropping them only costs a rebuild.
#[derive(Debug)]
pub struct ViewportComposer {
    tile_px: usize,
    atlas: TileAtlas,
    fallback: SpriteStore,
}

impl ViewportComposer {
    /// Creates a composer drawing each tile as `tile_px` square pixels.
    #[must_use]
    pub fn new(tile_px: usize) -> Self {
        Self {
            tile_px: tile_px.max(1),
            atlas: TileAtlas::new(),
            fallback: SpriteStore::new(),
        }
    }

    /// Creates a composer sized for a render mode.
    #[must_use]
    pub fn for_mode(mode: RenderMode) -> Self {
        Self::new(mode.tile_pixels())
    }

    /// Placeholder sprites currently cached.
    #[must_use]
    pub fn cached_placeholders(&self) -> usize {
        self.fallback.len()
    }

    /// Pixels per tile.
    #[must_use]
    pub const fn tile_px(&self) -> usize {
        self.tile_px
    }

    /// Tile area covered by a `width` x `height` pixel frame centred on
    /// `(cx, cy)`.
    #[must_use]
    pub fn area(&self, cx: i32, cy: i32, width: usize, height: usize) -> TileRect {
        let w = width.div_ceil(self.tile_px) as i32;
        let h = height.div_ceil(self.tile_px) as i32;
        TileRect {
            x: cx - w / 2,
            y: cy - h / 2,
            w,
            h,
        }
    }

    /// Composes a `width` x `height` pixel frame centred on `(cx, cy)`.
    pub fn compose<V>(&mut self, view: &mut V, cx: i32, cy: i32, width: usize, height: usize) -> PixelGrid
    where
        V: WorldView + ?Sized,
    {
        if self.fallback.len() >= FALLBACK_LIMIT {
            self.fallback.clear();
        }
        let area = self.area(cx, cy, width, height);
        let mut frame = PixelGrid::new(width, height);
        let tp = self.tile_px;
        let anim = view.animation_frame();

        for ty in 0..area.h {
            for tx in 0..area.w {
                let (wx, wy) = (area.x + tx, area.y + ty);
                let tile = view.tile_at(wx, wy);
                let art = self.atlas.art(tile, tp, anim);
                let (px, py) = (tx * tp as i32, ty * tp as i32);
                match view.lighting().map(|l| l.light_at(wx, wy)) {
                    Some(light) if (light - 1.0).abs() > f32::EPSILON => {
                        let mut lit = (*art).clone();
                        lit.map_opaque(|_, _, c| c.scaled(light));
                        frame.composite(&lit, px, py);
                    }
                    _ => frame.composite(&art, px, py),
                }
            }
        }

        if let Some(npcs) = view.npcs() {
            for npc in npcs.npcs_in(area) {
                let sheet = self.fallback.get_or_placeholder(&format!("npc:{}", npc.id));
                self.draw(&mut frame, area, &npc, &sheet);
            }
        }

        let local = view.local_player_id().map(str::to_owned);
        let mut players = view.players(area);
        // Local player last so it is never covered.
        players.sort_by_key(|p| local.as_deref() == Some(p.id.as_str()));
        for player in &players {
            let sheet = view
                .player_sprite(&player.id)
                .unwrap_or_else(|| self.fallback.get_or_placeholder(&player.id));
            self.draw(&mut frame, area, player, &sheet);
        }

        frame
    }

    fn draw(&self, frame: &mut PixelGrid, area: TileRect, entity: &VisibleEntity, sheet: &SpriteSheet) {
        if !area.contains(entity.x, entity.y) {
            return;
        }
        let tp = self.tile_px;
        let sprite = sheet.frame(usize::from(entity.animation_frame));
        let mut pixels = sprite.render_at(tp, tp);
        if entity.direction == Direction::Left {
            pixels = pixels.mirrored();
        }
        let px = (entity.x - area.x) * tp as i32;
        let py = (entity.y - area.y) * tp as i32;
        frame.composite(&pixels, px, py);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::Rgb;
    use crate::sprite::Sprite;
    use crate::tiles::tile_color;
    use glyphworld_procedural::Terrain;

    const RED: Rgb = Rgb::new(255, 0, 0);

    struct FlatWorld {
        players: Vec<VisibleEntity>,
        local: Option<String>,
        npcs: Option<Npcs>,
        dim: Option<Dim>,
    }

    struct Npcs(Vec<VisibleEntity>);
    struct Dim;

    impl NpcLayer for Npcs {
        fn npcs_in(&self, area: TileRect) -> Vec<VisibleEntity> {
            self.0.iter().filter(|n| area.contains(n.x, n.y)).cloned().collect()
        }
    }

    impl Lighting for Dim {
        fn light_at(&self, _x: i32, _y: i32) -> f32 {
            0.5
        }
    }

    impl WorldView for FlatWorld {
        fn tile_at(&mut self, _x: i32, _y: i32) -> Tile {
            Tile::new(Terrain::Grass, 0)
        }

        fn players(&self, area: TileRect) -> Vec<VisibleEntity> {
            self.players.iter().filter(|p| area.contains(p.x, p.y)).cloned().collect()
        }

        fn player_sprite(&self, id: &str) -> Option<Arc<SpriteSheet>> {
            (id == "red").then(|| Arc::new(SpriteSheet::still(Sprite::from_pixels(PixelGrid::filled(8, 8, RED)))))
        }

        fn local_player_id(&self) -> Option<&str> {
            self.local.as_deref()
        }

        fn npcs(&self) -> Option<&dyn NpcLayer> {
            self.npcs.as_ref().map(|n| n as &dyn NpcLayer)
        }

        fn lighting(&self) -> Option<&dyn Lighting> {
            self.dim.as_ref().map(|d| d as &dyn Lighting)
        }
    }

    fn entity(id: &str, x: i32, y: i32) -> VisibleEntity {
        VisibleEntity {
            id: id.to_owned(),
            x,
            y,
            direction: Direction::Down,
            animation_frame: 0,
        }
    }

    fn flat() -> FlatWorld {
        FlatWorld {
            players: Vec::new(),
            local: None,
            npcs: None,
            dim: None,
        }
    }

    #[test]
    fn test_terrain_fills_frame() {
        let mut composer = ViewportComposer::new(1);
        let frame = composer.compose(&mut flat(), 0, 0, 10, 6);

        assert_eq!(frame.opaque_count(), 60);
        assert_eq!(frame.get(3, 3), Some(tile_color(Tile::new(Terrain::Grass, 0))));
    }

    #[test]
    fn test_local_player_drawn_at_centre() {
        let mut world = flat();
        world.players.push(entity("red", 5, 5));
        world.local = Some("red".into());

        let mut composer = ViewportComposer::new(2);
        let frame = composer.compose(&mut world, 5, 5, 20, 20);
        let area = composer.area(5, 5, 20, 20);
        let (px, py) = (((5 - area.x) * 2) as usize, ((5 - area.y) * 2) as usize);

        assert_eq!(frame.get(px, py), Some(RED));
        assert_eq!(frame.get(px + 1, py + 1), Some(RED));
    }

    #[test]
    fn test_local_player_drawn_last() {
        let mut world = flat();
        world.players.push(entity("red", 0, 0));
        world.players.push(entity("other", 0, 0));
        world.local = Some("red".into());

        let mut composer = ViewportComposer::new(1);
        let frame = composer.compose(&mut world, 0, 0, 5, 5);
        let area = composer.area(0, 0, 5, 5);

        assert_eq!(frame.get((-area.x) as usize, (-area.y) as usize), Some(RED));
    }

    #[test]
    fn test_lighting_capability_darkens() {
        let mut lit = ViewportComposer::new(1);
        let bright = lit.compose(&mut flat(), 0, 0, 4, 4);

        let mut world = flat();
        world.dim = Some(Dim);
        let dark = lit.compose(&mut world, 0, 0, 4, 4);

        let (b, d) = (bright.get(1, 1).expect("opaque"), dark.get(1, 1).expect("opaque"));
        assert!(d.luma() < b.luma());
    }

    #[test]
    fn test_npc_capability_is_drawn() {
        let mut world = flat();
        world.npcs = Some(Npcs(vec![entity("wanderer", 0, 0)]));

        let mut composer = ViewportComposer::new(4);
        let with = composer.compose(&mut world, 0, 0, 20, 20);
        let without = composer.compose(&mut flat(), 0, 0, 20, 20);

        assert_ne!(with, without);
    }

    #[test]
    fn test_placeholder_cache_is_bounded() {
        let mut composer = ViewportComposer::new(1);
        for n in 0..FALLBACK_LIMIT * 3 {
            let mut world = flat();
            world.players.push(entity(&format!("guest-{n}"), 0, 0));
            let _ = composer.compose(&mut world, 0, 0, 4, 4);
            assert!(composer.cached_placeholders() <= FALLBACK_LIMIT);
        }
    }

    #[test]
    fn test_offscreen_players_skipped() {
        let mut world = flat();
        world.players.push(entity("red", 1000, 1000));

        let mut composer = ViewportComposer::new(1);
        let frame = composer.compose(&mut world, 0, 0, 8, 8);

        assert!(frame.pixels().iter().all(|p| *p != Some(RED)));
    }
}
