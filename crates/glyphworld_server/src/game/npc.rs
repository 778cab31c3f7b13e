//! # Wandering NPCs
//!
//! Deterministic ambient characters. Each NPC carries its own splitmix
//! state, so the same world seed and tick sequence always produce the
//! same walks. NPCs stay within a leash of their home tile and never
//! step onto unwalkable terrain.

use glyphworld_procedural::{splitmix64, TerrainWorld, WorldSeed};
use glyphworld_render::{NpcLayer, TileRect, VisibleEntity};
use glyphworld_shared::Direction;

use crate::spatial::SpatialIndex;

/// NPCs consider moving once every this many ticks.
pub const NPC_STEP_INTERVAL: u64 = 5;

/// Farthest an NPC wanders from home, per axis.
pub const NPC_LEASH: i32 = 8;

/// Tiles searched around a spawn point for walkable ground.
const SPAWN_SEARCH: i32 = 6;

/// One NPC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Npc {
    /// Id, unique within the roster.
    pub id: String,
    /// Tile X.
    pub x: i32,
    /// Tile Y.
    pub y: i32,
    /// Spawn tile.
    pub home: (i32, i32),
    /// Facing.
    pub direction: Direction,
    /// Walk cycle frame.
    pub animation_frame: u8,
    rng: u64,
}

impl Npc {
    fn next_random(&mut self) -> u64 {
        self.rng = splitmix64(self.rng);
        self.rng
    }
}

/// All NPCs of a world plus their own spatial index.
#[derive(Debug)]
pub struct NpcRoster {
    npcs: Vec<Npc>,
    index: SpatialIndex,
}

impl NpcRoster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new(cell_size: i32) -> Self {
        Self {
            npcs: Vec::new(),
            index: SpatialIndex::new(cell_size),
        }
    }

    /// Places `count` NPCs on walkable tiles around `(cx, cy)`.
    ///
    /// Positions derive from the seed only.
    pub fn populate(&mut self, seed: WorldSeed, count: usize, cx: i32, cy: i32, world: &mut TerrainWorld) {
        let base = seed.derive(0x4e50_43).value();
        for n in 0..count {
            let mut rng = splitmix64(base ^ n as u64);
            rng = splitmix64(rng);
            let ox = (rng % 41) as i32 - 20;
            let oy = ((rng >> 16) % 41) as i32 - 20;
            let Some((x, y)) = find_walkable(world, cx + ox, cy + oy) else {
                continue;
            };
            let npc = Npc {
                id: format!("npc-{n}"),
                x,
                y,
                home: (x, y),
                direction: Direction::Down,
                animation_frame: 0,
                rng,
            };
            self.index.update_player(&npc.id, x, y);
            self.npcs.push(npc);
        }
    }

    /// Advances every NPC for `tick`. Moves only on step ticks.
    ///
    /// Returns how many NPCs moved.
    pub fn step(&mut self, tick: u64, world: &mut TerrainWorld) -> usize {
        let frame = (tick % 4) as u8;
        let mut moved = 0;
        for npc in &mut self.npcs {
            npc.animation_frame = frame;
            if tick % NPC_STEP_INTERVAL != 0 {
                continue;
            }
            let roll = npc.next_random();
            // Half the time, stand still.
            if roll % 2 == 0 {
                continue;
            }
            let direction = match (roll >> 8) % 4 {
                0 => Direction::Up,
                1 => Direction::Down,
                2 => Direction::Left,
                _ => Direction::Right,
            };
            let (dx, dy) = direction.delta();
            let (nx, ny) = (npc.x + dx, npc.y + dy);
            npc.direction = direction;
            if (nx - npc.home.0).abs() > NPC_LEASH || (ny - npc.home.1).abs() > NPC_LEASH {
                continue;
            }
            if !world.is_walkable(nx, ny) {
                continue;
            }
            npc.x = nx;
            npc.y = ny;
            self.index.update_player(&npc.id, nx, ny);
            moved += 1;
        }
        moved
    }

    /// All NPCs.
    #[must_use]
    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    /// Index of NPC positions.
    #[must_use]
    pub const fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Number of NPCs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    /// Whether there are none.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }

    fn get(&self, id: &str) -> Option<&Npc> {
        self.npcs.iter().find(|n| n.id == id)
    }
}

impl NpcLayer for NpcRoster {
    fn npcs_in(&self, area: TileRect) -> Vec<VisibleEntity> {
        self.index
            .players_in_viewport(area.x, area.y, area.w, area.h, None)
            .into_iter()
            .filter_map(|e| {
                self.get(&e.id).map(|npc| VisibleEntity {
                    id: e.id,
                    x: e.x,
                    y: e.y,
                    direction: npc.direction,
                    animation_frame: npc.animation_frame,
                })
            })
            .collect()
    }
}

fn find_walkable(world: &mut TerrainWorld, x: i32, y: i32) -> Option<(i32, i32)> {
    for radius in 0..=SPAWN_SEARCH {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs() != radius && dy.abs() != radius {
                    continue;
                }
                if world.is_walkable(x + dx, y + dy) {
                    return Some((x + dx, y + dy));
                }
            }
        }
    }
    None
}
