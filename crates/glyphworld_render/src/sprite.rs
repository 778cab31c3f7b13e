//! # Sprites
//!
//! A [`Sprite`] holds one image at several resolutions: the source pixels
//! and successive halvings down to a single pixel. Drawing at a zoom
//! level picks the closest stored level instead of resampling on every
//! frame.
//!
//! Sprites with several animation frames are grouped in a
//! [`SpriteSheet`]. A [`SpriteStore`] maps player ids to sheets and falls
//! back to a deterministic placeholder for anyone without art.

use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use siphasher::sip::SipHasher13;
use tracing::debug;

use crate::pixel::{PixelGrid, Rgb};

/// Frames in a generated placeholder sheet.
pub const PLACEHOLDER_FRAMES: usize = 4;

/// Source size of generated placeholder art.
pub const PLACEHOLDER_SIZE: usize = 16;

/// One image at several resolutions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sprite {
    /// `levels[0]` is the source, each next level is half the previous.
    levels: Vec<PixelGrid>,
}

impl Sprite {
    /// Builds every level from the source pixels.
    #[must_use]
    pub fn from_pixels(source: PixelGrid) -> Self {
        let mut levels = vec![source];
        loop {
            let Some(last) = levels.last() else { break };
            if last.width() <= 1 && last.height() <= 1 {
                break;
            }
            let next = last.half();
            levels.push(next);
        }
        Self { levels }
    }

    /// Source width and height.
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        self.levels
            .first()
            .map_or((0, 0), |g| (g.width(), g.height()))
    }

    /// Every stored level, largest first.
    #[must_use]
    pub fn levels(&self) -> &[PixelGrid] {
        &self.levels
    }

    /// The smallest stored level at least `width` pixels wide.
    ///
    /// Falls back to the source when `width` exceeds it.
    #[must_use]
    pub fn level_for(&self, width: usize) -> Option<&PixelGrid> {
        self.levels
            .iter()
            .rev()
            .find(|g| g.width() >= width)
            .or_else(|| self.levels.first())
    }

    /// Pixels for drawing at exactly `width` x `height`.
    #[must_use]
    pub fn render_at(&self, width: usize, height: usize) -> PixelGrid {
        match self.level_for(width) {
            Some(level) if level.width() == width && level.height() == height => level.clone(),
            Some(level) => level.resized(width, height),
            None => PixelGrid::new(width, height),
        }
    }

    /// Deterministic placeholder art for `key`.
    ///
    /// Same key, same sprite, on every machine: the key is hashed with
    /// fixed SipHash keys and seeds a ChaCha stream.
    #[must_use]
    pub fn placeholder(key: &str) -> Self {
        let mut rng = placeholder_rng(key);
        Self::from_pixels(placeholder_pixels(&mut rng, 0))
    }
}

/// Animation frames of one sprite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpriteSheet {
    frames: Vec<Sprite>,
}

impl SpriteSheet {
    /// Creates a sheet. An empty frame list becomes a single blank frame.
    #[must_use]
    pub fn new(frames: Vec<Sprite>) -> Self {
        if frames.is_empty() {
            return Self::still(Sprite::from_pixels(PixelGrid::new(1, 1)));
        }
        Self { frames }
    }

    /// A sheet with one frame.
    #[must_use]
    pub fn still(sprite: Sprite) -> Self {
        Self {
            frames: vec![sprite],
        }
    }

    /// Placeholder sheet for `key`: one body, bobbing over four frames.
    #[must_use]
    pub fn placeholder(key: &str) -> Self {
        let mut rng = placeholder_rng(key);
        let seed: u64 = rng.gen();
        let frames = (0..PLACEHOLDER_FRAMES)
            .map(|frame| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let bob = usize::from(frame % 2 == 1);
                Sprite::from_pixels(placeholder_pixels(&mut rng, bob))
            })
            .collect();
        Self { frames }
    }

    /// Frame for an animation counter. Wraps around.
    #[must_use]
    pub fn frame(&self, animation_frame: usize) -> &Sprite {
        &self.frames[animation_frame % self.frames.len()]
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; a sheet has at least one frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl From<Sprite> for SpriteSheet {
    fn from(sprite: Sprite) -> Self {
        Self::still(sprite)
    }
}

/// Sprite sheets keyed by player id.
///
/// Owned by whoever hosts the world, shared with sessions by `Arc`.
#[derive(Debug, Default)]
pub struct SpriteStore {
    sheets: RwLock<HashMap<String, Arc<SpriteSheet>>>,
}

impl SpriteStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores art for `key`, replacing anything already there.
    pub fn insert(&self, key: impl Into<String>, sheet: SpriteSheet) {
        let key = key.into();
        debug!(key = %key, frames = sheet.len(), "sprite stored");
        self.sheets.write().insert(key, Arc::new(sheet));
    }

    /// Art for `key`, if any was stored.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<SpriteSheet>> {
        self.sheets.read().get(key).cloned()
    }

    /// Art for `key`, creating and caching a placeholder when missing.
    pub fn get_or_placeholder(&self, key: &str) -> Arc<SpriteSheet> {
        if let Some(sheet) = self.get(key) {
            return sheet;
        }
        let mut sheets = self.sheets.write();
        Arc::clone(
            sheets
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(SpriteSheet::placeholder(key))),
        )
    }

    /// Drops art for `key`.
    pub fn remove(&self, key: &str) -> Option<Arc<SpriteSheet>> {
        self.sheets.write().remove(key)
    }

    /// Drops every sheet.
    pub fn clear(&self) {
        self.sheets.write().clear();
    }

    /// Number of stored sheets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.read().is_empty()
    }
}

fn placeholder_rng(key: &str) -> ChaCha8Rng {
    let mut hasher = SipHasher13::new_with_keys(0x676c_7970_6877_6f72, 0x6c64_5f73_7072_6974);
    hasher.write(key.as_bytes());
    ChaCha8Rng::seed_from_u64(hasher.finish())
}

fn random_color(rng: &mut ChaCha8Rng) -> Rgb {
    Rgb::new(
        rng.gen_range(60..=255),
        rng.gen_range(60..=255),
        rng.gen_range(60..=255),
    )
}

/// Left-right symmetric creature with a one pixel dark outline.
fn placeholder_pixels(rng: &mut ChaCha8Rng, bob: usize) -> PixelGrid {
    const N: usize = PLACEHOLDER_SIZE;
    let body = random_color(rng);
    let accent = random_color(rng);
    let outline = body.scaled(0.35);

    let mut mask = [[false; N]; N];
    for (y, row) in mask.iter_mut().enumerate().take(N - 2).skip(2) {
        for x in 2..N / 2 {
            // Denser towards the centre column.
            let p = 0.35 + 0.4 * (x as f64 / (N / 2) as f64);
            let on = rng.gen_bool(p) || (y > N / 3 && x == N / 2 - 1);
            row[x] = on;
            row[N - 1 - x] = on;
        }
    }

    let mut grid = PixelGrid::new(N, N);
    for y in 0..N {
        for x in 0..N {
            let ty = y + bob;
            if ty >= N {
                continue;
            }
            if mask[y][x] {
                let color = if rng.gen_bool(0.2) { accent } else { body };
                grid.set(x, ty, Some(color));
            } else if neighbours(&mask, x, y) {
                grid.set(x, ty, Some(outline));
            }
        }
    }
    // Eyes sit in the upper third.
    let eye_y = N / 3 + bob;
    grid.set(N / 2 - 2, eye_y, Some(Rgb::WHITE));
    grid.set(N / 2 + 1, eye_y, Some(Rgb::WHITE));
    grid
}

fn neighbours<const N: usize>(mask: &[[bool; N]; N], x: usize, y: usize) -> bool {
    let (x, y) = (x as i32, y as i32);
    [(-1, 0), (1, 0), (0, -1), (0, 1)].iter().any(|&(dx, dy)| {
        let (nx, ny) = (x + dx, y + dy);
        nx >= 0 && ny >= 0 && (nx as usize) < N && (ny as usize) < N && mask[ny as usize][nx as usize]
    })
}
