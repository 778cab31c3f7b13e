//! # Pixel Grids
//!
//! Everything the renderer draws is first composed into a [`PixelGrid`]:
//! a rectangle of optional colours. `None` is a transparent pixel that
//! lets whatever is underneath show through during compositing, and
//! renders as the terminal default background.

/// An opaque 24-bit colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Creates a colour.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Creates a colour from an `[r, g, b]` triple.
    #[inline]
    #[must_use]
    pub const fn from_array(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }

    /// Perceived brightness, 0..=255000.
    ///
    /// Integer Rec.601 weights so thresholds are exact across platforms.
    #[inline]
    #[must_use]
    pub const fn luma(self) -> u32 {
        self.r as u32 * 299 + self.g as u32 * 587 + self.b as u32 * 114
    }

    /// Multiplies every channel by `factor`, clamped to 0..=255.
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        let apply = |c: u8| (f32::from(c) * factor).round().clamp(0.0, 255.0) as u8;
        Self::new(apply(self.r), apply(self.g), apply(self.b))
    }

    /// Blends towards `other` by `t` in 0.0..=1.0.
    #[must_use]
    pub fn mix(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let apply = |a: u8, b: u8| {
            (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8
        };
        Self::new(apply(self.r, other.r), apply(self.g, other.g), apply(self.b, other.b))
    }

    /// Channel-wise mean of the given colours, or `None` for an empty set.
    #[must_use]
    pub fn average<I>(colors: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        let (mut r, mut g, mut b, mut n) = (0u32, 0u32, 0u32, 0u32);
        for c in colors {
            r += u32::from(c.r);
            g += u32::from(c.g);
            b += u32::from(c.b);
            n += 1;
        }
        if n == 0 {
            return None;
        }
        Some(Self::new((r / n) as u8, (g / n) as u8, (b / n) as u8))
    }
}

/// A rectangle of optional pixels, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    pixels: Vec<Option<Rgb>>,
}

impl PixelGrid {
    /// Creates a fully transparent grid.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![None; width * height],
        }
    }

    /// Creates a grid filled with one colour.
    #[must_use]
    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![Some(color); width * height],
        }
    }

    /// Builds a grid from row-major pixels.
    ///
    /// Returns `None` if `pixels.len() != width * height`.
    #[must_use]
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Option<Rgb>>) -> Option<Self> {
        (pixels.len() == width * height).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Row-major pixel slice.
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[Option<Rgb>] {
        &self.pixels
    }

    /// Pixel at `(x, y)`. Out of bounds reads as transparent.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x]
        } else {
            None
        }
    }

    /// Sets the pixel at `(x, y)`. Out of bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, pixel: Option<Rgb>) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = pixel;
        }
    }

    /// Fills a rectangle, clipped to the grid.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: usize, h: usize, color: Rgb) {
        for dy in 0..h {
            for dx in 0..w {
                let (px, py) = (x + dx as i32, y + dy as i32);
                if px >= 0 && py >= 0 {
                    self.set(px as usize, py as usize, Some(color));
                }
            }
        }
    }

    /// Draws `src` on top of `self` with its top-left at `(ox, oy)`.
    ///
    /// Transparent source pixels leave the destination untouched. Anything
    /// outside the destination is clipped.
    pub fn composite(&mut self, src: &Self, ox: i32, oy: i32) {
        for sy in 0..src.height {
            let dy = oy + sy as i32;
            if dy < 0 || dy as usize >= self.height {
                continue;
            }
            for sx in 0..src.width {
                let dx = ox + sx as i32;
                if dx < 0 || dx as usize >= self.width {
                    continue;
                }
                if let Some(color) = src.pixels[sy * src.width + sx] {
                    self.pixels[dy as usize * self.width + dx as usize] = Some(color);
                }
            }
        }
    }

    /// Applies `f` to every opaque pixel, with its coordinates.
    pub fn map_opaque<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize, Rgb) -> Rgb,
    {
        for (i, pixel) in self.pixels.iter_mut().enumerate() {
            if let Some(color) = pixel {
                *color = f(i % self.width, i / self.width, *color);
            }
        }
    }

    /// Halves both dimensions (rounding up) with a 2x2 box filter.
    ///
    /// A destination pixel is opaque when at least half of its source
    /// pixels are, and takes their average colour.
    #[must_use]
    pub fn half(&self) -> Self {
        let width = self.width.div_ceil(2).max(1);
        let height = self.height.div_ceil(2).max(1);
        let mut out = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let mut opaque = Vec::with_capacity(4);
                let mut total = 0;
                for (sx, sy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let (px, py) = (x * 2 + sx, y * 2 + sy);
                    if px < self.width && py < self.height {
                        total += 1;
                        if let Some(c) = self.get(px, py) {
                            opaque.push(c);
                        }
                    }
                }
                if total > 0 && opaque.len() * 2 >= total {
                    out.set(x, y, Rgb::average(opaque));
                }
            }
        }
        out
    }

    /// Nearest-neighbour resample to an exact size.
    #[must_use]
    pub fn resized(&self, width: usize, height: usize) -> Self {
        let mut out = Self::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let sy = y * self.height / height;
            for x in 0..width {
                let sx = x * self.width / width;
                out.set(x, y, self.get(sx, sy));
            }
        }
        out
    }

    /// Left-right mirror image.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        let mut out = Self::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.set(self.width - 1 - x, y, self.get(x, y));
            }
        }
        out
    }

    /// Number of opaque pixels.
    #[must_use]
    pub fn opaque_count(&self) -> usize {
        self.pixels.iter().filter(|p| p.is_some()).count()
    }
}

/// Draws `fg` over `bg` with its top-left at `(ox, oy)`.
///
/// See [`PixelGrid::composite`].
#[inline]
pub fn composite(bg: &mut PixelGrid, fg: &PixelGrid, ox: i32, oy: i32) {
    bg.composite(fg, ox, oy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyphworld_procedural::splitmix64;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    #[test]
    fn test_composite_skips_transparent() {
        let mut dst = PixelGrid::filled(4, 4, BLUE);
        let mut src = PixelGrid::new(2, 2);
        src.set(0, 0, Some(RED));

        dst.composite(&src, 1, 1);

        assert_eq!(dst.get(1, 1), Some(RED));
        assert_eq!(dst.get(2, 1), Some(BLUE));
        assert_eq!(dst.get(2, 2), Some(BLUE));
    }

    #[test]
    fn test_composite_clips_negative_and_overflow() {
        let mut dst = PixelGrid::new(3, 3);
        let src = PixelGrid::filled(4, 4, RED);

        dst.composite(&src, -2, 1);

        assert_eq!(dst.get(0, 1), Some(RED));
        assert_eq!(dst.get(1, 2), Some(RED));
        assert_eq!(dst.get(2, 1), None);
        assert_eq!(dst.get(0, 0), None);
        assert_eq!(dst.opaque_count(), 4);
    }

    fn seeded_grid(width: usize, height: usize, seed: u64, opaque: bool) -> PixelGrid {
        let mut state = seed;
        let pixels = (0..width * height)
            .map(|_| {
                state = splitmix64(state);
                let [r, g, b, alpha, ..] = state.to_le_bytes();
                (opaque || alpha & 1 == 0).then_some(Rgb::new(r, g, b))
            })
            .collect();
        PixelGrid::from_pixels(width, height, pixels).expect("sized")
    }

    const SIZES: [(usize, usize); 4] = [(1, 1), (3, 5), (8, 8), (17, 4)];
    const OFFSETS: [(i32, i32); 5] = [(0, 0), (2, 1), (-3, 2), (5, -4), (-20, -20)];

    #[test]
    fn test_opaque_foreground_replaces_covered_pixels() {
        for (n, &(w, h)) in SIZES.iter().enumerate() {
            for &(ox, oy) in &OFFSETS {
                let bg = seeded_grid(10, 7, n as u64, false);
                let fg = seeded_grid(w, h, 1_000 + n as u64, true);
                let mut out = bg.clone();
                composite(&mut out, &fg, ox, oy);

                for y in 0..bg.height() {
                    for x in 0..bg.width() {
                        let (fx, fy) = (x as i32 - ox, y as i32 - oy);
                        let covered = fx >= 0 && fy >= 0 && (fx as usize) < w && (fy as usize) < h;
                        let expected = if covered {
                            fg.get(fx as usize, fy as usize)
                        } else {
                            bg.get(x, y)
                        };
                        assert_eq!(out.get(x, y), expected, "size {w}x{h} at ({ox},{oy})");
                    }
                }
            }
        }
    }

    #[test]
    fn test_opaque_foreground_of_same_size_equals_foreground() {
        for (n, &(w, h)) in SIZES.iter().enumerate() {
            let mut bg = seeded_grid(w, h, 50 + n as u64, false);
            let fg = seeded_grid(w, h, 60 + n as u64, true);
            composite(&mut bg, &fg, 0, 0);
            assert_eq!(bg, fg);
        }
    }

    #[test]
    fn test_transparent_foreground_leaves_background_identical() {
        for (n, &(w, h)) in SIZES.iter().enumerate() {
            for &(ox, oy) in &OFFSETS {
                let bg = seeded_grid(10, 7, 200 + n as u64, false);
                let mut out = bg.clone();
                composite(&mut out, &PixelGrid::new(w, h), ox, oy);
                assert_eq!(out.pixels(), bg.pixels());
            }
        }
    }

    #[test]
    fn test_half_keeps_majority_alpha() {
        let mut grid = PixelGrid::new(4, 2);
        // Left block: 2 of 4 opaque -> opaque. Right block: 1 of 4 -> clear.
        grid.set(0, 0, Some(RED));
        grid.set(1, 1, Some(BLUE));
        grid.set(3, 0, Some(RED));

        let half = grid.half();

        assert_eq!(half.width(), 2);
        assert_eq!(half.height(), 1);
        assert_eq!(half.get(0, 0), Some(Rgb::new(127, 0, 127)));
        assert_eq!(half.get(1, 0), None);
    }

    #[test]
    fn test_luma_orders_colors() {
        assert!(Rgb::WHITE.luma() > RED.luma());
        assert!(RED.luma() > BLUE.luma());
        assert_eq!(Rgb::BLACK.luma(), 0);
    }

    #[test]
    fn test_average_empty_is_none() {
        assert_eq!(Rgb::average(std::iter::empty()), None);
        assert_eq!(Rgb::average([RED, BLUE]), Some(Rgb::new(127, 0, 127)));
    }
}
