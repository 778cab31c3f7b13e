//! # Cell Encodings
//!
//! Turns a [`PixelGrid`] into a grid of terminal cells. Three modes trade
//! resolution for colour fidelity:
//!
//! | Mode        | Pixels per cell | Colours per cell |
//! |-------------|-----------------|------------------|
//! | `Block`     | 1 (over 2 cols) | 1                |
//! | `HalfBlock` | 1 x 2           | 2                |
//! | `Braille`   | 2 x 4           | 2 (averaged)     |
//!
//! All three leave transparent pixels at the terminal default colours.

use std::io::Write;

use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
};
use glyphworld_shared::RenderModeName;

use crate::pixel::{PixelGrid, Rgb};

/// Full block, used twice per pixel in block mode.
pub const FULL_BLOCK: char = '█';
/// Upper half block. Foreground paints the top pixel.
pub const UPPER_HALF: char = '▀';
/// Lower half block. Foreground paints the bottom pixel.
pub const LOWER_HALF: char = '▄';
/// First code point of the Braille patterns block.
pub const BRAILLE_BASE: u32 = 0x2800;

/// Dot bit for each `(column, row)` of a 2x4 Braille cell.
const BRAILLE_BITS: [[u8; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];

/// How pixels are packed into cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Each pixel becomes two full-block columns.
    Block,
    /// Each cell shows a pixel pair stacked vertically.
    #[default]
    HalfBlock,
    /// Each cell shows a 2x4 dot pattern.
    Braille,
}

impl RenderMode {
    /// Pixel dimensions that exactly fill `cols` x `rows` cells.
    #[must_use]
    pub const fn pixel_size(self, cols: u16, rows: u16) -> (usize, usize) {
        let (cols, rows) = (cols as usize, rows as usize);
        match self {
            Self::Block => (cols / 2, rows),
            Self::HalfBlock => (cols, rows * 2),
            Self::Braille => (cols * 2, rows * 4),
        }
    }

    /// Cell dimensions needed to show a `width` x `height` pixel grid.
    #[must_use]
    pub const fn cell_size(self, width: usize, height: usize) -> (usize, usize) {
        match self {
            Self::Block => (width * 2, height),
            Self::HalfBlock => (width, height.div_ceil(2)),
            Self::Braille => (width.div_ceil(2), height.div_ceil(4)),
        }
    }

    /// Pixels per world tile that keeps a tile roughly square on screen.
    #[must_use]
    pub const fn tile_pixels(self) -> usize {
        match self {
            Self::Block => 1,
            Self::HalfBlock => 2,
            Self::Braille => 4,
        }
    }
}

impl From<RenderModeName> for RenderMode {
    fn from(name: RenderModeName) -> Self {
        match name {
            RenderModeName::Block => Self::Block,
            RenderModeName::HalfBlock => Self::HalfBlock,
            RenderModeName::Braille => Self::Braille,
        }
    }
}

/// One terminal cell: a character and its colours.
///
/// `None` colours mean the terminal default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Character drawn.
    pub ch: char,
    /// Foreground colour.
    pub fg: Option<Rgb>,
    /// Background colour.
    pub bg: Option<Rgb>,
}

impl Cell {
    /// A blank cell in default colours.
    pub const BLANK: Self = Self {
        ch: ' ',
        fg: None,
        bg: None,
    };
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

/// A rectangle of cells, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellGrid {
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
}

impl CellGrid {
    /// Creates a blank grid.
    #[must_use]
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::BLANK; cols * rows],
        }
    }

    /// Columns.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Cell at `(col, row)`.
    #[inline]
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<&Cell> {
        (col < self.cols && row < self.rows).then(|| &self.cells[row * self.cols + col])
    }

    /// Replaces the cell at `(col, row)`. Out of bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, col: usize, row: usize, cell: Cell) {
        if col < self.cols && row < self.rows {
            self.cells[row * self.cols + col] = cell;
        }
    }

    /// One row of cells.
    #[must_use]
    pub fn row(&self, row: usize) -> &[Cell] {
        let start = row * self.cols;
        &self.cells[start..start + self.cols]
    }

    /// Writes `text` into `row`, starting at column 0, padded with blanks.
    pub fn put_text(&mut self, row: usize, text: &str, fg: Option<Rgb>, bg: Option<Rgb>) {
        if row >= self.rows {
            return;
        }
        let mut chars = text.chars();
        for col in 0..self.cols {
            let ch = chars.next().unwrap_or(' ');
            self.set(col, row, Cell { ch, fg, bg });
        }
    }
}

/// Encodes a pixel grid into cells using `mode`.
#[must_use]
pub fn encode_cells(pixels: &PixelGrid, mode: RenderMode) -> CellGrid {
    let (cols, rows) = mode.cell_size(pixels.width(), pixels.height());
    let mut grid = CellGrid::new(cols, rows);
    match mode {
        RenderMode::Block => {
            for y in 0..pixels.height() {
                for x in 0..pixels.width() {
                    let cell = block_cell(pixels.get(x, y));
                    grid.set(x * 2, y, cell);
                    grid.set(x * 2 + 1, y, cell);
                }
            }
        }
        RenderMode::HalfBlock => {
            for row in 0..rows {
                for x in 0..cols {
                    let top = pixels.get(x, row * 2);
                    let bottom = pixels.get(x, row * 2 + 1);
                    grid.set(x, row, half_block_cell(top, bottom));
                }
            }
        }
        RenderMode::Braille => {
            for row in 0..rows {
                for col in 0..cols {
                    let mut samples = [[None; 4]; 2];
                    for (dx, column) in samples.iter_mut().enumerate() {
                        for (dy, sample) in column.iter_mut().enumerate() {
                            *sample = pixels.get(col * 2 + dx, row * 4 + dy);
                        }
                    }
                    grid.set(col, row, braille_cell(&samples));
                }
            }
        }
    }
    grid
}

/// Block mode: one colour, full block.
#[must_use]
pub fn block_cell(pixel: Option<Rgb>) -> Cell {
    match pixel {
        Some(color) => Cell {
            ch: FULL_BLOCK,
            fg: Some(color),
            bg: None,
        },
        None => Cell::BLANK,
    }
}

/// Half-block mode: upper pixel as foreground, lower as background.
#[must_use]
pub fn half_block_cell(top: Option<Rgb>, bottom: Option<Rgb>) -> Cell {
    match (top, bottom) {
        (None, None) => Cell::BLANK,
        (Some(t), None) => Cell {
            ch: UPPER_HALF,
            fg: Some(t),
            bg: None,
        },
        (None, Some(b)) => Cell {
            ch: LOWER_HALF,
            fg: Some(b),
            bg: None,
        },
        (Some(t), Some(b)) => Cell {
            ch: UPPER_HALF,
            fg: Some(t),
            bg: Some(b),
        },
    }
}

/// Braille mode: samples indexed `[column][row]` over a 2x4 block.
///
/// Opaque samples strictly brighter than the median opaque brightness
/// become dots in their average colour. The rest fill the background with
/// their average colour. A fully transparent block is blank.
#[must_use]
pub fn braille_cell(samples: &[[Option<Rgb>; 4]; 2]) -> Cell {
    let mut lumas: Vec<u32> = samples
        .iter()
        .flat_map(|column| column.iter().flatten().map(|c| c.luma()))
        .collect();
    if lumas.is_empty() {
        return Cell::BLANK;
    }
    lumas.sort_unstable();
    let n = lumas.len();
    // Doubled to keep the even-count median exact.
    let median2 = if n % 2 == 0 {
        lumas[n / 2 - 1] + lumas[n / 2]
    } else {
        lumas[n / 2] * 2
    };

    let mut bits = 0u8;
    let mut dots = Vec::with_capacity(8);
    let mut rest = Vec::with_capacity(8);
    for (dx, column) in samples.iter().enumerate() {
        for (dy, sample) in column.iter().enumerate() {
            let Some(color) = *sample else { continue };
            if color.luma() * 2 > median2 {
                bits |= BRAILLE_BITS[dx][dy];
                dots.push(color);
            } else {
                rest.push(color);
            }
        }
    }

    let ch = char::from_u32(BRAILLE_BASE + u32::from(bits)).unwrap_or(' ');
    Cell {
        ch,
        fg: Rgb::average(dots),
        bg: Rgb::average(rest),
    }
}

/// Maps an optional colour to a crossterm colour.
#[inline]
#[must_use]
pub const fn term_color(color: Option<Rgb>) -> Color {
    match color {
        Some(Rgb { r, g, b }) => Color::Rgb { r, g, b },
        None => Color::Reset,
    }
}

/// Tracks the terminal pen so colour escapes are only sent on change.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Pen {
    fg: Option<Option<Rgb>>,
    bg: Option<Option<Rgb>>,
}

impl Pen {
    /// Queues the colour changes and the character of `cell`.
    pub(crate) fn draw(&mut self, out: &mut Vec<u8>, cell: &Cell) -> std::io::Result<()> {
        if self.fg != Some(cell.fg) {
            queue!(out, SetForegroundColor(term_color(cell.fg)))?;
            self.fg = Some(cell.fg);
        }
        if self.bg != Some(cell.bg) {
            queue!(out, SetBackgroundColor(term_color(cell.bg)))?;
            self.bg = Some(cell.bg);
        }
        queue!(out, Print(cell.ch))
    }

    /// Queues a colour reset and forgets the pen state.
    pub(crate) fn reset(&mut self, out: &mut Vec<u8>) -> std::io::Result<()> {
        *self = Self::default();
        queue!(out, ResetColor)
    }
}

/// Writes every cell of `grid`, each row addressed absolutely.
pub fn write_full(out: &mut Vec<u8>, grid: &CellGrid) -> std::io::Result<()> {
    let mut pen = Pen::default();
    for row in 0..grid.rows() {
        queue!(out, MoveTo(0, row as u16))?;
        for cell in grid.row(row) {
            pen.draw(out, cell)?;
        }
    }
    pen.reset(out)?;
    out.flush()
}

/// Encodes a pixel grid into the escape string of a complete redraw.
///
/// # Errors
///
/// Only fails if formatting an escape sequence fails, which writing into
/// a `Vec` never does in practice.
pub fn encode_full(pixels: &PixelGrid, mode: RenderMode) -> std::io::Result<String> {
    let grid = encode_cells(pixels, mode);
    let mut out = Vec::with_capacity(grid.cols() * grid.rows() * 8);
    write_full(&mut out, &grid)?;
    String::from_utf8(out).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
