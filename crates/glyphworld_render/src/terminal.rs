//! # Diffing Terminal Renderer
//!
//! Keeps the last frame it emitted and, for each new frame, writes only
//! the cells that changed. Applying the diff to a screen showing the
//! previous frame yields exactly what a full redraw would.
//!
//! ## Cursor Strategy
//!
//! After printing a cell the cursor sits on the next column, so a run of
//! changed cells needs no movement at all. A gap on the same row is
//! skipped with a relative move, anything else gets an absolute move.

use crossterm::{
    cursor::{Hide, MoveRight, MoveTo},
    queue,
    terminal::{Clear, ClearType},
};
use tracing::trace;

use crate::encode::{encode_cells, write_full, CellGrid, Pen, RenderMode};
use crate::pixel::{PixelGrid, Rgb};

/// Statistics for one rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Cells written.
    pub cells_written: usize,
    /// Bytes produced.
    pub bytes: usize,
    /// Whether this was a full redraw.
    pub full_redraw: bool,
}

/// Stateful renderer for one terminal.
#[derive(Debug)]
pub struct TerminalRenderer {
    mode: RenderMode,
    previous: Option<CellGrid>,
    last_stats: FrameStats,
}

impl TerminalRenderer {
    /// Creates a renderer. The first frame is always a full redraw.
    #[must_use]
    pub const fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            previous: None,
            last_stats: FrameStats {
                cells_written: 0,
                bytes: 0,
                full_redraw: false,
            },
        }
    }

    /// Current encoding mode.
    #[must_use]
    pub const fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Switches encoding mode. Forces a full redraw.
    pub fn set_mode(&mut self, mode: RenderMode) {
        if mode != self.mode {
            self.mode = mode;
            self.invalidate();
        }
    }

    /// Forgets the previous frame so the next render is a full redraw.
    ///
    /// Call after anything else has written to the terminal.
    pub fn invalidate(&mut self) {
        self.previous = None;
    }

    /// Statistics of the most recent frame.
    #[must_use]
    pub const fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Renders pixels and returns the bytes to send.
    ///
    /// # Errors
    ///
    /// Only if escape formatting fails.
    pub fn render(&mut self, pixels: &PixelGrid) -> std::io::Result<Vec<u8>> {
        let grid = encode_cells(pixels, self.mode);
        self.render_cells(grid)
    }

    /// Renders pixels with a text line below them.
    ///
    /// The status line occupies one extra row and takes part in diffing
    /// like any other row.
    ///
    /// # Errors
    ///
    /// Only if escape formatting fails.
    pub fn render_with_status(
        &mut self,
        pixels: &PixelGrid,
        status: &str,
    ) -> std::io::Result<Vec<u8>> {
        let body = encode_cells(pixels, self.mode);
        let mut grid = CellGrid::new(body.cols(), body.rows() + 1);
        for row in 0..body.rows() {
            for (col, cell) in body.row(row).iter().enumerate() {
                grid.set(col, row, *cell);
            }
        }
        grid.put_text(body.rows(), status, Some(Rgb::new(220, 220, 220)), None);
        self.render_cells(grid)
    }

    /// Renders an already encoded cell grid.
    ///
    /// # Errors
    ///
    /// Only if escape formatting fails.
    pub fn render_cells(&mut self, grid: CellGrid) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(grid.cols() * grid.rows() * 4);

        let stats = match &self.previous {
            Some(prev) if prev.cols() == grid.cols() && prev.rows() == grid.rows() => {
                let written = write_diff(&mut out, prev, &grid)?;
                FrameStats {
                    cells_written: written,
                    bytes: out.len(),
                    full_redraw: false,
                }
            }
            _ => {
                queue!(out, Hide, Clear(ClearType::All))?;
                write_full(&mut out, &grid)?;
                FrameStats {
                    cells_written: grid.cols() * grid.rows(),
                    bytes: out.len(),
                    full_redraw: true,
                }
            }
        };

        trace!(
            cells = stats.cells_written,
            bytes = stats.bytes,
            full = stats.full_redraw,
            "frame rendered"
        );
        self.last_stats = stats;
        self.previous = Some(grid);
        Ok(out)
    }
}

/// Writes the cells of `next` that differ from `prev`. Returns the count.
fn write_diff(out: &mut Vec<u8>, prev: &CellGrid, next: &CellGrid) -> std::io::Result<usize> {
    let mut pen = Pen::default();
    let mut cursor: Option<(usize, usize)> = None;
    let mut written = 0;

    for row in 0..next.rows() {
        for (col, (old, new)) in prev.row(row).iter().zip(next.row(row)).enumerate() {
            if old == new {
                continue;
            }
            match cursor {
                Some((c, r)) if r == row && c == col => {}
                Some((c, r)) if r == row && c < col => {
                    queue!(out, MoveRight((col - c) as u16))?;
                }
                _ => queue!(out, MoveTo(col as u16, row as u16))?,
            }
            pen.draw(out, new)?;
            cursor = Some((col + 1, row));
            written += 1;
        }
    }

    if written > 0 {
        pen.reset(out)?;
    }
    Ok(written)
}
