//! # Render Pipeline Integration Tests
//!
//! Compositing, encoding and diffing working together.

use glyphworld_render::{composite, encode_cells, PixelGrid, RenderMode, Rgb, Sprite, TerminalRenderer};

const SKY: Rgb = Rgb::new(20, 40, 90);
const HERO: Rgb = Rgb::new(250, 200, 40);

/// Test: A sprite composited over a background shows up in the right cells.
#[test]
fn test_sprite_over_background_half_block() {
    let mut frame = PixelGrid::filled(8, 8, SKY);
    let sprite = Sprite::from_pixels(PixelGrid::filled(2, 2, HERO));
    composite(&mut frame, &sprite.render_at(2, 2), 4, 2);

    let cells = encode_cells(&frame, RenderMode::HalfBlock);

    let hero_cell = cells.get(4, 1).expect("in bounds");
    assert_eq!(hero_cell.fg, Some(HERO));
    assert_eq!(hero_cell.bg, Some(HERO));

    let sky_cell = cells.get(0, 0).expect("in bounds");
    assert_eq!(sky_cell.fg, Some(SKY));
    assert_eq!(sky_cell.bg, Some(SKY));
}

/// Test: Moving a sprite one pixel only rewrites the cells it touched.
#[test]
fn test_moving_sprite_diff_is_local() {
    let background = PixelGrid::filled(40, 20, SKY);
    let hero = PixelGrid::filled(2, 2, HERO);
    let mut renderer = TerminalRenderer::new(RenderMode::HalfBlock);

    let mut first = background.clone();
    first.composite(&hero, 10, 4);
    let _ = renderer.render(&first).expect("render");

    let mut second = background;
    second.composite(&hero, 11, 4);
    let bytes = renderer.render(&second).expect("render");

    let stats = renderer.last_stats();
    assert!(!stats.full_redraw);
    // Column 10 loses the hero, column 12 gains it, column 11 is unchanged.
    assert_eq!(stats.cells_written, 2);
    assert!(!bytes.is_empty());
}

/// Test: Braille mode packs eight pixels into every cell.
#[test]
fn test_braille_density() {
    let frame = PixelGrid::filled(160, 92, SKY);
    let cells = encode_cells(&frame, RenderMode::Braille);

    assert_eq!((cells.cols(), cells.rows()), (80, 23));
}
