//! Render a grid of strings as a PNG table
//!
//! Text is drawn with a built-in 5x7 bitmap font (ASCII, lowercase shown as
//! uppercase, unknown glyphs as `?`) so no font files are needed at runtime.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, Rgb, RgbImage};

use crate::error::{BotError, Result};

pub const ROW_HEIGHT: u32 = 24;
pub const MIN_COLUMN_WIDTH: u32 = 64;
pub const MAX_COLUMN_WIDTH: u32 = 220;
pub const MAX_TOTAL_WIDTH: u32 = 3600;
pub const MIN_SCALED_COLUMN_WIDTH: u32 = 48;

const CELL_PADDING: u32 = 6;
const GLYPH_SCALE: u32 = 2;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = (GLYPH_WIDTH + 1) * GLYPH_SCALE;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const HEADER_FILL: Rgb<u8> = Rgb([224, 230, 240]);
const GRID_LINE: Rgb<u8> = Rgb([176, 176, 176]);
const TEXT: Rgb<u8> = Rgb([20, 20, 20]);

/// Rows of 5 bits each, most significant bit on the left
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        ' ' => [0; 7],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        ';' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x04, 0x08],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '[' => [0x0E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0E],
        ']' => [0x0E, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0E],
        '*' => [0x00, 0x04, 0x15, 0x0E, 0x15, 0x04, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '<' => [0x02, 0x04, 0x08, 0x10, 0x08, 0x04, 0x02],
        '>' => [0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08],
        '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        '&' => [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D],
        '@' => [0x0E, 0x11, 0x01, 0x0D, 0x15, 0x15, 0x0E],
        '$' => [0x04, 0x0F, 0x14, 0x0E, 0x05, 0x1E, 0x04],
        '|' => [0x04; 7],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '\'' => [0x0C, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        '"' => [0x0A, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

fn text_width(chars: usize) -> u32 {
    chars as u32 * GLYPH_ADVANCE
}

/// Fit `text` into `width` pixels, ending with `...` when clipped
pub fn clip_text(text: &str, width: u32) -> String {
    let max_chars = (width.saturating_sub(2 * CELL_PADDING) / GLYPH_ADVANCE) as usize;
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

/// Natural column widths, clamped, then scaled down to the total width limit
pub fn column_widths(values: &[Vec<String>]) -> Vec<u32> {
    let columns = values.iter().map(Vec::len).max().unwrap_or(0);
    let natural: Vec<u32> = (0..columns)
        .map(|c| {
            let longest = values
                .iter()
                .filter_map(|row| row.get(c))
                .map(|s| s.trim().chars().count())
                .max()
                .unwrap_or(0);
            (text_width(longest) + 2 * CELL_PADDING).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect();

    let total: u32 = natural.iter().sum();
    if total <= MAX_TOTAL_WIDTH {
        return natural;
    }
    let factor = MAX_TOTAL_WIDTH as f64 / total as f64;
    natural
        .into_iter()
        .map(|w| ((w as f64 * factor) as u32).max(MIN_SCALED_COLUMN_WIDTH))
        .collect()
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str) {
    for (i, c) in text.chars().enumerate() {
        let gx = x + i as u32 * GLYPH_ADVANCE;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    fill_rect(
                        img,
                        gx + col * GLYPH_SCALE,
                        y + row as u32 * GLYPH_SCALE,
                        GLYPH_SCALE,
                        GLYPH_SCALE,
                        TEXT,
                    );
                }
            }
        }
    }
}

/// Draw the table; the first row is shaded as a header
pub fn render_table(values: &[Vec<String>]) -> Result<RgbImage> {
    let widths = column_widths(values);
    if values.is_empty() || widths.is_empty() {
        return Err(BotError::Render("nothing to render: range is empty".to_string()));
    }

    let width: u32 = widths.iter().sum::<u32>() + 1;
    let height = values.len() as u32 * ROW_HEIGHT + 1;
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

    fill_rect(&mut img, 0, 0, width, ROW_HEIGHT, HEADER_FILL);

    let text_offset = (ROW_HEIGHT - GLYPH_HEIGHT * GLYPH_SCALE) / 2;
    for (r, row) in values.iter().enumerate() {
        let y = r as u32 * ROW_HEIGHT;
        let mut x = 0;
        for (c, w) in widths.iter().enumerate() {
            if let Some(text) = row.get(c) {
                let clipped = clip_text(text.trim(), *w);
                draw_text(&mut img, x + CELL_PADDING, y + text_offset, &clipped);
            }
            x += w;
        }
    }

    for r in 0..=values.len() as u32 {
        fill_rect(&mut img, 0, r * ROW_HEIGHT, width, 1, GRID_LINE);
    }
    let mut x = 0;
    for w in widths.iter().chain(std::iter::once(&0)) {
        fill_rect(&mut img, x, 0, 1, height, GRID_LINE);
        x += w;
    }

    Ok(img)
}

pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)
        .map_err(|e| BotError::Render(format!("png encoding failed: {}", e)))?;
    Ok(bytes)
}

/// Render `values` and return the PNG as standard base64
pub fn render_table_png_base64(values: &[Vec<String>]) -> Result<String> {
    let img = render_table(values)?;
    Ok(STANDARD.encode(encode_png(&img)?))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_widths_clamped() {
        let widths = column_widths(&[row(&["a", "x".repeat(100).as_str()])]);
        assert_eq!(widths, vec![MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH]);
    }

    #[test]
    fn test_widths_scaled_to_total_limit() {
        let wide = "x".repeat(50);
        let cells: Vec<String> = (0..40).map(|_| wide.clone()).collect();
        let widths = column_widths(&[cells]);
        assert!(widths.iter().sum::<u32>() <= MAX_TOTAL_WIDTH);
        assert!(widths.iter().all(|w| *w >= MIN_SCALED_COLUMN_WIDTH));

        let many: Vec<String> = (0..100).map(|_| wide.clone()).collect();
        assert!(column_widths(&[many]).iter().all(|w| *w == MIN_SCALED_COLUMN_WIDTH));
    }

    #[test]
    fn test_clip_text() {
        assert_eq!(clip_text("short", 220), "short");
        let clipped = clip_text(&"y".repeat(40), MIN_COLUMN_WIDTH);
        assert!(clipped.ends_with("..."));
        assert!(text_width(clipped.chars().count()) <= MIN_COLUMN_WIDTH - 2 * CELL_PADDING);
    }

    #[test]
    fn test_render_png_base64() {
        let encoded =
            render_table_png_base64(&[row(&["Region", "Total"]), row(&["SOL-IIS", "355"])]).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!(img.height(), 2 * ROW_HEIGHT + 1);
    }

    #[test]
    fn test_empty_range_is_render_error() {
        assert!(matches!(render_table_png_base64(&[]), Err(BotError::Render(_))));
        assert!(matches!(render_table_png_base64(&[vec![]]), Err(BotError::Render(_))));
    }
}
