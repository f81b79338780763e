//! 5x7 bitmap font for tag labels.

use crate::frame::{Bgr, BgrImage};

pub const GLYPH_WIDTH: i32 = 5;
pub const GLYPH_HEIGHT: i32 = 7;
/// Horizontal advance per character, in unscaled pixels.
pub const GLYPH_ADVANCE: i32 = 6;

/// Draw `text` with its bottom-left corner at `(x, baseline)`, each font
/// pixel drawn as a `scale`x`scale` block. Unknown characters advance
/// without drawing. Pixels outside the image are skipped.
pub fn draw_text(image: &mut BgrImage, x: i32, baseline: i32, text: &str, scale: i32, color: Bgr) {
    let scale = scale.max(1);
    let width = image.width() as i32;
    let height = image.height() as i32;
    let top = baseline - GLYPH_HEIGHT * scale;
    let pixel = color.pixel();

    let mut pen_x = x;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let x0 = pen_x + col * scale;
                    let y0 = top + row as i32 * scale;
                    for py in y0..y0 + scale {
                        for px in x0..x0 + scale {
                            if px >= 0 && px < width && py >= 0 && py < height {
                                image.put_pixel(px as u32, py as u32, pixel);
                            }
                        }
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE * scale;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        'D' => Some([
            0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100,
        ]),
        'I' => Some([
            0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '#' => Some([
            0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010,
        ]),
        '-' => Some([0, 0, 0, 0b11111, 0, 0, 0]),
        ':' => Some([0, 0b00110, 0b00110, 0, 0b00110, 0b00110, 0]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const GREEN: Bgr = Bgr::new(0, 255, 0);

    #[test]
    fn digit_one_lands_above_baseline() {
        let mut image = BgrImage::new(20, 20);
        draw_text(&mut image, 0, 10, "1", 1, GREEN);
        // Top row of '1' is a single pixel at column 2, row 10 - 7.
        assert_eq!(*image.get_pixel(2, 3), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(0, 3), Rgb([0, 0, 0]));
        // Nothing drawn at or below the baseline.
        assert!((0..20).all(|x| *image.get_pixel(x, 10) == Rgb([0, 0, 0])));
    }

    #[test]
    fn clipping_never_panics() {
        let mut image = BgrImage::new(8, 8);
        draw_text(&mut image, -20, -5, "42", 3, GREEN);
        draw_text(&mut image, 6, 100, "1234567890", 2, GREEN);
    }

    #[test]
    fn characters_advance_by_glyph_pitch() {
        let mut image = BgrImage::new(24, 12);
        draw_text(&mut image, 0, 10, "11", 2, GREEN);
        // Second '1' starts 12 pixels right; its top stroke covers columns 16..18.
        assert_eq!(*image.get_pixel(16, 0), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(15, 0), Rgb([0, 0, 0]));
    }
}
