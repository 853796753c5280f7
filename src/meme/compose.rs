//! Caption banner compositing.
//!
//! Renders the sanitized caption as a bottom banner: a translucent dark
//! strip across the full image width, with the text centered in white 8×8
//! bitmap glyphs and a black outline drawn by offset redraws. No font files,
//! no text shaping — legibility over polish.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

const GLYPH_PX: i32 = 8;

const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 230]);
const BANNER_COLOR: Rgba<u8> = Rgba([0, 0, 0, 150]);

/// Composite `caption` as a bottom banner onto `img`.
///
/// Infallible: an empty caption draws an empty banner, a caption wider than
/// the image word-wraps, and glyphs outside the basic set render as `?`.
pub fn draw_caption_banner(img: &mut RgbaImage, caption: &str) {
    let (width, height) = (img.width() as i32, img.height() as i32);
    if width == 0 || height == 0 {
        return;
    }

    let scale = glyph_scale(width);
    let glyph_w = GLYPH_PX * scale;
    let line_h = GLYPH_PX * scale;
    let padding = 2 * scale;

    let max_cols = ((width - 2 * padding) / glyph_w).max(1) as usize;
    let lines = wrap(caption, max_cols);

    let banner_h = lines.len() as i32 * line_h + 2 * padding;
    let banner_top = (height - banner_h).max(0);
    fill_rect(img, 0, banner_top, width - 1, height - 1, BANNER_COLOR);

    let outline = scale.max(1);
    for (i, line) in lines.iter().enumerate() {
        let line_w = line.chars().count() as i32 * glyph_w;
        let x = ((width - line_w) / 2).max(padding);
        let y = banner_top + padding + i as i32 * line_h;

        // Outline pass: redraw the line offset in a ring around the origin.
        for dx in -outline..=outline {
            for dy in -outline..=outline {
                if dx == 0 && dy == 0 {
                    continue;
                }
                draw_text(img, x + dx, y + dy, line, OUTLINE_COLOR, scale);
            }
        }
        draw_text(img, x, y, line, TEXT_COLOR, scale);
    }
}

/// Glyph scale factor for an image of `width` px — roughly 48 columns.
fn glyph_scale(width: i32) -> i32 {
    (width / (48 * GLYPH_PX)).clamp(1, 6)
}

/// Word-wrap to at most `max_cols` characters per line, hard-breaking words
/// that are longer than a whole line.
fn wrap(text: &str, max_cols: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();

        if current_len > 0 && current_len + 1 + word_len <= max_cols {
            current.push(' ');
            current.push_str(word);
        } else if current_len == 0 && word_len <= max_cols {
            current.push_str(word);
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            // Hard-break an over-long word.
            let mut rest: Vec<char> = word.chars().collect();
            while rest.len() > max_cols {
                lines.push(rest.drain(..max_cols).collect());
            }
            current = rest.into_iter().collect();
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn draw_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>, scale: i32) {
    let mut cursor_x = x;
    for ch in text.chars() {
        let glyph = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?'));
        if let Some(glyph) = glyph {
            for (row_idx, row) in glyph.iter().enumerate() {
                let bits = *row;
                for col_idx in 0..8 {
                    if (bits >> col_idx) & 1 == 0 {
                        continue;
                    }
                    let px = cursor_x + col_idx * scale;
                    let py = y + row_idx as i32 * scale;
                    fill_rect(img, px, py, px + scale - 1, py + scale - 1, color);
                }
            }
        }
        cursor_x += GLYPH_PX * scale;
    }
}

fn fill_rect(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    if w == 0 || h == 0 {
        return;
    }
    let min_x = x0.clamp(0, w - 1);
    let max_x = x1.clamp(0, w - 1);
    let min_y = y0.clamp(0, h - 1);
    let max_y = y1.clamp(0, h - 1);
    if x1 < 0 || y1 < 0 || x0 >= w || y0 >= h {
        return;
    }
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dst = *img.get_pixel(x as u32, y as u32);
            img.put_pixel(x as u32, y as u32, blend(dst, color));
        }
    }
}

/// Source-over alpha blend.
fn blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let ch = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    Rgba([
        ch(dst[0], src[0]),
        ch(dst[1], src[1]),
        ch(dst[2], src[2]),
        (f64::from(dst[3]) + f64::from(src[3]) * inv).round().clamp(0.0, 255.0) as u8,
    ])
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_darkens_the_bottom_rows() {
        let mut img = RgbaImage::from_pixel(400, 300, Rgba([200, 200, 200, 255]));
        draw_caption_banner(&mut img, "hello world");

        let bottom = *img.get_pixel(5, 299);
        let top = *img.get_pixel(5, 0);
        assert!(bottom[0] < top[0], "banner should darken the bottom edge");
        assert_eq!(top, Rgba([200, 200, 200, 255]), "top of image untouched");
    }

    #[test]
    fn text_pixels_land_inside_the_banner() {
        let mut img = RgbaImage::from_pixel(400, 300, Rgba([0, 0, 0, 255]));
        draw_caption_banner(&mut img, "HELLO");
        let white_pixels = img.pixels().filter(|p| p[0] > 200).count();
        assert!(white_pixels > 0, "glyphs should produce bright pixels");
    }

    #[test]
    fn wrap_respects_column_limit() {
        let lines = wrap("one two three four five", 9);
        assert!(lines.iter().all(|l| l.chars().count() <= 9), "{lines:?}");
        assert_eq!(lines.concat().replace(' ', ""), "onetwothreefourfive");
    }

    #[test]
    fn wrap_hard_breaks_overlong_words() {
        let lines = wrap("abcdefghijklmnop", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ijkl", "mnop"]);
    }

    #[test]
    fn wrap_of_empty_text_is_one_empty_line() {
        assert_eq!(wrap("", 10), vec![String::new()]);
    }

    #[test]
    fn zero_sized_image_is_a_no_op() {
        let mut img = RgbaImage::new(0, 0);
        draw_caption_banner(&mut img, "anything");
    }
}
