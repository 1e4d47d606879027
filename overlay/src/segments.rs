//! Seven-segment glyphs.
//!
//! ```text
//!    aaa
//!   f   b
//!    ggg
//!   e   c
//!    ddd
//! ```

use tiny_skia::{Path, PathBuilder, Rect};

const A: u8 = 1 << 0;
const B: u8 = 1 << 1;
const C: u8 = 1 << 2;
const D: u8 = 1 << 3;
const E: u8 = 1 << 4;
const F: u8 = 1 << 5;
const G: u8 = 1 << 6;

const DIGITS: [u8; 10] = [
    A | B | C | D | E | F,
    B | C,
    A | B | D | E | G,
    A | B | C | D | G,
    B | C | F | G,
    A | C | D | F | G,
    A | C | D | E | F | G,
    A | B | C,
    A | B | C | D | E | F | G,
    A | B | C | D | F | G,
];

/// Colon cells are this fraction of a digit cell wide
const COLON_WIDTH: f32 = 0.5;
/// Gap between the glyph and its cell edge, as a fraction of cell width
const CELL_GAP: f32 = 0.12;
/// Stroke thickness as a fraction of glyph width
const THICKNESS: f32 = 0.2;

pub fn segments_for(digit: char) -> Option<u8> {
    digit.to_digit(10).map(|d| DIGITS[d as usize])
}

/// Build one path covering every lit segment of `text` laid out inside the
/// box. Characters other than digits and `:` are skipped.
pub fn text_path(text: &str, x: f32, y: f32, width: f32, height: f32) -> Option<Path> {
    let units: f32 = text
        .chars()
        .map(|c| if c == ':' { COLON_WIDTH } else { 1.0 })
        .sum();
    if units <= 0.0 || width <= 0.0 || height <= 0.0 {
        return None;
    }
    let cell = width / units;

    let mut pb = PathBuilder::new();
    let mut cursor = x;
    for c in text.chars() {
        if c == ':' {
            let w = cell * COLON_WIDTH;
            push_colon(&mut pb, cursor, y, w, height, cell * (1.0 - 2.0 * CELL_GAP) * THICKNESS);
            cursor += w;
            continue;
        }
        if let Some(mask) = segments_for(c) {
            let gap = cell * CELL_GAP;
            push_glyph(&mut pb, mask, cursor + gap, y, cell - 2.0 * gap, height);
        }
        cursor += cell;
    }
    pb.finish()
}

fn push_glyph(pb: &mut PathBuilder, mask: u8, x: f32, y: f32, w: f32, h: f32) {
    let t = w * THICKNESS;
    let half = h / 2.0;
    let vertical = half - 1.5 * t;

    let segments = [
        (A, x + t, y, w - 2.0 * t, t),
        (B, x + w - t, y + t, t, vertical),
        (C, x + w - t, y + half + t / 2.0, t, vertical),
        (D, x + t, y + h - t, w - 2.0 * t, t),
        (E, x, y + half + t / 2.0, t, vertical),
        (F, x, y + t, t, vertical),
        (G, x + t, y + half - t / 2.0, w - 2.0 * t, t),
    ];
    for (bit, sx, sy, sw, sh) in segments {
        if mask & bit != 0 {
            push_rect(pb, sx, sy, sw, sh);
        }
    }
}

fn push_colon(pb: &mut PathBuilder, x: f32, y: f32, w: f32, h: f32, t: f32) {
    let cx = x + (w - t) / 2.0;
    push_rect(pb, cx, y + h * 0.3 - t / 2.0, t, t);
    push_rect(pb, cx, y + h * 0.7 - t / 2.0, t, t);
}

fn push_rect(pb: &mut PathBuilder, x: f32, y: f32, w: f32, h: f32) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        pb.push_rect(rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_masks() {
        assert_eq!(segments_for('8'), Some(0b111_1111));
        assert_eq!(segments_for('1'), Some(B | C));
        assert_eq!(segments_for('0').map(|m| m & G), Some(0));
        assert_eq!(segments_for(':'), None);
    }

    #[test]
    fn test_text_path_stays_in_box() {
        let path = text_path("12:34", 10.0, 20.0, 84.0, 22.0).unwrap();
        let bounds = path.bounds();
        assert!(bounds.left() >= 10.0);
        assert!(bounds.top() >= 20.0);
        assert!(bounds.right() <= 94.0 + 0.01);
        assert!(bounds.bottom() <= 42.0 + 0.01);
    }

    #[test]
    fn test_empty_text_has_no_path() {
        assert!(text_path("", 0.0, 0.0, 10.0, 10.0).is_none());
        assert!(text_path("00:00", 0.0, 0.0, 0.0, 10.0).is_none());
    }
}
