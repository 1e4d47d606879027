//! Timer badge.
//!
//! A small rounded rectangle in the top-right corner of the engine frame
//! showing the remaining time as `MM:SS`.

use coinop_core::OverlaySnapshot;
use coinop_types::formatting::format_clock;
use tiny_skia::{FillRule, Paint, Path, PathBuilder, PixmapMut, Transform};

use crate::colors;
use crate::segments;

/// Reference width for scaling calculations
const BASE_WIDTH: f32 = 1920.0;

/// Base layout values (at BASE_WIDTH)
const BASE_PADDING: f32 = 32.0;
const BASE_BADGE_WIDTH: f32 = 120.0;
const BASE_BADGE_HEIGHT: f32 = 36.0;
const BASE_CORNER_RADIUS: f32 = 6.0;
const BASE_TEXT_INSET_X: f32 = 18.0;
const BASE_TEXT_INSET_Y: f32 = 7.0;

/// Badge geometry for one framebuffer width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadgeLayout {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub text_x: f32,
    pub text_y: f32,
    pub text_width: f32,
    pub text_height: f32,
}

impl BadgeLayout {
    pub fn for_width(fb_width: u32) -> Self {
        let ratio = fb_width as f32 / BASE_WIDTH;
        let padding = BASE_PADDING * ratio;
        let width = BASE_BADGE_WIDTH * ratio;
        let height = BASE_BADGE_HEIGHT * ratio;
        let inset_x = BASE_TEXT_INSET_X * ratio;
        let inset_y = BASE_TEXT_INSET_Y * ratio;

        let x = fb_width as f32 - padding - width;
        let y = padding;
        Self {
            x,
            y,
            width,
            height,
            radius: BASE_CORNER_RADIUS * ratio,
            text_x: x + inset_x,
            text_y: y + inset_y,
            text_width: width - 2.0 * inset_x,
            text_height: height - 2.0 * inset_y,
        }
    }
}

/// Draws the badge into engine frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerBadge;

impl TimerBadge {
    pub fn new() -> Self {
        Self
    }

    /// Render into `pixmap`. Returns whether anything was drawn.
    pub fn render(&self, pixmap: &mut PixmapMut<'_>, snapshot: OverlaySnapshot) -> bool {
        if !snapshot.should_draw() {
            return false;
        }
        let layout = BadgeLayout::for_width(pixmap.width());
        let Some(background) = rounded_rect(layout.x, layout.y, layout.width, layout.height, layout.radius) else {
            tracing::trace!(width = pixmap.width(), "Frame too small for timer badge");
            return false;
        };

        let mut paint = Paint::default();
        paint.anti_alias = true;
        paint.set_color(colors::badge_background());
        pixmap.fill_path(&background, &paint, FillRule::Winding, Transform::identity(), None);

        let text = format_clock(snapshot.remaining_secs);
        if let Some(glyphs) = segments::text_path(
            &text,
            layout.text_x,
            layout.text_y,
            layout.text_width,
            layout.text_height,
        ) {
            paint.set_color(colors::badge_text());
            pixmap.fill_path(&glyphs, &paint, FillRule::Winding, Transform::identity(), None);
        }
        true
    }
}

fn rounded_rect(x: f32, y: f32, w: f32, h: f32, r: f32) -> Option<Path> {
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    let r = r.min(w / 2.0).min(h / 2.0).max(0.0);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::Pixmap;

    fn visible(remaining_secs: i64) -> OverlaySnapshot {
        OverlaySnapshot {
            remaining_secs,
            visible: true,
        }
    }

    #[test]
    fn test_layout_at_reference_width() {
        let layout = BadgeLayout::for_width(1920);
        assert_eq!(layout.x, 1920.0 - 32.0 - 120.0);
        assert_eq!(layout.y, 32.0);
        assert_eq!(layout.width, 120.0);
        assert_eq!(layout.height, 36.0);
        assert_eq!(layout.text_x, layout.x + 18.0);
        assert_eq!(layout.text_height, 22.0);
    }

    #[test]
    fn test_layout_scales_with_width() {
        let layout = BadgeLayout::for_width(960);
        assert_eq!(layout.width, 60.0);
        assert_eq!(layout.y, 16.0);
        assert_eq!(layout.radius, 3.0);
    }

    #[test]
    fn test_render_draws_background_and_digits() {
        let mut pixmap = Pixmap::new(1920, 1080).unwrap();
        let drawn = TimerBadge::new().render(&mut pixmap.as_mut(), visible(125));
        assert!(drawn);

        // Left text inset is background only
        let bg = pixmap.pixel(1772, 50).unwrap();
        assert!((114..=116).contains(&bg.alpha()));
        assert_eq!(bg.red(), 0);

        // Outside the badge stays untouched
        assert_eq!(pixmap.pixel(100, 100).unwrap().alpha(), 0);

        let layout = BadgeLayout::for_width(1920);
        let mut red = 0;
        for y in layout.text_y as u32..(layout.text_y + layout.text_height) as u32 {
            for x in layout.text_x as u32..(layout.text_x + layout.text_width) as u32 {
                if pixmap.pixel(x, y).is_some_and(|p| p.red() > 200) {
                    red += 1;
                }
            }
        }
        assert!(red > 50);
    }

    #[test]
    fn test_hidden_or_negative_draws_nothing() {
        let mut pixmap = Pixmap::new(640, 480).unwrap();
        let badge = TimerBadge::new();
        assert!(!badge.render(&mut pixmap.as_mut(), OverlaySnapshot::default()));
        assert!(!badge.render(&mut pixmap.as_mut(), visible(-1)));
        assert!(pixmap.pixels().iter().all(|p| p.alpha() == 0));
    }
}
