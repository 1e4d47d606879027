//! Badge color palette

use tiny_skia::Color;

/// Badge background: black at 45% alpha
#[inline]
pub fn badge_background() -> Color {
    Color::from_rgba8(0, 0, 0, 115)
}

#[inline]
pub fn badge_text() -> Color {
    Color::from_rgba8(255, 0, 0, 255)
}
