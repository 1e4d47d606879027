use serde::{Deserialize, Serialize};

/// Position and size of the engine window in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    /// Substituted whenever the engine cannot report its window.
    pub const FALLBACK: WindowGeometry = WindowGeometry {
        x: 0,
        y: 0,
        width: 800,
        height: 600,
    };

    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self::FALLBACK
    }
}
