//! Shared timer overlay state.
//!
//! Written by the timekeeper once per tick, read by the engine thread once
//! per frame. Critical sections only copy two fields.

use std::sync::{Arc, PoisonError, RwLock};

/// Copy of the overlay record taken under the read lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlaySnapshot {
    pub remaining_secs: i64,
    pub visible: bool,
}

impl OverlaySnapshot {
    /// Whether the timer badge should be drawn this frame.
    pub fn should_draw(&self) -> bool {
        self.visible && self.remaining_secs >= 0
    }
}

/// Handle to the overlay record shared between timekeeper and render path.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    inner: Arc<RwLock<OverlaySnapshot>>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the overlay visible showing `remaining_secs`.
    pub fn show(&self, remaining_secs: i64) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.remaining_secs = remaining_secs;
        guard.visible = true;
    }

    pub fn set_remaining(&self, remaining_secs: i64) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remaining_secs = remaining_secs;
    }

    pub fn hide(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .visible = false;
    }
}
