//! Engine boundary.
//!
//! The emulation engine itself is an external collaborator. This module
//! defines the seams the kiosk needs from it:
//!
//! - [`EmulationCore`]: what runs on the engine thread each frame
//! - [`EngineControl`]: what the timekeeper may do to a running engine
//! - [`host`]: the dedicated thread that owns the core and its frame loop

pub mod host;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use coinop_types::WindowGeometry;

use crate::error::EngineError;
use crate::session::OverlaySnapshot;

pub use host::{EngineCommand, EngineExit, EngineHandle, EngineLink, spawn_engine};

// ─────────────────────────────────────────────────────────────────────────────
// Pause Flag
// ─────────────────────────────────────────────────────────────────────────────

/// Flag the frame loop checks every iteration. While set, the core is asked
/// to render without advancing emulation.
#[derive(Debug, Clone, Default)]
pub struct PauseFlag(Arc<AtomicBool>);

impl PauseFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, paused: bool) {
        self.0.store(paused, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine-side traits
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one iteration of the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    /// The patron (or the window manager) closed the engine window
    WindowClosed,
}

/// An emulation core driven by the engine host thread.
///
/// Implementations are created on the engine thread and never leave it, so
/// they may hold thread-bound rendering contexts.
pub trait EmulationCore {
    fn load(&mut self, core_path: &Path, game_path: &Path) -> Result<(), EngineError>;

    /// Run one frame. When `paused` is set the core must not advance game
    /// state but should still present the frame (with the overlay).
    fn run_frame(&mut self, paused: bool, overlay: OverlaySnapshot) -> FrameOutcome;

    fn window_geometry(&self) -> Result<WindowGeometry, EngineError>;

    /// Release core and game resources. Called exactly once, last.
    fn unload(&mut self);
}

/// Builds an [`EmulationCore`] on the engine thread.
pub trait CoreFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn EmulationCore>;
}

impl<F> CoreFactory for F
where
    F: Fn() -> Box<dyn EmulationCore> + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn EmulationCore> {
        self()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timekeeper-side trait
// ─────────────────────────────────────────────────────────────────────────────

/// Operations the timekeeper performs on a running engine.
pub trait EngineControl: Send + Sync + 'static {
    fn set_paused(&self, paused: bool);

    fn query_geometry(&self) -> impl Future<Output = Result<WindowGeometry, EngineError>> + Send;
}
