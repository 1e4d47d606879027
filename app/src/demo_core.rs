//! Built-in stand-in for a real emulation core.
//!
//! Verifies the configured core and game files exist, then renders a
//! slowly cycling background into an offscreen frame with the timer badge on
//! top. Emulation time only advances while unpaused.

use std::path::Path;
use std::sync::Arc;

use coinop_core::error::EngineError;
use coinop_core::{CoreFactory, EmulationCore, FrameOutcome, OverlaySnapshot};
use coinop_overlay::TimerBadge;
use coinop_types::WindowGeometry;
use tiny_skia::{Color, Pixmap};
use tracing::{debug, info};

pub struct DemoCore {
    window: WindowGeometry,
    frame: Option<Pixmap>,
    frames: u64,
    badge: TimerBadge,
}

impl DemoCore {
    pub fn new(window: WindowGeometry) -> Self {
        Self {
            window,
            frame: None,
            frames: 0,
            badge: TimerBadge::new(),
        }
    }

    /// Emulated frames advanced so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl EmulationCore for DemoCore {
    fn load(&mut self, core_path: &Path, game_path: &Path) -> Result<(), EngineError> {
        if !core_path.is_file() {
            return Err(EngineError::LoadCore {
                path: core_path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        if !game_path.is_file() {
            return Err(EngineError::LoadGame {
                path: game_path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        let frame = Pixmap::new(self.window.width, self.window.height).ok_or_else(|| {
            EngineError::LoadCore {
                path: core_path.to_path_buf(),
                reason: format!("cannot open a {}x{} window", self.window.width, self.window.height),
            }
        })?;
        self.frame = Some(frame);
        info!(game = %game_path.display(), width = self.window.width, height = self.window.height, "Demo core loaded");
        Ok(())
    }

    fn run_frame(&mut self, paused: bool, overlay: OverlaySnapshot) -> FrameOutcome {
        let Some(frame) = self.frame.as_mut() else {
            return FrameOutcome::WindowClosed;
        };
        if !paused {
            self.frames += 1;
        }
        let shade = (self.frames % 256) as u8;
        frame.fill(Color::from_rgba8(shade / 4, 24, 64 + shade / 2, 255));
        self.badge.render(&mut frame.as_mut(), overlay);
        FrameOutcome::Continue
    }

    fn window_geometry(&self) -> Result<WindowGeometry, EngineError> {
        match self.frame {
            Some(_) => Ok(self.window),
            None => Err(EngineError::Geometry("window is not open".to_string())),
        }
    }

    fn unload(&mut self) {
        if self.frame.take().is_some() {
            debug!(frames = self.frames, "Demo core unloaded");
        }
    }
}

pub fn factory(window: WindowGeometry) -> Arc<dyn CoreFactory> {
    Arc::new(move || -> Box<dyn EmulationCore> { Box::new(DemoCore::new(window)) })
}
