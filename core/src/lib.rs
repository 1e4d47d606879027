pub mod config;
pub mod engine;
pub mod error;
pub mod frontend;
pub mod service;
pub mod session;
pub mod timekeeper;

// Re-exports for convenience
pub use config::KioskConfigExt;
pub use engine::{CoreFactory, EmulationCore, EngineControl, FrameOutcome, PauseFlag};
pub use error::{ConfigError, EngineError, SessionError, TransitionError};
pub use frontend::{Effect, Intent, Machine, UiState};
pub use service::{Notification, ServiceHandle, UiView};
pub use session::{OverlaySnapshot, OverlayState, SessionEndReason};
pub use timekeeper::{Timekeeper, TimekeeperConfig, TimekeeperExit, TimekeeperHandle};
