//! Session model and the pieces shared across its execution contexts.

mod overlay;
pub mod protocol;
mod signal;
pub mod supervisor;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use serde::Serialize;

pub use overlay::{OverlaySnapshot, OverlayState};
pub use protocol::{ControlMessage, SessionLink, TimekeeperEvent};
pub use signal::DoneSignal;
pub use supervisor::{ActiveSession, LaunchRequest, SessionEndReason, SessionNotice, launch};

/// Identifier for one paid session, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Timekeeper-side lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionPhase {
    #[default]
    Active,
    Expired,
    AwaitingExtensionPayment,
    Terminated,
}

/// A paid play period.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub game_id: String,
    pub core_path: PathBuf,
    pub game_path: PathBuf,
    /// Seconds purchased for the first leg
    pub allotted_secs: u32,
    pub started_at: DateTime<Local>,
}

impl Session {
    pub fn new(game_id: String, core_path: PathBuf, game_path: PathBuf, allotted_secs: u32) -> Self {
        Self {
            id: SessionId::next(),
            game_id,
            core_path,
            game_path,
            allotted_secs,
            started_at: Local::now(),
        }
    }

    /// Wall-clock time since launch.
    pub fn played(&self) -> chrono::TimeDelta {
        Local::now() - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_increase() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert!(b > a);
        assert!(a.to_string().starts_with('#'));
    }
}
