//! Error types for the kiosk core.

use std::path::PathBuf;

use coinop_types::Phase;
use thiserror::Error;

/// Failures reported by the emulation engine or its host thread.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("failed to load core {path}: {reason}")]
    LoadCore { path: PathBuf, reason: String },
    #[error("failed to load game {path}: {reason}")]
    LoadGame { path: PathBuf, reason: String },
    #[error("window geometry unavailable: {0}")]
    Geometry(String),
    #[error("engine thread could not be started: {0}")]
    Spawn(String),
    #[error("engine did not report ready within {0} seconds")]
    LaunchTimeout(u64),
    #[error("engine panicked: {0}")]
    Crashed(String),
    #[error("engine is no longer running")]
    Gone,
}

/// Failures of the launch/teardown and service layers.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("a session is already active")]
    AlreadyActive,
    #[error("no session is active")]
    NoSession,
    #[error("unknown game index {0}")]
    UnknownGame(usize),
    #[error("session channel closed")]
    ChannelClosed,
    #[error("kiosk service is not running")]
    ServiceStopped,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// An intent that the front-end state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{intent} is not allowed while in {phase:?}")]
    NotAllowed { intent: &'static str, phase: Phase },
    #[error("no games are configured")]
    NoGames,
    #[error("game index {index} out of range (have {count})")]
    InvalidGame { index: usize, count: usize },
    #[error("cannot pay for game {requested} while game {playing} is running")]
    WrongGame { requested: usize, playing: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Store(#[from] confy::ConfyError),
}
