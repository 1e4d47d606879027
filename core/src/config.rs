//! Configuration loading.
//!
//! The kiosk reads an explicit TOML file when one is given on the command
//! line, otherwise the per-user confy store (`coinop`). Unreadable stores fall
//! back to defaults so a misconfigured cabinet still boots to the selection
//! screen.

use std::path::Path;
use std::time::Duration;

use coinop_types::{KioskConfig, TimingConfig};

use crate::error::ConfigError;
use crate::timekeeper::TimekeeperConfig;

const APP_NAME: &str = "coinop";

/// Persistence helpers for [`KioskConfig`].
pub trait KioskConfigExt: Sized {
    /// Load from the confy store, falling back to defaults.
    fn load() -> Self;
    /// Load from an explicit TOML file.
    fn load_from(path: &Path) -> Result<Self, ConfigError>;
    /// Write back to the confy store.
    fn save(&self) -> Result<(), ConfigError>;
}

impl KioskConfigExt for KioskConfig {
    fn load() -> Self {
        match confy::load::<KioskConfig>(APP_NAME, None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load kiosk config, using defaults");
                KioskConfig::default()
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, None, self)?;
        Ok(())
    }
}

impl From<&TimingConfig> for TimekeeperConfig {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            tick: Duration::from_millis(timing.tick_millis.max(1)),
            prepare_at_secs: timing.prepare_timeout_at_secs,
            resume_wait: Duration::from_secs(timing.resume_wait_secs),
            duration_wait: Duration::from_secs(timing.duration_wait_secs),
            default_bonus_secs: timing.default_bonus_secs,
            geometry_wait: Duration::from_millis(timing.geometry_query_millis),
        }
    }
}
