//! Kiosk configuration types.
//!
//! The whole tree deserializes from TOML with every field optional; missing
//! values fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::WindowGeometry;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Games offered on the selection screen, in display order
    #[serde(rename = "game")]
    pub games: Vec<GameEntry>,
    pub pricing: PricingConfig,
    pub timing: TimingConfig,
    pub web: WebSettings,
    pub engine: EngineSettings,
}

impl KioskConfig {
    pub fn game(&self, index: usize) -> Option<&GameEntry> {
        self.games.get(index)
    }

    pub fn find_game(&self, name: &str) -> Option<usize> {
        self.games.iter().position(|g| g.name == name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// A playable title: which core runs which game image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEntry {
    pub name: String,
    pub core_path: PathBuf,
    pub game_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pricing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price charged per purchased minute
    pub price_per_minute: f64,
    /// Session seconds granted per purchased minute
    pub seconds_per_minute: u32,
    pub min_minutes: u32,
    pub max_minutes: u32,
    /// Minute picker starting value
    pub default_minutes: u32,
    /// Show prices with a decimal comma (`$2,50`)
    pub european_decimals: bool,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_per_minute: 0.5,
            seconds_per_minute: 60,
            min_minutes: 1,
            max_minutes: 60,
            default_minutes: 5,
            european_decimals: false,
        }
    }
}

impl PricingConfig {
    /// Clamp a minute count into the purchasable range.
    pub fn clamp_minutes(&self, minutes: i64) -> u32 {
        let lo = self.min_minutes.max(1);
        let hi = self.max_minutes.max(lo);
        minutes.clamp(lo as i64, hi as i64) as u32
    }

    pub fn seconds_for(&self, minutes: u32) -> u32 {
        minutes.saturating_mul(self.seconds_per_minute)
    }

    pub fn price_for(&self, minutes: u32) -> f64 {
        minutes as f64 * self.price_per_minute
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timing
// ─────────────────────────────────────────────────────────────────────────────

/// Countdown and handshake timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_millis: u64,
    /// Remaining seconds at which the low-time warning fires
    pub prepare_timeout_at_secs: i64,
    /// How long to wait for an extension confirmation before abandoning
    pub resume_wait_secs: u64,
    /// How long to wait for the new duration after a confirmation
    pub duration_wait_secs: u64,
    /// Granted when the new duration never arrives
    pub default_bonus_secs: i64,
    pub teardown_grace_millis: u64,
    pub launch_timeout_secs: u64,
    pub geometry_query_millis: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_millis: 1000,
            prepare_timeout_at_secs: 10,
            resume_wait_secs: 30,
            duration_wait_secs: 5,
            default_bonus_secs: 60,
            teardown_grace_millis: 100,
            launch_timeout_secs: 10,
            geometry_query_millis: 250,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Front-end / engine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub bind: String,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub frame_millis: u64,
    /// Window the engine opens when it has no better placement
    pub window: WindowGeometry,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frame_millis: 16,
            window: WindowGeometry::FALLBACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kiosk_toml() {
        let toml = r#"
[[game]]
name = "Super Mario Bros"
core_path = "/opt/cores/nestopia_libretro.so"
game_path = "/opt/games/smb.nes"
thumbnail_path = "/opt/thumbs/smb.png"

[[game]]
name = "Contra"
core_path = "/opt/cores/nestopia_libretro.so"
game_path = "/opt/games/contra.nes"

[pricing]
seconds_per_minute = 2
european_decimals = true

[timing]
resume_wait_secs = 45
"#;

        let config: KioskConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.games.len(), 2);
        assert_eq!(config.games[1].name, "Contra");
        assert!(config.games[1].thumbnail_path.is_none());
        assert_eq!(config.pricing.seconds_per_minute, 2);
        assert_eq!(config.pricing.price_per_minute, 0.5);
        assert!(config.pricing.european_decimals);
        assert_eq!(config.timing.resume_wait_secs, 45);
        assert_eq!(config.timing.duration_wait_secs, 5);
        assert_eq!(config.web.bind, "127.0.0.1:8080");
        assert_eq!(config.find_game("Contra"), Some(1));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: KioskConfig = toml::from_str("").unwrap();
        assert_eq!(config, KioskConfig::default());
        assert_eq!(config.engine.window, WindowGeometry::FALLBACK);
    }

    #[test]
    fn test_clamp_minutes() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.clamp_minutes(0), 1);
        assert_eq!(pricing.clamp_minutes(-5), 1);
        assert_eq!(pricing.clamp_minutes(30), 30);
        assert_eq!(pricing.clamp_minutes(61), 60);
    }

    #[test]
    fn test_seconds_and_price() {
        let pricing = PricingConfig {
            seconds_per_minute: 2,
            ..Default::default()
        };
        assert_eq!(pricing.seconds_for(5), 10);
        assert_eq!(pricing.price_for(5), 2.5);
    }
}
