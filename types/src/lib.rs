//! Shared types for COINOP.
//!
//! Everything here is plain serde data used by the core, the overlay renderer
//! and the front-ends. No behavior beyond small helpers lives in this crate.

pub mod config;
pub mod formatting;

mod geometry;
mod phase;

pub use config::{
    EngineSettings, GameEntry, KioskConfig, PricingConfig, TimingConfig, WebSettings,
};
pub use geometry::WindowGeometry;
pub use phase::Phase;
