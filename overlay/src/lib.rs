//! Timer badge rendering for the kiosk engine window.
//!
//! The engine thread calls [`TimerBadge::render`] once per frame with the
//! current [`OverlaySnapshot`](coinop_core::OverlaySnapshot); the badge is
//! drawn straight into the frame's RGBA buffer with tiny-skia.

pub mod badge;
pub mod colors;
mod segments;

pub use badge::{BadgeLayout, TimerBadge};
