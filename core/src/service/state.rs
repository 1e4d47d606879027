use coinop_types::formatting::{format_clock, format_cost_label, format_minutes};
use coinop_types::{KioskConfig, Phase, WindowGeometry};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::frontend::Machine;

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

/// Catalog entry as front-ends see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub index: usize,
    pub name: String,
    pub thumbnail: Option<String>,
}

/// Snapshot of the UI state broadcast after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiView {
    pub phase: Phase,
    pub prompt: &'static str,
    pub selected_game: usize,
    pub game_name: Option<String>,
    pub minutes: u32,
    pub minutes_label: String,
    pub seconds: u32,
    pub price: f64,
    pub price_label: String,
    pub session_loaded: bool,
    pub remaining_secs: Option<i64>,
    pub remaining_label: Option<String>,
    pub last_geometry: Option<WindowGeometry>,
}

impl UiView {
    pub fn new(machine: &Machine, config: &KioskConfig, remaining_secs: Option<i64>) -> Self {
        let state = machine.state();
        let price = machine.pricing().price_for(state.minutes);
        Self {
            phase: state.phase,
            prompt: state.phase.prompt(),
            selected_game: state.selected_game,
            game_name: config.game(state.selected_game).map(|g| g.name.clone()),
            minutes: state.minutes,
            minutes_label: format_minutes(state.minutes),
            seconds: machine.seconds(),
            price,
            price_label: format_cost_label(price, machine.pricing().european_decimals),
            session_loaded: state.session_loaded,
            remaining_secs,
            remaining_label: remaining_secs.map(format_clock),
            last_geometry: state.last_geometry,
        }
    }
}

pub fn catalog(config: &KioskConfig) -> Vec<GameInfo> {
    config
        .games
        .iter()
        .enumerate()
        .map(|(index, game)| GameInfo {
            index,
            name: game.name.clone(),
            thumbnail: game
                .thumbnail_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────────────────

/// State shared between the service task and its handles
pub struct SharedState {
    pub config: KioskConfig,
    pub games: Vec<GameInfo>,
    pub view: RwLock<UiView>,
}

impl SharedState {
    pub fn new(config: KioskConfig, machine: &Machine) -> Self {
        let view = UiView::new(machine, &config, None);
        Self {
            games: catalog(&config),
            config,
            view: RwLock::new(view),
        }
    }
}
