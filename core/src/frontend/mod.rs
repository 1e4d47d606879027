//! Front-end state machine.
//!
//! Shared by every front-end. Intents move the UI between phases and may
//! produce an [`Effect`] the service must carry out; session notifications
//! move it without asking.

use coinop_types::{Phase, PricingConfig, WindowGeometry};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

// ─────────────────────────────────────────────────────────────────────────────
// Intents and Effects
// ─────────────────────────────────────────────────────────────────────────────

/// What a patron asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Intent {
    SelectGame(usize),
    MoveSelection(i32),
    ConfirmSelection,
    AdjustTime(i32),
    SetTime(u32),
    ConfirmTime,
    Pay,
    /// Pay for the game and minutes the page picked itself
    PayFor {
        game: Option<usize>,
        minutes: Option<u32>,
    },
    Quit,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::SelectGame(_) => "selectGame",
            Intent::MoveSelection(_) => "moveSelection",
            Intent::ConfirmSelection => "confirmSelection",
            Intent::AdjustTime(_) => "adjustTime",
            Intent::SetTime(_) => "setTime",
            Intent::ConfirmTime => "confirmTime",
            Intent::Pay => "pay",
            Intent::PayFor { .. } => "payFor",
            Intent::Quit => "quit",
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start a new session for the game at this index
    Launch { game: usize, seconds: u32 },
    /// Pay for more time on the active session
    Extend { seconds: u32 },
    /// Tear the active session down
    Abandon,
}

// ─────────────────────────────────────────────────────────────────────────────
// UI State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub phase: Phase,
    pub selected_game: usize,
    pub minutes: u32,
    pub session_loaded: bool,
    /// Engine window geometry from the most recent timeout
    pub last_geometry: Option<WindowGeometry>,
}

#[derive(Debug, Clone)]
pub struct Machine {
    state: UiState,
    game_count: usize,
    pricing: PricingConfig,
}

impl Machine {
    pub fn new(game_count: usize, pricing: PricingConfig) -> Self {
        let minutes = pricing.clamp_minutes(pricing.default_minutes as i64);
        Self {
            state: UiState {
                minutes,
                ..UiState::default()
            },
            game_count,
            pricing,
        }
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Seconds the currently picked minutes buy.
    pub fn seconds(&self) -> u32 {
        self.pricing.seconds_for(self.state.minutes)
    }

    /// Apply a patron intent. Rejected intents leave the state untouched.
    pub fn apply(&mut self, intent: Intent) -> Result<Option<Effect>, TransitionError> {
        let phase = self.state.phase;
        let refuse = || TransitionError::NotAllowed {
            intent: intent.name(),
            phase,
        };

        match intent {
            Intent::SelectGame(index) => {
                if phase != Phase::SelectGame {
                    return Err(refuse());
                }
                self.check_game(index)?;
                self.state.selected_game = index;
                Ok(None)
            }
            Intent::MoveSelection(delta) => {
                if phase != Phase::SelectGame {
                    return Err(refuse());
                }
                if self.game_count == 0 {
                    return Err(TransitionError::NoGames);
                }
                let last = self.game_count as i64 - 1;
                let next = (self.state.selected_game as i64 + delta as i64).clamp(0, last);
                self.state.selected_game = next as usize;
                Ok(None)
            }
            Intent::ConfirmSelection => {
                if phase != Phase::SelectGame {
                    return Err(refuse());
                }
                self.check_game(self.state.selected_game)?;
                self.state.minutes = self.default_minutes();
                self.state.phase = Phase::TimeSelect;
                Ok(None)
            }
            Intent::AdjustTime(delta) => {
                if !phase.picks_time() {
                    return Err(refuse());
                }
                self.state.minutes = self
                    .pricing
                    .clamp_minutes(self.state.minutes as i64 + delta as i64);
                Ok(None)
            }
            Intent::SetTime(minutes) => {
                if !phase.picks_time() {
                    return Err(refuse());
                }
                self.state.minutes = self.pricing.clamp_minutes(minutes as i64);
                Ok(None)
            }
            Intent::ConfirmTime => {
                self.state.phase = match phase {
                    Phase::TimeSelect => Phase::Payment,
                    Phase::ExtendTime => Phase::ExtendPayment,
                    _ => return Err(refuse()),
                };
                Ok(None)
            }
            Intent::Pay => match phase {
                Phase::Payment => Ok(Some(self.begin_launch())),
                Phase::ExtendTime | Phase::ExtendPayment => Ok(Some(self.begin_extend())),
                _ => Err(refuse()),
            },
            Intent::PayFor { game, minutes } => match phase {
                Phase::Payment => {
                    if let Some(index) = game {
                        self.check_game(index)?;
                        self.state.selected_game = index;
                    }
                    if let Some(minutes) = minutes {
                        self.state.minutes = self.pricing.clamp_minutes(minutes as i64);
                    }
                    Ok(Some(self.begin_launch()))
                }
                Phase::ExtendTime | Phase::ExtendPayment => {
                    // An extension is always for the game already running
                    if let Some(index) = game.filter(|&i| i != self.state.selected_game) {
                        return Err(TransitionError::WrongGame {
                            requested: index,
                            playing: self.state.selected_game,
                        });
                    }
                    if let Some(minutes) = minutes {
                        self.state.minutes = self.pricing.clamp_minutes(minutes as i64);
                    }
                    Ok(Some(self.begin_extend()))
                }
                _ => Err(refuse()),
            },
            Intent::Quit => match phase {
                Phase::TimeSelect | Phase::Payment => {
                    self.state.phase = Phase::SelectGame;
                    Ok(None)
                }
                Phase::Playing | Phase::ExtendTime | Phase::ExtendPayment => {
                    self.reset();
                    Ok(Some(Effect::Abandon))
                }
                Phase::SelectGame => Err(refuse()),
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session notifications
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns whether anything changed.
    pub fn on_session_loaded(&mut self) -> bool {
        if !self.state.phase.has_session() || self.state.session_loaded {
            return false;
        }
        self.state.session_loaded = true;
        true
    }

    /// The countdown expired. Cannot be refused while playing.
    pub fn on_timeout(&mut self, geometry: WindowGeometry) -> bool {
        if self.state.phase != Phase::Playing {
            return false;
        }
        self.state.phase = Phase::ExtendTime;
        self.state.minutes = self.default_minutes();
        self.state.last_geometry = Some(geometry);
        true
    }

    pub fn on_resumed(&mut self) -> bool {
        match self.state.phase {
            Phase::ExtendTime | Phase::ExtendPayment => {
                self.state.phase = Phase::Playing;
                true
            }
            _ => false,
        }
    }

    /// Session torn down, or it never started.
    pub fn on_session_ended(&mut self) -> bool {
        if self.state.phase == Phase::SelectGame && !self.state.session_loaded {
            return false;
        }
        self.reset();
        true
    }

    fn begin_launch(&mut self) -> Effect {
        self.state.phase = Phase::Playing;
        self.state.session_loaded = false;
        self.state.last_geometry = None;
        Effect::Launch {
            game: self.state.selected_game,
            seconds: self.seconds(),
        }
    }

    fn begin_extend(&mut self) -> Effect {
        self.state.phase = Phase::Playing;
        Effect::Extend {
            seconds: self.seconds(),
        }
    }

    fn reset(&mut self) {
        self.state.phase = Phase::SelectGame;
        self.state.session_loaded = false;
        self.state.last_geometry = None;
        self.state.minutes = self.default_minutes();
    }

    fn default_minutes(&self) -> u32 {
        self.pricing
            .clamp_minutes(self.pricing.default_minutes as i64)
    }

    fn check_game(&self, index: usize) -> Result<(), TransitionError> {
        if self.game_count == 0 {
            return Err(TransitionError::NoGames);
        }
        if index >= self.game_count {
            return Err(TransitionError::InvalidGame {
                index,
                count: self.game_count,
            });
        }
        Ok(())
    }
}
