use serde::{Deserialize, Serialize};

/// Front-end UI phase.
///
/// ```text
/// SelectGame → TimeSelect → Payment → Playing ─(timeout)→ ExtendTime
///     ▲                                  ▲                    │
///     │                                  └── ExtendPayment ◄──┤
///     └────────────────────── quit ───────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    SelectGame,
    TimeSelect,
    Payment,
    Playing,
    ExtendTime,
    ExtendPayment,
}

impl Phase {
    /// Phases in which a session exists and the engine is loaded.
    pub fn has_session(self) -> bool {
        matches!(self, Phase::Playing | Phase::ExtendTime | Phase::ExtendPayment)
    }

    /// Phases that show the minute picker.
    pub fn picks_time(self) -> bool {
        matches!(self, Phase::TimeSelect | Phase::ExtendTime)
    }

    /// Short prompt shown by front-ends for this phase.
    pub fn prompt(self) -> &'static str {
        match self {
            Phase::SelectGame => "SELECT GAME    ENTER TO CONTINUE",
            Phase::TimeSelect => "SELECT TIME THEN ENTER",
            Phase::Payment => "PRESS X TO PAY",
            Phase::Playing => "GAME ACTIVE",
            Phase::ExtendTime => "TIME OUT! SELECT TIME THEN PRESS X TO PAY",
            Phase::ExtendPayment => "PRESS X TO PAY AND RESUME",
        }
    }
}
