//! Messages the kiosk page sends over the websocket.
//!
//! Frames are `{"type": ..., "payload": ...}`. Each message expands to the
//! intents the service applies in order.

use coinop_core::Intent;
use coinop_types::KioskConfig;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Pick a game (by index or by name) and move on to the minute picker
    SelectGame(GameRef),
    MoveSelection(i32),
    ConfirmSelection,
    AdjustTime(i32),
    SetTime(u32),
    /// Confirm the minute picker, optionally setting the minutes first
    SelectTime(Option<u32>),
    /// Pay, optionally naming the game and minutes the page picked
    Payment(Option<PaymentPayload>),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GameRef {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub minutes: Option<u32>,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("invalid message: {e}"))
    }

    /// Expand into intents. Game names resolve against the catalog.
    pub fn intents(&self, config: &KioskConfig) -> Result<Vec<Intent>, String> {
        let intents = match self {
            ClientMessage::SelectGame(game) => {
                let index = match game {
                    GameRef::Index(index) => *index,
                    GameRef::Name(name) => resolve(config, name)?,
                };
                vec![Intent::SelectGame(index), Intent::ConfirmSelection]
            }
            ClientMessage::MoveSelection(delta) => vec![Intent::MoveSelection(*delta)],
            ClientMessage::ConfirmSelection => vec![Intent::ConfirmSelection],
            ClientMessage::AdjustTime(delta) => vec![Intent::AdjustTime(*delta)],
            ClientMessage::SetTime(minutes) => vec![Intent::SetTime(*minutes)],
            ClientMessage::SelectTime(minutes) => {
                let mut out: Vec<Intent> = minutes.map(Intent::SetTime).into_iter().collect();
                out.push(Intent::ConfirmTime);
                out
            }
            ClientMessage::Payment(Some(PaymentPayload { game_name, minutes }))
                if game_name.is_some() || minutes.is_some() =>
            {
                let game = game_name
                    .as_deref()
                    .map(|name| resolve(config, name))
                    .transpose()?;
                vec![Intent::PayFor {
                    game,
                    minutes: *minutes,
                }]
            }
            ClientMessage::Payment(_) => vec![Intent::Pay],
            ClientMessage::Quit => vec![Intent::Quit],
        };
        Ok(intents)
    }
}

fn resolve(config: &KioskConfig, name: &str) -> Result<usize, String> {
    config
        .find_game(name)
        .ok_or_else(|| format!("unknown game {name:?}"))
}
