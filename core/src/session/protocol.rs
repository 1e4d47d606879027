//! Session channel protocol.
//!
//! Two directions, each a single typed channel:
//!
//! ```text
//!  front-end ──ControlMessage──▶ timekeeper
//!  front-end ◀─TimekeeperEvent── timekeeper
//! ```
//!
//! Window geometry rides inside [`TimekeeperEvent::Timeout`], so nothing can
//! interleave with it. An extension is the ordered pair
//! `ConfirmExtension(true)` then `Duration(secs)` on the same channel; FIFO
//! delivery keeps them in order.

use coinop_types::WindowGeometry;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Messages from the front-end to the timekeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Purchased seconds. Added to the countdown while active; the new leg
    /// length when it follows a confirmation.
    Duration(u32),
    /// Payment outcome for an extension after a timeout.
    ConfirmExtension(bool),
}

/// Notifications from the timekeeper to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum TimekeeperEvent {
    /// Emitted once before the first tick
    SessionLoaded,
    /// Remaining time reached the warning threshold
    PrepareTimeout { remaining_secs: i64 },
    /// Countdown expired; engine is paused
    Timeout { geometry: WindowGeometry },
    /// An extension was applied and the engine unpaused
    Resumed { remaining_secs: i64 },
}

/// Channel capacity for control messages.
pub const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// Front-end side of the control channel.
#[derive(Debug, Clone)]
pub struct SessionLink {
    tx: mpsc::Sender<ControlMessage>,
}

impl SessionLink {
    pub fn new(tx: mpsc::Sender<ControlMessage>) -> Self {
        Self { tx }
    }

    /// Create a linked pair of sender helper and timekeeper-side receiver.
    pub fn channel() -> (Self, mpsc::Receiver<ControlMessage>) {
        let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }

    /// Top up an active session.
    pub async fn add_time(&self, secs: u32) -> Result<(), SessionError> {
        self.send(ControlMessage::Duration(secs)).await
    }

    /// Confirm a paid extension, then send its duration.
    pub async fn confirm_extension(&self, secs: u32) -> Result<(), SessionError> {
        self.send(ControlMessage::ConfirmExtension(true)).await?;
        self.send(ControlMessage::Duration(secs)).await
    }

    /// Tell a waiting timekeeper that no extension is coming.
    pub async fn decline_extension(&self) -> Result<(), SessionError> {
        self.send(ControlMessage::ConfirmExtension(false)).await
    }

    async fn send(&self, msg: ControlMessage) -> Result<(), SessionError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_confirm_extension_sends_ordered_pair() {
        let (link, mut rx) = SessionLink::channel();
        link.confirm_extension(45).await.unwrap();

        assert_eq!(rx.recv().await, Some(ControlMessage::ConfirmExtension(true)));
        assert_eq!(rx.recv().await, Some(ControlMessage::Duration(45)));
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (link, rx) = SessionLink::channel();
        drop(rx);
        assert!(matches!(
            link.add_time(10).await,
            Err(SessionError::ChannelClosed)
        ));
    }

    #[test]
    fn test_timeout_event_json() {
        let event = TimekeeperEvent::Timeout {
            geometry: WindowGeometry::new(10, 20, 640, 480),
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["type"], "timeout");
        assert_eq!(json["payload"]["geometry"]["width"], 640);
    }
}
