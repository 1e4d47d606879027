use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use super::state::{GameInfo, SharedState, UiView};
use super::{Notification, ServiceCommand};
use crate::error::SessionError;
use crate::frontend::Intent;

// ─────────────────────────────────────────────────────────────────────────────
// Service Handle (for front-ends)
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to communicate with the kiosk service and query state
#[derive(Clone)]
pub struct ServiceHandle {
    pub cmd_tx: mpsc::Sender<ServiceCommand>,
    pub shared: Arc<SharedState>,
    pub(super) notify_tx: broadcast::Sender<Notification>,
}

impl ServiceHandle {
    /// Submit a patron intent and wait for the service to apply it
    pub async fn send_intent(&self, intent: Intent) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(ServiceCommand::Intent(intent, reply_tx))
            .await
            .map_err(|_| SessionError::ServiceStopped)?;
        reply_rx.await.map_err(|_| SessionError::ServiceStopped)?
    }

    /// Credit extra minutes to the running session
    pub async fn add_minutes(&self, minutes: u32) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(ServiceCommand::AddMinutes(minutes, reply_tx))
            .await
            .map_err(|_| SessionError::ServiceStopped)?;
        reply_rx.await.map_err(|_| SessionError::ServiceStopped)?
    }

    /// Stop the service; an active session is torn down first
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.cmd_tx
            .send(ServiceCommand::Shutdown)
            .await
            .map_err(|_| SessionError::ServiceStopped)
    }

    /// Receive every notification broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    /// Get the current UI snapshot
    pub async fn snapshot(&self) -> UiView {
        self.shared.view.read().await.clone()
    }

    pub fn games(&self) -> &[GameInfo] {
        &self.shared.games
    }
}
