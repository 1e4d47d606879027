//! Kiosk service.
//!
//! One task owns the front-end state machine and the active session. Every
//! front-end connection talks to it through a [`ServiceHandle`]; intents are
//! applied one at a time and each change is broadcast to all subscribers.

mod handle;
mod state;

use std::sync::Arc;
use std::time::Duration;

use coinop_types::{KioskConfig, WindowGeometry};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::CoreFactory;
use crate::error::SessionError;
use crate::frontend::{Effect, Intent, Machine};
use crate::session::{
    self, ActiveSession, LaunchRequest, SessionEndReason, SessionNotice, TimekeeperEvent,
};

pub use handle::ServiceHandle;
pub use state::{GameInfo, SharedState, UiView, catalog};

/// Upper bound on waiting for a quit session to finish tearing down.
const ABANDON_WAIT: Duration = Duration::from_secs(5);
const NOTIFY_CAPACITY: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Commands and Notifications
// ─────────────────────────────────────────────────────────────────────────────

pub enum ServiceCommand {
    Intent(Intent, oneshot::Sender<Result<(), SessionError>>),
    AddMinutes(u32, oneshot::Sender<Result<(), SessionError>>),
    Shutdown,
}

/// Broadcast to every front-end connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Notification {
    State(UiView),
    SessionLoaded,
    PrepareTimeout { remaining_secs: i64 },
    Timeout(WindowGeometry),
    SessionResumed { remaining_secs: i64 },
    SessionEnded { reason: SessionEndReason },
    Error { message: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Spawn the service task on the current runtime.
pub fn start(config: KioskConfig, factory: Arc<dyn CoreFactory>) -> (ServiceHandle, JoinHandle<()>) {
    let machine = Machine::new(config.games.len(), config.pricing.clone());
    let shared = Arc::new(SharedState::new(config, &machine));
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (notify_tx, _) = broadcast::channel(NOTIFY_CAPACITY);
    let (notices_tx, notices_rx) = mpsc::unbounded_channel();

    let service = KioskService {
        machine,
        shared: Arc::clone(&shared),
        factory,
        session: None,
        cmd_rx,
        notices_tx,
        notices_rx,
        notify_tx: notify_tx.clone(),
    };
    let task = tokio::spawn(service.run());

    let handle = ServiceHandle {
        cmd_tx,
        shared,
        notify_tx,
    };
    (handle, task)
}

struct KioskService {
    machine: Machine,
    shared: Arc<SharedState>,
    factory: Arc<dyn CoreFactory>,
    session: Option<ActiveSession>,
    cmd_rx: mpsc::Receiver<ServiceCommand>,
    notices_tx: mpsc::UnboundedSender<SessionNotice>,
    notices_rx: mpsc::UnboundedReceiver<SessionNotice>,
    notify_tx: broadcast::Sender<Notification>,
}

impl KioskService {
    async fn run(mut self) {
        info!(games = self.shared.games.len(), "Kiosk service started");

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ServiceCommand::Intent(intent, reply)) => {
                        let result = self.handle_intent(intent).await;
                        let _ = reply.send(result);
                    }
                    Some(ServiceCommand::AddMinutes(minutes, reply)) => {
                        let result = self.add_minutes(minutes).await;
                        let _ = reply.send(result);
                    }
                    Some(ServiceCommand::Shutdown) | None => break,
                },
                Some(notice) = self.notices_rx.recv() => self.handle_notice(notice).await,
            }
        }

        self.end_session().await;
        info!("Kiosk service stopped");
    }

    async fn handle_intent(&mut self, intent: Intent) -> Result<(), SessionError> {
        let effect = match self.machine.apply(intent) {
            Ok(effect) => effect,
            Err(e) => {
                debug!(error = %e, "Intent refused");
                return Err(e.into());
            }
        };

        let result = match effect {
            Some(effect) => self.execute(effect).await,
            None => Ok(()),
        };
        if let Err(e) = &result {
            self.broadcast(Notification::Error {
                message: e.to_string(),
            });
        }
        self.publish_state().await;
        result
    }

    async fn execute(&mut self, effect: Effect) -> Result<(), SessionError> {
        match effect {
            Effect::Launch { game, seconds } => {
                let result = self.launch(game, seconds).await;
                if result.is_err() {
                    // Launch failures return to selection once, no retry
                    self.machine.on_session_ended();
                }
                result
            }
            Effect::Extend { seconds } => {
                let Some(session) = &self.session else {
                    self.machine.on_session_ended();
                    return Err(SessionError::NoSession);
                };
                info!(session = %session.id(), seconds, "Extension paid");
                session.extend(seconds).await
            }
            Effect::Abandon => {
                self.end_session().await;
                Ok(())
            }
        }
    }

    async fn launch(&mut self, game: usize, seconds: u32) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        let entry = self
            .shared
            .config
            .game(game)
            .ok_or(SessionError::UnknownGame(game))?;

        let request = LaunchRequest::for_game(entry, seconds);
        match session::launch(
            request,
            Arc::clone(&self.factory),
            &self.shared.config,
            self.notices_tx.clone(),
        )
        .await
        {
            Ok(active) => {
                self.session = Some(active);
                Ok(())
            }
            Err(e) => {
                error!(game = %entry.name, error = %e, "Failed to launch session");
                Err(e)
            }
        }
    }

    async fn add_minutes(&mut self, minutes: u32) -> Result<(), SessionError> {
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        let seconds = self.shared.config.pricing.seconds_for(minutes);
        session.add_time(seconds).await?;
        self.publish_state().await;
        Ok(())
    }

    /// Quit the active session and wait for its teardown.
    async fn end_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let id = session.id();
        let played_secs = session.session().played().num_seconds();
        session.quit();
        match tokio::time::timeout(ABANDON_WAIT, session.finished()).await {
            Ok(reason) => {
                info!(session = %id, ?reason, played_secs, "Session torn down");
                self.broadcast(Notification::SessionEnded { reason });
            }
            Err(_) => warn!(session = %id, "Session teardown still running"),
        }
    }

    /// Snapshot is published before the event so readers reacting to the
    /// event already see the new phase.
    async fn handle_notice(&mut self, notice: SessionNotice) {
        let current = self.session.as_ref().map(|s| s.id());

        match notice {
            SessionNotice::Timekeeper { session, event } => {
                if current != Some(session) {
                    debug!(%session, ?event, "Event from a retired session");
                    return;
                }
                let notification = match event {
                    TimekeeperEvent::SessionLoaded => {
                        self.machine.on_session_loaded();
                        Notification::SessionLoaded
                    }
                    TimekeeperEvent::PrepareTimeout { remaining_secs } => {
                        Notification::PrepareTimeout { remaining_secs }
                    }
                    TimekeeperEvent::Timeout { geometry } => {
                        self.machine.on_timeout(geometry);
                        Notification::Timeout(geometry)
                    }
                    TimekeeperEvent::Resumed { remaining_secs } => {
                        self.machine.on_resumed();
                        Notification::SessionResumed { remaining_secs }
                    }
                };
                self.publish_state().await;
                self.broadcast(notification);
            }
            SessionNotice::Ended { session, reason } => {
                if current != Some(session) {
                    debug!(%session, ?reason, "Retired session finished");
                    return;
                }
                if let Some(active) = self.session.take() {
                    let played_secs = active.session().played().num_seconds();
                    info!(%session, ?reason, played_secs, "Session ended");
                }
                self.machine.on_session_ended();
                self.publish_state().await;
                self.broadcast(Notification::SessionEnded { reason });
            }
        }
    }

    async fn publish_state(&self) {
        let remaining = self.session.as_ref().map(|s| s.remaining_secs());
        let view = UiView::new(&self.machine, &self.shared.config, remaining);
        *self.shared.view.write().await = view.clone();
        self.broadcast(Notification::State(view));
    }

    fn broadcast(&self, notification: Notification) {
        // No subscribers is fine; front-ends may not have connected yet
        let _ = self.notify_tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::host::test_support::{CoreScript, scripted_factory};
    use crate::error::{EngineError, TransitionError};
    use coinop_types::{GameEntry, Phase};
    use std::sync::atomic::Ordering;

    fn config(seconds_per_minute: u32) -> KioskConfig {
        let mut config = KioskConfig::default();
        config.games.push(GameEntry {
            name: "Nova".into(),
            core_path: "core.so".into(),
            game_path: "nova.nes".into(),
            thumbnail_path: None,
        });
        config.pricing.seconds_per_minute = seconds_per_minute;
        config.engine.frame_millis = 2;
        config.timing.tick_millis = 10;
        config.timing.resume_wait_secs = 2;
        config.timing.duration_wait_secs = 1;
        config.timing.launch_timeout_secs = 2;
        config
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<Notification>,
        pred: impl Fn(&Notification) -> bool,
    ) -> Notification {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(n) if pred(&n) => return n,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => panic!("service closed"),
                }
            }
        })
        .await
        .expect("notification within timeout")
    }

    async fn pay_for_game(handle: &ServiceHandle) {
        handle.send_intent(Intent::ConfirmSelection).await.unwrap();
        handle.send_intent(Intent::ConfirmTime).await.unwrap();
        handle.send_intent(Intent::Pay).await.unwrap();
    }

    #[tokio::test]
    async fn test_launch_then_quit() {
        let script = Arc::new(CoreScript::default());
        let (handle, task) = start(
            config(60),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
        );
        let mut rx = handle.subscribe();

        pay_for_game(&handle).await;
        wait_for(&mut rx, |n| *n == Notification::SessionLoaded).await;
        let view = handle.snapshot().await;
        assert_eq!(view.phase, Phase::Playing);

        handle.send_intent(Intent::Quit).await.unwrap();
        assert_eq!(handle.snapshot().await.phase, Phase::SelectGame);
        assert!(script.unloaded.load(Ordering::SeqCst));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_intent_reports_error() {
        let script = Arc::new(CoreScript::default());
        let (handle, _task) = start(config(60), scripted_factory(script, WindowGeometry::FALLBACK));

        let err = handle.send_intent(Intent::Pay).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transition(TransitionError::NotAllowed { .. })
        ));
        assert_eq!(handle.games().len(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_returns_to_selection() {
        let script = Arc::new(CoreScript::default());
        *script.fail_load.lock().unwrap() = Some("bad core".into());
        let (handle, _task) = start(config(60), scripted_factory(script, WindowGeometry::FALLBACK));
        let mut rx = handle.subscribe();

        handle.send_intent(Intent::ConfirmSelection).await.unwrap();
        handle.send_intent(Intent::ConfirmTime).await.unwrap();
        let err = handle.send_intent(Intent::Pay).await.unwrap_err();

        assert!(matches!(err, SessionError::Engine(EngineError::LoadCore { .. })));
        wait_for(&mut rx, |n| matches!(n, Notification::Error { .. })).await;
        assert_eq!(handle.snapshot().await.phase, Phase::SelectGame);
    }

    #[tokio::test]
    async fn test_timeout_moves_to_extend_and_payment_resumes() {
        let script = Arc::new(CoreScript::default());
        let geometry = WindowGeometry::new(3, 4, 500, 400);
        // One "minute" buys a single second
        let (handle, _task) = start(config(1), scripted_factory(script, geometry));
        let mut rx = handle.subscribe();

        handle.send_intent(Intent::ConfirmSelection).await.unwrap();
        handle.send_intent(Intent::SetTime(1)).await.unwrap();
        handle.send_intent(Intent::ConfirmTime).await.unwrap();
        handle.send_intent(Intent::Pay).await.unwrap();

        let timeout = wait_for(&mut rx, |n| matches!(n, Notification::Timeout(_))).await;
        assert_eq!(timeout, Notification::Timeout(geometry));
        let view = handle.snapshot().await;
        assert_eq!(view.phase, Phase::ExtendTime);
        assert_eq!(view.last_geometry, Some(geometry));

        handle.send_intent(Intent::SetTime(60)).await.unwrap();
        handle.send_intent(Intent::Pay).await.unwrap();
        let resumed = wait_for(&mut rx, |n| matches!(n, Notification::SessionResumed { .. })).await;
        assert_eq!(resumed, Notification::SessionResumed { remaining_secs: 60 });
        assert_eq!(handle.snapshot().await.phase, Phase::Playing);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_window_close_ends_session() {
        let script = Arc::new(CoreScript::default());
        let (handle, _task) = start(
            config(60),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
        );
        let mut rx = handle.subscribe();

        pay_for_game(&handle).await;
        wait_for(&mut rx, |n| *n == Notification::SessionLoaded).await;
        handle.add_minutes(1).await.unwrap();

        script.close_window.store(true, Ordering::SeqCst);
        let ended = wait_for(&mut rx, |n| matches!(n, Notification::SessionEnded { .. })).await;
        assert_eq!(
            ended,
            Notification::SessionEnded {
                reason: SessionEndReason::WindowClosed
            }
        );
        assert_eq!(handle.snapshot().await.phase, Phase::SelectGame);
        assert!(matches!(
            handle.add_minutes(1).await,
            Err(SessionError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_frame_panic_returns_to_selection() {
        let script = Arc::new(CoreScript::default());
        let (handle, task) = start(
            config(60),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
        );
        let mut rx = handle.subscribe();

        pay_for_game(&handle).await;
        wait_for(&mut rx, |n| *n == Notification::SessionLoaded).await;

        script.panic_next_frame.store(true, Ordering::SeqCst);
        let ended = wait_for(&mut rx, |n| matches!(n, Notification::SessionEnded { .. })).await;
        assert_eq!(
            ended,
            Notification::SessionEnded {
                reason: SessionEndReason::EngineCrashed("scripted frame panic".into())
            }
        );
        assert_eq!(handle.snapshot().await.phase, Phase::SelectGame);
        assert!(script.unloaded.load(Ordering::SeqCst));

        // The kiosk takes a new game afterwards
        pay_for_game(&handle).await;
        wait_for(&mut rx, |n| *n == Notification::SessionLoaded).await;
        assert_eq!(handle.snapshot().await.phase, Phase::Playing);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_notification_json() {
        let json = serde_json::to_value(Notification::Timeout(WindowGeometry::new(1, 2, 3, 4))).unwrap();
        assert_eq!(json["type"], "timeout");
        assert_eq!(json["payload"]["x"], 1);
        assert_eq!(json["payload"]["height"], 4);

        let json = serde_json::to_value(Notification::PrepareTimeout { remaining_secs: 10 }).unwrap();
        assert_eq!(json["type"], "prepareTimeout");
        assert_eq!(json["payload"]["remainingSecs"], 10);

        let json = serde_json::to_value(Notification::SessionLoaded).unwrap();
        assert_eq!(json["type"], "sessionLoaded");
    }
}
