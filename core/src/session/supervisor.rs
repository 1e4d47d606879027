//! Session launch and teardown.
//!
//! A session is three concurrently running pieces: the engine thread, the
//! timekeeper task, and a supervisor task that watches both. Whichever ends
//! first (engine window closed, timekeeper exit, explicit quit) triggers the
//! same ordered teardown:
//!
//! 1. stop the timekeeper and give it a short grace period
//! 2. shut the engine down and join its thread
//! 3. hide the overlay
//! 4. report [`SessionNotice::Ended`]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use coinop_types::{GameEntry, KioskConfig};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DoneSignal, OverlayState, Session, SessionId, SessionLink, TimekeeperEvent};
use crate::engine::{CoreFactory, EngineExit, EngineHandle, PauseFlag, spawn_engine};
use crate::error::{EngineError, SessionError};
use crate::timekeeper::{Timekeeper, TimekeeperConfig, TimekeeperExit, TimekeeperHandle};

// ─────────────────────────────────────────────────────────────────────────────
// Requests and Notices
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to start one session.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub game_id: String,
    pub core_path: PathBuf,
    pub game_path: PathBuf,
    pub seconds: u32,
}

impl LaunchRequest {
    pub fn for_game(game: &GameEntry, seconds: u32) -> Self {
        Self {
            game_id: game.name.clone(),
            core_path: game.core_path.clone(),
            game_path: game.game_path.clone(),
            seconds,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum SessionEndReason {
    /// The patron or operator quit
    Quit,
    /// The engine window was closed
    WindowClosed,
    /// The engine panicked or lost its thread
    EngineCrashed(String),
    /// No extension was confirmed in time
    Abandoned,
    /// The patron declined to extend
    Declined,
    /// The front-end dropped its control link
    Disconnected,
}

impl From<TimekeeperExit> for SessionEndReason {
    fn from(exit: TimekeeperExit) -> Self {
        match exit {
            TimekeeperExit::Stopped => SessionEndReason::Quit,
            TimekeeperExit::Abandoned => SessionEndReason::Abandoned,
            TimekeeperExit::Declined => SessionEndReason::Declined,
            TimekeeperExit::Disconnected => SessionEndReason::Disconnected,
        }
    }
}

impl From<EngineExit> for SessionEndReason {
    fn from(exit: EngineExit) -> Self {
        match exit {
            EngineExit::WindowClosed => SessionEndReason::WindowClosed,
            EngineExit::Shutdown => SessionEndReason::Quit,
            EngineExit::LoadFailed(msg) | EngineExit::Crashed(msg) => SessionEndReason::EngineCrashed(msg),
        }
    }
}

/// Notifications from a running session to whoever launched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    Timekeeper {
        session: SessionId,
        event: TimekeeperEvent,
    },
    Ended {
        session: SessionId,
        reason: SessionEndReason,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Active Session
// ─────────────────────────────────────────────────────────────────────────────

/// A launched session. Dropping it disconnects the control link, which ends
/// the session through the normal teardown path.
pub struct ActiveSession {
    session: Session,
    link: SessionLink,
    quit: DoneSignal,
    overlay: OverlayState,
    task: JoinHandle<SessionEndReason>,
}

impl ActiveSession {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn id(&self) -> SessionId {
        self.session.id
    }

    /// Countdown value as last published to the overlay.
    pub fn remaining_secs(&self) -> i64 {
        self.overlay.snapshot().remaining_secs
    }

    /// Top up a running countdown.
    pub async fn add_time(&self, secs: u32) -> Result<(), SessionError> {
        self.link.add_time(secs).await
    }

    /// Pay for an extension after a timeout.
    pub async fn extend(&self, secs: u32) -> Result<(), SessionError> {
        self.link.confirm_extension(secs).await
    }

    pub async fn decline(&self) -> Result<(), SessionError> {
        self.link.decline_extension().await
    }

    /// Request teardown. Idempotent.
    pub fn quit(&self) {
        self.quit.close();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for teardown to complete.
    pub async fn finished(self) -> SessionEndReason {
        match self.task.await {
            Ok(reason) => reason,
            Err(e) => {
                error!(error = %e, "Session supervisor failed");
                SessionEndReason::EngineCrashed(e.to_string())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Launch
// ─────────────────────────────────────────────────────────────────────────────

/// Start the engine, wait for it to load, then start the timekeeper and its
/// supervisor. The countdown only begins once the game is running.
pub async fn launch(
    request: LaunchRequest,
    factory: Arc<dyn CoreFactory>,
    config: &KioskConfig,
    notices: mpsc::UnboundedSender<SessionNotice>,
) -> Result<ActiveSession, SessionError> {
    let session = Session::new(
        request.game_id,
        request.core_path,
        request.game_path,
        request.seconds,
    );
    info!(
        session = %session.id,
        game = %session.game_id,
        seconds = session.allotted_secs,
        "Launching session"
    );

    let overlay = OverlayState::new();
    let pause = PauseFlag::new();
    let mut engine = spawn_engine(
        factory,
        session.core_path.clone(),
        session.game_path.clone(),
        overlay.clone(),
        pause.clone(),
        Duration::from_millis(config.engine.frame_millis.max(1)),
    )?;

    let launch_timeout = config.timing.launch_timeout_secs;
    let ready = tokio::time::timeout(Duration::from_secs(launch_timeout), &mut engine.ready).await;
    match ready {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => {
            warn!(session = %session.id, error = %e, "Engine failed to load");
            engine.shutdown().await;
            return Err(e.into());
        }
        Ok(Err(_)) => {
            engine.shutdown().await;
            return Err(EngineError::Gone.into());
        }
        Err(_) => {
            warn!(session = %session.id, launch_timeout, "Engine did not become ready");
            // The thread may be stuck in load; join it off the caller's path
            tokio::spawn(engine.shutdown());
            return Err(EngineError::LaunchTimeout(launch_timeout).into());
        }
    }

    let tk_config = TimekeeperConfig::from(&config.timing);
    let (link, control_rx) = SessionLink::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let timekeeper = Timekeeper::new(
        session.id,
        tk_config.clone(),
        engine.link(pause.clone(), tk_config.geometry_wait),
        overlay.clone(),
        control_rx,
        events_tx,
        session.allotted_secs,
    )
    .spawn();

    let quit = DoneSignal::new();
    let supervisor = Supervisor {
        session: session.id,
        engine,
        timekeeper,
        events: events_rx,
        quit: quit.clone(),
        notices,
        overlay: overlay.clone(),
        pause,
        teardown_grace: Duration::from_millis(config.timing.teardown_grace_millis),
    };
    let task = tokio::spawn(supervisor.run());

    Ok(ActiveSession {
        session,
        link,
        quit,
        overlay,
        task,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

struct Supervisor {
    session: SessionId,
    engine: EngineHandle,
    timekeeper: TimekeeperHandle,
    events: mpsc::UnboundedReceiver<TimekeeperEvent>,
    quit: DoneSignal,
    notices: mpsc::UnboundedSender<SessionNotice>,
    overlay: OverlayState,
    pause: PauseFlag,
    teardown_grace: Duration,
}

impl Supervisor {
    async fn run(mut self) -> SessionEndReason {
        let quit = self.quit.clone();
        let reason = loop {
            tokio::select! {
                biased;
                _ = quit.closed() => break SessionEndReason::Quit,
                exit = &mut self.engine.exited => break match exit {
                    Ok(exit) => SessionEndReason::from(exit),
                    Err(_) => SessionEndReason::EngineCrashed("engine thread vanished".into()),
                },
                exit = self.timekeeper.wait() => break SessionEndReason::from(exit),
                Some(event) = self.events.recv() => self.forward(event),
            }
        };

        info!(session = %self.session, ?reason, "Session ending");
        self.teardown(reason).await
    }

    async fn teardown(mut self, reason: SessionEndReason) -> SessionEndReason {
        self.timekeeper.stop();
        if tokio::time::timeout(self.teardown_grace, self.timekeeper.wait())
            .await
            .is_err()
        {
            warn!(session = %self.session, "Timekeeper did not stop within grace period");
        }

        // Flush what the timekeeper emitted before it stopped
        while let Ok(event) = self.events.try_recv() {
            self.forward(event);
        }

        self.pause.set(false);
        let exit = self.engine.shutdown().await;
        if exit.is_abnormal() {
            warn!(session = %self.session, ?exit, "Engine stopped abnormally");
        } else {
            debug!(session = %self.session, ?exit, "Engine joined");
        }
        self.overlay.hide();

        let notice = SessionNotice::Ended {
            session: self.session,
            reason: reason.clone(),
        };
        if self.notices.send(notice).is_err() {
            debug!(session = %self.session, "Session end notice dropped, no listener");
        }
        reason
    }

    fn forward(&self, event: TimekeeperEvent) {
        let notice = SessionNotice::Timekeeper {
            session: self.session,
            event,
        };
        if self.notices.send(notice).is_err() {
            debug!(session = %self.session, "Session notice dropped, no listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::host::test_support::{CoreScript, scripted_factory};
    use coinop_types::WindowGeometry;
    use std::sync::atomic::Ordering;

    fn fast_config() -> KioskConfig {
        let mut config = KioskConfig::default();
        config.engine.frame_millis = 2;
        config.timing.tick_millis = 20;
        config.timing.resume_wait_secs = 1;
        config.timing.duration_wait_secs = 1;
        config.timing.teardown_grace_millis = 100;
        config.timing.launch_timeout_secs = 2;
        config.timing.geometry_query_millis = 200;
        config
    }

    fn request(seconds: u32) -> LaunchRequest {
        LaunchRequest {
            game_id: "Nova".into(),
            core_path: "core.so".into(),
            game_path: "nova.nes".into(),
            seconds,
        }
    }

    async fn next_notice(rx: &mut mpsc::UnboundedReceiver<SessionNotice>) -> SessionNotice {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("notice within timeout")
            .expect("notice channel open")
    }

    async fn wait_for_end(rx: &mut mpsc::UnboundedReceiver<SessionNotice>) -> SessionEndReason {
        loop {
            if let SessionNotice::Ended { reason, .. } = next_notice(rx).await {
                return reason;
            }
        }
    }

    #[tokio::test]
    async fn test_launch_loads_then_quit_tears_down() {
        let script = Arc::new(CoreScript::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let active = launch(
            request(30),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
            &fast_config(),
            tx,
        )
        .await
        .unwrap();

        assert!(matches!(
            next_notice(&mut rx).await,
            SessionNotice::Timekeeper {
                event: TimekeeperEvent::SessionLoaded,
                ..
            }
        ));
        assert_eq!(active.session().game_id, "Nova");

        active.quit();
        active.quit();
        assert_eq!(wait_for_end(&mut rx).await, SessionEndReason::Quit);
        assert!(script.unloaded.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_load_failure_returns_error() {
        let script = Arc::new(CoreScript::default());
        *script.fail_load.lock().unwrap() = Some("bad core".into());
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = launch(
            request(30),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
            &fast_config(),
            tx,
        )
        .await;

        assert!(matches!(
            result,
            Err(SessionError::Engine(EngineError::LoadCore { .. }))
        ));
    }

    #[tokio::test]
    async fn test_window_close_ends_session() {
        let script = Arc::new(CoreScript::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let active = launch(
            request(30),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
            &fast_config(),
            tx,
        )
        .await
        .unwrap();

        script.close_window.store(true, Ordering::SeqCst);
        assert_eq!(wait_for_end(&mut rx).await, SessionEndReason::WindowClosed);
        assert_eq!(active.finished().await, SessionEndReason::WindowClosed);
    }

    #[tokio::test]
    async fn test_timeout_then_abandon_hides_overlay() {
        let script = Arc::new(CoreScript::default());
        let geometry = WindowGeometry::new(1, 2, 300, 200);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let active = launch(
            request(2),
            scripted_factory(Arc::clone(&script), geometry),
            &fast_config(),
            tx,
        )
        .await
        .unwrap();

        let mut saw_timeout = false;
        let reason = loop {
            match next_notice(&mut rx).await {
                SessionNotice::Timekeeper {
                    event: TimekeeperEvent::Timeout { geometry: g },
                    ..
                } => {
                    assert_eq!(g, geometry);
                    saw_timeout = true;
                }
                SessionNotice::Ended { reason, .. } => break reason,
                _ => {}
            }
        };

        assert!(saw_timeout);
        assert_eq!(reason, SessionEndReason::Abandoned);
        assert!(script.paused_frames.load(Ordering::SeqCst) > 0);
        assert!(!active.overlay.snapshot().visible);
    }

    #[tokio::test]
    async fn test_extension_keeps_session_running() {
        let script = Arc::new(CoreScript::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let active = launch(
            request(1),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
            &fast_config(),
            tx,
        )
        .await
        .unwrap();

        loop {
            if let SessionNotice::Timekeeper {
                event: TimekeeperEvent::Timeout { .. },
                ..
            } = next_notice(&mut rx).await
            {
                break;
            }
        }

        active.extend(500).await.unwrap();
        assert_eq!(
            next_notice(&mut rx).await,
            SessionNotice::Timekeeper {
                session: active.id(),
                event: TimekeeperEvent::Resumed { remaining_secs: 500 },
            }
        );
        assert!(!active.is_finished());

        active.quit();
        assert_eq!(active.finished().await, SessionEndReason::Quit);
    }

    #[tokio::test]
    async fn test_decline_after_timeout() {
        let script = Arc::new(CoreScript::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let active = launch(
            request(1),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
            &fast_config(),
            tx,
        )
        .await
        .unwrap();

        loop {
            if let SessionNotice::Timekeeper {
                event: TimekeeperEvent::Timeout { .. },
                ..
            } = next_notice(&mut rx).await
            {
                break;
            }
        }

        active.decline().await.unwrap();
        assert_eq!(wait_for_end(&mut rx).await, SessionEndReason::Declined);
        assert!(script.unloaded.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_frame_panic_tears_down_session() {
        let script = Arc::new(CoreScript::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let active = launch(
            request(30),
            scripted_factory(Arc::clone(&script), WindowGeometry::FALLBACK),
            &fast_config(),
            tx,
        )
        .await
        .unwrap();

        script.panic_next_frame.store(true, Ordering::SeqCst);
        assert_eq!(
            wait_for_end(&mut rx).await,
            SessionEndReason::EngineCrashed("scripted frame panic".into())
        );
        assert!(script.unloaded.load(Ordering::SeqCst));
        assert!(!active.overlay.snapshot().visible);
        assert!(matches!(active.finished().await, SessionEndReason::EngineCrashed(_)));
    }

    #[test]
    fn test_end_reason_json() {
        let json = serde_json::to_value(SessionEndReason::EngineCrashed("boom".into())).unwrap();
        assert_eq!(json["kind"], "engineCrashed");
        assert_eq!(json["detail"], "boom");
        let json = serde_json::to_value(SessionEndReason::Quit).unwrap();
        assert_eq!(json["kind"], "quit");
    }
}
