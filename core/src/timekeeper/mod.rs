//! Session timekeeper.
//!
//! Owns the authoritative countdown for one session and drives the
//! extension handshake. Runs as a single tokio task with one exit path;
//! every suspension point races the session's [`DoneSignal`].
//!
//! ```text
//!            tick (remaining -= 1)
//!   Active ───────────────────────────┐
//!     ▲  remaining == 10 → PrepareTimeout (once per leg)
//!     │                               │ remaining <= 0
//!     │                               ▼
//!     │                 Expired: pause engine, query geometry,
//!     │                          emit Timeout { geometry }
//!     │                               │
//!     │                               ▼
//!     │   ConfirmExtension(true)  AwaitingExtensionPayment ── 30s ──▶ Abandoned
//!     │   then Duration(n) ≤5s        │ ConfirmExtension(false) ──▶ Declined
//!     └── (or 60s bonus) ◀────────────┘
//! ```

use std::time::Duration;

use coinop_types::WindowGeometry;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::engine::EngineControl;
use crate::session::{ControlMessage, DoneSignal, OverlayState, SessionId, SessionPhase, TimekeeperEvent};


// ─────────────────────────────────────────────────────────────────────────────
// Configuration and Exit
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimekeeperConfig {
    pub tick: Duration,
    /// Remaining seconds at which `PrepareTimeout` fires
    pub prepare_at_secs: i64,
    /// Bound on waiting for an extension confirmation
    pub resume_wait: Duration,
    /// Bound on waiting for the new duration after a confirmation
    pub duration_wait: Duration,
    /// Granted when the duration never arrives
    pub default_bonus_secs: i64,
    /// Bound on the engine geometry query (used by the engine link)
    pub geometry_wait: Duration,
}

impl Default for TimekeeperConfig {
    fn default() -> Self {
        Self::from(&coinop_types::TimingConfig::default())
    }
}

/// Why the timekeeper task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimekeeperExit {
    /// The done signal was closed
    Stopped,
    /// No extension confirmation arrived in time
    Abandoned,
    /// The front-end reported that no extension was paid
    Declined,
    /// Every control sender was dropped
    Disconnected,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a running timekeeper task
pub struct TimekeeperHandle {
    done: DoneSignal,
    task: JoinHandle<TimekeeperExit>,
    phase: watch::Receiver<SessionPhase>,
    exit: Option<TimekeeperExit>,
}

impl TimekeeperHandle {
    /// Request shutdown. Idempotent, safe after the task already exited.
    pub fn stop(&self) {
        self.done.close();
    }

    pub fn done(&self) -> &DoneSignal {
        &self.done
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.exit.is_some() || self.task.is_finished()
    }

    /// Wait for the task to end. Cancel-safe and may be called repeatedly.
    pub async fn wait(&mut self) -> TimekeeperExit {
        if let Some(exit) = self.exit {
            return exit;
        }
        let exit = match (&mut self.task).await {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, "Timekeeper task failed");
                TimekeeperExit::Stopped
            }
        };
        self.exit = Some(exit);
        exit
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timekeeper
// ─────────────────────────────────────────────────────────────────────────────

enum TickResult {
    Continue,
    Resumed,
    Exit(TimekeeperExit),
}

pub struct Timekeeper<E: EngineControl> {
    session: SessionId,
    config: TimekeeperConfig,
    engine: E,
    overlay: OverlayState,
    control: mpsc::Receiver<ControlMessage>,
    events: mpsc::UnboundedSender<TimekeeperEvent>,
    done: DoneSignal,
    phase: watch::Sender<SessionPhase>,
    remaining: i64,
    prepare_sent: bool,
}

impl<E: EngineControl> Timekeeper<E> {
    pub fn new(
        session: SessionId,
        config: TimekeeperConfig,
        engine: E,
        overlay: OverlayState,
        control: mpsc::Receiver<ControlMessage>,
        events: mpsc::UnboundedSender<TimekeeperEvent>,
        allotted_secs: u32,
    ) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Active);
        Self {
            session,
            config,
            engine,
            overlay,
            control,
            events,
            done: DoneSignal::new(),
            phase,
            remaining: allotted_secs as i64,
            prepare_sent: false,
        }
    }

    /// Start counting down on the current tokio runtime.
    pub fn spawn(self) -> TimekeeperHandle {
        let done = self.done.clone();
        let phase = self.phase.subscribe();
        let task = tokio::spawn(self.run());
        TimekeeperHandle {
            done,
            task,
            phase,
            exit: None,
        }
    }

    async fn run(mut self) -> TimekeeperExit {
        info!(session = %self.session, remaining = self.remaining, "Timekeeper started");
        self.overlay.show(self.remaining);
        self.emit(TimekeeperEvent::SessionLoaded);

        let done = self.done.clone();
        let mut ticker = time::interval_at(Instant::now() + self.config.tick, self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                biased;
                _ = done.closed() => break TimekeeperExit::Stopped,
                _ = ticker.tick() => match self.tick().await {
                    TickResult::Continue => {}
                    // The wait swallowed whole periods; restart the schedule
                    TickResult::Resumed => ticker.reset(),
                    TickResult::Exit(exit) => break exit,
                },
                msg = self.control.recv() => match msg {
                    Some(ControlMessage::Duration(secs)) => self.add_time(secs),
                    Some(ControlMessage::ConfirmExtension(confirmed)) => {
                        debug!(confirmed, "Ignoring extension confirmation while active");
                    }
                    None => break TimekeeperExit::Disconnected,
                },
            }
        };

        self.phase.send_replace(SessionPhase::Terminated);
        info!(session = %self.session, ?exit, remaining = self.remaining, "Timekeeper exited");
        exit
    }

    fn add_time(&mut self, secs: u32) {
        if secs == 0 {
            return;
        }
        self.remaining += secs as i64;
        self.overlay.set_remaining(self.remaining);
        info!(added = secs, remaining = self.remaining, "Timer updated: adding time");
    }

    async fn tick(&mut self) -> TickResult {
        self.remaining -= 1;
        self.overlay.set_remaining(self.remaining);

        if self.remaining == self.config.prepare_at_secs && !self.prepare_sent {
            self.prepare_sent = true;
            info!(remaining = self.remaining, "Sending prepare timeout");
            self.emit(TimekeeperEvent::PrepareTimeout {
                remaining_secs: self.remaining,
            });
        }

        if self.remaining <= 0 {
            return self.expire().await;
        }
        TickResult::Continue
    }

    async fn expire(&mut self) -> TickResult {
        let done = self.done.clone();
        self.phase.send_replace(SessionPhase::Expired);
        self.engine.set_paused(true);

        let geometry = tokio::select! {
            biased;
            _ = done.closed() => return TickResult::Exit(TimekeeperExit::Stopped),
            result = self.engine.query_geometry() => result.unwrap_or_else(|e| {
                warn!(error = %e, "Window geometry unavailable, using defaults");
                WindowGeometry::FALLBACK
            }),
        };

        info!(?geometry, "Session expired, engine paused");
        self.emit(TimekeeperEvent::Timeout { geometry });
        self.phase.send_replace(SessionPhase::AwaitingExtensionPayment);

        let confirmed = tokio::select! {
            biased;
            _ = done.closed() => return TickResult::Exit(TimekeeperExit::Stopped),
            _ = time::sleep(self.config.resume_wait) => {
                warn!(waited = ?self.config.resume_wait, "Timeout waiting for resume signal, abandoning session");
                return TickResult::Exit(TimekeeperExit::Abandoned);
            }
            confirmed = next_confirmation(&mut self.control) => match confirmed {
                Some(confirmed) => confirmed,
                None => return TickResult::Exit(TimekeeperExit::Disconnected),
            },
        };

        if !confirmed {
            info!("Extension declined");
            return TickResult::Exit(TimekeeperExit::Declined);
        }

        let new_secs = tokio::select! {
            biased;
            _ = done.closed() => return TickResult::Exit(TimekeeperExit::Stopped),
            _ = time::sleep(self.config.duration_wait) => {
                warn!(bonus = self.config.default_bonus_secs, "Timeout waiting for new duration, using default");
                self.config.default_bonus_secs
            }
            secs = next_duration(&mut self.control) => match secs {
                Some(secs) => secs as i64,
                None => return TickResult::Exit(TimekeeperExit::Disconnected),
            },
        };

        self.remaining = new_secs;
        self.prepare_sent = false;
        self.overlay.set_remaining(self.remaining);
        self.engine.set_paused(false);
        self.phase.send_replace(SessionPhase::Active);
        info!(remaining = self.remaining, "Session resumed");
        self.emit(TimekeeperEvent::Resumed {
            remaining_secs: self.remaining,
        });
        TickResult::Resumed
    }

    fn emit(&self, event: TimekeeperEvent) {
        if let Err(e) = self.events.send(event) {
            debug!(event = ?e.0, "No listener for timekeeper event");
        }
    }
}

/// Next confirmation on the control channel; stray durations are dropped.
async fn next_confirmation(control: &mut mpsc::Receiver<ControlMessage>) -> Option<bool> {
    loop {
        match control.recv().await? {
            ControlMessage::ConfirmExtension(confirmed) => return Some(confirmed),
            ControlMessage::Duration(secs) => {
                warn!(secs, "Duration received before extension confirmation, discarding");
            }
        }
    }
}

/// Next duration on the control channel; repeated confirmations are dropped.
async fn next_duration(control: &mut mpsc::Receiver<ControlMessage>) -> Option<u32> {
    loop {
        match control.recv().await? {
            ControlMessage::Duration(secs) => return Some(secs),
            ControlMessage::ConfirmExtension(_) => {
                debug!("Duplicate extension confirmation");
            }
        }
    }
}
