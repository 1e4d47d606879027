//! Engine host thread.
//!
//! The emulation core must live on a single OS thread for its whole life
//! (rendering contexts are thread-bound), so it gets a dedicated
//! `std::thread` running a fixed-rate frame loop. Everything else talks to it
//! through [`EngineCommand`]s and the shared pause flag.
//!
//! Each loop iteration:
//! - drains pending commands (geometry queries, shutdown)
//! - reads the pause flag and an overlay snapshot
//! - runs one frame under `catch_unwind`
//! - sleeps for the frame interval

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use coinop_types::WindowGeometry;
use tokio::sync::mpsc::{self, Sender, error::TryRecvError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{CoreFactory, EmulationCore, EngineControl, FrameOutcome, PauseFlag};
use crate::error::EngineError;
use crate::session::OverlayState;

// ─────────────────────────────────────────────────────────────────────────────
// Commands and Exit
// ─────────────────────────────────────────────────────────────────────────────

/// Commands sent to the engine thread
pub enum EngineCommand {
    /// Report the current window geometry via oneshot channel
    QueryGeometry(oneshot::Sender<Result<WindowGeometry, EngineError>>),
    /// Leave the frame loop and unload
    Shutdown,
}

/// Why the engine thread stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineExit {
    WindowClosed,
    Shutdown,
    LoadFailed(String),
    Crashed(String),
}

impl EngineExit {
    pub fn is_abnormal(&self) -> bool {
        matches!(self, EngineExit::LoadFailed(_) | EngineExit::Crashed(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a running engine thread
pub struct EngineHandle {
    tx: Sender<EngineCommand>,
    thread: JoinHandle<EngineExit>,
    /// Resolves once the core and game are loaded (or failed to load)
    pub ready: oneshot::Receiver<Result<(), EngineError>>,
    /// Resolves when the frame loop ends for any reason
    pub exited: oneshot::Receiver<EngineExit>,
}

impl EngineHandle {
    /// Control surface handed to the timekeeper.
    pub fn link(&self, pause: PauseFlag, geometry_wait: Duration) -> EngineLink {
        EngineLink {
            tx: self.tx.clone(),
            pause,
            geometry_wait,
        }
    }

    /// Ask the frame loop to stop, then join the thread.
    ///
    /// Safe to call after the engine already exited on its own.
    pub async fn shutdown(self) -> EngineExit {
        let _ = self.tx.send(EngineCommand::Shutdown).await;
        let thread = self.thread;
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(exit)) => exit,
            Ok(Err(panic)) => EngineExit::Crashed(panic_message(panic.as_ref())),
            Err(e) => EngineExit::Crashed(format!("engine join failed: {e}")),
        }
    }
}

/// [`EngineControl`] backed by the engine thread's command channel.
#[derive(Clone)]
pub struct EngineLink {
    tx: Sender<EngineCommand>,
    pause: PauseFlag,
    geometry_wait: Duration,
}

impl EngineControl for EngineLink {
    fn set_paused(&self, paused: bool) {
        self.pause.set(paused);
    }

    fn query_geometry(&self) -> impl Future<Output = Result<WindowGeometry, EngineError>> + Send {
        let tx = self.tx.clone();
        let wait = self.geometry_wait;
        async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            tx.send(EngineCommand::QueryGeometry(reply_tx))
                .await
                .map_err(|_| EngineError::Gone)?;
            match tokio::time::timeout(wait, reply_rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(EngineError::Gone),
                Err(_) => Err(EngineError::Geometry(format!(
                    "no reply within {}ms",
                    wait.as_millis()
                ))),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Spawn
// ─────────────────────────────────────────────────────────────────────────────

/// Start the engine thread for one session.
pub fn spawn_engine(
    factory: Arc<dyn CoreFactory>,
    core_path: PathBuf,
    game_path: PathBuf,
    overlay: OverlayState,
    pause: PauseFlag,
    frame_interval: Duration,
) -> Result<EngineHandle, EngineError> {
    let (tx, rx) = mpsc::channel::<EngineCommand>(32);
    let (ready_tx, ready_rx) = oneshot::channel();
    let (exit_tx, exit_rx) = oneshot::channel();

    let thread = thread::Builder::new()
        .name("coinop-engine".to_string())
        .spawn(move || {
            let exit = run_engine(
                factory.as_ref(),
                &core_path,
                &game_path,
                &overlay,
                &pause,
                frame_interval,
                rx,
                ready_tx,
            );
            info!(?exit, "Engine thread exiting");
            let _ = exit_tx.send(exit.clone());
            exit
        })
        .map_err(|e| EngineError::Spawn(e.to_string()))?;

    Ok(EngineHandle {
        tx,
        thread,
        ready: ready_rx,
        exited: exit_rx,
    })
}

fn run_engine(
    factory: &dyn CoreFactory,
    core_path: &std::path::Path,
    game_path: &std::path::Path,
    overlay: &OverlayState,
    pause: &PauseFlag,
    frame_interval: Duration,
    mut rx: mpsc::Receiver<EngineCommand>,
    ready_tx: oneshot::Sender<Result<(), EngineError>>,
) -> EngineExit {
    let mut core: Box<dyn EmulationCore> = match catch_unwind(AssertUnwindSafe(|| factory.create())) {
        Ok(core) => core,
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            error!(error = %msg, "Core factory panicked");
            let _ = ready_tx.send(Err(EngineError::Crashed(msg.clone())));
            return EngineExit::Crashed(msg);
        }
    };

    match catch_unwind(AssertUnwindSafe(|| core.load(core_path, game_path))) {
        Ok(Ok(())) => {
            info!(core = %core_path.display(), game = %game_path.display(), "Core and game loaded");
            let _ = ready_tx.send(Ok(()));
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Engine load failed");
            let reason = e.to_string();
            let _ = ready_tx.send(Err(e));
            unload(core.as_mut());
            return EngineExit::LoadFailed(reason);
        }
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            error!(error = %msg, "Engine panicked while loading");
            let _ = ready_tx.send(Err(EngineError::Crashed(msg.clone())));
            unload(core.as_mut());
            return EngineExit::Crashed(msg);
        }
    }

    let exit = 'frames: loop {
        // Process all pending commands
        loop {
            match rx.try_recv() {
                Ok(EngineCommand::QueryGeometry(reply)) => {
                    let geometry = catch_unwind(AssertUnwindSafe(|| core.window_geometry()))
                        .unwrap_or_else(|panic| {
                            Err(EngineError::Geometry(panic_message(panic.as_ref())))
                        });
                    let _ = reply.send(geometry);
                }
                Ok(EngineCommand::Shutdown) => break 'frames EngineExit::Shutdown,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Engine command channel closed");
                    break 'frames EngineExit::Shutdown;
                }
            }
        }

        let paused = pause.is_set();
        let snapshot = overlay.snapshot();
        match catch_unwind(AssertUnwindSafe(|| core.run_frame(paused, snapshot))) {
            Ok(FrameOutcome::Continue) => {}
            Ok(FrameOutcome::WindowClosed) => break EngineExit::WindowClosed,
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!(error = %msg, "Recovered from panic in frame loop");
                break EngineExit::Crashed(msg);
            }
        }

        thread::sleep(frame_interval);
    };

    unload(core.as_mut());
    exit
}

fn unload(core: &mut dyn EmulationCore) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| core.unload())) {
        warn!(error = %panic_message(panic.as_ref()), "Engine panicked while unloading");
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scriptable core used by engine and supervisor tests.

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    pub struct CoreScript {
        pub frames: AtomicUsize,
        pub paused_frames: AtomicUsize,
        pub unloaded: AtomicBool,
        pub close_window: AtomicBool,
        pub panic_next_frame: AtomicBool,
        pub fail_geometry: AtomicBool,
        pub fail_load: Mutex<Option<String>>,
    }

    pub struct ScriptedCore {
        pub script: Arc<CoreScript>,
        pub geometry: WindowGeometry,
    }

    impl EmulationCore for ScriptedCore {
        fn load(&mut self, core_path: &std::path::Path, _game: &std::path::Path) -> Result<(), EngineError> {
            let fail = self.script.fail_load.lock().unwrap().clone();
            match fail {
                Some(reason) => Err(EngineError::LoadCore {
                    path: core_path.to_path_buf(),
                    reason,
                }),
                None => Ok(()),
            }
        }

        fn run_frame(&mut self, paused: bool, _overlay: crate::session::OverlaySnapshot) -> FrameOutcome {
            if self.script.panic_next_frame.swap(false, Ordering::SeqCst) {
                panic!("scripted frame panic");
            }
            self.script.frames.fetch_add(1, Ordering::SeqCst);
            if paused {
                self.script.paused_frames.fetch_add(1, Ordering::SeqCst);
            }
            if self.script.close_window.load(Ordering::SeqCst) {
                FrameOutcome::WindowClosed
            } else {
                FrameOutcome::Continue
            }
        }

        fn window_geometry(&self) -> Result<WindowGeometry, EngineError> {
            if self.script.fail_geometry.load(Ordering::SeqCst) {
                Err(EngineError::Geometry("no window".into()))
            } else {
                Ok(self.geometry)
            }
        }

        fn unload(&mut self) {
            self.script.unloaded.store(true, Ordering::SeqCst);
        }
    }

    pub fn scripted_factory(script: Arc<CoreScript>, geometry: WindowGeometry) -> Arc<dyn CoreFactory> {
        Arc::new(move || -> Box<dyn EmulationCore> {
            Box::new(ScriptedCore {
                script: Arc::clone(&script),
                geometry,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::atomic::Ordering;

    const FRAME: Duration = Duration::from_millis(2);

    fn start(script: &Arc<CoreScript>) -> (EngineHandle, OverlayState, PauseFlag) {
        let overlay = OverlayState::new();
        let pause = PauseFlag::new();
        let handle = spawn_engine(
            scripted_factory(Arc::clone(script), WindowGeometry::new(5, 6, 320, 240)),
            PathBuf::from("core.so"),
            PathBuf::from("game.nes"),
            overlay.clone(),
            pause.clone(),
            FRAME,
        )
        .unwrap();
        (handle, overlay, pause)
    }

    #[tokio::test]
    async fn test_ready_then_shutdown_unloads() {
        let script = Arc::new(CoreScript::default());
        let (mut handle, _overlay, _pause) = start(&script);

        assert!((&mut handle.ready).await.unwrap().is_ok());
        let exit = handle.shutdown().await;

        assert_eq!(exit, EngineExit::Shutdown);
        assert!(script.unloaded.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_load_failure_reported_on_ready() {
        let script = Arc::new(CoreScript::default());
        *script.fail_load.lock().unwrap() = Some("missing symbol".into());
        let (mut handle, _overlay, _pause) = start(&script);

        let ready = (&mut handle.ready).await.unwrap();
        assert!(matches!(ready, Err(EngineError::LoadCore { .. })));
        assert!(matches!(handle.shutdown().await, EngineExit::LoadFailed(_)));
    }

    #[tokio::test]
    async fn test_geometry_query_round_trip() {
        let script = Arc::new(CoreScript::default());
        let (mut handle, _overlay, pause) = start(&script);
        (&mut handle.ready).await.unwrap().unwrap();

        let link = handle.link(pause, Duration::from_secs(1));
        let geometry = link.query_geometry().await.unwrap();
        assert_eq!(geometry, WindowGeometry::new(5, 6, 320, 240));

        script.fail_geometry.store(true, Ordering::SeqCst);
        assert!(link.query_geometry().await.is_err());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_frame_panic_becomes_crash_exit() {
        let script = Arc::new(CoreScript::default());
        let (mut handle, _overlay, _pause) = start(&script);
        (&mut handle.ready).await.unwrap().unwrap();

        script.panic_next_frame.store(true, Ordering::SeqCst);
        let exit = (&mut handle.exited).await.unwrap();

        assert_eq!(exit, EngineExit::Crashed("scripted frame panic".into()));
        assert!(script.unloaded.load(Ordering::SeqCst));
        assert_eq!(handle.shutdown().await, exit);
    }

    #[tokio::test]
    async fn test_window_close_and_pause_flag() {
        let script = Arc::new(CoreScript::default());
        let (mut handle, _overlay, pause) = start(&script);
        (&mut handle.ready).await.unwrap().unwrap();

        let link = handle.link(pause, Duration::from_secs(1));
        link.set_paused(true);
        while script.paused_frames.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(FRAME).await;
        }

        script.close_window.store(true, Ordering::SeqCst);
        let exit = (&mut handle.exited).await.unwrap();
        assert_eq!(exit, EngineExit::WindowClosed);
        handle.shutdown().await;
    }
}
