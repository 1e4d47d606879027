//! Console (desktop) front-end.
//!
//! Raw-mode key translation on top of the shared kiosk service. A blocking
//! reader thread forwards key presses; the async loop maps them to intents
//! and redraws the screen on every service notification.

use std::io::{self, Stdout, Write};
use std::thread;
use std::time::Duration;

use coinop_core::service::GameInfo;
use coinop_core::session::DoneSignal;
use coinop_core::{Intent, Notification, ServiceHandle, UiView};
use coinop_types::Phase;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute, queue};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const KEY_POLL: Duration = Duration::from_millis(100);

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Intent(Intent),
    /// Operator credit of one minute to the running session
    AddMinute,
    Exit,
}

pub fn map_key(key: KeyEvent, phase: Phase) -> Option<ConsoleAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c' | 'C')) {
        return Some(ConsoleAction::Exit);
    }
    let intent = match key.code {
        KeyCode::Up => Intent::MoveSelection(-1),
        KeyCode::Down => Intent::MoveSelection(1),
        KeyCode::Left => Intent::AdjustTime(-1),
        KeyCode::Right => Intent::AdjustTime(1),
        KeyCode::Enter => match phase {
            Phase::SelectGame => Intent::ConfirmSelection,
            Phase::TimeSelect | Phase::ExtendTime => Intent::ConfirmTime,
            _ => return None,
        },
        KeyCode::Char('x' | 'X') => Intent::Pay,
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Intent::Quit,
        KeyCode::Char('+') if phase.has_session() => return Some(ConsoleAction::AddMinute),
        _ => return None,
    };
    Some(ConsoleAction::Intent(intent))
}

// ─────────────────────────────────────────────────────────────────────────────
// Screen
// ─────────────────────────────────────────────────────────────────────────────

/// Raw mode plus the alternate screen, restored on drop.
struct Screen {
    out: Stdout,
}

impl Screen {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(Self { out })
    }

    fn draw(&mut self, view: &UiView, games: &[GameInfo], banner: Option<&str>) -> io::Result<()> {
        queue!(self.out, terminal::Clear(ClearType::All))?;
        for (row, line) in screen_lines(view, games, banner).iter().enumerate() {
            queue!(self.out, cursor::MoveTo(0, row as u16))?;
            if row == 0 {
                queue!(
                    self.out,
                    SetAttribute(Attribute::Bold),
                    Print(line),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(self.out, Print(line))?;
            }
        }
        self.out.flush()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = execute!(self.out, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Lines of the console screen for one UI snapshot.
pub fn screen_lines(view: &UiView, games: &[GameInfo], banner: Option<&str>) -> Vec<String> {
    let mut lines = vec![format!("COINOP  [{:?}]", view.phase), String::new()];

    match view.phase {
        Phase::SelectGame => {
            if games.is_empty() {
                lines.push("  (no games configured)".to_string());
            }
            for game in games {
                let marker = if game.index == view.selected_game { '>' } else { ' ' };
                lines.push(format!("{marker} {}", game.name));
            }
        }
        phase => {
            if let Some(name) = &view.game_name {
                lines.push(format!("  {name}"));
            }
            if phase != Phase::Playing {
                lines.push(format!("  {}    {}", view.minutes_label, view.price_label));
            }
            if let Some(remaining) = &view.remaining_label {
                lines.push(format!("  TIME LEFT {remaining}"));
            }
        }
    }

    lines.push(String::new());
    lines.push(view.prompt.to_string());
    if let Some(banner) = banner {
        lines.push(banner.to_string());
    }
    lines
}

fn banner_for(notification: &Notification) -> Option<String> {
    match notification {
        Notification::State(_) => None,
        Notification::SessionLoaded => Some("Game loaded".to_string()),
        Notification::PrepareTimeout { remaining_secs } => {
            Some(format!("{remaining_secs} seconds left"))
        }
        Notification::Timeout(_) => Some("Time is up".to_string()),
        Notification::SessionResumed { .. } => Some("Time added".to_string()),
        Notification::SessionEnded { reason } => Some(format!("Session ended: {reason:?}")),
        Notification::Error { message } => Some(format!("! {message}")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

fn read_keys(keys: mpsc::UnboundedSender<KeyEvent>, done: DoneSignal) {
    while !done.is_closed() {
        match event::poll(KEY_POLL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(error = %e, "Terminal input failed");
                break;
            }
        }
        match event::read() {
            Ok(Event::Key(key)) => {
                if keys.send(key).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Terminal input failed");
                break;
            }
        }
    }
    debug!("Key reader stopped");
}

/// Run until the operator exits or `done` closes.
pub async fn run(handle: ServiceHandle, done: DoneSignal) -> io::Result<()> {
    let mut screen = Screen::enter()?;
    let (key_tx, mut key_rx) = mpsc::unbounded_channel();
    {
        let done = done.clone();
        thread::Builder::new()
            .name("coinop-keys".to_string())
            .spawn(move || read_keys(key_tx, done))?;
    }

    let mut notifications = handle.subscribe();
    let mut view = handle.snapshot().await;
    let mut banner: Option<String> = None;
    screen.draw(&view, handle.games(), None)?;

    loop {
        tokio::select! {
            _ = done.closed() => break,
            key = key_rx.recv() => {
                let Some(key) = key else { break };
                match map_key(key, view.phase) {
                    Some(ConsoleAction::Exit) => break,
                    Some(ConsoleAction::Intent(intent)) => {
                        banner = None;
                        if let Err(e) = handle.send_intent(intent).await {
                            banner = Some(format!("! {e}"));
                        }
                    }
                    Some(ConsoleAction::AddMinute) => {
                        if let Err(e) = handle.add_minutes(1).await {
                            banner = Some(format!("! {e}"));
                        }
                    }
                    None => continue,
                }
                view = handle.snapshot().await;
            }
            notification = notifications.recv() => match notification {
                Ok(Notification::State(next)) => view = next,
                Ok(other) => banner = banner_for(&other),
                Err(RecvError::Lagged(_)) => view = handle.snapshot().await,
                Err(RecvError::Closed) => break,
            },
        }
        screen.draw(&view, handle.games(), banner.as_deref())?;
    }

    done.close();
    Ok(())
}
