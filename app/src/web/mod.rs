//! Web kiosk front-end.
//!
//! Serves the catalog and UI snapshot over HTTP and runs one WebSocket per
//! kiosk page. Inbound frames become service intents; every service
//! notification is pushed to every connected page.

mod protocol;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use coinop_core::service::GameInfo;
use coinop_core::session::DoneSignal;
use coinop_core::{Notification, ServiceHandle, SessionError, UiView};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

pub use protocol::ClientMessage;

pub fn router(handle: ServiceHandle) -> Router {
    Router::new()
        .route("/api/games", get(games))
        .route("/api/state", get(state))
        .route("/ws", get(ws))
        .with_state(handle)
}

/// Serve until `done` closes.
pub async fn serve(handle: ServiceHandle, bind: &str, done: DoneSignal) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "Web front-end listening");
    axum::serve(listener, router(handle))
        .with_graceful_shutdown(async move { done.closed().await })
        .await
}

async fn games(State(handle): State<ServiceHandle>) -> Json<Vec<GameInfo>> {
    Json(handle.games().to_vec())
}

async fn state(State(handle): State<ServiceHandle>) -> Json<UiView> {
    Json(handle.snapshot().await)
}

async fn ws(upgrade: WebSocketUpgrade, State(handle): State<ServiceHandle>) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| client(socket, handle))
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection loop
// ─────────────────────────────────────────────────────────────────────────────

async fn client(socket: WebSocket, handle: ServiceHandle) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the first snapshot so no change slips between them
    let mut notifications = handle.subscribe();
    debug!("Kiosk page connected");

    if send(&mut sender, &Notification::State(handle.snapshot().await)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                let text = match inbound {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive failed");
                        break;
                    }
                };
                if let Err(message) = dispatch(&handle, text.as_str()).await {
                    debug!(%message, "Kiosk page request refused");
                    if send(&mut sender, &Notification::Error { message }).await.is_err() {
                        break;
                    }
                }
            }
            outbound = notifications.recv() => {
                let notification = match outbound {
                    Ok(notification) => notification,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Kiosk page lagged, resending state");
                        Notification::State(handle.snapshot().await)
                    }
                    Err(RecvError::Closed) => break,
                };
                if send(&mut sender, &notification).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Kiosk page disconnected");
}

async fn dispatch(handle: &ServiceHandle, text: &str) -> Result<(), String> {
    let message = ClientMessage::parse(text)?;
    for intent in message.intents(&handle.shared.config)? {
        if let Err(e) = handle.send_intent(intent).await {
            return match e {
                SessionError::Transition(_) | SessionError::ServiceStopped => Err(e.to_string()),
                // Execution failures were already broadcast to every page
                _ => Ok(()),
            };
        }
    }
    Ok(())
}

async fn send<S>(sender: &mut S, notification: &Notification) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = match serde_json::to_string(notification) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to encode notification");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
