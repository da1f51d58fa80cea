//! Push channel for the connection status.
//!
//! Every client gets the current status right after the upgrade and then one
//! message per change of the session state. Changes come from the session
//! manager's watch channel; nothing is polled.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    app::AppState,
    session::{SessionState, SessionStatus},
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// Sent on connect and whenever the session state changes.
    ConnectionStatus(SessionStatus),
}

/// Gets called for every new web client and spins up an event loop.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rx = state.panel.subscribe();
    ws.on_upgrade(move |socket| status_loop(socket, rx))
}

async fn send_ws_message(socket: &mut WebSocket, msg: &WsMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to serialize websocket message: {}", e);
            Err(axum::Error::new(e))
        }
    }
}

async fn status_loop(mut socket: WebSocket, mut rx: watch::Receiver<SessionState>) {
    let mut last = rx.borrow_and_update().status();
    if let Err(e) = send_ws_message(&mut socket, &WsMessage::ConnectionStatus(last)).await {
        debug!("Failed to send initial status: {}", e);
        return;
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("Session manager gone, closing websocket");
                    break;
                }
                let status = rx.borrow_and_update().status();
                if status == last {
                    continue;
                }
                last = status;
                if let Err(e) = send_ws_message(&mut socket, &WsMessage::ConnectionStatus(status)).await {
                    debug!("Failed to send status, closing connection: {}", e);
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    None | Some(Err(_) | Ok(Message::Close(_))) => {
                        debug!("WebSocket connection closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
