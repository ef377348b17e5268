//! WebSocket handler for streamed voice commands
//!
//! Clients send raw PCM16 audio as binary frames and receive one
//! `{"command": "..."}` text message per recognized command.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::ApiState;
use crate::error::SessionErrorKind;
use crate::session::{CommandMessage, ConnectionId};
use crate::Error;

/// Close reason sent when the connection's decoder fails
pub const ENGINE_FAILURE_REASON: &str = "engine failure";

/// How long a finished reader waits for queued outbound messages to flush
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Queued message for the socket writer
#[derive(Debug)]
enum Outbound {
    Command(CommandMessage),
    Close { code: u16, reason: &'static str },
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let id = ConnectionId::new();
    let (mut sender, mut receiver) = socket.split();

    if let Err(e) = state.sessions.add(id).await {
        tracing::error!(session_id = %id, error = %e, "could not start decode session");
        let _ = sender
            .send(close_message(close_code::ERROR, ENGINE_FAILURE_REASON))
            .await;
        return;
    }

    tracing::info!(session_id = %id, "WebSocket connected");

    let (tx, mut rx) = mpsc::channel::<Outbound>(32);

    // Forward queued messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            let (message, last) = match out {
                Outbound::Command(command) => match serde_json::to_string(&command) {
                    Ok(text) => (Message::Text(text.into()), false),
                    Err(e) => {
                        tracing::warn!(session_id = %id, error = %e, "failed to encode command");
                        continue;
                    }
                },
                Outbound::Close { code, reason } => (close_message(code, reason), true),
            };

            sender
                .send(message)
                .await
                .map_err(|e| Error::Transport(format!("send failed: {e}")))?;
            if last {
                break;
            }
        }
        Ok::<_, Error>(())
    });

    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = msg.map_err(|e| Error::Transport(format!("receive failed: {e}")))?;

            match msg {
                Message::Binary(frame) => {
                    if !route_frame(&recv_state, id, frame.to_vec(), &tx).await {
                        break;
                    }
                }
                Message::Text(text) => {
                    tracing::debug!(
                        session_id = %id,
                        len = text.as_str().len(),
                        "ignoring text frame"
                    );
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %id, "WebSocket closed by client");
                    break;
                }
                // axum answers pings itself
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
        Ok::<_, Error>(())
    });

    // Wait for either task to complete
    let ended = tokio::select! {
        res = &mut send_task => {
            recv_task.abort();
            res
        }
        res = &mut recv_task => {
            // Reader is gone so the queue is closed; let the writer drain it
            if tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task).await.is_err() {
                send_task.abort();
            }
            res
        }
    };
    if let Ok(Err(e)) = ended {
        tracing::debug!(session_id = %id, error = %e, "connection ended on transport error");
    }

    state.sessions.remove(id).await;
    tracing::info!(session_id = %id, "WebSocket disconnected");
}

/// Route one audio frame and queue whatever it produced
///
/// Returns `false` when the connection should end.
async fn route_frame(
    state: &ApiState,
    id: ConnectionId,
    frame: Vec<u8>,
    tx: &mpsc::Sender<Outbound>,
) -> bool {
    match state.sessions.route(id, frame).await {
        Ok(Some(event)) => tx
            .send(Outbound::Command(CommandMessage::from(&event)))
            .await
            .is_ok(),
        Ok(None) => true,
        Err(e) if e.session_kind() == Some(SessionErrorKind::EngineFailure) => {
            tracing::warn!(session_id = %id, error = %e, "closing connection after engine failure");
            let _ = tx
                .send(Outbound::Close {
                    code: close_code::ERROR,
                    reason: ENGINE_FAILURE_REASON,
                })
                .await;
            false
        }
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "dropping connection");
            false
        }
    }
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
