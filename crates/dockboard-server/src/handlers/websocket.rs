//! WebSocket handler for the realtime board
//!
//! Each connection receives `board:init` once, then `board:updated` for
//! every accepted change it did not submit itself. Clients push either a
//! whole replacement board (`board:update`) or a single operator command
//! (`board:command`); refused commands are answered with `board:rejected`
//! on the same connection only.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use dockboard::board::BoardCommand;
use dockboard::{BoardError, BoardSnapshot, ConnectionId, TransitionRejected};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

use crate::server::AppState;

/// Messages a client sends
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Keepalive
    #[serde(rename = "ping")]
    Ping,
    /// Full replacement board
    #[serde(rename = "board:update")]
    BoardUpdate(BoardSnapshot),
    /// A single operator command, validated by the server
    #[serde(rename = "board:command")]
    BoardCommand(BoardCommand),
}

/// Messages the server sends
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage<'a> {
    /// Pong response
    #[serde(rename = "pong")]
    Pong,
    /// Board on connect
    #[serde(rename = "board:init")]
    BoardInit(&'a BoardSnapshot),
    /// Board after a change from elsewhere
    #[serde(rename = "board:updated")]
    BoardUpdated(&'a BoardSnapshot),
    /// A refused command or submission
    #[serde(rename = "board:rejected")]
    BoardRejected(Rejection),
    /// Error message
    #[serde(rename = "error")]
    Error { message: String },
}

/// Why a change was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Stable identifier, e.g. `dock_unavailable`
    pub kind: String,
    /// Operator-facing message
    pub message: String,
    /// Command that was refused, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Dock involved, for highlighting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dock_id: Option<String>,
    /// Board version the client should resync to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<u64>,
}

impl Rejection {
    fn transition(command: &BoardCommand, reason: &TransitionRejected) -> Self {
        Self {
            kind: reason.kind().to_string(),
            message: reason.to_string(),
            command: Some(command.name().to_string()),
            dock_id: reason.dock_id().map(str::to_string),
            current_version: None,
        }
    }

    fn stale(submitted: u64, current: u64) -> Self {
        Self {
            kind: "stale_snapshot".to_string(),
            message: format!(
                "board changed since version {submitted}; reloaded version {current}"
            ),
            command: None,
            dock_id: None,
            current_version: Some(current),
        }
    }
}

fn encode(message: &ServerMessage<'_>) -> Option<String> {
    serde_json::to_string(message)
        .inspect_err(|e| warn!(error = %e, "failed to encode board message"))
        .ok()
}

/// WebSocket upgrade handler
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection = ConnectionId::new();
    state.service.roll_over().await;
    // Subscribe before reading the board so no update falls in between.
    let mut updates = state.service.subscribe();
    let init = encode(&ServerMessage::BoardInit(&state.service.snapshot()));
    info!(%connection, "board connection opened");

    let (mut sender, mut receiver) = socket.split();
    let (replies, mut reply_rx) = mpsc::channel::<String>(16);

    // Single writer: direct replies and broadcast updates share the sink.
    let writer_state = Arc::clone(&state);
    let writer = tokio::spawn(async move {
        if let Some(text) = init {
            if sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }

        loop {
            let text = tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(text) => Some(text),
                    None => break,
                },
                update = updates.recv() => match update {
                    Ok(update) if update.is_for(connection) => {
                        encode(&ServerMessage::BoardUpdated(&update.snapshot))
                    },
                    Ok(_) => None,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%connection, skipped, "connection lagged, resending board");
                        let current = writer_state.service.snapshot();
                        encode(&ServerMessage::BoardUpdated(&current))
                    },
                    Err(RecvError::Closed) => break,
                },
            };

            if let Some(text) = text {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(_) => break,
        };

        let mut outgoing = Vec::new();
        match serde_json::from_str::<ClientMessage>(&msg) {
            Ok(message) => respond(&state, connection, message, &mut outgoing).await,
            Err(e) => {
                debug!(%connection, error = %e, "malformed board message");
                outgoing.extend(encode(&ServerMessage::Error {
                    message: format!("Invalid message: {e}"),
                }));
            },
        }

        let mut writer_gone = false;
        for text in outgoing {
            if replies.send(text).await.is_err() {
                writer_gone = true;
                break;
            }
        }
        if writer_gone {
            break;
        }
    }

    drop(replies);
    let _ = writer.await;
    info!(%connection, "board connection closed");
}

async fn respond(
    state: &AppState,
    connection: ConnectionId,
    message: ClientMessage,
    outgoing: &mut Vec<String>,
) {
    match message {
        ClientMessage::Ping => outgoing.extend(encode(&ServerMessage::Pong)),
        ClientMessage::BoardUpdate(snapshot) => {
            match state.service.submit(Some(connection), snapshot).await {
                Ok(_) => {},
                Err(BoardError::StaleSnapshot { submitted, current }) => {
                    outgoing.extend(encode(&ServerMessage::BoardRejected(Rejection::stale(
                        submitted, current,
                    ))));
                    let board = state.service.snapshot();
                    outgoing.extend(encode(&ServerMessage::BoardUpdated(&board)));
                },
                Err(e) => outgoing.extend(encode(&ServerMessage::Error {
                    message: e.to_string(),
                })),
            }
        },
        ClientMessage::BoardCommand(command) => {
            match state.service.apply_command(Some(connection), &command).await {
                Ok(_) => {},
                Err(BoardError::Transition(reason)) => outgoing.extend(encode(
                    &ServerMessage::BoardRejected(Rejection::transition(&command, &reason)),
                )),
                Err(e) => outgoing.extend(encode(&ServerMessage::Error {
                    message: e.to_string(),
                })),
            }
        },
    }
}
