use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use coach_core::{HubMessage, LiveConnection};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClientCommand {
    GetQuote,
    GetFocusing,
    Ping,
    Unknown(String),
}

impl ClientCommand {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "get_quote" => Self::GetQuote,
            "get_focusing" => Self::GetFocusing,
            "ping" => Self::Ping,
            other => Self::Unknown(other.to_string()),
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<AppState>, socket: WebSocket) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(state.queue_capacity);
    let write_timeout = state.write_timeout;
    let hub = state.controller.hub().clone();
    let conn_id = hub.next_conn_id();

    let writer_id = conn_id.clone();
    let write_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            let send = ws_sender.send(Message::Text(text));
            match tokio::time::timeout(write_timeout, send).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    debug!(event = "write_error", conn_id = %writer_id, error = %err);
                    return;
                }
                Err(_) => {
                    warn!(event = "write_timeout", conn_id = %writer_id);
                    return;
                }
            }
        }
    });

    hub.register(LiveConnection::new(conn_id.clone(), tx)).await;
    let connections = hub.connection_count().await;
    debug!(event = "socket_open", conn_id = %conn_id, connections = connections);

    while let Some(result) = ws_receiver.next().await {
        let msg = match result {
            Ok(value) => value,
            Err(err) => {
                warn!(event = "read_error", conn_id = %conn_id, error = %err);
                break;
            }
        };
        let text = match msg {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Close(_) => {
                info!(event = "client_close", conn_id = %conn_id);
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        handle_command(&state, &conn_id, &text).await;
    }

    hub.unregister(&conn_id).await;
    let _ = write_task.await;
}

async fn handle_command(state: &AppState, conn_id: &str, raw: &str) {
    let hub = state.controller.hub();
    match ClientCommand::parse(raw) {
        ClientCommand::GetQuote => {
            let message = HubMessage::Quote {
                quote: state.quotes.random(),
            };
            if let Err(err) = hub.broadcast(&message).await {
                warn!(event = "quote_broadcast_error", error = %err);
            }
        }
        ClientCommand::GetFocusing => {
            if let Err(err) = state.controller.broadcast_snapshot().await {
                warn!(event = "snapshot_broadcast_error", error = %err);
            }
        }
        ClientCommand::Ping => {
            if let Err(err) = hub.send_to(conn_id, &HubMessage::Pong).await {
                debug!(event = "pong_error", conn_id = %conn_id, error = %err);
            }
        }
        ClientCommand::Unknown(other) => {
            debug!(event = "unknown_command", conn_id = %conn_id, command = %other);
        }
    }
}
