use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::api::state::AppState;
use crate::chat::events::{ClientEvent, ServerEvent};
use crate::chat::service::ChatService;
use crate::store::Store;

/// GET /chats/ws
pub async fn chat_socket<S: Store + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> Response {
    let chat = state.chat.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, chat))
}

async fn handle_connection<S: Store + 'static>(socket: WebSocket, chat: ChatService<S>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = chat.hub().connect(outbox);
    log::debug!("Chat connection {} opened", conn);

    let writer = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    log::error!("Failed to encode chat event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Frames from one socket are handled in order, one at a time.
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => chat.handle(conn, event).await,
                Err(e) => log::warn!("Ignoring undecodable chat frame on {}: {}", conn, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("Chat connection {} errored: {}", conn, e);
                break;
            }
        }
    }

    chat.hub().disconnect(conn);
    writer.abort();
    log::debug!("Chat connection {} closed", conn);
}
