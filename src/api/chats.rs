use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch, post},
    Router,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::api::extract::{ExternalId, ValidJson};
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::chat::socket::chat_socket;
use crate::error::{ApiError, ApiResult};
use crate::model::{is_uid, ChatMessage, ChatStats, ChatSummary, NewChatMessage};
use crate::store::Store;

#[derive(Debug, Serialize)]
pub struct History {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResult {
    pub updated: bool,
}

pub async fn all_chats<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<BTreeMap<String, ChatSummary>>> {
    Ok(response::data(state.chat.snapshot().await?))
}

pub async fn user_history<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ExternalId(user_id): ExternalId,
) -> ApiResult<Reply<History>> {
    let messages = state.chat.history(&user_id).await?;
    Ok(response::data(History { messages }))
}

/// Same path as a live socket message: persisted, then fanned out to both rooms.
pub async fn post_message<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<NewChatMessage>,
) -> ApiResult<(StatusCode, Reply<ChatMessage>)> {
    let (Some(user_id), Some(text), Some(sender)) = (
        body.user_id.filter(|id| !id.is_empty()),
        body.text.filter(|text| !text.trim().is_empty()),
        body.sender_type,
    ) else {
        return Err(ApiError::bad_request(
            "userId, text, and senderType are required",
        ));
    };
    if !is_uid(&user_id) {
        return Err(ApiError::bad_request("Invalid user ID format"));
    }

    let message = state
        .chat
        .deliver(&user_id, body.user_name.as_deref(), text, sender)
        .await?;
    Ok(response::created("Message sent", message))
}

pub async fn mark_read<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ExternalId(user_id): ExternalId,
) -> ApiResult<Reply<MarkReadResult>> {
    let updated = state.chat.mark_read(&user_id).await?;
    Ok(response::with_message(
        "Messages marked as read",
        MarkReadResult { updated },
    ))
}

pub async fn delete_chat<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ExternalId(user_id): ExternalId,
) -> ApiResult<Reply<()>> {
    if !state.store.delete_thread(&user_id).await? {
        return Err(ApiError::not_found("Chat not found"));
    }
    log::info!("Deleted chat for {}", user_id);
    Ok(response::message("User chat deleted"))
}

pub async fn stats<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<ChatStats>> {
    let threads = state.store.list_threads().await?;
    Ok(response::data(ChatStats::compute(&threads, chrono::Utc::now())))
}

pub fn router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/ws", get(chat_socket::<S>))
        .route("/admin/all", get(all_chats::<S>))
        .route("/admin/stats", get(stats::<S>))
        .route("/admin/mark-read/:userId", patch(mark_read::<S>))
        .route("/admin/chat/:userId", delete(delete_chat::<S>))
        .route("/user/message", post(post_message::<S>))
        .route("/user/:userId", get(user_history::<S>))
}
