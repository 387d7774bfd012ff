use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{ChatMessage, ChatSummary};

/// Frames sent by browsers, `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinUserChat {
        user_id: String,
        #[serde(default)]
        user_name: Option<String>,
    },
    JoinAdmin,
    SendUserMessage {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    SendAdminMessage { user_id: String, text: String },
    #[serde(rename_all = "camelCase")]
    MarkMessagesAsRead { user_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    UserChatHistory {
        messages: Vec<ChatMessage>,
    },
    AllUserChats(BTreeMap<String, ChatSummary>),
    #[serde(rename_all = "camelCase")]
    ReceiveUserMessage {
        user_id: String,
        message: ChatMessage,
    },
    #[serde(rename_all = "camelCase")]
    NewUserMessage {
        user_id: String,
        user_name: String,
        message: ChatMessage,
    },
    #[serde(rename_all = "camelCase")]
    MessagesMarkedRead { user_id: String, updated: bool },
}
