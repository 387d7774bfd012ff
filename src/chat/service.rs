use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chat::events::{ClientEvent, ServerEvent};
use crate::chat::hub::{ChatHub, ChatUser, ConnectionId};
use crate::model::{
    display_name, given_name, guest_name, summarize, ChatMessage, ChatSummary, Sender,
};
use crate::store::Store;

/// Chat operations shared by the socket and REST surfaces: persist first,
/// then fan out to the user's room and the admin room.
pub struct ChatService<S> {
    store: Arc<S>,
    hub: Arc<ChatHub>,
}

impl<S> Clone for ChatService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hub: self.hub.clone(),
        }
    }
}

impl<S: Store> ChatService<S> {
    pub fn new(store: Arc<S>, hub: Arc<ChatHub>) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &ChatHub {
        &self.hub
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .store
            .get_thread(user_id)
            .await?
            .map(|thread| thread.messages)
            .unwrap_or_default())
    }

    pub async fn snapshot(&self) -> Result<BTreeMap<String, ChatSummary>> {
        Ok(summarize(self.store.list_threads().await?))
    }

    /// Store the message and emit it to both rooms. Emission happens even
    /// when the write fails; the error is returned for the caller to report.
    pub async fn deliver(
        &self,
        user_id: &str,
        user_name: Option<&str>,
        text: String,
        sender: Sender,
    ) -> Result<ChatMessage> {
        let user_name = given_name(user_name);
        let message = ChatMessage::new(text, sender);
        let persisted = self
            .store
            .append_message(user_id, user_name, &message)
            .await;

        let user_name = match user_name {
            Some(name) => name.to_string(),
            None => self.stored_name(user_id).await,
        };
        self.hub.send_to_user(
            user_id,
            ServerEvent::ReceiveUserMessage {
                user_id: user_id.to_string(),
                message: message.clone(),
            },
        );
        self.hub.broadcast_admins(ServerEvent::NewUserMessage {
            user_id: user_id.to_string(),
            user_name,
            message: message.clone(),
        });

        persisted.map(|_| message)
    }

    pub async fn mark_read(&self, user_id: &str) -> Result<bool> {
        let updated = self.store.mark_user_messages_read(user_id).await?;
        self.hub.broadcast_admins(ServerEvent::MessagesMarkedRead {
            user_id: user_id.to_string(),
            updated,
        });
        Ok(updated)
    }

    async fn stored_name(&self, user_id: &str) -> String {
        match self.store.get_thread(user_id).await {
            Ok(Some(thread)) => thread.user_name,
            _ => guest_name(user_id),
        }
    }

    /// Apply one decoded socket frame. Store failures are logged, never sent back.
    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinUserChat { user_id, user_name } => {
                let name = display_name(&user_id, user_name.as_deref());
                self.hub.join_user(
                    conn,
                    ChatUser {
                        id: user_id.clone(),
                        name,
                    },
                );
                let messages = self.history(&user_id).await.unwrap_or_else(|e| {
                    log::error!("Failed to load chat history for {}: {:#}", user_id, e);
                    Vec::new()
                });
                log::info!("User {} joined chat", user_id);
                self.hub
                    .send_to(conn, ServerEvent::UserChatHistory { messages });
            }
            ClientEvent::JoinAdmin => {
                self.hub.join_admin(conn);
                let chats = self.snapshot().await.unwrap_or_else(|e| {
                    log::error!("Failed to load chat snapshot: {:#}", e);
                    BTreeMap::new()
                });
                log::info!("Admin joined chat ({} threads)", chats.len());
                self.hub.send_to(conn, ServerEvent::AllUserChats(chats));
            }
            ClientEvent::SendUserMessage { text } => {
                let Some(user) = self.hub.user_of(conn) else {
                    log::warn!("Ignoring message from connection {} before join", conn);
                    return;
                };
                if let Err(e) = self
                    .deliver(&user.id, Some(&user.name), text, Sender::User)
                    .await
                {
                    log::error!("Failed to save message from {}: {:#}", user.id, e);
                }
            }
            ClientEvent::SendAdminMessage { user_id, text } => {
                if let Err(e) = self.deliver(&user_id, None, text, Sender::Admin).await {
                    log::error!("Failed to save admin reply to {}: {:#}", user_id, e);
                }
            }
            ClientEvent::MarkMessagesAsRead { user_id } => {
                if let Err(e) = self.mark_read(&user_id).await {
                    log::error!("Failed to mark messages read for {}: {:#}", user_id, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChatStore, MemoryStore};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn service() -> ChatService<MemoryStore> {
        ChatService::new(Arc::new(MemoryStore::new()), Arc::new(ChatHub::new()))
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_user_message_reaches_both_rooms_once() {
        let chat = service();
        let (user_tx, mut user_rx) = unbounded_channel();
        let (admin_tx, mut admin_rx) = unbounded_channel();
        let user = chat.hub().connect(user_tx);
        let admin = chat.hub().connect(admin_tx);

        chat.handle(
            user,
            ClientEvent::JoinUserChat {
                user_id: "visitor_42".to_string(),
                user_name: None,
            },
        )
        .await;
        chat.handle(admin, ClientEvent::JoinAdmin).await;
        assert_eq!(
            drain(&mut user_rx),
            vec![ServerEvent::UserChatHistory { messages: vec![] }]
        );
        assert_eq!(
            drain(&mut admin_rx),
            vec![ServerEvent::AllUserChats(BTreeMap::new())]
        );

        chat.handle(
            user,
            ClientEvent::SendUserMessage {
                text: "Need a quote".to_string(),
            },
        )
        .await;

        let to_user = drain(&mut user_rx);
        let to_admin = drain(&mut admin_rx);
        assert_eq!(to_user.len(), 1);
        assert_eq!(to_admin.len(), 1);
        assert!(matches!(&to_user[0], ServerEvent::ReceiveUserMessage { user_id, .. } if user_id == "visitor_42"));
        match &to_admin[0] {
            ServerEvent::NewUserMessage {
                user_name, message, ..
            } => {
                assert_eq!(user_name, "Guest_r_42");
                assert_eq!(message.text, "Need a quote");
                assert!(!message.read);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let thread = chat.store.get_thread("visitor_42").await.unwrap().unwrap();
        assert_eq!(thread.user_name, "Guest_r_42");
        assert_eq!(thread.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_names_become_guest_names() {
        let chat = service();
        let (user_tx, _user_rx) = unbounded_channel();
        let (admin_tx, mut admin_rx) = unbounded_channel();
        let user = chat.hub().connect(user_tx);
        let admin = chat.hub().connect(admin_tx);
        chat.handle(admin, ClientEvent::JoinAdmin).await;
        drain(&mut admin_rx);

        chat.handle(
            user,
            ClientEvent::JoinUserChat {
                user_id: "visitor_42".to_string(),
                user_name: Some(String::new()),
            },
        )
        .await;
        chat.handle(
            user,
            ClientEvent::SendUserMessage {
                text: "hello".to_string(),
            },
        )
        .await;
        chat.deliver("visitor_77", Some("   "), "rest".to_string(), Sender::User)
            .await
            .unwrap();

        let names: Vec<String> = drain(&mut admin_rx)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::NewUserMessage { user_name, .. } => Some(user_name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["Guest_r_42", "Guest_r_77"]);

        let thread = chat.store.get_thread("visitor_77").await.unwrap().unwrap();
        assert_eq!(thread.user_name, "Guest_r_77");
    }

    #[tokio::test]
    async fn test_mark_read_leaves_admin_messages() {
        let chat = service();
        chat.deliver("u_7", Some("Nadia"), "hi".to_string(), Sender::User)
            .await
            .unwrap();
        chat.deliver("u_7", None, "hello!".to_string(), Sender::Admin)
            .await
            .unwrap();
        chat.deliver("u_7", Some("Nadia"), "prices?".to_string(), Sender::User)
            .await
            .unwrap();

        let (admin_tx, mut admin_rx) = unbounded_channel();
        let admin = chat.hub().connect(admin_tx);
        chat.hub().join_admin(admin);

        chat.handle(
            admin,
            ClientEvent::MarkMessagesAsRead {
                user_id: "u_7".to_string(),
            },
        )
        .await;

        assert_eq!(
            drain(&mut admin_rx),
            vec![ServerEvent::MessagesMarkedRead {
                user_id: "u_7".to_string(),
                updated: true,
            }]
        );
        let messages = chat.history("u_7").await.unwrap();
        assert!(messages.iter().all(|m| m.read));
        assert_eq!(messages[1].sender, Sender::Admin);
    }

    #[tokio::test]
    async fn test_send_before_join_is_ignored() {
        let chat = service();
        let (tx, mut rx) = unbounded_channel();
        let conn = chat.hub().connect(tx);

        chat.handle(
            conn,
            ClientEvent::SendUserMessage {
                text: "hello?".to_string(),
            },
        )
        .await;

        assert!(drain(&mut rx).is_empty());
        assert!(chat.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_reply_reaches_user_room() {
        let chat = service();
        let (user_tx, mut user_rx) = unbounded_channel();
        let user = chat.hub().connect(user_tx);
        chat.handle(
            user,
            ClientEvent::JoinUserChat {
                user_id: "u_9".to_string(),
                user_name: Some("Tariq".to_string()),
            },
        )
        .await;
        drain(&mut user_rx);

        chat.handle(
            user,
            ClientEvent::SendUserMessage {
                text: "hi".to_string(),
            },
        )
        .await;
        chat.handle(
            user,
            ClientEvent::SendAdminMessage {
                user_id: "u_9".to_string(),
                text: "welcome".to_string(),
            },
        )
        .await;

        let events = drain(&mut user_rx);
        assert_eq!(events.len(), 2);
        match &events[1] {
            ServerEvent::ReceiveUserMessage { message, .. } => {
                assert_eq!(message.sender, Sender::Admin);
                assert!(message.read);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
