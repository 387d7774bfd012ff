use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::common::now_timestamp;

pub const USER_CHATS: &str = "userChats";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: String,
    pub read: bool,
}

impl ChatMessage {
    /// Admin-authored messages are born read; user messages wait for an admin.
    pub fn new(text: String, sender: Sender) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            sender,
            timestamp: now_timestamp(),
            read: sender == Sender::Admin,
        }
    }

    pub fn is_unread_from_user(&self) -> bool {
        self.sender == Sender::User && !self.read
    }
}

/// One user's persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: String,
    pub last_activity: String,
}

impl ChatThread {
    pub fn new(user_id: &str, user_name: Option<&str>) -> Self {
        let now = now_timestamp();
        Self {
            user_id: user_id.to_string(),
            user_name: display_name(user_id, user_name),
            messages: Vec::new(),
            created_at: now.clone(),
            last_activity: now,
        }
    }

    pub fn unread_from_user(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.is_unread_from_user())
            .count()
    }
}

/// A supplied name with something other than whitespace in it.
pub fn given_name(user_name: Option<&str>) -> Option<&str> {
    user_name.filter(|name| !name.trim().is_empty())
}

/// The supplied name, or the guest name when it is missing or blank.
pub fn display_name(user_id: &str, user_name: Option<&str>) -> String {
    given_name(user_name)
        .map(str::to_string)
        .unwrap_or_else(|| guest_name(user_id))
}

/// `Guest_` plus the last four characters of the user id.
pub fn guest_name(user_id: &str) -> String {
    let chars: Vec<char> = user_id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("Guest_{}", tail)
}

/// Admin snapshot entry, keyed by user id in `allUserChats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub user_name: String,
    pub messages: Vec<ChatMessage>,
    pub last_activity: String,
}

pub fn summarize(threads: Vec<ChatThread>) -> BTreeMap<String, ChatSummary> {
    threads
        .into_iter()
        .map(|thread| {
            (
                thread.user_id,
                ChatSummary {
                    user_name: thread.user_name,
                    messages: thread.messages,
                    last_activity: thread.last_activity,
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    pub total_chats: usize,
    pub active_today: usize,
    pub total_unread_messages: usize,
    pub chats_with_unread_messages: usize,
}

impl ChatStats {
    pub fn compute(threads: &[ChatThread], now: DateTime<Utc>) -> Self {
        let since = now - Duration::hours(24);
        let active_today = threads
            .iter()
            .filter(|t| {
                DateTime::parse_from_rfc3339(&t.last_activity)
                    .map_or(false, |ts| ts.with_timezone(&Utc) >= since)
            })
            .count();
        let unread: Vec<usize> = threads.iter().map(ChatThread::unread_from_user).collect();

        Self {
            total_chats: threads.len(),
            active_today,
            total_unread_messages: unread.iter().sum(),
            chats_with_unread_messages: unread.iter().filter(|&&n| n > 0).count(),
        }
    }
}

/// REST body for posting a message outside of a live socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatMessage {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub text: Option<String>,
    pub sender_type: Option<Sender>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(user_id: &str, last_activity: &str, messages: Vec<ChatMessage>) -> ChatThread {
        ChatThread {
            user_id: user_id.to_string(),
            user_name: user_id.to_string(),
            messages,
            created_at: last_activity.to_string(),
            last_activity: last_activity.to_string(),
        }
    }

    #[test]
    fn test_guest_name_uses_last_four_chars() {
        assert_eq!(guest_name("visitor-8f3a"), "Guest_8f3a");
        assert_eq!(guest_name("ab"), "Guest_ab");
        assert_eq!(ChatThread::new("user_1234", None).user_name, "Guest_1234");
        assert_eq!(ChatThread::new("user_1234", Some("Mim")).user_name, "Mim");
    }

    #[test]
    fn test_blank_names_fall_back_to_guest() {
        assert_eq!(ChatThread::new("visitor_42", Some("")).user_name, "Guest_r_42");
        assert_eq!(ChatThread::new("visitor_42", Some("  ")).user_name, "Guest_r_42");
        assert_eq!(display_name("visitor_42", Some(" Mim ")), " Mim ");
        assert_eq!(given_name(Some("\t")), None);
    }

    #[test]
    fn test_message_read_flag_depends_on_sender() {
        assert!(!ChatMessage::new("hi".to_string(), Sender::User).read);
        assert!(ChatMessage::new("hello".to_string(), Sender::Admin).read);
    }

    #[test]
    fn test_stats() {
        let now = Utc::now();
        let recent = (now - Duration::hours(1)).to_rfc3339();
        let stale = (now - Duration::hours(30)).to_rfc3339();

        let threads = vec![
            thread(
                "a",
                &recent,
                vec![
                    ChatMessage::new("1".to_string(), Sender::User),
                    ChatMessage::new("2".to_string(), Sender::User),
                    ChatMessage::new("3".to_string(), Sender::Admin),
                ],
            ),
            thread("b", &stale, vec![ChatMessage::new("x".to_string(), Sender::Admin)]),
        ];

        let stats = ChatStats::compute(&threads, now);
        assert_eq!(
            stats,
            ChatStats {
                total_chats: 2,
                active_today: 1,
                total_unread_messages: 2,
                chats_with_unread_messages: 1,
            }
        );
    }
}
