use anyhow::Result;

use crate::model::{ChatMessage, ChatThread, Document};
use crate::store::filter::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Collection-level operations shared by every resource router.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;
    /// Insert and return the stored document, `_id` included.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Document>;
    /// All-or-nothing bulk insert.
    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<Document>>;
    /// `$set` the given fields on the first match.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateOutcome>;
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool>;
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64>;
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;
}

/// Per-user chat history
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    async fn get_thread(&self, user_id: &str) -> Result<Option<ChatThread>>;
    async fn list_threads(&self) -> Result<Vec<ChatThread>>;
    /// Append to the user's thread, creating it on first message.
    async fn append_message(
        &self,
        user_id: &str,
        user_name: Option<&str>,
        message: &ChatMessage,
    ) -> Result<()>;
    /// Flag every user-authored message read. Returns false when there is no thread.
    async fn mark_user_messages_read(&self, user_id: &str) -> Result<bool>;
    async fn delete_thread(&self, user_id: &str) -> Result<bool>;
}

pub trait Store: DocumentStore + ChatStore + Send + Sync {}
