use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::model::{generate_object_id, ChatMessage, ChatThread, Document, Sender, ID_FIELD};
use crate::store::filter::Filter;
use crate::store::traits::{ChatStore, DocumentStore, Store, UpdateOutcome};

/// Process-local store used for development (`database.in_memory`) and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Documents keyed by collection name, in insertion order
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
    /// Chat threads keyed by user id
    threads: Arc<RwLock<HashMap<String, ChatThread>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn assign_id(mut doc: Document) -> Document {
    let has_id = matches!(doc.get(ID_FIELD), Some(Value::String(id)) if !id.is_empty());
    if !has_id {
        doc.insert(ID_FIELD.to_string(), Value::String(generate_object_id()));
    }
    doc
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Document> {
        let doc = assign_id(doc);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<Document>> {
        let docs: Vec<Document> = docs.into_iter().map(assign_id).collect();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs.iter().cloned());
        Ok(docs)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateOutcome> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)))
        else {
            return Ok(UpdateOutcome::default());
        };

        let mut modified = false;
        for (key, value) in set {
            if key == ID_FIELD {
                continue;
            }
            if doc.get(&key) != Some(&value) {
                doc.insert(key, value);
                modified = true;
            }
        }

        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                docs.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|d| filter.matches(d)).count()) as u64)
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryStore {
    async fn get_thread(&self, user_id: &str) -> Result<Option<ChatThread>> {
        Ok(self.threads.read().await.get(user_id).cloned())
    }

    async fn list_threads(&self) -> Result<Vec<ChatThread>> {
        let threads = self.threads.read().await;
        let mut all: Vec<ChatThread> = threads.values().cloned().collect();
        all.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(all)
    }

    async fn append_message(
        &self,
        user_id: &str,
        user_name: Option<&str>,
        message: &ChatMessage,
    ) -> Result<()> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .entry(user_id.to_string())
            .or_insert_with(|| ChatThread::new(user_id, user_name));
        thread.messages.push(message.clone());
        thread.last_activity = message.timestamp.clone();
        Ok(())
    }

    async fn mark_user_messages_read(&self, user_id: &str) -> Result<bool> {
        let mut threads = self.threads.write().await;
        let Some(thread) = threads.get_mut(user_id) else {
            return Ok(false);
        };
        thread
            .messages
            .iter_mut()
            .filter(|m| m.sender == Sender::User)
            .for_each(|m| m.read = true);
        Ok(true)
    }

    async fn delete_thread(&self, user_id: &str) -> Result<bool> {
        Ok(self.threads.write().await.remove(user_id).is_some())
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_filters() {
        let store = MemoryStore::new();
        let a = store
            .insert_one("products", doc(json!({"name": "A", "category": "x"})))
            .await
            .unwrap();
        store
            .insert_one("products", doc(json!({"name": "B", "category": "y"})))
            .await
            .unwrap();

        let id = a[ID_FIELD].as_str().unwrap();
        assert_eq!(id.len(), 24);
        assert_eq!(store.count("products", &Filter::All).await.unwrap(), 2);

        let xs = store
            .find("products", &Filter::eq("category", "x"))
            .await
            .unwrap();
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0]["name"], json!("A"));

        assert!(store.find("missing", &Filter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_reports_matched_and_modified() {
        let store = MemoryStore::new();
        let stored = store
            .insert_one("blogs", doc(json!({"title": "T"})))
            .await
            .unwrap();
        let oid = crate::model::parse_object_id(stored[ID_FIELD].as_str().unwrap()).unwrap();

        let outcome = store
            .update_one("blogs", &Filter::id(oid), doc(json!({"title": "T"})))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0 });

        let outcome = store
            .update_one("blogs", &Filter::id(oid), doc(json!({"title": "U"})))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

        let missing = crate::model::parse_object_id("507f1f77bcf86cd799439011").unwrap();
        let outcome = store
            .update_one("blogs", &Filter::id(missing), doc(json!({"title": "V"})))
            .await
            .unwrap();
        assert_eq!(outcome.matched, 0);
    }

    #[tokio::test]
    async fn test_delete_one_then_again() {
        let store = MemoryStore::new();
        let stored = store
            .insert_one("portfolio", doc(json!({"title": "P"})))
            .await
            .unwrap();
        let oid = crate::model::parse_object_id(stored[ID_FIELD].as_str().unwrap()).unwrap();

        assert!(store.delete_one("portfolio", &Filter::id(oid)).await.unwrap());
        assert!(!store.delete_one("portfolio", &Filter::id(oid)).await.unwrap());
    }

    #[tokio::test]
    async fn test_chat_thread_lifecycle() {
        let store = MemoryStore::new();
        let hello = ChatMessage::new("hello".to_string(), Sender::User);
        let reply = ChatMessage::new("hi there".to_string(), Sender::Admin);

        store.append_message("u_1", Some("Rafi"), &hello).await.unwrap();
        store.append_message("u_1", Some("Other"), &reply).await.unwrap();

        let thread = store.get_thread("u_1").await.unwrap().unwrap();
        assert_eq!(thread.user_name, "Rafi");
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.unread_from_user(), 1);

        assert!(store.mark_user_messages_read("u_1").await.unwrap());
        let thread = store.get_thread("u_1").await.unwrap().unwrap();
        assert_eq!(thread.unread_from_user(), 0);
        assert!(thread.messages[1].read);

        assert!(!store.mark_user_messages_read("nobody").await.unwrap());
        assert!(store.delete_thread("u_1").await.unwrap());
        assert!(!store.delete_thread("u_1").await.unwrap());
    }
}
