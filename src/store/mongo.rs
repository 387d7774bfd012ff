use anyhow::{Context, Result};
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document as BsonDocument};
use mongodb::{Client, Collection, Database};
use serde_json::Value;

use crate::model::{display_name, parse_object_id, ChatMessage, ChatThread, Document, ID_FIELD, USER_CHATS};
use crate::store::filter::Filter;
use crate::store::traits::{ChatStore, DocumentStore, Store, UpdateOutcome};

#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and ping so a bad URI fails at startup rather than on first request.
    pub async fn new(database_url: &str, database_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(database_url)
            .await
            .context("Failed to create MongoDB client")?;
        let db = client.database(database_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .context("Failed to reach MongoDB")?;

        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.db.collection(name)
    }

    fn threads(&self) -> Collection<ChatThread> {
        self.db.collection(USER_CHATS)
    }
}

fn filter_to_bson(filter: &Filter) -> Result<BsonDocument> {
    Ok(match filter {
        Filter::All => doc! {},
        Filter::Id(id) => doc! { "_id": *id },
        Filter::NotId(id) => doc! { "_id": { "$ne": *id } },
        Filter::Eq(field, value) => {
            let mut clause = BsonDocument::new();
            clause.insert(field.as_str(), bson::to_bson(value)?);
            clause
        }
        Filter::And(clauses) => {
            let clauses = clauses
                .iter()
                .map(filter_to_bson)
                .collect::<Result<Vec<_>>>()?;
            doc! { "$and": clauses }
        }
    })
}

/// JSON document to BSON. A hex `_id` becomes an ObjectId; a missing one is generated.
fn document_to_bson(mut doc: Document) -> Result<(ObjectId, BsonDocument)> {
    let id = doc
        .remove(ID_FIELD)
        .and_then(|v| v.as_str().and_then(parse_object_id))
        .unwrap_or_else(ObjectId::new);
    let mut bson_doc = bson::to_document(&doc).context("Failed to encode document")?;
    bson_doc.insert(ID_FIELD, id);
    Ok((id, bson_doc))
}

/// BSON to JSON with `_id` rendered as its 24-char hex form.
fn document_from_bson(doc: BsonDocument) -> Document {
    doc.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Bson::ObjectId(id) => Value::String(id.to_hex()),
                other => other.into_relaxed_extjson(),
            };
            (key, value)
        })
        .collect()
}

#[async_trait::async_trait]
impl DocumentStore for MongoStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .find(filter_to_bson(filter)?)
            .await
            .with_context(|| format!("Failed to query {}", collection))?;
        let docs: Vec<BsonDocument> = cursor
            .try_collect()
            .await
            .with_context(|| format!("Failed to read {}", collection))?;
        Ok(docs.into_iter().map(document_from_bson).collect())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let doc = self
            .collection(collection)
            .find_one(filter_to_bson(filter)?)
            .await
            .with_context(|| format!("Failed to fetch from {}", collection))?;
        Ok(doc.map(document_from_bson))
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Document> {
        let (_, bson_doc) = document_to_bson(doc)?;
        self.collection(collection)
            .insert_one(&bson_doc)
            .await
            .with_context(|| format!("Failed to insert into {}", collection))?;
        Ok(document_from_bson(bson_doc))
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<Document>> {
        let bson_docs = docs
            .into_iter()
            .map(|d| document_to_bson(d).map(|(_, b)| b))
            .collect::<Result<Vec<_>>>()?;
        self.collection(collection)
            .insert_many(&bson_docs)
            .await
            .with_context(|| format!("Failed to bulk insert into {}", collection))?;
        Ok(bson_docs.into_iter().map(document_from_bson).collect())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        mut set: Document,
    ) -> Result<UpdateOutcome> {
        set.remove(ID_FIELD);
        let set = bson::to_document(&set).context("Failed to encode update")?;
        let result = self
            .collection(collection)
            .update_one(filter_to_bson(filter)?, doc! { "$set": set })
            .await
            .with_context(|| format!("Failed to update {}", collection))?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool> {
        let result = self
            .collection(collection)
            .delete_one(filter_to_bson(filter)?)
            .await
            .with_context(|| format!("Failed to delete from {}", collection))?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let result = self
            .collection(collection)
            .delete_many(filter_to_bson(filter)?)
            .await
            .with_context(|| format!("Failed to delete from {}", collection))?;
        Ok(result.deleted_count)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.collection(collection)
            .count_documents(filter_to_bson(filter)?)
            .await
            .with_context(|| format!("Failed to count {}", collection))
    }
}

#[async_trait::async_trait]
impl ChatStore for MongoStore {
    async fn get_thread(&self, user_id: &str) -> Result<Option<ChatThread>> {
        self.threads()
            .find_one(doc! { "userId": user_id })
            .await
            .context("Failed to fetch chat thread")
    }

    async fn list_threads(&self) -> Result<Vec<ChatThread>> {
        let cursor = self
            .threads()
            .find(doc! {})
            .sort(doc! { "lastActivity": -1 })
            .await
            .context("Failed to query chat threads")?;
        cursor
            .try_collect()
            .await
            .context("Failed to read chat threads")
    }

    async fn append_message(
        &self,
        user_id: &str,
        user_name: Option<&str>,
        message: &ChatMessage,
    ) -> Result<()> {
        let user_name = display_name(user_id, user_name);
        let message_bson = bson::to_bson(message).context("Failed to encode chat message")?;

        self.threads()
            .update_one(
                doc! { "userId": user_id },
                doc! {
                    "$push": { "messages": message_bson },
                    "$set": { "lastActivity": message.timestamp.as_str() },
                    "$setOnInsert": {
                        "userName": user_name,
                        "createdAt": message.timestamp.as_str(),
                    },
                },
            )
            .upsert(true)
            .await
            .context("Failed to append chat message")?;
        Ok(())
    }

    async fn mark_user_messages_read(&self, user_id: &str) -> Result<bool> {
        let result = self
            .threads()
            .update_one(
                doc! { "userId": user_id },
                doc! { "$set": { "messages.$[m].read": true } },
            )
            .array_filters(vec![doc! { "m.sender": "user" }])
            .await
            .context("Failed to mark chat messages read")?;
        Ok(result.matched_count > 0)
    }

    async fn delete_thread(&self, user_id: &str) -> Result<bool> {
        let result = self
            .threads()
            .delete_one(doc! { "userId": user_id })
            .await
            .context("Failed to delete chat thread")?;
        Ok(result.deleted_count > 0)
    }
}

impl Store for MongoStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_translation() {
        let id = ObjectId::new();
        let filter = Filter::eq("postId", "p1").and(Filter::NotId(id));
        let translated = filter_to_bson(&filter).unwrap();
        assert_eq!(
            translated,
            doc! { "$and": [ { "postId": "p1" }, { "_id": { "$ne": id } } ] }
        );
        assert_eq!(filter_to_bson(&Filter::All).unwrap(), doc! {});
    }

    #[test]
    fn test_document_conversion_keeps_hex_ids() {
        let id = ObjectId::new();
        let source = match json!({"_id": id.to_hex(), "name": "Logo", "size": 42}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let (assigned, encoded) = document_to_bson(source).unwrap();
        assert_eq!(assigned, id);
        assert_eq!(encoded.get_object_id(ID_FIELD).unwrap(), id);

        let decoded = document_from_bson(encoded);
        assert_eq!(decoded[ID_FIELD], json!(id.to_hex()));
        assert_eq!(decoded["size"], json!(42));
    }
}
