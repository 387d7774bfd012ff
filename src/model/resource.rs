use serde::{de::DeserializeOwned, Serialize};

use crate::error::FieldError;
use crate::model::common::{to_document, Document};

/// Request contract for a collection served by the generic CRUD handlers.
pub trait Resource: DeserializeOwned + Serialize + Send + 'static {
    /// Backing collection name.
    const COLLECTION: &'static str;
    /// Human label used in response messages ("Blog", "Portfolio item").
    const NAME: &'static str;
    /// Query-string field the list route may filter on.
    const FILTER_FIELD: Option<&'static str> = None;

    fn validate(&self) -> Vec<FieldError> {
        Vec::new()
    }

    /// Stored shape of a create/replace body, before timestamps. Defaults are
    /// filled in here.
    fn into_document(self) -> anyhow::Result<Document> {
        to_document(&self)
    }
}
