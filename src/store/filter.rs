use mongodb::bson::oid::ObjectId;
use serde_json::Value;

use crate::model::{Document, ID_FIELD};

/// Equality-only query, the subset of MongoDB filters the routers need.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(ObjectId),
    NotId(ObjectId),
    Eq(String, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn id(id: ObjectId) -> Self {
        Filter::Id(id)
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut clauses) => {
                clauses.push(other);
                Filter::And(clauses)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// In-process evaluation against a stored document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => doc.get(ID_FIELD).and_then(Value::as_str) == Some(&id.to_hex()),
            Filter::NotId(id) => doc.get(ID_FIELD).and_then(Value::as_str) != Some(&id.to_hex()),
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
        }
    }
}

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

    #[test]
    fn test_matches() {
        let id = ObjectId::new();
        let d = doc(json!({"_id": id.to_hex(), "category": "Hosting", "price": 10}));

        assert!(Filter::All.matches(&d));
        assert!(Filter::id(id).matches(&d));
        assert!(!Filter::NotId(id).matches(&d));
        assert!(Filter::eq("category", "Hosting").matches(&d));
        assert!(!Filter::eq("category", "Domains").matches(&d));
        assert!(Filter::eq("price", 10).matches(&d));
        assert!(!Filter::eq("missing", "x").matches(&d));
    }

    #[test]
    fn test_and_flattens() {
        let id = ObjectId::new();
        let combined = Filter::All
            .and(Filter::eq("postId", "p1"))
            .and(Filter::NotId(id));
        assert_eq!(
            combined,
            Filter::And(vec![Filter::eq("postId", "p1"), Filter::NotId(id)])
        );
    }
}
