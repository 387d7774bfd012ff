use chrono::{SecondsFormat, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::FieldError;

/// A stored record: a flat JSON object. `_id` is always a 24-char hex string.
pub type Document = serde_json::Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Parse a 24-character hex document identifier.
pub fn parse_object_id(raw: &str) -> Option<ObjectId> {
    if raw.len() != 24 {
        return None;
    }
    ObjectId::parse_str(raw).ok()
}

pub fn generate_object_id() -> String {
    ObjectId::new().to_hex()
}

/// External identifiers (Firebase UIDs, post ids, chat user ids): `[A-Za-z0-9_-]+`.
pub fn is_uid(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn is_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !domain.contains('@')
        && !raw.chars().any(char::is_whitespace)
}

/// Fixed-width RFC 3339 timestamp so stored values sort lexicographically.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn to_document<T: Serialize>(value: &T) -> anyhow::Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, got {}", other),
    }
}

pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Stamp a freshly created document. A client-supplied `createdAt` is kept.
pub fn stamp_created(doc: &mut Document) {
    let now = now_timestamp();
    doc.entry(CREATED_AT.to_string())
        .or_insert_with(|| Value::String(now.clone()));
    doc.insert(UPDATED_AT.to_string(), Value::String(now));
}

pub fn stamp_updated(doc: &mut Document) {
    doc.insert(UPDATED_AT.to_string(), Value::String(now_timestamp()));
}

/// Accept a JSON number, or a string holding one.
pub fn coerce_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Number::from(i))
            } else {
                s.parse::<f64>().ok().and_then(Number::from_f64)
            }
        }
        _ => None,
    }
}

pub fn require_text(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>) {
    if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
        errors.push(FieldError::new(field, &format!("{} is required", field)));
    }
}
