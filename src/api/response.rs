use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Success envelope shared by every route: `{success, message?, count?, data?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type Reply<T> = Json<Envelope<T>>;

pub fn data<T: Serialize>(data: T) -> Reply<T> {
    Json(Envelope {
        success: true,
        message: None,
        count: None,
        data: Some(data),
    })
}

pub fn list<T: Serialize>(items: Vec<T>) -> Reply<Vec<T>> {
    Json(Envelope {
        success: true,
        message: None,
        count: Some(items.len()),
        data: Some(items),
    })
}

pub fn message(message: impl Into<String>) -> Reply<()> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        count: None,
        data: None,
    })
}

pub fn with_message<T: Serialize>(message: impl Into<String>, data: T) -> Reply<T> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        count: None,
        data: Some(data),
    })
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Reply<T>) {
    (StatusCode::CREATED, with_message(message, data))
}
