use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::model::{is_uid, parse_object_id};

/// JSON body whose rejections become 400 responses in the API envelope.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// Single `:id` path segment that must be a 24-hex ObjectId.
#[derive(Debug, Clone, Copy)]
pub struct DocumentId(pub ObjectId);

#[async_trait]
impl<S> FromRequestParts<S> for DocumentId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::invalid_id())?;
        parse_object_id(&raw)
            .map(DocumentId)
            .ok_or_else(ApiError::invalid_id)
    }
}

/// Single path segment holding an external id (`[A-Za-z0-9_-]+`).
#[derive(Debug, Clone)]
pub struct ExternalId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ExternalId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::invalid_id())?;
        if is_uid(&raw) {
            Ok(ExternalId(raw))
        } else {
            Err(ApiError::invalid_id())
        }
    }
}
