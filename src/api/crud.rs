//! Generic list/get/create/replace/patch/delete handlers for any [`Resource`].

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::extract::{DocumentId, ValidJson};
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{stamp_created, stamp_updated, Document, Resource, ID_FIELD};
use crate::store::{Filter, Store};

/// Bulk bodies: a JSON array, or a single object for convenience.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<R> {
    Many(Vec<R>),
    One(R),
}

impl<R> OneOrMany<R> {
    fn into_vec(self) -> Vec<R> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

pub fn not_found<R: Resource>() -> ApiError {
    ApiError::not_found(format!("{} not found", R::NAME))
}

/// Validate a create body and turn it into a stamped document without `_id`.
pub fn prepare<R: Resource>(body: R) -> ApiResult<Document> {
    let errors = body.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let mut doc = body.into_document()?;
    doc.remove(ID_FIELD);
    stamp_created(&mut doc);
    Ok(doc)
}

pub async fn list<S: Store + 'static, R: Resource>(
    State(state): State<AppState<S>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Reply<Vec<Document>>> {
    let filter = R::FILTER_FIELD
        .and_then(|field| params.get(field).map(|value| Filter::eq(field, value.as_str())))
        .unwrap_or(Filter::All);
    let docs = state.store.find(R::COLLECTION, &filter).await?;
    Ok(response::list(docs))
}

pub async fn get_one<S: Store + 'static, R: Resource>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
) -> ApiResult<Reply<Document>> {
    let doc = state
        .store
        .find_one(R::COLLECTION, &Filter::id(id))
        .await?
        .ok_or_else(not_found::<R>)?;
    Ok(response::data(doc))
}

pub async fn create<S: Store + 'static, R: Resource>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<R>,
) -> ApiResult<(StatusCode, Reply<Document>)> {
    let doc = prepare(body)?;
    let stored = state.store.insert_one(R::COLLECTION, doc).await?;
    log::info!("Created {} in {}", R::NAME, R::COLLECTION);
    Ok(response::created(
        format!("{} created successfully", R::NAME),
        stored,
    ))
}

/// Bulk insert; one invalid item rejects the whole request.
pub async fn create_many<S: Store + 'static, R: Resource>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<OneOrMany<R>>,
) -> ApiResult<(StatusCode, Reply<Vec<Document>>)> {
    let items = body.into_vec();
    if items.is_empty() {
        return Err(ApiError::bad_request("At least one item is required"));
    }
    let docs = items
        .into_iter()
        .map(prepare)
        .collect::<ApiResult<Vec<_>>>()?;
    let stored = state.store.insert_many(R::COLLECTION, docs).await?;
    log::info!("Inserted {} documents into {}", stored.len(), R::COLLECTION);
    Ok(response::created(
        format!("{} items created successfully", stored.len()),
        stored,
    ))
}

/// PUT: the full body is validated, then `$set` over the stored document.
pub async fn replace<S: Store + 'static, R: Resource>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
    ValidJson(body): ValidJson<R>,
) -> ApiResult<Reply<Document>> {
    let errors = body.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let mut doc = body.into_document()?;
    stamp_updated(&mut doc);
    update_and_fetch::<S, R>(&state, id, doc).await
}

/// PATCH: merge whatever fields were sent.
pub async fn patch<S: Store + 'static, R: Resource>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
    ValidJson(mut fields): ValidJson<Document>,
) -> ApiResult<Reply<Document>> {
    stamp_updated(&mut fields);
    update_and_fetch::<S, R>(&state, id, fields).await
}

async fn update_and_fetch<S: Store + 'static, R: Resource>(
    state: &AppState<S>,
    id: mongodb::bson::oid::ObjectId,
    mut fields: Document,
) -> ApiResult<Reply<Document>> {
    fields.remove(ID_FIELD);
    let filter = Filter::id(id);
    let outcome = state.store.update_one(R::COLLECTION, &filter, fields).await?;
    if outcome.matched == 0 {
        return Err(not_found::<R>());
    }
    let updated = state
        .store
        .find_one(R::COLLECTION, &filter)
        .await?
        .ok_or_else(not_found::<R>)?;
    Ok(response::with_message(
        format!("{} updated successfully", R::NAME),
        updated,
    ))
}

pub async fn remove<S: Store + 'static, R: Resource>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
) -> ApiResult<Reply<()>> {
    if !state.store.delete_one(R::COLLECTION, &Filter::id(id)).await? {
        return Err(not_found::<R>());
    }
    log::info!("Deleted {} from {}", R::NAME, R::COLLECTION);
    Ok(response::message(format!("{} deleted successfully", R::NAME)))
}

fn by_id_routes<S: Store + 'static, R: Resource>() -> Router<AppState<S>> {
    Router::new().route(
        "/:id",
        get(get_one::<S, R>)
            .put(replace::<S, R>)
            .patch(patch::<S, R>)
            .delete(remove::<S, R>),
    )
}

/// `/` list + create, `/:id` get/put/patch/delete.
pub fn resource_router<S: Store + 'static, R: Resource>() -> Router<AppState<S>> {
    by_id_routes::<S, R>().route("/", get(list::<S, R>).post(create::<S, R>))
}

/// Same as [`resource_router`] but POST takes an array.
pub fn bulk_resource_router<S: Store + 'static, R: Resource>() -> Router<AppState<S>> {
    by_id_routes::<S, R>().route("/", get(list::<S, R>).post(create_many::<S, R>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Blog, Category, CREATED_AT, UPDATED_AT};
    use serde_json::json;

    #[test]
    fn test_prepare_strips_id_and_stamps() {
        let blog: Blog = serde_json::from_value(json!({
            "_id": "507f1f77bcf86cd799439011",
            "title": "Launch",
            "tags": ["news"],
        }))
        .unwrap();
        let doc = prepare(blog).unwrap();
        assert!(!doc.contains_key(ID_FIELD));
        assert_eq!(doc["tags"], json!(["news"]));
        assert!(doc.contains_key(CREATED_AT));
        assert!(doc.contains_key(UPDATED_AT));
    }

    #[test]
    fn test_prepare_reports_field_errors() {
        let blog: Blog = serde_json::from_value(json!({"category": "news"})).unwrap();
        match prepare(blog) {
            Err(ApiError::Validation(errors)) => assert_eq!(errors[0].field, "title"),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_one_or_many() {
        let many: OneOrMany<Category> =
            serde_json::from_value(json!([{"name": "Web"}, {"name": "Mobile"}])).unwrap();
        assert_eq!(many.into_vec().len(), 2);
        let one: OneOrMany<Category> = serde_json::from_value(json!({"name": "Web"})).unwrap();
        assert_eq!(one.into_vec().len(), 1);
    }
}
