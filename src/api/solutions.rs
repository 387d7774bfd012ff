use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Router,
};
use serde_json::Value;

use crate::api::extract::ValidJson;
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    stamp_created, stamp_updated, Document, SolutionGroupRequest, SolutionItemUpdate, SOLUTIONS,
};
use crate::store::{Filter, Store};

fn group_not_found() -> ApiError {
    ApiError::not_found("Solution category not found")
}

fn by_category(category: &str) -> Filter {
    Filter::eq("category", category)
}

pub async fn list_groups<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<Vec<Document>>> {
    let groups = state.store.find(SOLUTIONS, &Filter::All).await?;
    Ok(response::list(groups))
}

pub async fn get_group<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(category): Path<String>,
) -> ApiResult<Reply<Document>> {
    let group = state
        .store
        .find_one(SOLUTIONS, &by_category(&category))
        .await?
        .ok_or_else(group_not_found)?;
    Ok(response::data(group))
}

/// One document per category: POST replaces the solution list when the
/// category exists, otherwise creates it.
pub async fn upsert_group<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<SolutionGroupRequest>,
) -> ApiResult<(StatusCode, Reply<Document>)> {
    let (category, solutions) = body
        .into_parts()
        .map_err(|e| ApiError::bad_request(e.message))?;
    let filter = by_category(&category);

    let mut fields = Document::new();
    fields.insert("solutions".to_string(), Value::Array(solutions));

    if state.store.count(SOLUTIONS, &filter).await? > 0 {
        stamp_updated(&mut fields);
        state.store.update_one(SOLUTIONS, &filter, fields).await?;
        let group = state
            .store
            .find_one(SOLUTIONS, &filter)
            .await?
            .ok_or_else(group_not_found)?;
        return Ok((
            StatusCode::OK,
            response::with_message("Solution category updated successfully", group),
        ));
    }

    fields.insert("category".to_string(), Value::String(category));
    stamp_created(&mut fields);
    let stored = state.store.insert_one(SOLUTIONS, fields).await?;
    Ok(response::created(
        "Solution category created successfully",
        stored,
    ))
}

pub async fn delete_group<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(category): Path<String>,
) -> ApiResult<Reply<()>> {
    if !state.store.delete_one(SOLUTIONS, &by_category(&category)).await? {
        return Err(group_not_found());
    }
    Ok(response::message("Solution category deleted successfully"))
}

pub async fn update_item<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path((category, item_id)): Path<(String, String)>,
    ValidJson(update): ValidJson<SolutionItemUpdate>,
) -> ApiResult<Reply<Document>> {
    let item_id: i64 = item_id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid item ID"))?;
    let filter = by_category(&category);
    let item_missing = || ApiError::not_found("Solution item not found");

    let group = state
        .store
        .find_one(SOLUTIONS, &filter)
        .await?
        .ok_or_else(item_missing)?;
    let mut solutions = match group.get("solutions") {
        Some(Value::Array(items)) => items.clone(),
        _ => return Err(item_missing()),
    };
    if !update.apply(&mut solutions, item_id) {
        return Err(item_missing());
    }

    let mut fields = Document::new();
    fields.insert("solutions".to_string(), Value::Array(solutions));
    stamp_updated(&mut fields);
    state.store.update_one(SOLUTIONS, &filter, fields).await?;

    let group = state
        .store
        .find_one(SOLUTIONS, &filter)
        .await?
        .ok_or_else(group_not_found)?;
    Ok(response::with_message(
        "Solution item updated successfully",
        group,
    ))
}

pub fn router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(list_groups::<S>).post(upsert_group::<S>))
        .route("/category/:category", get(get_group::<S>))
        .route("/:category", delete(delete_group::<S>))
        .route("/:category/item/:itemId", put(update_item::<S>))
}
