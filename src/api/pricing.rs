use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Router,
};
use serde_json::Value;

use crate::api::extract::{DocumentId, ValidJson};
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult, FieldError};
use crate::model::{
    category_name, stamp_created, stamp_updated, to_document, Document, PricingCategoryRequest,
    PricingPlanRequest, PRICING_CATEGORIES, PRICING_PLANS,
};
use crate::store::{Filter, Store};

fn category_not_found() -> ApiError {
    ApiError::not_found("Category not found")
}

fn plan_not_found() -> ApiError {
    ApiError::not_found("Product not found")
}

fn rejected(error: FieldError) -> ApiError {
    ApiError::bad_request(error.message)
}

pub async fn list_categories<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<Vec<Document>>> {
    let categories = state.store.find(PRICING_CATEGORIES, &Filter::All).await?;
    Ok(response::list(categories))
}

pub async fn create_category<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<PricingCategoryRequest>,
) -> ApiResult<(StatusCode, Reply<Document>)> {
    let name = body.name().map_err(rejected)?;
    let taken = state
        .store
        .count(PRICING_CATEGORIES, &Filter::eq("name", name.as_str()))
        .await?;
    if taken > 0 {
        return Err(ApiError::bad_request("Category already exists"));
    }

    let mut doc = Document::new();
    doc.insert("name".to_string(), Value::String(name));
    stamp_created(&mut doc);
    let stored = state.store.insert_one(PRICING_CATEGORIES, doc).await?;
    Ok(response::created("Category created successfully", stored))
}

pub async fn update_category<S: Store + 'static>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
    ValidJson(body): ValidJson<PricingCategoryRequest>,
) -> ApiResult<Reply<()>> {
    let name = body.name().map_err(rejected)?;
    let mut fields = Document::new();
    fields.insert("name".to_string(), Value::String(name));
    stamp_updated(&mut fields);

    let outcome = state
        .store
        .update_one(PRICING_CATEGORIES, &Filter::id(id), fields)
        .await?;
    if outcome.matched == 0 {
        return Err(category_not_found());
    }
    Ok(response::message("Category updated successfully"))
}

/// A category still referenced by a plan cannot be removed.
pub async fn delete_category<S: Store + 'static>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
) -> ApiResult<Reply<()>> {
    let filter = Filter::id(id);
    let category = state
        .store
        .find_one(PRICING_CATEGORIES, &filter)
        .await?
        .ok_or_else(category_not_found)?;

    if let Some(name) = category_name(&category) {
        let in_use = state
            .store
            .count(PRICING_PLANS, &Filter::eq("category", name))
            .await?;
        if in_use > 0 {
            return Err(ApiError::bad_request(
                "Cannot delete category with existing products",
            ));
        }
    }

    if !state.store.delete_one(PRICING_CATEGORIES, &filter).await? {
        return Err(category_not_found());
    }
    Ok(response::message("Category deleted successfully"))
}

pub async fn list_plans<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<Vec<Document>>> {
    let plans = state.store.find(PRICING_PLANS, &Filter::All).await?;
    Ok(response::list(plans))
}

pub async fn list_plans_by_category<S: Store + 'static>(
    State(state): State<AppState<S>>,
    DocumentId(category_id): DocumentId,
) -> ApiResult<Reply<Vec<Document>>> {
    let category = state
        .store
        .find_one(PRICING_CATEGORIES, &Filter::id(category_id))
        .await?
        .ok_or_else(category_not_found)?;
    let Some(name) = category_name(&category) else {
        return Ok(response::list(Vec::new()));
    };
    let plans = state
        .store
        .find(PRICING_PLANS, &Filter::eq("category", name))
        .await?;
    Ok(response::list(plans))
}

pub async fn create_plan<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<PricingPlanRequest>,
) -> ApiResult<(StatusCode, Reply<Document>)> {
    let plan = body.into_plan().map_err(rejected)?;
    let mut doc = to_document(&plan)?;
    stamp_created(&mut doc);
    let stored = state.store.insert_one(PRICING_PLANS, doc).await?;
    Ok(response::created("Product created successfully", stored))
}

pub async fn update_plan<S: Store + 'static>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
    ValidJson(body): ValidJson<PricingPlanRequest>,
) -> ApiResult<Reply<Document>> {
    let plan = body.into_plan().map_err(rejected)?;
    let mut fields = to_document(&plan)?;
    stamp_updated(&mut fields);

    let filter = Filter::id(id);
    let outcome = state.store.update_one(PRICING_PLANS, &filter, fields).await?;
    if outcome.matched == 0 {
        return Err(plan_not_found());
    }
    let updated = state
        .store
        .find_one(PRICING_PLANS, &filter)
        .await?
        .ok_or_else(plan_not_found)?;
    Ok(response::with_message("Product updated successfully", updated))
}

pub async fn delete_plan<S: Store + 'static>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
) -> ApiResult<Reply<()>> {
    if !state.store.delete_one(PRICING_PLANS, &Filter::id(id)).await? {
        return Err(plan_not_found());
    }
    Ok(response::message("Product deleted successfully"))
}

pub fn router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/categories",
            get(list_categories::<S>).post(create_category::<S>),
        )
        .route(
            "/categories/:id",
            put(update_category::<S>).delete(delete_category::<S>),
        )
        .route("/products", get(list_plans::<S>).post(create_plan::<S>))
        .route(
            "/products/category/:categoryId",
            get(list_plans_by_category::<S>),
        )
        .route(
            "/products/:id",
            put(update_plan::<S>).delete(delete_plan::<S>),
        )
}
