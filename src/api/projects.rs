use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::extract::{DocumentId, ExternalId, ValidJson};
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    is_uid, now_timestamp, stamp_updated, to_document, Document, ProjectRecord, ProjectRequest,
    PROJECTS,
};
use crate::store::{Filter, Store};

const OWNER_FIELD: &str = "firebaseID";
const POST_FIELD: &str = "postId";

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    #[serde(rename = "firebaseID")]
    pub firebase_id: Option<String>,
}

fn project_not_found() -> ApiError {
    ApiError::not_found("Project not found")
}

fn post_taken() -> ApiError {
    ApiError::bad_request("Post ID already exists")
}

pub async fn list_projects<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Reply<Vec<Document>>> {
    let filter = match query.firebase_id.as_deref() {
        Some(owner) if !is_uid(owner) => {
            return Err(ApiError::bad_request("Invalid Firebase ID format"))
        }
        Some(owner) => Filter::eq(OWNER_FIELD, owner),
        None => Filter::All,
    };
    let projects = state.store.find(PROJECTS, &filter).await?;
    Ok(response::list(projects))
}

pub async fn projects_for_owner<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ExternalId(owner): ExternalId,
) -> ApiResult<Reply<Vec<Document>>> {
    let projects = state
        .store
        .find(PROJECTS, &Filter::eq(OWNER_FIELD, owner.as_str()))
        .await?;
    if projects.is_empty() {
        return Err(ApiError::not_found("No projects found for this Firebase ID"));
    }
    Ok(response::list(projects))
}

pub async fn create_project<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<ProjectRequest>,
) -> ApiResult<(StatusCode, Reply<Document>)> {
    let (firebase_id, post_id) = body.validate().map_err(ApiError::Validation)?;

    let taken = state
        .store
        .count(PROJECTS, &Filter::eq(POST_FIELD, post_id.as_str()))
        .await?;
    if taken > 0 {
        return Err(post_taken());
    }

    let record = ProjectRecord {
        firebase_id,
        post_id,
        created_at: now_timestamp(),
    };
    let stored = state
        .store
        .insert_one(PROJECTS, to_document(&record)?)
        .await?;
    Ok(response::created("Project created successfully", stored))
}

/// A post id may only move to this project if no other project holds it.
pub async fn update_project<S: Store + 'static>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
    ValidJson(body): ValidJson<ProjectRequest>,
) -> ApiResult<Reply<Document>> {
    let (firebase_id, post_id) = body.validate().map_err(ApiError::Validation)?;

    let clash = Filter::eq(POST_FIELD, post_id.as_str()).and(Filter::NotId(id));
    if state.store.count(PROJECTS, &clash).await? > 0 {
        return Err(post_taken());
    }

    let mut fields = Document::new();
    fields.insert(OWNER_FIELD.to_string(), Value::String(firebase_id));
    fields.insert(POST_FIELD.to_string(), Value::String(post_id));
    stamp_updated(&mut fields);

    let filter = Filter::id(id);
    let outcome = state.store.update_one(PROJECTS, &filter, fields).await?;
    if outcome.matched == 0 {
        return Err(project_not_found());
    }
    let project = state
        .store
        .find_one(PROJECTS, &filter)
        .await?
        .ok_or_else(project_not_found)?;
    Ok(response::with_message("Project updated successfully", project))
}

pub async fn delete_project<S: Store + 'static>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
) -> ApiResult<Reply<()>> {
    if !state.store.delete_one(PROJECTS, &Filter::id(id)).await? {
        return Err(project_not_found());
    }
    Ok(response::message("Project deleted successfully"))
}

pub fn router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(list_projects::<S>).post(create_project::<S>))
        .route(
            "/:id",
            get(projects_for_owner::<S>)
                .put(update_project::<S>)
                .delete(delete_project::<S>),
        )
}
