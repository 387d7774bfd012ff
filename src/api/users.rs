use axum::{
    async_trait,
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, put},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::api::extract::ValidJson;
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::api::uploads::{
    body_limit, file_extension, public_url, remove_upload, resolve_upload_url, save_upload,
    stored_filename, upload_dir, upload_error,
};
use crate::config::UploadConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    format_bytes, is_uid, now_timestamp, parse_object_id, profile_size, stamp_created,
    stamp_updated, storage_limit, storage_percentage, to_document, validate_profile_fields,
    with_storage, Document, NewUser, ID_FIELD, UID_FIELD, USERS,
};
use crate::store::{Filter, Store};

const PROFILE_IMAGE_FIELD: &str = "profileImage";
const PROFILE_DIR: &str = "profiles";
const PHOTO_FIELD: &str = "photoURL";
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];
const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/gif"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReport {
    pub storage_used: String,
    pub storage_bytes: u64,
    pub storage_limit: String,
    pub storage_percentage: String,
    pub is_premium: bool,
}

/// A 24-hex id looks up `_id`; anything else in the UID charset looks up `firebaseUID`.
fn user_filter(raw: &str) -> ApiResult<Filter> {
    if let Some(id) = parse_object_id(raw) {
        Ok(Filter::id(id))
    } else if is_uid(raw) {
        Ok(Filter::eq(UID_FIELD, raw))
    } else {
        Err(ApiError::invalid_id())
    }
}

#[derive(Debug)]
pub struct ProfileImage {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ProfileImage {
    fn check(&self, max_file_size: usize) -> ApiResult<()> {
        let extension_ok = file_extension(&self.original_name)
            .map_or(false, |ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        if !extension_ok || !IMAGE_TYPES.contains(&self.content_type.as_str()) {
            return Err(ApiError::bad_request("Images only (jpg, png, gif)"));
        }
        if self.bytes.len() > max_file_size {
            return Err(ApiError::bad_request("File too large"));
        }
        Ok(())
    }
}

/// Profile edit body: plain JSON, or multipart form fields with an optional `profileImage`.
#[derive(Debug)]
pub struct ProfileUpdate {
    pub fields: Document,
    pub image: Option<ProfileImage>,
}

/// Form fields arrive as text; `privacy` carries a JSON object.
fn form_value(name: &str, text: String) -> ApiResult<Value> {
    if name == "privacy" {
        return match serde_json::from_str::<Value>(&text) {
            Ok(value @ Value::Object(_)) => Ok(value),
            _ => Err(ApiError::bad_request("Privacy must be a JSON object")),
        };
    }
    Ok(Value::String(text))
}

#[async_trait]
impl<S> FromRequest<S> for ProfileUpdate
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.starts_with("multipart/form-data"));
        if !is_multipart {
            let ValidJson(fields) = ValidJson::<Document>::from_request(req, state).await?;
            return Ok(ProfileUpdate { fields, image: None });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        let mut update = ProfileUpdate {
            fields: Document::new(),
            image: None,
        };
        while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == PROFILE_IMAGE_FIELD {
                update.image = Some(ProfileImage {
                    original_name: field.file_name().unwrap_or(PROFILE_IMAGE_FIELD).to_string(),
                    content_type: field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string(),
                    bytes: field.bytes().await.map_err(upload_error)?,
                });
            } else {
                let text = field.text().await.map_err(upload_error)?;
                let value = form_value(&name, text)?;
                update.fields.insert(name, value);
            }
        }
        Ok(update)
    }
}

fn user_not_found() -> ApiError {
    ApiError::not_found("User not found")
}

async fn find_user<S: Store>(store: &S, filter: &Filter) -> ApiResult<Document> {
    store
        .find_one(USERS, filter)
        .await?
        .ok_or_else(user_not_found)
}

/// Size of an uploaded profile photo; external or unreadable photos count as zero.
async fn photo_size(uploads: &UploadConfig, user: &Document) -> u64 {
    let Some(path) = user
        .get(PHOTO_FIELD)
        .and_then(Value::as_str)
        .and_then(|url| resolve_upload_url(uploads, url))
    else {
        return 0;
    };
    match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            log::warn!("Failed to read profile image {}: {}", path.display(), e);
            0
        }
    }
}

/// Measure the stored profile plus its photo and persist the figure. Returns the byte count.
async fn refresh_storage<S: Store>(
    store: &S,
    uploads: &UploadConfig,
    filter: &Filter,
    user: &Document,
) -> ApiResult<u64> {
    let bytes = profile_size(user) + photo_size(uploads, user).await;
    let mut fields = Document::new();
    fields.insert("storageUsed".to_string(), json!(bytes));
    fields.insert("lastStorageUpdate".to_string(), json!(now_timestamp()));
    store.update_one(USERS, filter, fields).await?;
    Ok(bytes)
}

pub async fn list_users<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<Vec<Document>>> {
    let users = state.store.find(USERS, &Filter::All).await?;
    Ok(response::list(users))
}

pub async fn get_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Reply<Document>> {
    let filter = user_filter(&id)?;
    let user = find_user(state.store.as_ref(), &filter).await?;
    let bytes = refresh_storage(state.store.as_ref(), &state.config.uploads, &filter, &user).await?;
    Ok(response::data(with_storage(user, bytes)))
}

pub async fn get_storage<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Reply<StorageReport>> {
    let filter = user_filter(&id)?;
    let user = find_user(state.store.as_ref(), &filter).await?;
    let bytes = refresh_storage(state.store.as_ref(), &state.config.uploads, &filter, &user).await?;

    let is_premium = user.get("premium").and_then(|v| v.as_bool()).unwrap_or(false);
    let limit = storage_limit(is_premium);
    Ok(response::data(StorageReport {
        storage_used: format_bytes(bytes),
        storage_bytes: bytes,
        storage_limit: format_bytes(limit),
        storage_percentage: storage_percentage(bytes, limit),
        is_premium,
    }))
}

pub async fn create_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<NewUser>,
) -> ApiResult<(StatusCode, Reply<Document>)> {
    let errors = body.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let profile = body.into_profile();

    let existing = state
        .store
        .count(USERS, &Filter::eq(UID_FIELD, profile.firebase_uid.as_str()))
        .await?;
    if existing > 0 {
        return Err(ApiError::bad_request(
            "User with this Firebase UID already exists",
        ));
    }

    let mut doc = to_document(&profile)?;
    stamp_created(&mut doc);
    let stored = state.store.insert_one(USERS, doc).await?;
    log::info!("Created user {}", profile.firebase_uid);
    Ok(response::created("User created successfully", stored))
}

pub async fn update_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    update: ProfileUpdate,
) -> ApiResult<Reply<Document>> {
    let filter = user_filter(&id)?;
    let ProfileUpdate { mut fields, image } = update;
    let errors = validate_profile_fields(&fields);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    fields.remove(ID_FIELD);

    let uploads = &state.config.uploads;
    let saved: Option<PathBuf> = match image {
        Some(image) => {
            image.check(uploads.max_file_size)?;
            let filename = stored_filename("profile", &image.original_name);
            let dir = upload_dir(uploads, PROFILE_DIR);
            let path = save_upload(&dir, &filename, &image.bytes).await?;
            fields.insert(
                PHOTO_FIELD.to_string(),
                json!(public_url(PROFILE_DIR, &filename)),
            );
            Some(path)
        }
        None => None,
    };

    let outcome = match state.store.update_one(USERS, &filter, fields).await {
        Ok(outcome) if outcome.matched > 0 => outcome,
        failed => {
            if let Some(path) = &saved {
                remove_upload(path).await;
            }
            return Err(match failed {
                Ok(_) => user_not_found(),
                Err(e) => e.into(),
            });
        }
    };
    // Only a real change moves updatedAt.
    if outcome.modified > 0 {
        let mut stamp = Document::new();
        stamp_updated(&mut stamp);
        state.store.update_one(USERS, &filter, stamp).await?;
    }

    let user = find_user(state.store.as_ref(), &filter).await?;
    let bytes = refresh_storage(state.store.as_ref(), &state.config.uploads, &filter, &user).await?;
    let message = if outcome.modified == 0 {
        "No changes made to user profile"
    } else {
        "User profile updated successfully"
    };
    Ok(response::with_message(message, with_storage(user, bytes)))
}

pub async fn delete_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Reply<()>> {
    let filter = user_filter(&id)?;
    if !state.store.delete_one(USERS, &filter).await? {
        return Err(user_not_found());
    }
    Ok(response::message("User deleted successfully"))
}

pub fn router<S: Store + 'static>(uploads: &UploadConfig) -> Router<AppState<S>> {
    Router::new()
        .route("/", get(list_users::<S>).post(create_user::<S>))
        .route(
            "/:id",
            put(update_user::<S>)
                .layer(DefaultBodyLimit::max(body_limit(uploads)))
                .get(get_user::<S>)
                .delete(delete_user::<S>),
        )
        .route("/:id/storage", get(get_storage::<S>))
}
