use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};
use itertools::Itertools;
use serde_json::Value;

use crate::api::extract::DocumentId;
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::api::uploads::{
    body_limit, public_url, remove_upload, save_upload, stored_filename, upload_dir, upload_error,
};
use crate::config::UploadConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::{now_timestamp, to_document, ClientLogo, Document, CLIENTS, CREATED_AT};
use crate::store::{Filter, Store};

const LOGO_FIELD: &str = "logo";
const CLIENT_DIR: &str = "clients";

pub async fn list_clients<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<Vec<Document>>> {
    let clients = state.store.find(CLIENTS, &Filter::All).await?;
    let newest_first = clients
        .into_iter()
        .sorted_by(|a, b| {
            let created = |d: &Document| d.get(CREATED_AT).and_then(Value::as_str).map(str::to_string);
            created(b).cmp(&created(a))
        })
        .collect();
    Ok(response::list(newest_first))
}

/// POST /upload, multipart field `logo`, images only.
pub async fn upload_logo<S: Store + 'static>(
    State(state): State<AppState<S>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Reply<Document>)> {
    let uploads = &state.config.uploads;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(LOGO_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or(LOGO_FIELD).to_string();
        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !mimetype.starts_with("image/") {
            return Err(ApiError::bad_request("Only image files are allowed!"));
        }

        let bytes = field.bytes().await.map_err(upload_error)?;
        if bytes.len() > uploads.max_file_size {
            return Err(ApiError::bad_request("File too large"));
        }

        let filename = stored_filename("client", &original_name);
        let path = save_upload(&upload_dir(uploads, CLIENT_DIR), &filename, &bytes).await?;

        let logo = ClientLogo {
            original_name,
            logo_url: public_url(CLIENT_DIR, &filename),
            filename,
            mimetype,
            size: bytes.len() as u64,
            created_at: now_timestamp(),
        };
        let stored = match state.store.insert_one(CLIENTS, to_document(&logo)?).await {
            Ok(stored) => stored,
            Err(e) => {
                remove_upload(&path).await;
                return Err(e.into());
            }
        };
        log::info!("Stored client logo {}", logo.filename);
        return Ok(response::created("Logo uploaded successfully", stored));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

/// Removes the record and its file; a file already gone is not an error.
pub async fn delete_client<S: Store + 'static>(
    State(state): State<AppState<S>>,
    DocumentId(id): DocumentId,
) -> ApiResult<Reply<()>> {
    let filter = Filter::id(id);
    let not_found = || ApiError::not_found("Client not found");
    let client = state
        .store
        .find_one(CLIENTS, &filter)
        .await?
        .ok_or_else(not_found)?;

    // Only a bare file name is ever joined onto the upload directory.
    if let Some(filename) = client
        .get("filename")
        .and_then(Value::as_str)
        .filter(|name| !name.contains(['/', '\\']) && !name.starts_with('.'))
    {
        remove_upload(&upload_dir(&state.config.uploads, CLIENT_DIR).join(filename)).await;
    }

    if !state.store.delete_one(CLIENTS, &filter).await? {
        return Err(not_found());
    }
    Ok(response::message("Client logo deleted successfully"))
}

pub fn router<S: Store + 'static>(uploads: &UploadConfig) -> Router<AppState<S>> {
    Router::new()
        .route("/", get(list_clients::<S>))
        .route(
            "/upload",
            post(upload_logo::<S>).layer(DefaultBodyLimit::max(body_limit(uploads))),
        )
        .route("/:id", delete(delete_client::<S>))
}
