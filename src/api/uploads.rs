use axum::{extract::multipart::MultipartError, http::StatusCode};
use std::path::{Path, PathBuf};

use crate::config::UploadConfig;
use crate::error::{ApiError, ApiResult};

/// URL prefix under which the upload directory is served.
pub const UPLOADS_URL: &str = "/uploads";

pub fn upload_dir(config: &UploadConfig, sub: &str) -> PathBuf {
    Path::new(&config.dir).join(sub)
}

/// Request body cap for upload routes: the file plus room for multipart framing.
pub fn body_limit(config: &UploadConfig) -> usize {
    config.max_file_size + 64 * 1024
}

pub fn public_url(sub: &str, filename: &str) -> String {
    format!("{}/{}/{}", UPLOADS_URL, sub, filename)
}

/// `<prefix>-<millis>-<random><.ext>`, keeping only a plain alphanumeric extension.
pub fn stored_filename(prefix: &str, original_name: &str) -> String {
    let extension = file_extension(original_name)
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        &suffix[..9],
        extension
    )
}

/// Lowercased extension, if it is non-empty and alphanumeric.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn upload_error(error: MultipartError) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::bad_request("File too large")
    } else {
        ApiError::bad_request(error.body_text())
    }
}

pub async fn save_upload(dir: &Path, filename: &str, bytes: &[u8]) -> ApiResult<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", dir.display(), e))?;
    let path = dir.join(filename);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
    Ok(path)
}

/// A file already gone is not an error.
pub async fn remove_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Maps `/uploads/<sub>/<file>` back onto the upload directory.
/// Anything else, including segments that could climb out, is `None`.
pub fn resolve_upload_url(config: &UploadConfig, url: &str) -> Option<PathBuf> {
    let relative = url.strip_prefix(UPLOADS_URL)?.strip_prefix('/')?;
    let safe = relative
        .split('/')
        .all(|segment| !segment.is_empty() && !segment.starts_with('.') && !segment.contains('\\'));
    safe.then(|| Path::new(&config.dir).join(relative))
}
