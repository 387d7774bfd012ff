use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::FieldError;
use crate::model::common::{is_email, is_uid, Document};

pub const USERS: &str = "users";
pub const UID_FIELD: &str = "firebaseUID";

const FREE_STORAGE_LIMIT: u64 = 5 * 1024 * 1024 * 1024;
const PREMIUM_STORAGE_LIMIT: u64 = 50 * 1024 * 1024 * 1024;
const MAX_FULL_NAME: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Privacy {
    pub show_email: bool,
    pub show_phone: bool,
    pub show_location: bool,
}

impl Default for Privacy {
    fn default() -> Self {
        Self {
            show_email: true,
            show_phone: false,
            show_location: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(rename = "firebaseUID")]
    pub firebase_uid: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Value>,
    pub premium: Option<bool>,
}

/// Stored profile shape, created once at sign-up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "firebaseUID")]
    pub firebase_uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub premium: bool,
    pub storage_used: u64,
    pub projects: u64,
    pub privacy: Privacy,
}

impl NewUser {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match self.firebase_uid.as_deref().map(str::trim) {
            None | Some("") => errors.push(FieldError::new(UID_FIELD, "Firebase UID is required")),
            Some(uid) if !is_uid(uid) => {
                errors.push(FieldError::new(UID_FIELD, "Invalid Firebase UID format"))
            }
            Some(_) => {}
        }
        let mut fields = Document::new();
        if let Some(email) = &self.email {
            fields.insert("email".to_string(), Value::String(email.clone()));
        }
        if let Some(name) = &self.full_name {
            fields.insert("fullName".to_string(), Value::String(name.clone()));
        }
        if let Some(role) = &self.role {
            fields.insert("role".to_string(), role.clone());
        }
        errors.extend(validate_profile_fields(&fields));
        errors
    }

    /// Call after `validate` succeeded.
    pub fn into_profile(self) -> UserProfile {
        let role = self
            .role
            .and_then(|r| serde_json::from_value(r).ok())
            .unwrap_or(Role::User);
        UserProfile {
            firebase_uid: self.firebase_uid.unwrap_or_default().trim().to_string(),
            full_name: self.full_name.map(|n| n.trim().to_string()),
            email: self.email,
            role,
            premium: self.premium.unwrap_or(false),
            storage_used: 0,
            projects: 0,
            privacy: Privacy::default(),
        }
    }
}

/// Rules shared by sign-up and profile edits; only fields present are checked.
pub fn validate_profile_fields(fields: &Document) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Some(email) = fields.get("email") {
        if !email.as_str().map_or(false, is_email) {
            errors.push(FieldError::new("email", "Invalid email format"));
        }
    }
    if let Some(name) = fields.get("fullName") {
        match name.as_str() {
            Some(n) if n.trim().chars().count() > MAX_FULL_NAME => errors.push(FieldError::new(
                "fullName",
                "Full name must not exceed 100 characters",
            )),
            Some(_) => {}
            None => errors.push(FieldError::new("fullName", "Full name must be a string")),
        }
    }
    if let Some(role) = fields.get("role") {
        if serde_json::from_value::<Role>(role.clone()).is_err() {
            errors.push(FieldError::new(
                "role",
                "Role must be either \"user\" or \"admin\"",
            ));
        }
    }
    errors
}

/// Bytes a profile occupies, measured as its serialised JSON.
pub fn profile_size(profile: &Document) -> u64 {
    serde_json::to_vec(profile).map_or(0, |bytes| bytes.len() as u64)
}

pub fn storage_limit(premium: bool) -> u64 {
    if premium {
        PREMIUM_STORAGE_LIMIT
    } else {
        FREE_STORAGE_LIMIT
    }
}

/// Human-readable size: "0 MB", "512 Bytes", "1.5 KB", "5 GB".
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 MB".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

pub fn storage_percentage(bytes: u64, limit: u64) -> String {
    format!("{:.1}", bytes as f64 / limit as f64 * 100.0)
}

/// Public view of a profile with storage figures attached.
pub fn with_storage(mut user: Document, bytes: u64) -> Document {
    user.entry("role".to_string()).or_insert_with(|| json!("user"));
    user.insert("storageUsed".to_string(), json!(format_bytes(bytes)));
    user.insert("storageBytes".to_string(), json!(bytes));
    user
}
