//! Solutions, client logos, overview stats and per-user project tallies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FieldError;
use crate::model::common::is_uid;

pub const SOLUTIONS: &str = "ourSolutions";
pub const CLIENTS: &str = "ourClients";
pub const OVERVIEW: &str = "overview";
pub const PROJECTS: &str = "totalProjects";

#[derive(Debug, Clone, Deserialize)]
pub struct SolutionGroupRequest {
    pub category: Option<String>,
    pub solutions: Option<Vec<Value>>,
}

impl SolutionGroupRequest {
    pub fn into_parts(self) -> Result<(String, Vec<Value>), FieldError> {
        match (self.category.filter(|c| !c.trim().is_empty()), self.solutions) {
            (Some(category), Some(solutions)) => Ok((category, solutions)),
            _ => Err(FieldError::new(
                "category",
                "Category and solutions are required",
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolutionItemUpdate {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub icon: Option<String>,
}

impl SolutionItemUpdate {
    /// Overwrite the item whose numeric `id` matches. Returns false when absent.
    pub fn apply(&self, solutions: &mut [Value], item_id: i64) -> bool {
        let Some(item) = solutions
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .find(|item| item.get("id").and_then(Value::as_i64) == Some(item_id))
        else {
            return false;
        };
        for (key, value) in [
            ("title", &self.title),
            ("subtitle", &self.subtitle),
            ("icon", &self.icon),
        ] {
            item.insert(
                key.to_string(),
                value.clone().map_or(Value::Null, Value::String),
            );
        }
        true
    }
}

/// Metadata recorded for an uploaded client logo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLogo {
    pub original_name: String,
    pub filename: String,
    pub logo_url: String,
    pub mimetype: String,
    pub size: u64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverviewUpdate {
    pub stats: Option<Vec<OverviewStat>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewStat {
    #[serde(default)]
    pub label: Value,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewEntry {
    pub id: usize,
    pub label: Value,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRequest {
    #[serde(rename = "firebaseID")]
    pub firebase_id: Option<String>,
    #[serde(rename = "postId")]
    pub post_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRecord {
    #[serde(rename = "firebaseID")]
    pub firebase_id: String,
    #[serde(rename = "postId")]
    pub post_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl ProjectRequest {
    pub fn validate(&self) -> Result<(String, String), Vec<FieldError>> {
        let mut errors = Vec::new();
        let firebase_id = check_uid(&mut errors, "firebaseID", "Firebase ID", &self.firebase_id);
        let post_id = check_uid(&mut errors, "postId", "Post ID", &self.post_id);
        match (firebase_id, post_id) {
            (Some(f), Some(p)) if errors.is_empty() => Ok((f, p)),
            _ => Err(errors),
        }
    }
}

fn check_uid(
    errors: &mut Vec<FieldError>,
    field: &str,
    label: &str,
    value: &Option<String>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push(FieldError::new(field, &format!("{} is required", label)));
            None
        }
        Some(v) if !is_uid(v) => {
            errors.push(FieldError::new(field, &format!("Invalid {} format", label)));
            None
        }
        Some(v) => Some(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_solution_item_update() {
        let mut solutions = vec![
            json!({"id": 1, "title": "Old", "subtitle": "s", "icon": "i"}),
            json!({"id": 2, "title": "Keep"}),
        ];
        let update = SolutionItemUpdate {
            title: Some("New".to_string()),
            subtitle: Some("Sub".to_string()),
            icon: Some("star".to_string()),
        };
        assert!(update.apply(&mut solutions, 1));
        assert_eq!(solutions[0]["title"], json!("New"));
        assert_eq!(solutions[1]["title"], json!("Keep"));
        assert!(!update.apply(&mut solutions, 7));
    }

    #[test]
    fn test_project_request_validation() {
        let ok = ProjectRequest {
            firebase_id: Some("uid_1".to_string()),
            post_id: Some("post-9".to_string()),
        };
        assert_eq!(
            ok.validate().unwrap(),
            ("uid_1".to_string(), "post-9".to_string())
        );

        let bad = ProjectRequest {
            firebase_id: None,
            post_id: Some("bad id".to_string()),
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors[0].message, "Firebase ID is required");
        assert_eq!(errors[1].message, "Invalid Post ID format");
    }

    #[test]
    fn test_solution_group_requires_both_fields() {
        let request: SolutionGroupRequest =
            serde_json::from_value(json!({"category": "web"})).unwrap();
        assert!(request.into_parts().is_err());
    }
}
