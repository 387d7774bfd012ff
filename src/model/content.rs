//! Free-form site content: known fields are checked, everything else is kept
//! verbatim in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::FieldError;
use crate::model::common::{require_text, to_document, Document};
use crate::model::resource::Resource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for Blog {
    const COLLECTION: &'static str = "blogs";
    const NAME: &'static str = "Blog";
    const FILTER_FIELD: Option<&'static str> = Some("category");

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "title", &self.title);
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for PortfolioItem {
    const COLLECTION: &'static str = "portfolio";
    const NAME: &'static str = "Portfolio item";
    const FILTER_FIELD: Option<&'static str> = Some("category");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Number>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for Product {
    const COLLECTION: &'static str = "products";
    const NAME: &'static str = "Product";
    const FILTER_FIELD: Option<&'static str> = Some("category");

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        if let Some(price) = self.price.as_ref().and_then(Number::as_f64) {
            if price < 0.0 {
                errors.push(FieldError::new("price", "price must not be negative"));
            }
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for TeamMember {
    const COLLECTION: &'static str = "our_team";
    const NAME: &'static str = "Team member";
    const FILTER_FIELD: Option<&'static str> = Some("department");

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Number>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for Testimonial {
    const COLLECTION: &'static str = "testimonials";
    const NAME: &'static str = "Testimonial";

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        require_text(&mut errors, "message", &self.message);
        if let Some(rating) = &self.rating {
            let in_range = rating.as_f64().map_or(false, |r| (1.0..=5.0).contains(&r));
            if !in_range {
                errors.push(FieldError::new("rating", "rating must be between 1 and 5"));
            }
        }
        errors
    }
}

/// Entry of the `/categories` taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for Category {
    const COLLECTION: &'static str = "categories";
    const NAME: &'static str = "Category";

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technology {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for Technology {
    const COLLECTION: &'static str = "technologies";
    const NAME: &'static str = "Technology";

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_features: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_projects: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for Service {
    const COLLECTION: &'static str = "services";
    const NAME: &'static str = "Service";
    const FILTER_FIELD: Option<&'static str> = Some("category");

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "title", &self.title);
        require_text(&mut errors, "paragraph", &self.paragraph);
        errors
    }

    fn into_document(mut self) -> anyhow::Result<Document> {
        self.key_features.get_or_insert_with(Vec::new);
        self.technologies.get_or_insert_with(Vec::new);
        self.total_projects.get_or_insert_with(|| Number::from(0));
        self.category.get_or_insert_with(|| "General".to_string());
        to_document(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extra_fields_round_trip() {
        let body = json!({
            "title": "Launch week",
            "category": "News",
            "body": "We shipped.",
            "tags": ["release", "web"],
        });
        let blog: Blog = serde_json::from_value(body.clone()).unwrap();
        assert!(blog.validate().is_empty());
        let doc = blog.into_document().unwrap();
        assert_eq!(Value::Object(doc), body);
    }

    #[test]
    fn test_product_requires_name() {
        let product: Product = serde_json::from_value(json!({"price": 10})).unwrap();
        let errors = product.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn test_product_price_keeps_integer_form() {
        let product: Product =
            serde_json::from_value(json!({"name": "Plan A", "category": "Hosting", "price": 10}))
                .unwrap();
        let doc = product.into_document().unwrap();
        assert_eq!(doc["price"], json!(10));
    }

    #[test]
    fn test_testimonial_rating_range() {
        let ok: Testimonial =
            serde_json::from_value(json!({"name": "Rina", "message": "Great", "rating": 5})).unwrap();
        assert!(ok.validate().is_empty());

        let bad: Testimonial =
            serde_json::from_value(json!({"name": "Rina", "message": "Great", "rating": 9})).unwrap();
        assert_eq!(bad.validate()[0].field, "rating");
    }

    #[test]
    fn test_service_defaults() {
        let service: Service =
            serde_json::from_value(json!({"title": "Web", "paragraph": "Sites"})).unwrap();
        let doc = service.into_document().unwrap();
        assert_eq!(doc["keyFeatures"], json!([]));
        assert_eq!(doc["technologies"], json!([]));
        assert_eq!(doc["totalProjects"], json!(0));
        assert_eq!(doc["category"], json!("General"));
    }
}
