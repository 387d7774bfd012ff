use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::FieldError;
use crate::model::common::{coerce_number, Document};

pub const PRICING_PLANS: &str = "pricing";
pub const PRICING_CATEGORIES: &str = "pricing_categories";

const DEFAULT_EMI: &str = "$10/month";

#[derive(Debug, Clone, Deserialize)]
pub struct PricingCategoryRequest {
    pub name: Option<String>,
}

impl PricingCategoryRequest {
    pub fn name(&self) -> Result<String, FieldError> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(FieldError::new("name", "Category name is required")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPlanRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Value>,
    pub features: Option<Vec<Value>>,
    pub description: Option<String>,
    pub popular: Option<bool>,
    pub starting_price_text: Option<Value>,
    pub emi: Option<String>,
}

/// Stored pricing plan with every optional field defaulted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPlan {
    pub name: String,
    pub category: String,
    pub price: Number,
    pub features: Vec<Value>,
    pub description: String,
    pub popular: bool,
    pub starting_price_text: Value,
    pub emi: String,
}

impl PricingPlanRequest {
    pub fn into_plan(self) -> Result<PricingPlan, FieldError> {
        let name = self.name.filter(|n| !n.trim().is_empty());
        let category = self.category.filter(|c| !c.trim().is_empty());
        let (Some(name), Some(category), Some(price)) = (name, category, self.price) else {
            return Err(FieldError::new(
                "name",
                "Name, category and price are required",
            ));
        };
        let price = coerce_number(&price)
            .ok_or_else(|| FieldError::new("price", "Price must be a number"))?;

        Ok(PricingPlan {
            name,
            category,
            price,
            features: self.features.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            popular: self.popular.unwrap_or(false),
            starting_price_text: self.starting_price_text.unwrap_or(Value::Bool(false)),
            emi: self.emi.unwrap_or_else(|| DEFAULT_EMI.to_string()),
        })
    }
}

pub fn category_name(doc: &Document) -> Option<&str> {
    doc.get("name").and_then(Value::as_str)
}
