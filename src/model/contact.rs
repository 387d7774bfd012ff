use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FieldError;
use crate::model::common::{is_email, require_text, to_document, Document};
use crate::model::resource::Resource;

/// Body of the public contact form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub service: Option<String>,
}

impl ContactForm {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        require_text(&mut errors, "email", &self.email);
        require_text(&mut errors, "subject", &self.subject);
        require_text(&mut errors, "message", &self.message);
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !is_email(email.trim()) {
                errors.push(FieldError::new("email", "Invalid email format"));
            }
        }
        errors
    }

    fn into_document(mut self, submitted: bool) -> anyhow::Result<Document> {
        self.phone.get_or_insert_with(String::new);
        self.company.get_or_insert_with(String::new);
        self.service.get_or_insert_with(String::new);
        let mut doc = to_document(&self)?;
        doc.insert("submitted".to_string(), Value::Bool(submitted));
        Ok(doc)
    }
}

/// A contact form saved before the visitor pressed submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactDraft(pub ContactForm);

impl Resource for ContactDraft {
    const COLLECTION: &'static str = "contactRequests";
    const NAME: &'static str = "Contact request";

    fn validate(&self) -> Vec<FieldError> {
        self.0.validate()
    }

    fn into_document(self) -> anyhow::Result<Document> {
        self.0.into_document(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactSubmission(pub ContactForm);

impl Resource for ContactSubmission {
    const COLLECTION: &'static str = "contactSubmittedRequests";
    const NAME: &'static str = "Submitted contact request";

    fn validate(&self) -> Vec<FieldError> {
        self.0.validate()
    }

    fn into_document(self) -> anyhow::Result<Document> {
        self.0.into_document(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportTicket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Resource for SupportTicket {
    const COLLECTION: &'static str = "support_tickets";
    const NAME: &'static str = "Support ticket";
    const FILTER_FIELD: Option<&'static str> = Some("status");

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "email", &self.email);
        require_text(&mut errors, "message", &self.message);
        errors
    }

    fn into_document(mut self) -> anyhow::Result<Document> {
        self.status.get_or_insert_with(|| "open".to_string());
        to_document(&self)
    }
}
