use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub available_at: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub photo_thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCategory {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub library_id: i64,
}

/// A stored file with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    pub file_url: String,
    pub file_name: String,
    pub file_content_type: String,
    #[serde(default)]
    pub file_size: Option<Value>,
    #[serde(default)]
    pub file_thumbnail_url: Option<String>,
    #[serde(default)]
    pub library_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub document_category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_category: Option<DocumentCategory>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Link between a document and the record it is attached to (here, a book).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentModel {
    pub id: i64,
    pub model_name: String,
    pub model_id: i64,
    pub document_id: i64,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A file chosen on the device, ready to be sent as a multipart part.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Input for attaching a document to a book. One file per request.
#[derive(Debug, Clone, Validate)]
pub struct DocumentUpload {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub observations: String,
    pub file: FileUpload,
}
