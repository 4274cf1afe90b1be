//! Book catalogue, book documents and photo uploads.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use log::{info, warn};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use validator::Validate;

use crate::api::ApiClient;
use crate::error::AppError;
use crate::models::{Book, DocumentModel, DocumentUpload, Envelope, FileUpload};
use crate::query::{
    decode, Direction, FilterData, JoinOn, Latest, ListQuery, ListQueryFacade, Operator, SortData,
};

pub const BOOKS_ROUTE: &str = "/books";
const BOOKS_KEY: &str = "books";
const DOCUMENTS_KEY: &str = "book-documents";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
    #[default]
    Title,
    Id,
}

impl BookSort {
    fn property(self) -> &'static str {
        match self {
            BookSort::Title => "title",
            BookSort::Id => "id",
        }
    }
}

/// Catalogue search. Empty text fields and unset dates add no filter.
#[derive(Debug, Clone, PartialEq)]
pub struct BookFilter {
    pub title: String,
    pub author: String,
    pub available_from: Option<NaiveDate>,
    pub available_to: Option<NaiveDate>,
    pub sort: BookSort,
    pub direction: Direction,
    pub page: u32,
    pub limit: u32,
}

impl Default for BookFilter {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            available_from: None,
            available_to: None,
            sort: BookSort::Title,
            direction: Direction::Desc,
            page: 1,
            limit: 10,
        }
    }
}

impl BookFilter {
    pub fn to_query(&self) -> ListQuery {
        let mut filters = Vec::new();
        if let Some(from) = self.available_from {
            filters.push(FilterData::new(
                "available_at",
                from.format(DATE_FORMAT).to_string(),
                Operator::Ge,
                JoinOn::And,
            ));
        }
        if let Some(to) = self.available_to {
            filters.push(FilterData::new(
                "available_at",
                to.format(DATE_FORMAT).to_string(),
                Operator::Le,
                JoinOn::And,
            ));
        }
        if !self.title.is_empty() {
            filters.push(FilterData::new(
                "title",
                self.title.as_str(),
                Operator::Like,
                JoinOn::And,
            ));
        }
        if !self.author.is_empty() {
            filters.push(FilterData::new(
                "author",
                self.author.as_str(),
                Operator::Like,
                JoinOn::And,
            ));
        }

        ListQuery::new(BOOKS_ROUTE)
            .page(self.page)
            .limit(self.limit)
            .sort(vec![SortData::new(self.sort.property(), self.direction)])
            .filter(filters)
    }
}

pub struct BookService {
    api: Arc<ApiClient>,
    queries: Arc<ListQueryFacade>,
}

impl BookService {
    pub fn new(api: Arc<ApiClient>, queries: Arc<ListQueryFacade>) -> Self {
        Self { api, queries }
    }

    pub async fn list(&self, filter: &BookFilter) -> Latest<Option<Envelope<Vec<Book>>>> {
        self.queries
            .query_latest(BOOKS_KEY, &filter.to_query())
            .await
            .typed()
    }

    pub async fn get(&self, id: i64) -> Option<Envelope<Book>> {
        self.queries.load(BOOKS_ROUTE, id).await.and_then(decode)
    }

    /// Documents attached to a book.
    pub async fn documents(
        &self,
        book_id: i64,
        page: u32,
        limit: u32,
    ) -> Latest<Option<Envelope<Vec<DocumentModel>>>> {
        let query = ListQuery::new(documents_route(book_id))
            .page(page)
            .limit(limit);
        self.queries
            .query_latest(DOCUMENTS_KEY, &query)
            .await
            .typed()
    }

    /// Attaches one file to a book. A missing description fails locally
    /// with `AppError::Validation` and sends nothing.
    pub async fn upload_document(
        &self,
        book_id: i64,
        upload: DocumentUpload,
    ) -> Result<Option<Envelope<Value>>, AppError> {
        upload.validate()?;

        let form = Form::new()
            .part("file", file_part(upload.file, "application/octet-stream")?)
            .text("description", upload.description)
            .text("observations", upload.observations);

        let envelope = self.upload(&documents_route(book_id), form).await;
        if envelope.as_ref().map(Envelope::is_success).unwrap_or(false) {
            info!("document attached to book {}", book_id);
        }
        Ok(envelope)
    }

    /// Replaces the book's cover photo. The part is named after the capture
    /// time (`IMG_yyyyMMdd_HHmmss.jpg`) whatever the local file was called.
    pub async fn upload_photo(
        &self,
        book_id: i64,
        photo: FileUpload,
    ) -> Result<Option<Envelope<Value>>, AppError> {
        let photo = FileUpload {
            file_name: photo_file_name(Local::now().naive_local()),
            ..photo
        };
        let form = Form::new().part("photo", file_part(photo, "image/jpeg")?);
        Ok(self
            .upload(&format!("{}/{}/photo", BOOKS_ROUTE, book_id), form)
            .await)
    }

    async fn upload(&self, path: &str, form: Form) -> Option<Envelope<Value>> {
        match self.api.post_multipart(path, form).await {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!("upload to {} failed: {}", path, e);
                None
            }
        }
    }
}

fn documents_route(book_id: i64) -> String {
    format!("{}/{}/documents", BOOKS_ROUTE, book_id)
}

pub(crate) fn photo_file_name(taken_at: chrono::NaiveDateTime) -> String {
    format!("IMG_{}.jpg", taken_at.format("%Y%m%d_%H%M%S"))
}

pub(crate) fn file_part(file: FileUpload, fallback_type: &str) -> Result<Part, AppError> {
    let content_type = file.content_type.unwrap_or_else(|| fallback_type.to_string());
    Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(&content_type)
        .map_err(|e| AppError::Config(format!("Invalid content type {}: {}", content_type, e)))
}
