//! Profile edits made by the signed-in user.

use std::sync::Arc;

use chrono::Local;
use log::{info, warn};
use reqwest::multipart::Form;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::api::ApiClient;
use crate::auth::AuthManager;
use crate::books::{file_part, photo_file_name};
use crate::error::AppError;
use crate::models::{Envelope, FileUpload};

pub const PROFILE_ROUTE: &str = "/profile";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PasswordChange {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
    #[validate(must_match = "new_password")]
    pub password_confirmation: String,
}

pub struct ProfileService {
    api: Arc<ApiClient>,
    auth: Arc<AuthManager>,
}

impl ProfileService {
    pub fn new(api: Arc<ApiClient>, auth: Arc<AuthManager>) -> Self {
        Self { api, auth }
    }

    /// Saves name and username; on success the cached profile takes the
    /// values the server echoed back.
    pub async fn update(
        &self,
        update: &ProfileUpdate,
    ) -> Result<Option<Envelope<Value>>, AppError> {
        update.validate()?;
        let Some(envelope) = self.put(update).await else {
            return Ok(None);
        };
        if envelope.is_success() {
            let name = echoed(&envelope, "name").unwrap_or_else(|| update.name.clone());
            let username = echoed(&envelope, "username").unwrap_or_else(|| update.username.clone());
            self.auth
                .merge_user(|user| {
                    user.name = name;
                    user.username = username;
                })
                .await?;
            info!("profile updated");
        }
        Ok(Some(envelope))
    }

    /// Changes the password. The confirmation must match locally before
    /// anything is sent.
    pub async fn change_password(
        &self,
        change: &PasswordChange,
    ) -> Result<Option<Envelope<Value>>, AppError> {
        change.validate()?;
        Ok(self.put(change).await)
    }

    /// Uploads a new avatar and caches the resulting image URLs.
    pub async fn upload_avatar(
        &self,
        avatar: FileUpload,
    ) -> Result<Option<Envelope<Value>>, AppError> {
        let avatar = FileUpload {
            file_name: photo_file_name(Local::now().naive_local()),
            ..avatar
        };
        let form = Form::new().part("avatar", file_part(avatar, "image/jpeg")?);
        let path = format!("{}/avatar", PROFILE_ROUTE);
        let envelope = match self.api.post_multipart(&path, form).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("avatar upload failed: {}", e);
                return Ok(None);
            }
        };
        if envelope.is_success() {
            let avatar_url = echoed(&envelope, "avatar_url");
            let thumbnail_url = echoed(&envelope, "avatar_thumbnail_url");
            self.auth
                .merge_user(|user| {
                    user.avatar_url = avatar_url;
                    user.avatar_thumbnail_url = thumbnail_url;
                })
                .await?;
        }
        Ok(Some(envelope))
    }

    async fn put<B: Serialize>(&self, body: &B) -> Option<Envelope<Value>> {
        match self.api.put_json(PROFILE_ROUTE, body).await {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!("profile request failed: {}", e);
                None
            }
        }
    }
}

fn echoed(envelope: &Envelope<Value>, field: &str) -> Option<String> {
    envelope
        .data
        .as_ref()
        .and_then(|data| data.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
}
