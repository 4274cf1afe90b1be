pub mod manager;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use manager::AuthManager;

/// Credentials posted to `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignInCredentials {
    /// Account username. Required.
    #[validate(length(min = 1, message = "User required"))]
    pub username: String,
    /// Account password. Required.
    #[validate(length(min = 1, message = "Password required"))]
    pub password: String,
}

impl SignInCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Body of the push-token registration sent after sign-in.
#[derive(Debug, Serialize)]
pub struct PushTokenPatch<'a> {
    pub fcm_token: &'a str,
}
