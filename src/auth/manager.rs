use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{json, Value};
use validator::Validate;

use crate::api::ApiClient;
use crate::auth::{PushTokenPatch, SignInCredentials};
use crate::error::AppError;
use crate::models::{Envelope, User};
use crate::session::{AuthState, Session, SessionHandle, SessionStore};

/// Owns the authentication lifecycle: `Initializing -> {Authenticated, Unauthenticated}`.
///
/// Expected failures (bad credentials, unreachable server) come back as
/// non-success envelopes. `Err` is reserved for local storage failures and
/// for calls made before [`restore`](Self::restore) has run.
pub struct AuthManager {
    api: Arc<ApiClient>,
    store: SessionStore,
    session: SessionHandle,
}

impl AuthManager {
    pub fn new(api: Arc<ApiClient>, store: SessionStore, session: SessionHandle) -> Self {
        Self {
            api,
            store,
            session,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Initial transition: adopts the persisted session if there is one.
    ///
    /// An unreadable stored session is logged and treated as signed out.
    pub async fn restore(&self) -> AuthState {
        let state = match self.store.load().await {
            Ok(Some(session)) => {
                info!("restored session for {}", session.user.username);
                AuthState::Authenticated(session)
            }
            Ok(None) => AuthState::Unauthenticated,
            Err(e) => {
                warn!("ignoring unreadable stored session: {}", e);
                AuthState::Unauthenticated
            }
        };
        self.session.set(state.clone());
        state
    }

    /// Signs in and, on success, persists the session and registers the
    /// cached push token with the server (best-effort).
    ///
    /// The server's envelope is returned whatever the outcome; callers
    /// inspect `meta.success`.
    pub async fn sign_in(
        &self,
        credentials: &SignInCredentials,
    ) -> Result<Envelope<Value>, AppError> {
        self.ensure_restored("sign_in")?;

        if let Err(errors) = credentials.validate() {
            return Ok(Envelope::failure(json!(errors.to_string())));
        }

        let envelope = match self.api.post_json("/auth/login", credentials).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("sign-in request failed: {}", e);
                return Ok(Envelope::failure(json!(e.to_string())));
            }
        };
        if !envelope.is_success() {
            info!("sign-in rejected for {}", credentials.username);
            return Ok(envelope);
        }

        let session = match session_from_login(envelope.data.clone()) {
            Ok(session) => session,
            Err(e) => {
                warn!("sign-in response could not be read: {}", e);
                return Ok(Envelope::failure(json!(e.to_string())));
            }
        };

        self.store.save(&session).await?;
        info!("signed in as {}", session.user.username);
        self.session.set(AuthState::Authenticated(session));

        self.register_push_token().await;

        Ok(envelope)
    }

    /// Clears the in-memory session and the stored entries. No server call is made.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.session.set(AuthState::Unauthenticated);
        self.store.clear().await?;
        info!("signed out");
        Ok(())
    }

    /// Replaces the cached profile, keeping the current token, and persists it.
    pub async fn update_user(&self, user: User) -> Result<(), AppError> {
        self.merge_user(move |current| *current = user).await.map(|_| ())
    }

    /// Applies `update` to the cached profile and persists the result.
    pub async fn merge_user<F>(&self, update: F) -> Result<User, AppError>
    where
        F: FnOnce(&mut User),
    {
        self.ensure_restored("update_user")?;
        let user = self.session.update_user(update).ok_or_else(|| {
            AppError::Misuse("profile update requested without an active session".into())
        })?;
        self.store.save_user(&user).await?;
        Ok(user)
    }

    /// Overwrites only the unread-notification counter of the cached profile.
    ///
    /// Returns `Ok(None)` when the session ended while the count was being
    /// fetched; the count is then dropped.
    pub async fn update_unread_count(&self, count: u32) -> Result<Option<User>, AppError> {
        self.ensure_restored("update_unread_count")?;
        let Some(user) = self
            .session
            .update_user(|user| user.unread_notifications_count = count)
        else {
            debug!("signed out before the unread counter arrived, dropping it");
            return Ok(None);
        };
        self.store.save_user(&user).await?;
        Ok(Some(user))
    }

    async fn register_push_token(&self) {
        let token = match self.store.cached_push_token().await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return,
            Err(e) => {
                warn!("could not read cached push token: {}", e);
                return;
            }
        };
        let body = PushTokenPatch { fcm_token: &token };
        match self.api.patch_json("/users/my/fcm-token", &body).await {
            Ok(envelope) if envelope.is_success() => info!("push token registered"),
            Ok(envelope) => warn!("push token rejected: {}", envelope.error_text()),
            Err(e) => warn!("push token registration failed: {}", e),
        }
    }

    fn ensure_restored(&self, operation: &str) -> Result<(), AppError> {
        if self.session.is_initializing() {
            return Err(AppError::Misuse(format!(
                "{} called before the auth manager restored its session",
                operation
            )));
        }
        Ok(())
    }
}

// The login payload is the user record with the bearer token alongside its fields.
fn session_from_login(data: Option<Value>) -> Result<Session, AppError> {
    let mut data = match data {
        Some(Value::Object(map)) => map,
        _ => return Err(malformed("login response carries no user record")),
    };
    let token = match data.remove("token") {
        Some(Value::String(token)) if !token.is_empty() => token,
        _ => return Err(malformed("login response carries no token")),
    };
    let user: User = serde_json::from_value(Value::Object(data))?;
    Ok(Session { token, user })
}

fn malformed(reason: &str) -> AppError {
    AppError::Decode(<serde_json::Error as serde::de::Error>::custom(reason))
}
