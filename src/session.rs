//! Session persistence and the shared in-memory session state.

use std::sync::Arc;

use log::warn;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::User;
use crate::storage::KeyValueStore;

pub const TOKEN_KEY: &str = "@mobileonlibrary:token";
pub const USER_KEY: &str = "@mobileonlibrary:user";
pub const USERNAME_KEY: &str = "@mobileonlibrary:username";
pub const PUSH_TOKEN_KEY: &str = "@mobileonlibrary:fcmToken";

/// An authenticated session: the bearer token and the cached profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Persists the session (and a couple of sign-in conveniences) in a key-value store.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Loads the persisted session. A missing token or user is a normal empty
    /// state and yields `Ok(None)`.
    pub async fn load(&self) -> Result<Option<Session>, AppError> {
        let values = self.storage.multi_get(&[TOKEN_KEY, USER_KEY]).await?;
        match (values.first().cloned().flatten(), values.get(1).cloned().flatten()) {
            (Some(token), Some(user)) if !token.is_empty() => {
                let user: User = serde_json::from_str(&user)?;
                Ok(Some(Session { token, user }))
            }
            _ => Ok(None),
        }
    }

    pub async fn save(&self, session: &Session) -> Result<(), AppError> {
        let user = serde_json::to_string(&session.user)?;
        self.storage
            .multi_set(&[(TOKEN_KEY, session.token.as_str()), (USER_KEY, user.as_str())])
            .await
    }

    /// Replaces only the stored profile.
    pub async fn save_user(&self, user: &User) -> Result<(), AppError> {
        let user = serde_json::to_string(user)?;
        self.storage.set(USER_KEY, &user).await
    }

    /// Removes the token and the user. Remembered username and push token stay.
    pub async fn clear(&self) -> Result<(), AppError> {
        self.storage.multi_remove(&[TOKEN_KEY, USER_KEY]).await
    }

    pub async fn remembered_username(&self) -> Result<Option<String>, AppError> {
        self.storage.get(USERNAME_KEY).await
    }

    /// Stores the username for the next sign-in, or forgets it with `None`.
    pub async fn remember_username(&self, username: Option<&str>) -> Result<(), AppError> {
        match username {
            Some(username) => self.storage.set(USERNAME_KEY, username).await,
            None => self.storage.multi_remove(&[USERNAME_KEY]).await,
        }
    }

    pub async fn cached_push_token(&self) -> Result<Option<String>, AppError> {
        self.storage.get(PUSH_TOKEN_KEY).await
    }

    pub async fn cache_push_token(&self, token: &str) -> Result<(), AppError> {
        self.storage.set(PUSH_TOKEN_KEY, token).await
    }
}

/// Lifecycle of the authentication state.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// The stored session has not been looked at yet.
    Initializing,
    Authenticated(Session),
    Unauthenticated,
}

/// Cheaply clonable handle on the current authentication state.
///
/// Only the auth manager writes through it; the HTTP client reads the token
/// from it when building each request.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<AuthState>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(AuthState::Initializing)),
        }
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AuthState {
        self.inner.read().clone()
    }

    pub fn is_initializing(&self) -> bool {
        matches!(*self.inner.read(), AuthState::Initializing)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.inner.read(), AuthState::Authenticated(_))
    }

    pub fn session(&self) -> Option<Session> {
        match &*self.inner.read() {
            AuthState::Authenticated(session) => Some(session.clone()),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<String> {
        match &*self.inner.read() {
            AuthState::Authenticated(session) => Some(session.token.clone()),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<User> {
        self.session().map(|session| session.user)
    }

    pub(crate) fn set(&self, state: AuthState) {
        *self.inner.write() = state;
    }

    /// Applies `update` to the current user, keeping the token. Returns the
    /// updated user, or `None` when there is no session.
    pub(crate) fn update_user<F>(&self, update: F) -> Option<User>
    where
        F: FnOnce(&mut User),
    {
        let mut state = self.inner.write();
        match &mut *state {
            AuthState::Authenticated(session) => {
                update(&mut session.user);
                Some(session.user.clone())
            }
            _ => {
                warn!("profile update ignored: no active session");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn user() -> User {
        serde_json::from_value(json!({
            "id": 1,
            "name": "Test User",
            "username": "testuser",
            "unread_notifications_count": 2
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.load().await.unwrap(), None);

        let session = Session {
            token: "abc".to_string(),
            user: user(),
        };
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_entries_are_an_empty_session() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(TOKEN_KEY, "abc").await.unwrap();
        let store = SessionStore::new(storage);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_keeps_preferences() {
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        store.remember_username(Some("testuser")).await.unwrap();
        store.cache_push_token("fcm-1").await.unwrap();
        store
            .save(&Session {
                token: "abc".to_string(),
                user: user(),
            })
            .await
            .unwrap();

        store.clear().await.unwrap();
        assert_eq!(
            store.remembered_username().await.unwrap().as_deref(),
            Some("testuser")
        );
        assert_eq!(store.cached_push_token().await.unwrap().as_deref(), Some("fcm-1"));

        store.remember_username(None).await.unwrap();
        assert_eq!(store.remembered_username().await.unwrap(), None);
    }

    #[test]
    fn test_handle_update_preserves_token() {
        let handle = SessionHandle::new();
        assert!(handle.is_initializing());
        assert!(handle.update_user(|u| u.name = "x".into()).is_none());

        handle.set(AuthState::Authenticated(Session {
            token: "abc".to_string(),
            user: user(),
        }));
        let updated = handle
            .update_user(|u| u.unread_notifications_count = 0)
            .unwrap();
        assert_eq!(updated.unread_notifications_count, 0);
        assert_eq!(handle.token().as_deref(), Some("abc"));
        assert_eq!(handle.user().unwrap().name, "Test User");
    }
}
