mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{closed_port_url, spawn_mock_api, PASSWORD, TOKEN};
use onlibrary::auth::SignInCredentials;
use onlibrary::models::FileUpload;
use onlibrary::profile::{PasswordChange, ProfileUpdate};
use onlibrary::session::AuthState;
use onlibrary::storage::{KeyValueStore, MemoryStore};
use onlibrary::{AppError, AppState, Config};

#[test_log::test(actix_rt::test)]
async fn test_sign_in_persists_and_restores_session() {
    let api = spawn_mock_api().await;
    let dir = tempfile::tempdir().unwrap();

    let state = AppState::new(api.config(dir.path())).unwrap();
    assert_eq!(state.auth.restore().await, AuthState::Unauthenticated);
    state.auth.store().cache_push_token("device-1").await.unwrap();

    let envelope = state
        .auth
        .sign_in(&SignInCredentials::new("testuser", PASSWORD))
        .await
        .unwrap();
    assert!(envelope.is_success());
    assert!(state.session.is_authenticated());
    assert_eq!(state.session.token().as_deref(), Some(TOKEN));
    let user = state.session.user().unwrap();
    assert_eq!(user.username, "testuser");
    assert_eq!(user.unread_notifications_count, 1);
    assert!(user.can_access("Books"));
    assert!(!user.extra.contains_key("token"));

    let login = api.state.requests_to("POST", "/auth/login");
    assert_eq!(login.len(), 1);
    assert_eq!(login[0].authorization, None);
    assert_eq!(login[0].json(), json!({ "username": "testuser", "password": PASSWORD }));

    let push = api.state.requests_to("PATCH", "/users/my/fcm-token");
    assert_eq!(push.len(), 1);
    assert_eq!(push[0].json(), json!({ "fcm_token": "device-1" }));
    assert_eq!(push[0].authorization.as_deref(), Some("Bearer test-token"));

    // A fresh process picks the session back up from disk.
    let restarted = AppState::new(api.config(dir.path())).unwrap();
    match restarted.auth.restore().await {
        AuthState::Authenticated(session) => {
            assert_eq!(session.token, TOKEN);
            assert_eq!(session.user, user);
        }
        other => panic!("expected a restored session, got {:?}", other),
    }
}

#[actix_rt::test]
async fn test_sign_in_recovers_from_torn_session_file() {
    let api = spawn_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let config = api.config(dir.path());
    std::fs::write(config.session_file(), r#"{"@mobileonlibrary:tok"#).unwrap();

    let state = AppState::new(config.clone()).unwrap();
    assert_eq!(state.auth.restore().await, AuthState::Unauthenticated);

    let envelope = state
        .auth
        .sign_in(&SignInCredentials::new("testuser", PASSWORD))
        .await
        .unwrap();
    assert!(envelope.is_success());

    let restarted = AppState::new(config).unwrap();
    assert!(matches!(
        restarted.auth.restore().await,
        AuthState::Authenticated(_)
    ));
}

#[actix_rt::test]
async fn test_sign_in_without_push_token_skips_registration() {
    let api = spawn_mock_api().await;
    let state = api.app(Arc::new(MemoryStore::new()));
    state.auth.restore().await;

    let envelope = state
        .auth
        .sign_in(&SignInCredentials::new("testuser", PASSWORD))
        .await
        .unwrap();
    assert!(envelope.is_success());
    assert!(api.state.requests_to("PATCH", "/users/my/fcm-token").is_empty());
}

#[actix_rt::test]
async fn test_rejected_credentials_return_failure_envelope() {
    let api = spawn_mock_api().await;
    let storage = Arc::new(MemoryStore::new());
    let state = api.app(storage.clone());
    state.auth.restore().await;
    state.auth.store().cache_push_token("device-1").await.unwrap();

    let envelope = state
        .auth
        .sign_in(&SignInCredentials::new("testuser", "wrong"))
        .await
        .unwrap();

    assert!(!envelope.is_success());
    assert_eq!(envelope.error_text(), "Invalid credentials");
    assert_eq!(state.session.state(), AuthState::Unauthenticated);
    assert!(state.auth.store().load().await.unwrap().is_none());
    assert!(api.state.requests_to("PATCH", "/users/my/fcm-token").is_empty());
}

#[actix_rt::test]
async fn test_unreachable_server_returns_failure_envelope() {
    let config = Config::with_base_url(closed_port_url(), std::env::temp_dir());
    let state = AppState::with_store(config, Arc::new(MemoryStore::new())).unwrap();
    state.auth.restore().await;

    let envelope = state
        .auth
        .sign_in(&SignInCredentials::new("testuser", PASSWORD))
        .await
        .unwrap();

    assert!(!envelope.is_success());
    assert!(!envelope.error_text().is_empty());
    assert!(!state.session.is_authenticated());
}

#[actix_rt::test]
async fn test_sign_out_keeps_username_and_push_token() {
    let api = spawn_mock_api().await;
    let storage = Arc::new(MemoryStore::new());
    let state = api.app(storage.clone());
    state.auth.restore().await;
    state.auth.store().remember_username(Some("testuser")).await.unwrap();
    state.auth.store().cache_push_token("device-1").await.unwrap();
    state
        .auth
        .sign_in(&SignInCredentials::new("testuser", PASSWORD))
        .await
        .unwrap();

    state.auth.sign_out().await.unwrap();

    assert_eq!(state.session.state(), AuthState::Unauthenticated);
    assert!(state.session.token().is_none());
    assert!(state.auth.store().load().await.unwrap().is_none());
    assert_eq!(storage.get("@mobileonlibrary:token").await.unwrap(), None);
    assert_eq!(storage.get("@mobileonlibrary:user").await.unwrap(), None);
    assert_eq!(
        state.auth.store().remembered_username().await.unwrap().as_deref(),
        Some("testuser")
    );
    assert_eq!(
        state.auth.store().cached_push_token().await.unwrap().as_deref(),
        Some("device-1")
    );
}

#[actix_rt::test]
async fn test_profile_changes_merge_into_session() {
    let api = spawn_mock_api().await;
    let state = api.app(Arc::new(MemoryStore::new()));
    state.auth.restore().await;
    state
        .auth
        .sign_in(&SignInCredentials::new("testuser", PASSWORD))
        .await
        .unwrap();

    let update = ProfileUpdate {
        name: "Renamed User".to_string(),
        username: "renamed".to_string(),
    };
    let envelope = state.profile.update(&update).await.unwrap().unwrap();
    assert!(envelope.is_success());
    let user = state.session.user().unwrap();
    assert_eq!(user.name, "Renamed User");
    assert_eq!(user.username, "renamed");
    assert_eq!(state.session.token().as_deref(), Some(TOKEN));
    let stored = state.auth.store().load().await.unwrap().unwrap();
    assert_eq!(stored.user.username, "renamed");

    let avatar = FileUpload {
        file_name: "selfie.png".to_string(),
        content_type: Some("image/jpeg".to_string()),
        bytes: vec![0xff, 0xd8, 0xff],
    };
    let envelope = state.profile.upload_avatar(avatar).await.unwrap().unwrap();
    assert!(envelope.is_success());
    let user = state.session.user().unwrap();
    assert_eq!(user.avatar_url.as_deref(), Some("https://files/avatar.jpg"));
    assert_eq!(
        user.avatar_thumbnail_url.as_deref(),
        Some("https://files/avatar_thumb.jpg")
    );
    let upload = &api.state.requests_to("POST", "/profile/avatar")[0];
    assert!(upload.body.contains(r#"name="avatar"; filename="IMG_"#));
}

#[actix_rt::test]
async fn test_password_change_is_validated_locally() {
    let api = spawn_mock_api().await;
    let state = api.app(Arc::new(MemoryStore::new()));
    state.auth.restore().await;
    state
        .auth
        .sign_in(&SignInCredentials::new("testuser", PASSWORD))
        .await
        .unwrap();

    let mismatch = PasswordChange {
        current_password: PASSWORD.to_string(),
        new_password: "next-secret".to_string(),
        password_confirmation: "next-secert".to_string(),
    };
    let result = state.profile.change_password(&mismatch).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(api.state.requests_to("PUT", "/profile").is_empty());

    let change = PasswordChange {
        password_confirmation: "next-secret".to_string(),
        ..mismatch
    };
    let envelope = state.profile.change_password(&change).await.unwrap().unwrap();
    assert!(envelope.is_success());
    assert_eq!(api.state.requests_to("PUT", "/profile").len(), 1);
}
