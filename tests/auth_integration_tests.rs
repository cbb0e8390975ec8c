use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use shop_dashboard::{
    AppState,
    auth::{AuthUser, Claims, SESSION_COOKIE, issue_token, session_cookie},
    config::{AppConfig, Env},
    models::{NewUser, Role, User},
    repository::{InMemoryRepository, Repository},
    storage::MockStorageService,
};
use std::sync::Arc;
use uuid::Uuid;

// --- TEST UTILITIES ---

fn state_for(env: Env) -> AppState {
    AppState {
        repo: Arc::new(InMemoryRepository::new()),
        storage: Arc::new(MockStorageService::new()),
        config: AppConfig {
            env,
            ..AppConfig::default()
        },
    }
}

async fn seed(state: &AppState, role: Role) -> User {
    state
        .repo
        .create_user(NewUser {
            name: "Tester".into(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "unused".into(),
            role,
        })
        .await
        .unwrap()
}

fn parts_with(headers: &[(header::HeaderName, String)]) -> Parts {
    let mut builder = Request::builder().uri("/api/auth/me");
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder.body(()).unwrap().into_parts().0
}

async fn resolve(state: &AppState, mut parts: Parts) -> Result<AuthUser, StatusCode> {
    AuthUser::from_request_parts(&mut parts, state)
        .await
        .map_err(|e| e.status_code())
}

// --- TESTS ---

#[tokio::test]
async fn test_bearer_token_resolves_user() {
    let state = state_for(Env::Production);
    let user = seed(&state, Role::Admin).await;
    let token = issue_token(&user, &state.config).unwrap();

    let parts = parts_with(&[(header::AUTHORIZATION, format!("Bearer {token}"))]);
    let resolved = resolve(&state, parts).await.unwrap();

    assert_eq!(resolved.id, user.id);
    assert_eq!(resolved.role, Role::Admin);
}

#[tokio::test]
async fn test_session_cookie_resolves_user() {
    let state = state_for(Env::Production);
    let user = seed(&state, Role::User).await;
    let token = issue_token(&user, &state.config).unwrap();

    let parts = parts_with(&[(header::COOKIE, format!("{SESSION_COOKIE}={token}"))]);
    let resolved = resolve(&state, parts).await.unwrap();
    assert_eq!(resolved.id, user.id);
}

#[tokio::test]
async fn test_role_is_reloaded_from_store() {
    let state = state_for(Env::Production);
    let user = seed(&state, Role::User).await;
    let token = issue_token(&user, &state.config).unwrap();

    state
        .repo
        .update_user(user.id, user.name.clone(), Role::Admin)
        .await
        .unwrap();

    let parts = parts_with(&[(header::AUTHORIZATION, format!("Bearer {token}"))]);
    assert_eq!(resolve(&state, parts).await.unwrap().role, Role::Admin);
}

#[tokio::test]
async fn test_deleted_user_loses_access() {
    let state = state_for(Env::Production);
    let user = seed(&state, Role::User).await;
    let token = issue_token(&user, &state.config).unwrap();
    state.repo.delete_user(user.id).await.unwrap();

    let parts = parts_with(&[(header::AUTHORIZATION, format!("Bearer {token}"))]);
    assert_eq!(resolve(&state, parts).await.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_or_foreign_tokens_are_rejected() {
    let state = state_for(Env::Production);
    let user = seed(&state, Role::User).await;
    let now = Utc::now().timestamp();

    let expired = encode(
        &Header::default(),
        &Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: (now - 7200) as usize,
            exp: (now - 3600) as usize,
        },
        &EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
    )
    .unwrap();
    let parts = parts_with(&[(header::AUTHORIZATION, format!("Bearer {expired}"))]);
    assert_eq!(resolve(&state, parts).await.unwrap_err(), StatusCode::UNAUTHORIZED);

    let foreign_config = AppConfig {
        jwt_secret: "some-other-secret".into(),
        ..AppConfig::default()
    };
    let foreign = issue_token(&user, &foreign_config).unwrap();
    let parts = parts_with(&[(header::AUTHORIZATION, format!("Bearer {foreign}"))]);
    assert_eq!(resolve(&state, parts).await.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_credentials_are_unauthorized() {
    let state = state_for(Env::Local);
    assert_eq!(
        resolve(&state, parts_with(&[])).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_dev_bypass_only_in_local() {
    let local = state_for(Env::Local);
    let user = seed(&local, Role::User).await;
    let parts = parts_with(&[(header::HeaderName::from_static("x-user-id"), user.id.to_string())]);
    assert_eq!(resolve(&local, parts).await.unwrap().id, user.id);

    let prod = state_for(Env::Production);
    let prod_user = seed(&prod, Role::User).await;
    let parts = parts_with(&[(
        header::HeaderName::from_static("x-user-id"),
        prod_user.id.to_string(),
    )]);
    assert_eq!(resolve(&prod, parts).await.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_identity_attached_by_page_guard_wins() {
    let state = state_for(Env::Production);
    let mut parts = parts_with(&[]);
    let attached = AuthUser {
        id: Uuid::new_v4(),
        role: Role::Superadmin,
        email: "guard@example.com".into(),
        name: "Guard".into(),
    };
    parts.extensions.insert(attached.clone());

    let resolved = resolve(&state, parts).await.unwrap();
    assert_eq!(resolved.id, attached.id);
}

#[test]
fn test_session_cookie_attributes() {
    let local = AppConfig::default();
    let cookie = session_cookie("tok".into(), &local);
    assert_eq!(cookie.name(), SESSION_COOKIE);
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
    assert_ne!(cookie.secure(), Some(true));

    let prod = AppConfig {
        env: Env::Production,
        ..AppConfig::default()
    };
    assert_eq!(session_cookie("tok".into(), &prod).secure(), Some(true));
}
