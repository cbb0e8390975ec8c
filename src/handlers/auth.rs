use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar},
};

use crate::{
    AppState,
    auth::{
        AuthUser, SESSION_COOKIE, hash_password, issue_token, password_meets_policy,
        session_cookie, verify_password,
    },
    error::{ApiError, MessageResponse, RepoError},
    models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, Role, UserProfile},
};

const PASSWORD_RULES: &str = "Password must be at least 8 characters and include an uppercase letter, a lowercase letter, a number and a special character, with no spaces";

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// register
///
/// [Public Route] Creates a `user` account. The first admin is provisioned through
/// the superadmin seed, never through this endpoint.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = MessageResponse),
        (status = 400, description = "Invalid input or email taken", body = MessageResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let name = payload.name.trim();
    let email = normalize_email(&payload.email);
    if name.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("All fields are required"));
    }
    if !password_meets_policy(&payload.password) {
        return Err(ApiError::bad_request(PASSWORD_RULES));
    }
    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::bad_request("User already registered"));
    }

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = state
        .repo
        .create_user(NewUser {
            name: name.to_string(),
            email,
            password_hash,
            role: Role::User,
        })
        .await
        .map_err(|e| match e {
            RepoError::Duplicate(msg) => ApiError::BadRequest(msg),
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// login
///
/// [Public Route] Verifies the credentials, then returns the session token in the
/// body and as the HttpOnly `session_token` cookie.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());
    let user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(payload.password, user.password_hash.clone()).await {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(invalid());
    }

    let token = issue_token(&user, &state.config)?;
    let jar = jar.add(session_cookie(token.clone(), &state.config));

    Ok((
        jar,
        Json(LoginResponse {
            token,
            user: UserProfile::from(user),
        }),
    ))
}

/// logout
///
/// Expires the session cookie. Bearer tokens stay valid until `exp`.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Signed out", body = MessageResponse))
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    (jar, Json(MessageResponse::new("Logged out")))
}

/// me
///
/// [Authenticated Route] The caller's stored profile.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "No session", body = MessageResponse)
    )
)]
pub async fn me(user: AuthUser, State(state): State<AppState>) -> Result<Json<UserProfile>, ApiError> {
    let stored = state
        .repo
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(UserProfile::from(stored)))
}
