use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Name of the HttpOnly cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

/// Characters that satisfy the "special character" password rule.
const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// Claims
///
/// Payload of a session token. `role` and `email` are informational; the extractor
/// always re-reads the account so that role changes apply to live sessions.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Expiration Time, seconds since the epoch.
    pub exp: usize,
    /// Issued At, seconds since the epoch.
    pub iat: usize,
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers use it for ownership
/// checks (`id`) and role checks (`role`).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub email: String,
    pub name: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

impl AuthUser {
    /// Fails with 403 unless the caller is `admin` or `superadmin`.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }

    pub fn require_superadmin(&self) -> Result<(), ApiError> {
        if self.role.is_superadmin() {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }

    /// Owner-or-admin rule used for categories, products and orders.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.role.is_admin() || self.id == owner_id
    }

    /// Owner filter for list queries: plain users only see their own documents.
    pub fn scope(&self) -> Option<Uuid> {
        if self.role.is_admin() {
            None
        } else {
            Some(self.id)
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. An identity already attached by the page guard (request extensions).
/// 2. Local bypass: an `x-user-id` header naming an existing user (`Env::Local` only).
/// 3. A token from `Authorization: Bearer ...`, falling back to the session cookie.
///
/// The token's subject is re-loaded from the repository, so deleted accounts lose
/// access immediately. Any failure rejects with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());
            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.find_user_by_id(user_id).await? {
                    return Ok(AuthUser::from(&user));
                }
            }
        }

        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or_else(ApiError::unauthorized)?;

        let claims = decode_token(&token, &config.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            ApiError::unauthorized()
        })?;

        let user = repo
            .find_user_by_id(claims.sub)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(AuthUser::from(&user))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn cookie_token(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// issue_token
///
/// Signs an HS256 session token for `user`, valid for `session_max_age_secs`.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now as usize,
        exp: (now + config.session_max_age_secs) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "failed to sign session token");
        ApiError::Internal
    })
}

/// Validates signature and expiry.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
}

/// The cookie set on login. Marked `Secure` outside local development.
pub fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.env == Env::Production)
        .max_age(time::Duration::seconds(config.session_max_age_secs))
        .build()
}

/// password_meets_policy
///
/// At least 8 characters, no whitespace, and at least one lowercase letter, uppercase
/// letter, digit and special character.
pub fn password_meets_policy(password: &str) -> bool {
    password.chars().count() >= 8
        && !password.chars().any(char::is_whitespace)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Hashes on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing task failed");
            ApiError::Internal
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::Internal
        })
}

/// Returns false for a mismatch and for a malformed stored hash.
pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy() {
        assert!(password_meets_policy("Str0ng!pass"));
        assert!(!password_meets_policy("Sh0rt!"));
        assert!(!password_meets_policy("nouppercase1!"));
        assert!(!password_meets_policy("NOLOWERCASE1!"));
        assert!(!password_meets_policy("NoDigits!!"));
        assert!(!password_meets_policy("NoSpecial11"));
        assert!(!password_meets_policy("Has Space1!"));
    }

    #[test]
    fn issued_token_decodes_with_same_secret_only() {
        let config = AppConfig::default();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            role: Role::Admin,
            created_at: now,
            updated_at: now,
        };

        let token = issue_token(&user, &config).unwrap();
        let claims = decode_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Admin);
        assert!(decode_token(&token, "another-secret").is_err());
    }

    #[tokio::test]
    async fn bcrypt_round_trip() {
        let hash = hash_password("Str0ng!pass".into(), 4).await.unwrap();
        assert!(verify_password("Str0ng!pass".into(), hash.clone()).await);
        assert!(!verify_password("wrong".into(), hash).await);
        assert!(!verify_password("x".into(), "not-a-hash".into()).await);
    }
}
