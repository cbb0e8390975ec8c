use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    error::{ApiError, MessageResponse},
    handlers::auth::normalize_email,
    models::{NewUser, Role, UpdateUserRequest, UserProfile},
};

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

fn superadmin_only() -> ApiError {
    ApiError::Forbidden("Only a superadmin can manage superadmin accounts.".to_string())
}

/// list_users
///
/// [Admin Route] Every account, newest first.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [UserProfile]),
        (status = 403, description = "Not an admin", body = MessageResponse)
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    user.require_admin()?;
    let users = state.repo.list_users(None).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// update_user
///
/// [Admin Route] Renames an account and sets its role.
///
/// Nobody may change their own role, and only a superadmin may edit a superadmin or
/// grant the superadmin role.
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 403, description = "Forbidden", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateUserRequest>, ApiError>,
) -> Result<Json<UserProfile>, ApiError> {
    user.require_admin()?;

    let name = payload.name.as_deref().map(str::trim).unwrap_or_default();
    let (false, Some(raw_role)) = (name.is_empty(), payload.role.as_deref()) else {
        return Err(ApiError::bad_request("Name and role are required"));
    };
    let role: Role = raw_role
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid role"))?;

    let target = state
        .repo
        .find_user_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;

    if target.id == user.id && target.role != role {
        return Err(ApiError::Forbidden(
            "You cannot change your own role.".to_string(),
        ));
    }
    if !user.role.is_superadmin() && (target.role.is_superadmin() || role.is_superadmin()) {
        return Err(superadmin_only());
    }

    let updated = state
        .repo
        .update_user(id, name.to_string(), role)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(actor = %user.id, target = %id, %role, "user updated");
    Ok(Json(UserProfile::from(updated)))
}

/// delete_user
///
/// [Admin Route] Removes an account together with its categories and products.
/// Refused with 409 while another account's product uses one of those categories.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Forbidden", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse),
        (status = 409, description = "Categories used by other accounts", body = MessageResponse)
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    user.require_admin()?;
    if id == user.id {
        return Err(ApiError::Forbidden(
            "You cannot delete your own account.".to_string(),
        ));
    }

    let target = state
        .repo
        .find_user_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;
    if target.role.is_superadmin() && !user.role.is_superadmin() {
        return Err(superadmin_only());
    }

    if !state.repo.delete_user(id).await? {
        return Err(user_not_found());
    }

    tracing::info!(actor = %user.id, target = %id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// seed_superadmin
///
/// Startup bootstrap. Creates the configured superadmin unless an account with that
/// email already exists. Returns the created profile, if any.
pub async fn seed_superadmin(state: &AppState) -> Result<Option<UserProfile>, ApiError> {
    let Some(seed) = state.config.superadmin_seed.clone() else {
        return Ok(None);
    };

    let email = normalize_email(&seed.email);
    if state.repo.find_user_by_email(&email).await?.is_some() {
        tracing::debug!(%email, "superadmin seed already present");
        return Ok(None);
    }

    let password_hash = hash_password(seed.password, state.config.bcrypt_cost).await?;
    let user = state
        .repo
        .create_user(NewUser {
            name: seed.name,
            email,
            password_hash,
            role: Role::Superadmin,
        })
        .await?;

    tracing::info!(user_id = %user.id, "superadmin account seeded");
    Ok(Some(UserProfile::from(user)))
}
