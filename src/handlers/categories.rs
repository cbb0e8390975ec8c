use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, CategoryUsage, MessageResponse, RepoError},
    models::{Category, CategoryDeleteResponse, CategoryRequest, CategoryView},
    repository::RepositoryState,
};

fn category_not_found() -> ApiError {
    ApiError::NotFound("Category not found".to_string())
}

fn parent_not_found() -> ApiError {
    ApiError::bad_request("Parent category not found")
}

/// Loads a category and applies the owner-or-admin rule.
async fn load_accessible(state: &AppState, user: &AuthUser, id: Uuid) -> Result<Category, ApiError> {
    let category = state
        .repo
        .get_category(id)
        .await?
        .ok_or_else(category_not_found)?;
    if !user.can_access(category.user_id) {
        return Err(ApiError::forbidden());
    }
    Ok(category)
}

/// The parent must exist and be visible to the caller.
async fn check_parent(state: &AppState, user: &AuthUser, parent: Uuid) -> Result<(), ApiError> {
    match state.repo.get_category(parent).await? {
        Some(p) if user.can_access(p.user_id) => Ok(()),
        _ => Err(parent_not_found()),
    }
}

/// is_descendant
///
/// Walks up from `candidate` through its ancestors and reports whether `id` is among
/// them. Stops on a missing link or an already visited node.
pub async fn is_descendant(
    repo: &RepositoryState,
    id: Uuid,
    candidate: Uuid,
) -> Result<bool, ApiError> {
    let mut seen = HashSet::new();
    let mut cursor = Some(candidate);
    while let Some(current) = cursor {
        if current == id {
            return Ok(true);
        }
        if !seen.insert(current) {
            break;
        }
        cursor = repo.get_category(current).await?.and_then(|c| c.parent_id);
    }
    Ok(false)
}

async fn view(state: &AppState, id: Uuid) -> Result<CategoryView, ApiError> {
    state
        .repo
        .get_category_view(id)
        .await?
        .ok_or_else(category_not_found)
}

/// list_categories
///
/// [Authenticated Route] Sorted by name. Plain users only see their own tree.
#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "Categories", body = [CategoryView]))
)]
pub async fn list_categories(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryView>>, ApiError> {
    Ok(Json(state.repo.list_categories(user.scope()).await?))
}

/// create_category
///
/// [Authenticated Route] Adds a category owned by the caller, optionally under an
/// existing parent.
#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Created", body = CategoryView),
        (status = 400, description = "Invalid name or parent", body = MessageResponse),
        (status = 409, description = "Duplicate", body = MessageResponse)
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<CategoryRequest>, ApiError>,
) -> Result<(StatusCode, Json<CategoryView>), ApiError> {
    let (name, parent) = payload.validate()?;
    if let Some(parent) = parent {
        check_parent(&state, &user, parent).await?;
    }
    if state
        .repo
        .category_exists(user.id, &name, parent, None)
        .await?
    {
        return Err(ApiError::Conflict("Category already exists".to_string()));
    }

    let created = state.repo.create_category(user.id, name, parent).await?;
    tracing::debug!(category_id = %created.id, owner = %user.id, "category created");
    Ok((StatusCode::CREATED, Json(view(&state, created.id).await?)))
}

/// get_category
#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = CategoryView),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn get_category(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<CategoryView>, ApiError> {
    load_accessible(&state, &user, id).await?;
    Ok(Json(view(&state, id).await?))
}

/// update_category
///
/// [Authenticated Route] Renames and/or moves a category. A move that would put the
/// category under itself or under one of its descendants is rejected.
#[utoipa::path(
    patch,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Updated", body = CategoryView),
        (status = 400, description = "Invalid name or parent", body = MessageResponse),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse),
        (status = 409, description = "Duplicate", body = MessageResponse)
    )
)]
pub async fn update_category(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<CategoryRequest>, ApiError>,
) -> Result<Json<CategoryView>, ApiError> {
    let category = load_accessible(&state, &user, id).await?;
    let (name, parent) = payload.validate()?;

    if let Some(parent) = parent {
        if parent == id {
            return Err(ApiError::bad_request("Category cannot be its own parent"));
        }
        check_parent(&state, &user, parent).await?;
        if is_descendant(&state.repo, id, parent).await? {
            return Err(ApiError::bad_request(
                "Category cannot be moved under one of its own subcategories",
            ));
        }
    }

    if state
        .repo
        .category_exists(category.user_id, &name, parent, Some(id))
        .await?
    {
        return Err(ApiError::Conflict("Category name already exists".to_string()));
    }

    state
        .repo
        .update_category(id, name, parent)
        .await?
        .ok_or_else(category_not_found)?;
    Ok(Json(view(&state, id).await?))
}

/// delete_category
///
/// [Authenticated Route] Refused with 409 while any product references the category.
/// Otherwise its children become roots and the category is removed.
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Deleted", body = CategoryDeleteResponse),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse),
        (status = 409, description = "Still referenced by products", body = CategoryUsage)
    )
)]
pub async fn delete_category(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<CategoryDeleteResponse>, ApiError> {
    load_accessible(&state, &user, id).await?;

    let reparented_children = match state.repo.delete_category(id).await {
        Ok(Some(count)) => count,
        Ok(None) => return Err(category_not_found()),
        Err(RepoError::CategoryInUse(usage)) => {
            tracing::debug!(
                category_id = %id,
                products = usage.product_count,
                "category delete refused"
            );
            return Err(ApiError::CategoryInUse(usage));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(category_id = %id, reparented_children, "category deleted");
    Ok(Json(CategoryDeleteResponse {
        message: "Category deleted successfully".to_string(),
        reparented_children,
    }))
}
