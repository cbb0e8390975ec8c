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
    error::{ApiError, MessageResponse},
    models::{OwnerRef, Product, ProductRequest, ProductView},
};

fn product_not_found() -> ApiError {
    ApiError::NotFound("Product not found".to_string())
}

fn invalid_categories() -> ApiError {
    ApiError::bad_request("Invalid categories provided")
}

fn sku_taken() -> ApiError {
    ApiError::Conflict("SKU already exists".to_string())
}

/// Loads a product and applies the owner-or-admin rule.
pub(crate) async fn load_accessible(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<Product, ApiError> {
    let product = state
        .repo
        .get_product(id)
        .await?
        .ok_or_else(product_not_found)?;
    if !user.can_access(product.user_id) {
        return Err(ApiError::forbidden());
    }
    Ok(product)
}

/// Resolves category names and the owner for a single product.
pub(crate) async fn populate(state: &AppState, product: Product) -> Result<ProductView, ApiError> {
    let categories = state.repo.categories_by_ids(&product.categories).await?;
    let owner = state
        .repo
        .find_user_by_id(product.user_id)
        .await?
        .map(|u| OwnerRef::from(&u));
    Ok(ProductView::new(product, categories, owner))
}

/// list_products
///
/// [Authenticated Route] Newest first. Plain users only see their own products.
#[utoipa::path(
    get,
    path = "/api/products",
    responses((status = 200, description = "Products", body = [ProductView]))
)]
pub async fn list_products(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    Ok(Json(state.repo.list_products(user.scope()).await?))
}

/// create_product
///
/// [Authenticated Route] Every referenced category must belong to the caller.
#[utoipa::path(
    post,
    path = "/api/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Created", body = ProductView),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 409, description = "SKU taken", body = MessageResponse)
    )
)]
pub async fn create_product(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<ProductRequest>, ApiError>,
) -> Result<(StatusCode, Json<ProductView>), ApiError> {
    let input = payload.validate()?;

    if state.repo.sku_exists(user.id, &input.sku, None).await? {
        return Err(sku_taken());
    }
    let owned = state
        .repo
        .count_categories(&input.categories, Some(user.id))
        .await?;
    if owned != input.categories.len() as i64 {
        return Err(invalid_categories());
    }

    let product = state.repo.create_product(user.id, input).await?;
    tracing::debug!(product_id = %product.id, owner = %user.id, "product created");
    Ok((StatusCode::CREATED, Json(populate(&state, product).await?)))
}

/// get_product
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Found", body = ProductView),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn get_product(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<ProductView>, ApiError> {
    let product = load_accessible(&state, &user, id).await?;
    Ok(Json(populate(&state, product).await?))
}

/// update_product
///
/// [Authenticated Route] Replaces all fields. Categories only need to exist, which
/// lets an admin keep another owner's categories on that owner's product.
#[utoipa::path(
    patch,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Updated", body = ProductView),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse),
        (status = 409, description = "SKU taken", body = MessageResponse)
    )
)]
pub async fn update_product(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<ProductRequest>, ApiError>,
) -> Result<Json<ProductView>, ApiError> {
    let existing = load_accessible(&state, &user, id).await?;
    let input = payload.validate()?;

    if state
        .repo
        .sku_exists(existing.user_id, &input.sku, Some(id))
        .await?
    {
        return Err(sku_taken());
    }
    let found = state.repo.count_categories(&input.categories, None).await?;
    if found != input.categories.len() as i64 {
        return Err(invalid_categories());
    }

    let product = state
        .repo
        .update_product(id, input)
        .await?
        .ok_or_else(product_not_found)?;
    Ok(Json(populate(&state, product).await?))
}

/// delete_product
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn delete_product(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    load_accessible(&state, &user, id).await?;
    if !state.repo.delete_product(id).await? {
        return Err(product_not_found());
    }
    Ok(Json(MessageResponse::new("Product deleted successfully")))
}
